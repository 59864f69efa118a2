//! Interactive collection of a message draft

use std::io::{BufRead, Write};
use std::path::Path;

use tracing::debug;

use crate::smtp::compose::{Attachment, Draft};
use crate::smtp::error::MailError;
use crate::smtp::grammar::{Address, parse_mailbox};

/// Ask for sender, recipients, subject, body and attachment
///
/// Invalid addresses and unreadable attachments are asked for again. The
/// body ends at a line holding a single `.`. An empty attachment path sends
/// the message without one.
pub fn gather<R, W>(input: &mut R, output: &mut W) -> Result<Draft, MailError>
where
    R: BufRead,
    W: Write,
{
    let sender = loop {
        let line = ask(input, output, "From:")?;
        match parse_mailbox(&line) {
            Ok(address) => break address,
            Err(e) => debug!(error = %e, "invalid sender"),
        }
    };

    let recipients = loop {
        let line = ask(input, output, "To:")?;
        match parse_recipients(&line) {
            Some(recipients) => break recipients,
            None => debug!(line = %line, "invalid recipient list"),
        }
    };

    let subject = ask(input, output, "Subject:")?;

    writeln!(output, "Message:")?;
    output.flush()?;
    let mut body = String::new();
    loop {
        let line = read_line(input)?;
        if line.trim_end_matches(['\r', '\n']) == "." {
            break;
        }
        body.push_str(&line);
        if !line.ends_with('\n') {
            body.push('\n');
        }
    }

    let attachment = loop {
        let path = ask(input, output, "Attachment:")?;
        if path.is_empty() {
            break None;
        }
        match Attachment::from_path(Path::new(&path)) {
            Ok(attachment) => break Some(attachment),
            Err(e) => writeln!(output, "Cannot read {path}: {e}")?,
        }
    };

    Ok(Draft {
        sender,
        recipients,
        subject,
        body,
        attachment,
    })
}

/// Split a comma-separated list; `None` if any entry is not a mailbox
fn parse_recipients(line: &str) -> Option<Vec<Address>> {
    line.split(',')
        .map(|entry| parse_mailbox(entry.trim()).ok())
        .collect()
}

/// Print `label` and read one answer with its line ending removed
fn ask<R, W>(input: &mut R, output: &mut W, label: &str) -> Result<String, MailError>
where
    R: BufRead,
    W: Write,
{
    writeln!(output, "{label}")?;
    output.flush()?;
    let line = read_line(input)?;
    Ok(line.trim_end_matches(['\r', '\n']).trim().to_owned())
}

fn read_line<R: BufRead>(input: &mut R) -> Result<String, MailError> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(MailError::InputClosed);
    }
    Ok(line)
}
