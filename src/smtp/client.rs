//! Client-side session driver
//!
//! Runs the fixed command sequence against a server, checking each reply
//! before moving on:
//!
//! ```text
//! greeting 220 → HELO 250 → MAIL FROM 250 → RCPT TO 250 (each)
//!   → DATA 354 → payload + "." 250 → QUIT 221 → close
//! ```
//!
//! Any other reply aborts the sequence. The connection is then torn down
//! with a best-effort QUIT and closed exactly once.

use std::fmt;
use std::net::TcpStream;

use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::smtp::error::MailError;
use crate::smtp::grammar::Address;
use crate::smtp::response::{ReceivedReply, ReplyCode};
use crate::smtp::transport::{LineReader, Transport, send_text};

/// A step of the client command sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStep {
    Greeting,
    Helo,
    MailFrom,
    RcptTo,
    Data,
    Payload,
    Quit,
}

impl fmt::Display for ClientStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClientStep::Greeting => "greeting",
            ClientStep::Helo => "HELO",
            ClientStep::MailFrom => "MAIL FROM",
            ClientStep::RcptTo => "RCPT TO",
            ClientStep::Data => "DATA",
            ClientStep::Payload => "message data",
            ClientStep::Quit => "QUIT",
        })
    }
}

/// Sender and recipients of one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub sender: Address,
    pub recipients: Vec<Address>,
}

impl Envelope {
    pub fn new(sender: Address, recipients: Vec<Address>) -> Self {
        Self { sender, recipients }
    }
}

/// How a delivery attempt ended
#[derive(Debug)]
pub enum Outcome {
    /// The server accepted the message
    Delivered,
    /// The sequence stopped early; nothing was accepted
    Aborted(MailError),
}

impl Outcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Outcome::Delivered)
    }
}

/// One client connection
pub struct ClientSession<T: Transport> {
    connection: Option<T>,
    lines: LineReader,
    helo_domain: String,
}

impl<T: Transport> ClientSession<T> {
    pub fn new(stream: T, helo_domain: &str) -> Self {
        Self {
            connection: Some(stream),
            lines: LineReader::new(),
            helo_domain: helo_domain.to_owned(),
        }
    }

    /// Run the whole sequence for one message and close the connection
    pub fn deliver(mut self, envelope: &Envelope, payload: &str) -> Outcome {
        if let Err(e) = self.transfer(envelope, payload) {
            warn!(error = %e, "delivery aborted");
            self.teardown();
            return Outcome::Aborted(e);
        }

        // The message is accepted at this point; QUIT only ends the session.
        if let Err(e) = self.command("QUIT\n", ClientStep::Quit, ReplyCode::Closing) {
            warn!(error = %e, "server did not acknowledge QUIT");
        }
        self.close();
        info!(recipients = envelope.recipients.len(), "message delivered");
        Outcome::Delivered
    }

    fn transfer(&mut self, envelope: &Envelope, payload: &str) -> Result<(), MailError> {
        self.expect(ClientStep::Greeting, ReplyCode::ServiceReady)?;

        let helo = format!("HELO {}\n", self.helo_domain);
        self.command(&helo, ClientStep::Helo, ReplyCode::Ok)?;

        let mail = format!("MAIL FROM:<{}>\n", envelope.sender);
        self.command(&mail, ClientStep::MailFrom, ReplyCode::Ok)?;

        for recipient in &envelope.recipients {
            let rcpt = format!("RCPT TO:<{recipient}>\n");
            self.command(&rcpt, ClientStep::RcptTo, ReplyCode::Ok)?;
        }

        self.command("DATA\n", ClientStep::Data, ReplyCode::StartMailInput)?;
        self.command(&dot_stuff(payload), ClientStep::Payload, ReplyCode::Ok)?;
        Ok(())
    }

    /// Send `text` and require `expected` in reply
    fn command(
        &mut self,
        text: &str,
        step: ClientStep,
        expected: ReplyCode,
    ) -> Result<ReceivedReply, MailError> {
        let connection = self.connection.as_mut().ok_or(MailError::ConnectionClosed)?;
        debug!(%step, "sending");
        send_text(connection, text)?;
        self.expect(step, expected)
    }

    fn expect(&mut self, step: ClientStep, expected: ReplyCode) -> Result<ReceivedReply, MailError> {
        let reply = self.read_reply()?;
        debug!(%step, %reply, "received");
        if !reply.is(expected) {
            return Err(MailError::UnexpectedReply {
                step,
                expected,
                got: reply.code,
            });
        }
        Ok(reply)
    }

    fn read_reply(&mut self) -> Result<ReceivedReply, MailError> {
        let connection = self.connection.as_mut().ok_or(MailError::ConnectionClosed)?;
        let line = self
            .lines
            .read_line(connection)?
            .ok_or(MailError::ConnectionClosed)?;
        ReceivedReply::parse(&line)
    }

    /// Best-effort QUIT, then close. Failures here are only logged.
    fn teardown(&mut self) {
        if let Some(connection) = self.connection.as_mut() {
            if let Err(e) = send_text(connection, "QUIT\n") {
                debug!(error = %e, "could not send QUIT during teardown");
            } else if let Err(e) = self.read_reply() {
                debug!(error = %e, "no reply to QUIT during teardown");
            }
        }
        self.close();
    }

    fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.close() {
                debug!(error = %e, "error closing connection");
            }
        }
    }
}

impl<T: Transport> Drop for ClientSession<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Prefix lines starting with `.` and append the end-of-data marker
fn dot_stuff(payload: &str) -> String {
    let mut out = String::with_capacity(payload.len() + 8);
    for line in payload.split_inclusive('\n') {
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(".\n");
    out
}

/// Connect to the configured server and deliver one message
pub fn send_mail(config: &ClientConfig, envelope: &Envelope, payload: &str) -> Outcome {
    let stream = match TcpStream::connect((config.host.as_str(), config.port)) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(host = %config.host, port = config.port, error = %e, "connect failed");
            return Outcome::Aborted(e.into());
        }
    };
    if let Err(e) = stream.set_read_timeout(config.read_timeout) {
        warn!(error = %e, "could not set read timeout");
    }
    info!(host = %config.host, port = config.port, "connected");
    ClientSession::new(stream, &config.helo_domain).deliver(envelope, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smtp::transport::mock::MockStream;

    fn envelope(recipients: &[&str]) -> Envelope {
        Envelope::new(
            "a@x.com".parse().unwrap(),
            recipients.iter().map(|r| r.parse().unwrap()).collect(),
        )
    }

    const HAPPY_REPLIES: &str = concat!(
        "220 server.test\n",
        "250 Hello client.test pleased to meet you\n",
        "250 OK\n",
        "250 OK\n",
        "354 Start mail input; end with <CRLF>.<CRLF>\n",
        "250 OK\n",
        "221 server.test closing connection\n",
    );

    #[test]
    fn test_happy_path() {
        let mut stream = MockStream::new(HAPPY_REPLIES);
        let outcome = ClientSession::new(&mut stream, "client.test")
            .deliver(&envelope(&["b@y.com"]), "Hello\n");
        assert!(outcome.is_delivered());
        assert_eq!(
            stream.output_str(),
            "HELO client.test\nMAIL FROM:<a@x.com>\nRCPT TO:<b@y.com>\nDATA\nHello\n.\nQUIT\n"
        );
        assert_eq!(stream.closes, 1);
    }

    #[test]
    fn test_recipients_sent_in_order() {
        let replies = concat!(
            "220 s\n", "250 h\n", "250 OK\n", "250 OK\n", "250 OK\n", "354 go\n", "250 OK\n", "221 bye\n",
        );
        let mut stream = MockStream::new(replies);
        let outcome = ClientSession::new(&mut stream, "client.test")
            .deliver(&envelope(&["b@y.com", "c@z.com"]), "Hi\n");
        assert!(outcome.is_delivered());
        let sent = stream.output_str();
        let b = sent.find("RCPT TO:<b@y.com>").unwrap();
        let c = sent.find("RCPT TO:<c@z.com>").unwrap();
        assert!(b < c);
    }

    #[test]
    fn test_bad_greeting_aborts_with_teardown() {
        let mut stream = MockStream::new("554 go away\n221 bye\n");
        let outcome =
            ClientSession::new(&mut stream, "client.test").deliver(&envelope(&["b@y.com"]), "Hi\n");
        match outcome {
            Outcome::Aborted(MailError::UnexpectedReply { step, got, .. }) => {
                assert_eq!(step, ClientStep::Greeting);
                assert_eq!(got, 554);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(stream.output_str(), "QUIT\n");
        assert_eq!(stream.closes, 1);
    }

    #[test]
    fn test_rejected_recipient_aborts_remaining_steps() {
        let replies = concat!("220 s\n", "250 h\n", "250 OK\n", "503 Bad sequence of commands\n", "221 bye\n");
        let mut stream = MockStream::new(replies);
        let outcome = ClientSession::new(&mut stream, "client.test")
            .deliver(&envelope(&["b@y.com", "c@z.com"]), "Hi\n");
        assert!(matches!(
            outcome,
            Outcome::Aborted(MailError::UnexpectedReply {
                step: ClientStep::RcptTo,
                got: 503,
                ..
            })
        ));
        let sent = stream.output_str();
        assert!(!sent.contains("c@z.com"));
        assert!(!sent.contains("DATA"));
        assert!(sent.ends_with("RCPT TO:<b@y.com>\nQUIT\n"));
        assert_eq!(stream.closes, 1);
    }

    #[test]
    fn test_server_hangup_closes_once() {
        let mut stream = MockStream::new("220 s\n250 h\n");
        let outcome =
            ClientSession::new(&mut stream, "client.test").deliver(&envelope(&["b@y.com"]), "Hi\n");
        assert!(matches!(outcome, Outcome::Aborted(MailError::ConnectionClosed)));
        assert_eq!(stream.closes, 1);
    }

    #[test]
    fn test_write_failure_during_teardown_still_closes_once() {
        let mut stream = MockStream::new("220 s\n501 no\n");
        stream.fail_writes_after = Some(0);
        let outcome =
            ClientSession::new(&mut stream, "client.test").deliver(&envelope(&["b@y.com"]), "Hi\n");
        assert!(matches!(outcome, Outcome::Aborted(MailError::Io(_))));
        assert_eq!(stream.closes, 1);
    }

    #[test]
    fn test_malformed_reply_aborts() {
        let mut stream = MockStream::new("hello there\n");
        let outcome =
            ClientSession::new(&mut stream, "client.test").deliver(&envelope(&["b@y.com"]), "Hi\n");
        assert!(matches!(outcome, Outcome::Aborted(MailError::MalformedReply(_))));
        assert_eq!(stream.closes, 1);
    }

    #[test]
    fn test_wrong_quit_reply_is_still_delivered() {
        let replies = HAPPY_REPLIES.replace("221 server.test closing connection\n", "500 what\n");
        let mut stream = MockStream::new(&replies);
        let outcome =
            ClientSession::new(&mut stream, "client.test").deliver(&envelope(&["b@y.com"]), "Hi\n");
        assert!(outcome.is_delivered());
        assert_eq!(stream.closes, 1);
    }

    #[test]
    fn test_dropping_unused_session_closes_once() {
        let mut stream = MockStream::new("");
        drop(ClientSession::new(&mut stream, "client.test"));
        assert_eq!(stream.closes, 1);
    }

    #[test]
    fn test_dot_stuff() {
        assert_eq!(dot_stuff("Hello\n"), "Hello\n.\n");
        assert_eq!(dot_stuff("Hello"), "Hello\n.\n");
        assert_eq!(dot_stuff(""), ".\n");
        assert_eq!(dot_stuff(".\n..\nx\n"), "..\n...\nx\n.\n");
        assert_eq!(dot_stuff("a\r\n.b\r\n"), "a\r\n..b\r\n.\n");
    }

    #[test]
    fn test_connect_failure_aborts_without_close() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let config = ClientConfig::new("127.0.0.1", port).with_helo_domain("client.test");
        let outcome = send_mail(&config, &envelope(&["b@y.com"]), "Hi\n");
        assert!(matches!(outcome, Outcome::Aborted(MailError::Io(_))));
    }
}
