//! Byte-stream transport and line demultiplexing

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};

use crate::smtp::error::{Limits, MailError};

/// A bidirectional byte stream that can be closed
pub trait Transport: Read + Write {
    /// Close the stream in both directions
    fn close(&mut self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn close(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Write one complete chunk of text and flush it
pub fn send_text<W: Write + ?Sized>(stream: &mut W, text: &str) -> Result<(), MailError> {
    stream.write_all(text.as_bytes())?;
    stream.flush()?;
    Ok(())
}

/// Splits inbound bytes into `\n`-terminated lines
///
/// One read may carry several lines; they are queued and handed out one at
/// a time in arrival order. A trailing fragment stays buffered until its
/// newline arrives. Lines keep their terminator.
#[derive(Debug, Default)]
pub struct LineReader {
    partial: Vec<u8>,
    ready: VecDeque<String>,
}

impl LineReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes into the reader
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), MailError> {
        let mut rest = bytes;
        while let Some(idx) = rest.iter().position(|&b| b == b'\n') {
            self.partial.extend_from_slice(&rest[..=idx]);
            rest = &rest[idx + 1..];
            self.check_length()?;
            let line = String::from_utf8_lossy(&self.partial).into_owned();
            self.ready.push_back(line);
            self.partial.clear();
        }
        self.partial.extend_from_slice(rest);
        self.check_length()
    }

    fn check_length(&self) -> Result<(), MailError> {
        if self.partial.len() > Limits::MAX_LINE_LENGTH {
            return Err(MailError::LineTooLong {
                max: Limits::MAX_LINE_LENGTH,
            });
        }
        Ok(())
    }

    /// Next complete line, if one is buffered
    pub fn next_line(&mut self) -> Option<String> {
        self.ready.pop_front()
    }

    /// Number of complete lines waiting
    pub fn pending(&self) -> usize {
        self.ready.len()
    }

    /// True when an unterminated fragment is buffered
    pub fn has_partial(&self) -> bool {
        !self.partial.is_empty()
    }

    /// Block until a complete line is available
    ///
    /// Returns `Ok(None)` at end of stream. An unterminated fragment left at
    /// end of stream is dropped.
    pub fn read_line<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
    ) -> Result<Option<String>, MailError> {
        let mut chunk = [0u8; Limits::READ_CHUNK];
        loop {
            if let Some(line) = self.next_line() {
                return Ok(Some(line));
            }
            let read = match reader.read(&mut chunk) {
                Ok(0) => {
                    self.partial.clear();
                    return Ok(None);
                }
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.push(&chunk[..read])?;
        }
    }
}
