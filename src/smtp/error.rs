//! Error types for the mail engine

use thiserror::Error;

use crate::smtp::client::ClientStep;
use crate::smtp::commands::Verb;
use crate::smtp::response::{Reply, ReplyCode};

/// Recoverable protocol errors. Each one is answered with a reply and the
/// session carries on.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("command unrecognized")]
    Unrecognized,

    #[error("malformed parameters for {0}")]
    Malformed(Verb),

    #[error("{0} out of sequence")]
    OutOfSequence(Verb),
}

impl ProtocolError {
    pub fn to_reply(&self) -> Reply {
        match self {
            ProtocolError::Unrecognized => Reply::unrecognized(),
            ProtocolError::Malformed(_) => Reply::bad_parameters(),
            ProtocolError::OutOfSequence(_) => Reply::bad_sequence(),
        }
    }
}

/// Errors that end a connection or a client operation
#[derive(Error, Debug)]
pub enum MailError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("Connection closed while collecting message data")]
    PrematureEndOfStream,

    #[error("Line too long (max {max} bytes)")]
    LineTooLong { max: usize },

    #[error("Malformed reply: {0:?}")]
    MalformedReply(String),

    #[error("Unexpected reply {got} to {step}, expected {expected}")]
    UnexpectedReply {
        step: ClientStep,
        expected: ReplyCode,
        got: u16,
    },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Input closed before the message was complete")]
    InputClosed,

    #[error("Failed to compose message: {0}")]
    Compose(String),

    #[error("Mailbox store failed for {domain}: {source}")]
    Store {
        domain: String,
        #[source]
        source: std::io::Error,
    },
}

/// Size limits applied to untrusted input
pub struct Limits;

impl Limits {
    /// Longest line the line reader will buffer, terminator included
    pub const MAX_LINE_LENGTH: usize = 64 * 1024;

    /// Bytes requested from the transport per read
    pub const READ_CHUNK: usize = 2048;
}
