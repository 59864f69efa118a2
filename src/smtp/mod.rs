//! Mail transfer protocol engine

pub mod client;
pub mod commands;
pub mod compose;
pub mod error;
pub mod grammar;
pub mod prompt;
pub mod response;
pub mod server;
pub mod session;
pub mod store;
pub mod transport;

pub use client::{ClientSession, ClientStep, Envelope, Outcome, send_mail};
pub use commands::{Classified, Command, Verb, classify};
pub use compose::{Attachment, Draft, compose};
pub use error::{Limits, MailError, ProtocolError};
pub use grammar::{Address, ParseError, parse_domain, parse_mailbox};
pub use response::{ReceivedReply, Reply, ReplyCode};
pub use server::MailServer;
pub use session::{Committed, Progress, ServerSession, SessionState, Transaction};
pub use store::{Delivery, DirectoryStore, MailboxStore};
pub use transport::{LineReader, Transport};
