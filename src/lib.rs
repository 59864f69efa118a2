//! # linemail
//!
//! linemail is a small line-oriented mail transfer engine: a server that
//! accepts messages and files them per recipient domain, and a client that
//! composes and delivers them.
//!
//! Every command line is checked against a strict grammar before it is acted
//! on, and every session follows a fixed command order.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use linemail::{DirectoryStore, MailServer, ServerConfig};
//!
//! let config = ServerConfig::default().with_hostname("mail.local");
//! let store = DirectoryStore::open(&config.mailbox_dir).unwrap();
//!
//! // Blocks, serving one connection at a time
//! MailServer::new(config).start("127.0.0.1:2525", &store).unwrap();
//! ```
//!
//! Sending a message:
//!
//! ```rust,no_run
//! use linemail::{ClientConfig, Envelope, send_mail};
//!
//! let config = ClientConfig::new("127.0.0.1", 2525);
//! let envelope = Envelope::new(
//!     "alice@example.com".parse().unwrap(),
//!     vec!["bob@example.org".parse().unwrap()],
//! );
//! let outcome = send_mail(&config, &envelope, "Subject: Hi\n\nHello Bob\n");
//! assert!(outcome.is_delivered());
//! ```
//!
//! ## Supported commands
//!
//! - `HELO <domain>` - Identify the sender
//! - `MAIL FROM:<path>` - Start a transaction
//! - `RCPT TO:<path>` - Add a recipient (repeatable)
//! - `DATA` - Send the message, ended by a line holding a single `.`
//! - `QUIT` - Close the connection
//!
//! Keywords are case-sensitive. Lines end with a single `\n`.
//!
//! ## Replies
//!
//! | Code | Meaning |
//! |------|---------|
//! | 220 | Greeting |
//! | 221 | Closing connection |
//! | 250 | Requested action completed |
//! | 354 | Start mail input |
//! | 500 | Command unrecognized |
//! | 501 | Syntax error in parameters |
//! | 503 | Bad sequence of commands |
//!
//! ## Delivery
//!
//! A committed transaction is written once per distinct recipient domain.
//! [`DirectoryStore`] appends it to `<mailbox_dir>/<domain>`; an
//! `mpsc::Sender<Delivery>` can be used instead to receive deliveries in
//! memory.
//!
//! ## Notes
//!
//! - No authentication, TLS, relaying or extended commands.
//! - Addresses and domains are restricted to a simple ASCII grammar.

pub mod config;
pub mod logging;
mod smtp;

pub use config::{ClientConfig, ServerConfig};
pub use smtp::{
    Address, Attachment, Classified, ClientSession, ClientStep, Command, Committed, Delivery,
    DirectoryStore, Draft, Envelope, Limits, LineReader, MailError, MailServer, MailboxStore,
    Outcome, ParseError, Progress, ProtocolError, ReceivedReply, Reply, ReplyCode, ServerSession,
    SessionState, Transaction, Transport, Verb, classify, compose, parse_domain, parse_mailbox,
    send_mail,
};
pub use smtp::{commands, grammar, prompt, response, session, store, transport};
