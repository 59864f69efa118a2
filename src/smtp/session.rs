//! Server-side session state machine
//!
//! [`ServerSession`] is pure: it consumes one line at a time and reports the
//! reply to send, any transaction that was committed, and whether the
//! session is finished. The connection driver in [`crate::smtp::server`]
//! owns the I/O.

use std::mem;

use tracing::debug;

use crate::smtp::commands::{Classified, Command, Verb, classify, is_data_end};
use crate::smtp::error::{MailError, ProtocolError};
use crate::smtp::grammar::Address;
use crate::smtp::response::Reply;

/// Where a session is in the command sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Greeting sent, waiting for HELO
    AwaitHelo,
    /// HELO accepted, waiting for MAIL FROM
    Ready,
    /// Sender accepted, waiting for the first RCPT TO
    MailSeen,
    /// At least one recipient accepted, waiting for RCPT TO or DATA
    RcptSeen,
    /// Collecting message lines until the end-of-data marker
    InData,
    /// QUIT handled or stream ended
    Closed,
}

impl SessionState {
    /// Whether `verb` is in sequence for this state
    pub fn expects(self, verb: Verb) -> bool {
        match self {
            SessionState::AwaitHelo => matches!(verb, Verb::Helo | Verb::Quit),
            SessionState::Ready => matches!(verb, Verb::MailFrom | Verb::Quit),
            SessionState::MailSeen => matches!(verb, Verb::RcptTo | Verb::Quit),
            SessionState::RcptSeen => matches!(verb, Verb::RcptTo | Verb::Data | Verb::Quit),
            SessionState::InData | SessionState::Closed => false,
        }
    }
}

/// The sender, recipients and body of one delivery attempt
///
/// Built up by value and swapped out whole on commit or reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    sender: Option<Address>,
    recipients: Vec<Address>,
    domains: Vec<String>,
    body: Vec<String>,
}

impl Transaction {
    /// Start a transaction for `sender`
    pub fn begin(sender: Address) -> Self {
        Self {
            sender: Some(sender),
            ..Self::default()
        }
    }

    /// Add a recipient; its domain is recorded once, in first-seen order
    pub fn with_recipient(mut self, recipient: Address) -> Self {
        if !self.domains.iter().any(|d| d == recipient.domain()) {
            self.domains.push(recipient.domain().to_owned());
        }
        self.recipients.push(recipient);
        self
    }

    pub fn with_body_line(mut self, line: &str) -> Self {
        self.body.push(line.to_owned());
        self
    }

    pub fn sender(&self) -> Option<&Address> {
        self.sender.as_ref()
    }

    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn body(&self) -> &[String] {
        &self.body
    }

    /// DATA may only start once a sender and a recipient domain exist
    pub fn is_ready_for_data(&self) -> bool {
        self.sender.is_some() && !self.domains.is_empty()
    }

    /// The text appended to each mailbox record
    ///
    /// Envelope declarations in canonical form, then the body exactly as
    /// received.
    pub fn raw_text(&self) -> String {
        let mut text = String::new();
        if let Some(sender) = &self.sender {
            text.push_str(&format!("MAIL FROM: <{sender}>\n"));
        }
        for recipient in &self.recipients {
            text.push_str(&format!("RCPT TO: <{recipient}>\n"));
        }
        text.push_str("DATA\n");
        for line in &self.body {
            text.push_str(line);
        }
        text
    }
}

/// A transaction that reached the end-of-data marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    /// Distinct recipient domains, first-seen order
    pub domains: Vec<String>,
    pub text: String,
}

impl From<Transaction> for Committed {
    fn from(transaction: Transaction) -> Self {
        let text = transaction.raw_text();
        Self {
            domains: transaction.domains,
            text,
        }
    }
}

/// What handling one line produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    /// Reply to send; `None` while collecting DATA lines
    pub reply: Option<Reply>,
    /// Set when the line committed a transaction
    pub committed: Option<Committed>,
}

impl Progress {
    fn reply(reply: Reply) -> Self {
        Self {
            reply: Some(reply),
            committed: None,
        }
    }
}

/// Per-connection server state machine
#[derive(Debug)]
pub struct ServerSession {
    hostname: String,
    state: SessionState,
    transaction: Transaction,
    client_domain: Option<String>,
}

impl ServerSession {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_owned(),
            state: SessionState::AwaitHelo,
            transaction: Transaction::default(),
            client_domain: None,
        }
    }

    /// The 220 reply sent when the connection opens
    pub fn greeting(&self) -> Reply {
        Reply::greeting(&self.hostname)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// Domain announced in the accepted HELO
    pub fn client_domain(&self) -> Option<&str> {
        self.client_domain.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Handle one line, terminator included
    pub fn handle_line(&mut self, line: &str) -> Progress {
        match self.state {
            SessionState::Closed => Progress::default(),
            SessionState::InData => self.collect_data(line),
            _ => self.dispatch(classify(line)),
        }
    }

    /// The peer went away
    ///
    /// Any transaction in progress is discarded. Losing the peer mid-DATA is
    /// reported as [`MailError::PrematureEndOfStream`].
    pub fn end_of_stream(&mut self) -> Result<(), MailError> {
        let previous = mem::replace(&mut self.state, SessionState::Closed);
        self.transaction = Transaction::default();
        if previous == SessionState::InData {
            return Err(MailError::PrematureEndOfStream);
        }
        Ok(())
    }

    fn dispatch(&mut self, classified: Classified) -> Progress {
        let verb = match &classified {
            Classified::Unrecognized => return self.reject(ProtocolError::Unrecognized),
            Classified::Malformed(verb) => *verb,
            Classified::Valid(command) => command.verb(),
        };

        if !self.state.expects(verb) {
            return self.reject(ProtocolError::OutOfSequence(verb));
        }

        match classified {
            Classified::Valid(command) => self.accept(command),
            // The step is retried; what was accumulated so far stays.
            _ => {
                debug!(%verb, state = ?self.state, "malformed parameters");
                Progress::reply(ProtocolError::Malformed(verb).to_reply())
            }
        }
    }

    /// Answer a 500 or 503, abandoning the transaction once past HELO
    fn reject(&mut self, error: ProtocolError) -> Progress {
        debug!(%error, state = ?self.state, "command rejected");
        if self.state != SessionState::AwaitHelo {
            self.transaction = Transaction::default();
            self.state = SessionState::Ready;
        }
        Progress::reply(error.to_reply())
    }

    fn accept(&mut self, command: Command) -> Progress {
        match command {
            Command::Helo { domain } => {
                let reply = Reply::helo(&domain);
                self.client_domain = Some(domain);
                self.state = SessionState::Ready;
                Progress::reply(reply)
            }
            Command::MailFrom { reverse_path } => {
                self.transaction = Transaction::begin(reverse_path);
                self.state = SessionState::MailSeen;
                Progress::reply(Reply::ok())
            }
            Command::RcptTo { forward_path } => {
                self.transaction = mem::take(&mut self.transaction).with_recipient(forward_path);
                self.state = SessionState::RcptSeen;
                Progress::reply(Reply::ok())
            }
            Command::Data => {
                if !self.transaction.is_ready_for_data() {
                    return self.reject(ProtocolError::OutOfSequence(Verb::Data));
                }
                self.state = SessionState::InData;
                Progress::reply(Reply::data_start())
            }
            Command::Quit => {
                self.transaction = Transaction::default();
                self.state = SessionState::Closed;
                Progress::reply(Reply::quit(&self.hostname))
            }
        }
    }

    fn collect_data(&mut self, line: &str) -> Progress {
        let transaction = mem::take(&mut self.transaction);
        if is_data_end(line) {
            self.state = SessionState::Ready;
            return Progress {
                reply: Some(Reply::ok()),
                committed: Some(Committed::from(transaction)),
            };
        }
        self.transaction = transaction.with_body_line(line);
        Progress::default()
    }
}
