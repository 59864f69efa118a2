//! Append-only mailbox stores keyed by recipient domain

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::SystemTime;

/// Durable sink for committed transactions
pub trait MailboxStore {
    /// Append `text` to the record for `domain`
    fn append(&self, domain: &str, text: &str) -> io::Result<()>;
}

/// One transaction delivered to one recipient domain
#[derive(Debug, Clone)]
pub struct Delivery {
    /// The recipient domain this copy was delivered for
    pub domain: String,

    /// Raw transaction text: envelope declarations followed by the message
    pub text: String,

    /// When the transaction was committed
    pub timestamp: SystemTime,
}

impl Delivery {
    pub fn new(domain: String, text: String) -> Self {
        Self {
            domain,
            text,
            timestamp: SystemTime::now(),
        }
    }

    /// Get the subject line from the message headers (if present)
    pub fn subject(&self) -> Option<&str> {
        for line in self.text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                break;
            }
            if let Some(subject) = line
                .strip_prefix("Subject: ")
                .or_else(|| line.strip_prefix("subject: "))
            {
                return Some(subject);
            }
        }
        None
    }

    /// Check if the delivery contains `text` anywhere
    pub fn contains_text(&self, text: &str) -> bool {
        self.text.contains(text)
    }

    pub fn data_size(&self) -> usize {
        self.text.len()
    }
}

/// Channel-backed store: every append becomes a [`Delivery`] on the channel
impl MailboxStore for mpsc::Sender<Delivery> {
    fn append(&self, domain: &str, text: &str) -> io::Result<()> {
        self.send(Delivery::new(domain.to_owned(), text.to_owned()))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "delivery receiver dropped"))
    }
}

/// One append-only file per domain inside a delivery directory
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record for `domain`
    pub fn path_for(&self, domain: &str) -> PathBuf {
        self.root.join(domain)
    }
}

impl MailboxStore for DirectoryStore {
    fn append(&self, domain: &str, text: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(domain))?;
        file.write_all(text.as_bytes())?;
        file.flush()
    }
}
