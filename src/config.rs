//! Server and client configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::smtp::grammar::parse_domain;

/// Directory deliveries are written to when none is configured
pub const DEFAULT_MAILBOX_DIR: &str = "forward";

/// Port used when none is given
pub const DEFAULT_PORT: u16 = 2525;

/// Name of this machine if it is usable as a HELO domain, else `localhost`
pub fn local_domain() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| parse_domain(name).is_ok())
        .unwrap_or_else(|| "localhost".to_owned())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Name announced in the greeting and the QUIT reply
    pub hostname: String,
    /// Where per-domain mailbox records are written
    pub mailbox_dir: PathBuf,
    /// Per-connection read timeout; `None` blocks indefinitely
    pub read_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: local_domain(),
            mailbox_dir: PathBuf::from(DEFAULT_MAILBOX_DIR),
            read_timeout: None,
        }
    }
}

impl ServerConfig {
    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.hostname = hostname.to_owned();
        self
    }

    pub fn with_mailbox_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.mailbox_dir = dir.into();
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Domain sent with HELO
    pub helo_domain: String,
    /// Timeout for each reply; `None` blocks indefinitely
    pub read_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_owned(),
            port,
            helo_domain: local_domain(),
            read_timeout: None,
        }
    }

    pub fn with_helo_domain(mut self, domain: &str) -> Self {
        self.helo_domain = domain.to_owned();
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }
}
