//! Server connection handling

use std::net::{TcpListener, TcpStream};

use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::smtp::error::MailError;
use crate::smtp::response::Reply;
use crate::smtp::session::{Committed, ServerSession};
use crate::smtp::store::MailboxStore;
use crate::smtp::transport::{LineReader, Transport, send_text};

/// Accepts connections and runs one [`ServerSession`] per connection
#[derive(Debug, Clone)]
pub struct MailServer {
    config: ServerConfig,
}

impl MailServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind to `addr` and serve connections (blocking)
    ///
    /// Committed transactions are appended to `store`.
    pub fn start<S>(&self, addr: &str, store: &S) -> Result<(), MailError>
    where
        S: MailboxStore + ?Sized,
    {
        let listener = TcpListener::bind(addr)?;
        self.start_with_listener(listener, store)
    }

    /// Serve connections from an existing listener (blocking)
    ///
    /// Connections are handled one after another. A failing connection is
    /// logged and never stops the accept loop.
    pub fn start_with_listener<S>(&self, listener: TcpListener, store: &S) -> Result<(), MailError>
    where
        S: MailboxStore + ?Sized,
    {
        info!(addr = %listener.local_addr()?, hostname = %self.config.hostname, "listening");

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => self.accept(stream, store),
                Err(e) => warn!(error = %e, "error accepting connection"),
            }
        }

        Ok(())
    }

    fn accept<S>(&self, stream: TcpStream, store: &S)
    where
        S: MailboxStore + ?Sized,
    {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_owned());
        info!(%peer, "connection accepted");

        if let Err(e) = stream.set_read_timeout(self.config.read_timeout) {
            warn!(%peer, error = %e, "could not set read timeout");
        }

        match self.handle_client(stream, store) {
            Ok(()) => info!(%peer, "connection closed"),
            Err(e) => warn!(%peer, error = %e, "connection ended with error"),
        }
    }

    /// Run a full session over `stream`, then close it
    ///
    /// The stream is closed exactly once whether the session ended with QUIT,
    /// end of stream or a transport error.
    pub fn handle_client<T, S>(&self, mut stream: T, store: &S) -> Result<(), MailError>
    where
        T: Transport,
        S: MailboxStore + ?Sized,
    {
        let result = self.run_session(&mut stream, store);
        if let Err(e) = stream.close() {
            debug!(error = %e, "error closing connection");
        }
        result
    }

    fn run_session<T, S>(&self, stream: &mut T, store: &S) -> Result<(), MailError>
    where
        T: Transport,
        S: MailboxStore + ?Sized,
    {
        let mut session = ServerSession::new(&self.config.hostname);
        let mut lines = LineReader::new();

        send_reply(stream, &session.greeting())?;

        loop {
            let Some(line) = lines.read_line(stream)? else {
                return session.end_of_stream();
            };
            debug!(line = line.trim_end(), state = ?session.state(), "received");

            let progress = session.handle_line(&line);
            if let Some(committed) = &progress.committed {
                deliver(committed, store);
            }
            if let Some(reply) = &progress.reply {
                send_reply(stream, reply)?;
            }
            if session.is_closed() {
                return Ok(());
            }
        }
    }
}

fn send_reply<T: Transport + ?Sized>(stream: &mut T, reply: &Reply) -> Result<(), MailError> {
    debug!(%reply, "sending");
    send_text(stream, &reply.format())
}

/// Append the committed text once per distinct recipient domain
fn deliver<S: MailboxStore + ?Sized>(committed: &Committed, store: &S) {
    for domain in &committed.domains {
        match store.append(domain, &committed.text) {
            Ok(()) => info!(%domain, bytes = committed.text.len(), "delivered"),
            Err(source) => {
                let e = MailError::Store {
                    domain: domain.clone(),
                    source,
                };
                error!(error = %e, "delivery failed");
            }
        }
    }
}
