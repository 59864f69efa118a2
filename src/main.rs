use std::io;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use linemail::{
    ClientConfig, DirectoryStore, Envelope, MailError, MailServer, Outcome, ServerConfig, compose,
    config, parse_domain, prompt, send_mail,
};

#[derive(Parser, Debug)]
#[command(name = "linemail")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Accept messages and file them per recipient domain
    Serve {
        /// Port to listen on
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,

        /// Name announced in the greeting (default: this machine's name)
        #[arg(long, env = "LINEMAIL_HOSTNAME")]
        hostname: Option<String>,

        /// Directory holding one mailbox file per domain
        #[arg(long, env = "LINEMAIL_MAILBOX_DIR", default_value = config::DEFAULT_MAILBOX_DIR)]
        mailbox_dir: PathBuf,

        /// Drop connections idle for this many seconds
        #[arg(long)]
        read_timeout: Option<u64>,
    },

    /// Prompt for a message on stdin and deliver it
    Send {
        /// Server host
        host: String,

        /// Server port
        port: u16,

        /// Domain to announce with HELO (default: this machine's name)
        #[arg(long)]
        helo: Option<String>,
    },
}

fn main() {
    if let Err(e) = linemail::logging::init() {
        eprintln!("Failed to initialize logging: {e}");
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), MailError> {
    match cli.command {
        Commands::Serve {
            port,
            bind,
            hostname,
            mailbox_dir,
            read_timeout,
        } => {
            let mut config = ServerConfig::default()
                .with_mailbox_dir(mailbox_dir)
                .with_read_timeout(read_timeout.map(Duration::from_secs));
            if let Some(hostname) = hostname {
                config = config.with_hostname(&hostname);
            }

            let store = DirectoryStore::open(&config.mailbox_dir)?;
            println!("Hostname: {}", config.hostname);
            println!("Mailboxes: {}", store.root().display());
            MailServer::new(config).start(&format!("{bind}:{port}"), &store)
        }
        Commands::Send { host, port, helo } => {
            let mut config = ClientConfig::new(&host, port);
            if let Some(helo) = helo {
                parse_domain(&helo).map_err(|e| MailError::InvalidAddress(format!("{helo}: {e}")))?;
                config = config.with_helo_domain(&helo);
            }

            let draft = prompt::gather(&mut io::stdin().lock(), &mut io::stdout())?;
            let payload = compose(&draft)?;
            let envelope = Envelope::new(draft.sender, draft.recipients);

            match send_mail(&config, &envelope, &payload) {
                Outcome::Delivered => {
                    println!("Message delivered to {host}:{port}");
                    Ok(())
                }
                Outcome::Aborted(e) => Err(e),
            }
        }
    }
}
