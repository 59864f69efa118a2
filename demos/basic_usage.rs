//! Basic usage example for linemail
//!
//! Starts a server that hands deliveries to a channel, sends one message
//! with the library client and one by hand over a raw socket, then prints
//! what arrived.

use linemail::{Address, ClientConfig, Delivery, Envelope, MailServer, Outcome, ServerConfig, send_mail};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn main() {
    println!("linemail Basic Usage Example");
    println!("============================");

    let listener = match TcpListener::bind("127.0.0.1:0") {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Failed to bind: {e}");
            return;
        }
    };
    let port = match listener.local_addr() {
        Ok(addr) => addr.port(),
        Err(e) => {
            eprintln!("Failed to read local address: {e}");
            return;
        }
    };

    let (tx, rx) = mpsc::channel::<Delivery>();
    let server = MailServer::new(ServerConfig::default().with_hostname("example.local"));
    println!("Created server with hostname: example.local");

    thread::spawn(move || {
        if let Err(e) = server.start_with_listener(listener, &tx) {
            eprintln!("Server error: {e}");
        }
    });
    println!("Server started on 127.0.0.1:{port}");

    println!("\nSending with the library client...");
    let config = ClientConfig::new("127.0.0.1", port).with_helo_domain("client.example.com");
    let envelope = match (
        "sender@example.com".parse::<Address>(),
        "recipient@example.org".parse::<Address>(),
        "other@example.net".parse::<Address>(),
    ) {
        (Ok(sender), Ok(first), Ok(second)) => Envelope::new(sender, vec![first, second]),
        _ => {
            eprintln!("Invalid example address");
            return;
        }
    };
    match send_mail(&config, &envelope, "Subject: Greetings\n\nHello from linemail\n") {
        Outcome::Delivered => println!("Delivered"),
        Outcome::Aborted(e) => {
            eprintln!("Delivery aborted: {e}");
            return;
        }
    }

    println!("\nSending by hand...");
    if let Err(e) = send_by_hand(port) {
        eprintln!("Failed to send: {e}");
        return;
    }

    println!("\nCollecting deliveries...");
    let mut deliveries = Vec::new();
    while let Ok(delivery) = rx.recv_timeout(Duration::from_millis(200)) {
        deliveries.push(delivery);
    }
    println!("Collected {} delivery(ies)", deliveries.len());

    for delivery in &deliveries {
        println!("\nMailbox: {}", delivery.domain);
        println!("  Received: {:?}", delivery.timestamp);
        println!("  Size: {} bytes", delivery.data_size());
        if let Some(subject) = delivery.subject() {
            println!("  Subject: {subject}");
        }
        for line in delivery.text.lines() {
            println!("    {line}");
        }
    }
}

fn send_by_hand(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = TcpStream::connect(("127.0.0.1", port))?;
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut response = String::new();
    reader.read_line(&mut response)?;
    print!("S: {response}");

    for command in [
        "HELO client.example.com",
        "MAIL FROM:<sender@example.com>",
        "RCPT TO:<recipient@example.org>",
        "DATA",
    ] {
        println!("C: {command}");
        writeln!(stream, "{command}")?;
        response.clear();
        reader.read_line(&mut response)?;
        print!("S: {response}");
    }

    writeln!(stream, "Subject: Typed by hand")?;
    writeln!(stream)?;
    writeln!(stream, "A line typed by hand")?;
    writeln!(stream, ".")?;
    response.clear();
    reader.read_line(&mut response)?;
    print!("S: {response}");

    writeln!(stream, "QUIT")?;
    response.clear();
    reader.read_line(&mut response)?;
    print!("S: {response}");

    Ok(())
}
