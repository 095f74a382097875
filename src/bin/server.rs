//! Thin CLI wrapper around [`gbn`]: binds a local port, collects pending
//! receivers in broadcast-acceptor mode, then transfers a file to each of
//! them in turn.

use std::io::{self, Write};
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use clap::Parser;
use gbn::{split_filename, Endpoint, NullHandlers, TransportConfig};
use log::{info, warn};

#[derive(Parser, Debug)]
#[command(about = "Broadcast a file to every client that requests it")]
struct Args {
    /// Local UDP port to bind.
    local_port: u16,
    /// File to broadcast to each collected receiver.
    file_path: std::path::PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let local: SocketAddr = format!("127.0.0.1:{}", args.local_port).parse()?;
    let mut endpoint: Endpoint<UdpSocket> =
        Endpoint::bind(local, TransportConfig::default(), Box::new(NullHandlers))?;

    loop {
        loop {
            match endpoint.listen_broadcast(Some(Duration::from_secs(30))) {
                Ok(Some(addr)) => info!("[!] queued receiver {addr}"),
                Ok(None) => {}
                Err(gbn::TransportError::Timeout) => break,
                Err(e) => warn!("[!] error while collecting receivers: {e}"),
            }
        }

        print!("Listen more? (y/n) ");
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        if answer.trim().eq_ignore_ascii_case("n") {
            break;
        }
    }

    let payload = std::fs::read(&args.file_path)?;
    let metadata = split_filename(&args.file_path.to_string_lossy());

    for addr in endpoint.take_pending_peers() {
        info!("[Handshake] connecting to receiver {addr}");
        if let Err(e) = endpoint.handshake(addr) {
            warn!("[!] handshake with {addr} failed: {e}");
            continue;
        }
        if let Err(e) = endpoint.transfer(addr, &metadata, &payload) {
            warn!("[!] transfer to {addr} failed: {e}");
        }
    }

    Ok(())
}
