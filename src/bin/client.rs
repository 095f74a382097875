//! Thin CLI wrapper around [`gbn`]: requests a broadcast (or connects
//! directly for peer-to-peer mode), receives the metadata prelude and file
//! content, and writes the reconstructed file to disk.

use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use gbn::{reconstruct_filename, Endpoint, Metadata, Segment, TransportConfig, TransportHandlers};
use log::info;

#[derive(Parser, Debug)]
#[command(about = "Receive a broadcast or peer-to-peer file transfer")]
struct Args {
    /// Local UDP port to bind.
    local_port: u16,
    /// Remote host to request a transfer from.
    remote_host: String,
    /// Remote UDP port to request a transfer from.
    remote_port: u16,
    /// Directory the reconstructed file is written into.
    output_dir: std::path::PathBuf,
    /// Connect directly instead of sending a broadcast request.
    #[arg(long)]
    p2p: bool,
}

#[derive(Default)]
struct ClientState {
    metadata: Option<Metadata>,
    data: Vec<u8>,
    closed: bool,
}

struct ClientHandlers {
    state: Arc<Mutex<ClientState>>,
}

impl TransportHandlers for ClientHandlers {
    fn on_payload(&mut self, peer: SocketAddr, payload: &[u8]) {
        let mut state = self.state.lock().unwrap();
        if state.metadata.is_none() {
            match serde_json::from_slice::<Metadata>(payload) {
                Ok(meta) => {
                    info!("[Segment] metadata from {peer}: {}.{}", meta.filename, meta.extension);
                    state.metadata = Some(meta);
                }
                Err(_) => state.data.extend_from_slice(payload),
            }
        } else {
            state.data.extend_from_slice(payload);
        }
    }

    fn on_connect(&mut self, peer: SocketAddr) {
        info!("[Handshake] connected to {peer}");
    }

    fn on_close(&mut self, peer: SocketAddr) {
        info!("[Termination] connection with {peer} closed");
        self.state.lock().unwrap().closed = true;
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let local: SocketAddr = format!("127.0.0.1:{}", args.local_port).parse()?;
    let remote: SocketAddr = format!("{}:{}", args.remote_host, args.remote_port).parse()?;

    let state = Arc::new(Mutex::new(ClientState::default()));
    let handlers = ClientHandlers { state: state.clone() };
    let mut endpoint: Endpoint<UdpSocket> =
        Endpoint::bind(local, TransportConfig::default(), Box::new(handlers))?;

    if args.p2p {
        endpoint.handshake(remote)?;
    } else {
        info!("[!] sent broadcast request to {remote}");
        endpoint.send_segment(remote, &Segment::syn(gbn::SeqNum::new(0)))?;
    }

    loop {
        if state.lock().unwrap().closed {
            break;
        }
        match endpoint.listen(Some(Duration::from_secs(30))) {
            Ok(_) => {}
            Err(gbn::TransportError::Timeout) => continue,
            Err(gbn::TransportError::MalformedSegment(reason)) => {
                log::warn!("[!] dropped malformed segment: {reason}");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let state = state.lock().unwrap();
    if let Some(meta) = &state.metadata {
        let path = args.output_dir.join(reconstruct_filename(meta));
        std::fs::write(&path, &state.data)?;
        info!("[!] wrote {}", path.display());
    }

    Ok(())
}
