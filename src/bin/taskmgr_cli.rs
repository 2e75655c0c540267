use std::{error::Error, fs, net::ToSocketAddrs, path::PathBuf};

use clap::{Parser, Subcommand};
use taskmgr::{
    config::ListenMode,
    protocol::{Connection, ProtocolTransport},
};

/// Send one JSON request file to a taskmgr server and print its reply.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    target: Target,
}

#[derive(Subcommand)]
enum Target {
    /// Connect over TCP
    Tcp {
        host: String,
        port: u16,
        /// JSON request document
        file: PathBuf,
    },
    /// Connect over a Unix domain socket
    Unix {
        socket_path: PathBuf,
        /// JSON request document
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let (endpoint, file) = match cli.target {
        Target::Tcp { host, port, file } => {
            let addr = (host.as_str(), port)
                .to_socket_addrs()?
                .next()
                .ok_or_else(|| format!("could not resolve '{host}'"))?;
            (ListenMode::Tcp(addr), file)
        }
        Target::Unix { socket_path, file } => (ListenMode::Unix(socket_path), file),
    };

    // Re-encode so the payload is compact and known to be valid JSON.
    let document: serde_json::Value = serde_json::from_str(&fs::read_to_string(&file)?)?;
    let payload = serde_json::to_vec(&document)?;

    let mut transport = ProtocolTransport::new(Connection::connect(&endpoint)?);
    transport.write_request(&payload)?;
    match transport.read_response()? {
        Some(resp) => println!("{}", serde_json::to_string(&resp)?),
        None => println!(),
    }
    Ok(())
}
