use std::{error::Error, path::PathBuf};

use clap::Parser;
use log::info;
use taskmgr::{ServerConfig, protocol::Server};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    config: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = ServerConfig::load(&cli.config)?;
    let server = Server::new(&config)?;

    let shutdown = server.shutdown_handle();
    ctrlc::set_handler(move || {
        info!("received termination signal");
        shutdown.trigger();
    })?;

    server.listen();
    info!("server stopped");
    Ok(())
}
