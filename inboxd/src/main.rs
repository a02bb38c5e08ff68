mod config;
mod context;
mod logging;
mod server;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;

use config::read_config;
use context::Context;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(short, long, env = "INBOXD_CONFIG", default_value = "inboxd.toml")]
    /// Path to the main configuration file
    config_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let args = Args::parse();
    let config = read_config(args.config_file)?;
    let bind_addr = config.updates.bind_addr;
    let ctx = Context::new(config);

    let (exit_tx, exit_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received shutdown signal");
            let _ = exit_tx.send(true);
        }
    });

    let srv = server::new(bind_addr, ctx);
    srv.run(exit_rx).await
}
