//! Command line driver for the transaction sequencer. Reads chain state,
//! sends transfers and batches, and exercises a Counter contract.

use clap::Parser;
use eyre::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tx_sequencer::deadline_token;

use crate::cli::Cli;

mod cli;
mod commands;
mod report;
mod trace;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    trace::start_tracing(cli.log_level, cli.log_format)?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Received interrupt, cancelling");
                shutdown.cancel();
            }
        });
    }

    let cancel = match cli.deadline {
        Some(deadline) => deadline_token(&shutdown, deadline),
        None => shutdown.child_token(),
    };

    let result = commands::run(&cli, &cancel).await;
    shutdown.cancel();
    if result.is_ok() {
        info!("Done");
    }
    result
}
