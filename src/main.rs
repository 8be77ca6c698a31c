//! Entry point for the wink CLI

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use wink::cli::{Cli, run};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "wink=debug" } else { "wink=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    // Ctrl-c fires the cancel handle: the in-flight LLM request, shell
    // command, or web fetch aborts, and the agent loop pauses the session at
    // its next iteration boundary so --continue resumes cleanly.
    let (cancel_handle, cancel_token) = wink::cancel::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted; pausing session...");
            cancel_handle.cancel();
        }
    });

    let debug = cli.debug;
    if let Err(e) = run::execute(cli, cancel_token).await {
        if debug {
            eprintln!("Error: {:?}", e);
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}
