//! OrderNet daemon — headless peer-to-peer chat node.
//!
//! Runs a single node until interrupted with Ctrl+C. Exit code 0 on
//! clean shutdown, 1 on fatal start error.

use std::process::ExitCode;
use std::time::Duration;

use ordernet_node::node::Node;

mod config;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let node_config = match config::parse_args(&args) {
        config::ParseOutcome::Config(cfg) => cfg,
        config::ParseOutcome::Help => {
            config::print_help();
            return ExitCode::SUCCESS;
        }
        config::ParseOutcome::Error(message) => {
            eprintln!("{message}");
            eprintln!("use --help for usage information");
            return ExitCode::FAILURE;
        }
    };

    match run(node_config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ordernet_types::config::NodeConfig) -> ordernet_types::Result<()> {
    let mut node = Node::new(config)?;

    println!("============================================================");
    println!("  OrderNet node");
    println!("============================================================");
    println!("  Identity:    {}", node.fingerprint());
    println!("  Public key:  {}", node.pubkey_hex());
    println!("  Nickname:    {}", node.nickname());
    println!("============================================================");
    println!("  Press Ctrl+C to stop");
    println!();

    let mut event_rx = node
        .take_event_receiver()
        .expect("event receiver taken once at startup");

    let mut handle = node.start()?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received Ctrl+C, shutting down");
                break;
            }

            Some(event) = event_rx.recv() => {
                tracing::info!(?event, "node event");
            }

            result = &mut handle => {
                match result {
                    Ok(()) => tracing::error!("event loop exited unexpectedly"),
                    Err(e) => tracing::error!(%e, "event loop panicked"),
                }
                return Ok(());
            }
        }
    }

    node.shutdown();

    // Give the loop a moment to drain; it also exits on channel close.
    match tokio::time::timeout(Duration::from_secs(5), handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(%e, "event loop join error"),
        Err(_) => tracing::warn!("event loop did not exit within 5s"),
    }

    tracing::info!("daemon stopped");
    Ok(())
}
