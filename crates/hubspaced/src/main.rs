use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use hubspaced::Bridge;
use hubspaced::Config;
use hubspaced::FixtureClient;
use hubspaced::SetupError;
use hubspaced::api;
use tokio::sync::oneshot;
use tokio::sync::watch;

/// Delay between setup attempts while Hubspace is unreachable
const SETUP_RETRY: Duration = Duration::from_secs(30);

/// Hubspace bridge daemon
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "hubspaced.toml")]
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    if args.check {
        println!("{}: ok", args.config.display());
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(config.logging.env_filter())
        .init();

    tracing::info!("hubspaced starting");
    tracing::info!("Loaded config from: {}", args.config.display());

    let fixture = config
        .fixture
        .as_ref()
        .context("no vendor configured: add a [fixture] section")?;
    let client = FixtureClient::from_file(&fixture.path)?;
    let bridge = Bridge::new(client);

    let (poll_tx, poll_rx) = watch::channel(false);
    let (api_tx, api_rx) = oneshot::channel();

    let setup = {
        let bridge = bridge.clone();
        let hubspace = config.hubspace.clone();
        tokio::spawn(async move {
            loop {
                match bridge.setup(&hubspace).await {
                    Ok(count) => {
                        tracing::info!("Setup complete: {} entities", count);
                        break;
                    }
                    Err(SetupError::NotReady(e)) => {
                        tracing::warn!("Hubspace not ready ({}), retrying in {:?}", e, SETUP_RETRY);
                        tokio::time::sleep(SETUP_RETRY).await;
                    }
                    Err(e) => {
                        tracing::error!("Setup failed: {}", e);
                        return;
                    }
                }
            }
            bridge.spawn_poller(hubspace.scan_interval(), poll_rx);
        })
    };

    let server = tokio::spawn(api::serve(
        bridge.clone(),
        config.api.listen.clone(),
        config.api.port,
        api_rx,
    ));

    tracing::info!("Press Ctrl+C to exit");
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received shutdown signal"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }

    setup.abort();
    let _ = poll_tx.send(true);
    let _ = api_tx.send(());

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("HTTP API server failed: {}", e),
        Err(e) => tracing::error!("HTTP API task panicked: {}", e),
    }

    tracing::info!("hubspaced shutdown complete");
    Ok(())
}
