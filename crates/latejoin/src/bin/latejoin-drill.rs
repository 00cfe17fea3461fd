//! latejoin-drill: run the late-joiner sync drill as one participant.
//!
//! Start participant 1 (the authority) first, then any number of peers
//! against the same endpoint and session.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use latejoin::{
    DrillConfig, DrillOutcome, ParticipantId, SessionConfig, SessionController, DEFAULT_ENDPOINT,
    DEFAULT_SESSION_ID,
};

#[derive(Parser, Debug)]
#[command(name = "latejoin-drill")]
#[command(about = "Late-joiner state sync drill")]
struct Args {
    /// Transport endpoint to connect to
    #[arg(short, long, env = "LATEJOIN_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Participant id; 1 is the authority
    #[arg(short, long, env = "LATEJOIN_PARTICIPANT", default_value_t = 2)]
    participant: u64,

    /// Session id shared by all participants
    #[arg(short, long, env = "LATEJOIN_SESSION", default_value = DEFAULT_SESSION_ID)]
    session: String,

    /// Peer: milliseconds to wait before requesting a sync
    #[arg(long, default_value_t = 1000)]
    request_delay_ms: u64,

    /// Peer: milliseconds to wait for the sync response
    #[arg(long, default_value_t = 5000)]
    sync_wait_ms: u64,

    /// Authority: milliseconds to stay up after broadcasting
    #[arg(long, default_value_t = 10_000)]
    hold_ms: u64,

    /// Authority: re-broadcast a refreshed snapshot every this many milliseconds
    #[arg(long)]
    rebroadcast_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            endpoint: self.endpoint.clone(),
            session_id: self.session.clone(),
            participant: ParticipantId(self.participant),
            drill: DrillConfig {
                request_delay: Duration::from_millis(self.request_delay_ms),
                sync_wait: Duration::from_millis(self.sync_wait_ms),
                hold: Duration::from_millis(self.hold_ms),
                rebroadcast_interval: self.rebroadcast_ms.map(Duration::from_millis),
            },
            ..SessionConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise info, or debug with --verbose
    let default_filter = if args.verbose {
        "debug,latejoin=debug"
    } else {
        "info,latejoin=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.session_config();
    info!(
        endpoint = %config.endpoint,
        session = %config.session_id,
        participant = %config.participant,
        role = %config.role(),
        "starting drill"
    );

    let mut session = SessionController::from_config(&config)?;
    session
        .connect(&config.endpoint)
        .await
        .with_context(|| format!("failed to connect to {}", config.endpoint))?;

    let result = run(&mut session, &config).await;
    session.shutdown().await?;
    result
}

async fn run(session: &mut SessionController, config: &SessionConfig) -> Result<()> {
    let setup = session.setup_channels(&config.session_id).await?;
    if !setup.is_complete() {
        warn!(
            failed = setup.failed.len(),
            subscribed = setup.subscribed.len(),
            "some channels could not be subscribed"
        );
    }

    let report = session.run_scenario(&config.drill).await?;
    match &report.outcome {
        DrillOutcome::Broadcast { rebroadcasts } => {
            info!(
                rebroadcasts,
                served = report.sync.requests_served,
                "authority done"
            );
        }
        DrillOutcome::Synced(snapshot) => {
            let json = snapshot.to_json_string()?;
            info!(snapshot = %json, "peer synced");
        }
        DrillOutcome::NoResponse => {
            warn!("peer did not receive a snapshot");
        }
    }
    Ok(())
}
