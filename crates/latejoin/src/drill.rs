//! The scripted sync drill.
//!
//! The authority broadcasts a snapshot and stays up to serve late joiners.
//! A peer waits a moment, asks for the state and waits for the answer. This
//! is a harness for exercising the protocol end to end, not part of it.

use tokio::time::{self, Instant};

use latejoin_core::{ParticipantId, ParticipantRole, SyncSnapshot};
use latejoin_sync::SyncReport;

use crate::config::DrillConfig;
use crate::error::Result;
use crate::session::SessionController;

/// How a drill ended.
#[derive(Debug, Clone, PartialEq)]
pub enum DrillOutcome {
    /// The authority broadcast its snapshot, plus `rebroadcasts` refreshes.
    Broadcast { rebroadcasts: usize },
    /// The peer received a snapshot.
    Synced(SyncSnapshot),
    /// The peer gave up waiting. The request is not cancelled.
    NoResponse,
}

/// Result of [`SessionController::run_scenario`].
#[derive(Debug, Clone, PartialEq)]
pub struct DrillReport {
    pub role: ParticipantRole,
    pub outcome: DrillOutcome,
    pub sync: SyncReport,
}

/// The snapshot an authority starts a drill with.
pub fn drill_snapshot(authority: ParticipantId) -> SyncSnapshot {
    SyncSnapshot::new()
        .with("score", 100)
        .with("players", 2)
        .with("timestamp", now_millis())
        .with("authority", authority.0)
}

impl SessionController {
    /// Run the drill for this participant's role.
    ///
    /// Channels must already be set up.
    pub async fn run_scenario(&self, drill: &DrillConfig) -> Result<DrillReport> {
        let role = self.role();
        tracing::info!(%role, "starting drill");

        let outcome = match role {
            ParticipantRole::Authority => self.authority_drill(drill).await?,
            ParticipantRole::Peer => self.peer_drill(drill).await?,
        };

        tracing::info!(%role, ?outcome, "drill finished");
        Ok(DrillReport {
            role,
            outcome,
            sync: self.report(),
        })
    }

    async fn authority_drill(&self, drill: &DrillConfig) -> Result<DrillOutcome> {
        self.broadcast_snapshot(drill_snapshot(self.participant()))
            .await?;

        let Some(period) = drill.rebroadcast_interval else {
            time::sleep(drill.hold).await;
            return Ok(DrillOutcome::Broadcast { rebroadcasts: 0 });
        };

        let deadline = time::sleep_until(Instant::now() + drill.hold);
        tokio::pin!(deadline);
        let mut ticker = time::interval_at(Instant::now() + period, period);
        let mut rebroadcasts = 0;

        loop {
            tokio::select! {
                biased;
                _ = &mut deadline => break,
                _ = ticker.tick() => {
                    self.broadcast_snapshot(drill_snapshot(self.participant())).await?;
                    rebroadcasts += 1;
                    tracing::debug!(rebroadcasts, "refreshed snapshot");
                }
            }
        }

        Ok(DrillOutcome::Broadcast { rebroadcasts })
    }

    async fn peer_drill(&self, drill: &DrillConfig) -> Result<DrillOutcome> {
        time::sleep(drill.request_delay).await;
        self.request_sync().await?;

        match self.wait_for_sync(drill.sync_wait).await? {
            Some(snapshot) => {
                tracing::info!(keys = snapshot.len(), "synced with authority");
                Ok(DrillOutcome::Synced(snapshot))
            }
            None => {
                tracing::warn!(wait = ?drill.sync_wait, "no sync response");
                Ok(DrillOutcome::NoResponse)
            }
        }
    }
}

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as u64
}
