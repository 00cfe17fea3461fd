//! Sync protocol state machine.
//!
//! Authority:
//!
//! ```text
//! Idle --broadcast_snapshot--> Holding(S) --broadcast_snapshot/echo--> Holding(S')
//! request on 254: Holding => publish S on 255, Idle => no-op
//! ```
//!
//! Peer:
//!
//! ```text
//! Idle --request_sync--> AwaitingSync --data on 255--> Synced(S)
//! Synced(S) --request_sync--> AwaitingSync --data on 255--> Synced(S')
//! ```
//!
//! The authority never re-broadcasts because of something it receives on
//! 255, so its own echoed broadcast cannot amplify into a loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use latejoin_core::{
    PacketBody, ParticipantRole, SyncSnapshot, TopicScheme, SYNC_DATA_CHANNEL,
    SYNC_REQUEST_CHANNEL,
};
use latejoin_store::{GatedStore, ReplaceResult, SnapshotStore};

use crate::error::{Result, SyncError};
use crate::messages::{SyncMessage, SYNC_REQUEST_SENTINEL};
use crate::transport::Transport;

/// Where a participant stands in the sync cycle.
///
/// For the authority, `Idle` means no snapshot is held yet and `Synced`
/// means one is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing requested, nothing held.
    Idle,
    /// A request was sent and no data has arrived since.
    AwaitingSync,
    /// A snapshot is held.
    Synced,
}

/// Counters describing what the engine has done so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Sync requests published.
    pub requests_sent: usize,
    /// Sync requests answered with a broadcast.
    pub requests_served: usize,
    /// Sync requests received before any snapshot was held.
    pub requests_unserved: usize,
    /// Sync requests seen by a peer and left to the authority.
    pub requests_ignored: usize,
    /// Snapshots published on the sync data channel.
    pub broadcasts: usize,
    /// Snapshots decoded and applied by a peer.
    pub snapshots_applied: usize,
    /// Authority broadcasts observed coming back on the sync data channel.
    pub echoes_observed: usize,
    /// Binary sync payloads applied as a size-only snapshot.
    pub binary_fallbacks: usize,
    /// Sync payloads that failed to decode and were dropped.
    pub decode_failures: usize,
}

/// What happened to an inbound sync request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The held snapshot was published on the sync data channel.
    Served,
    /// The authority holds no snapshot yet; nothing was published.
    NothingToServe,
    /// Peers do not answer sync requests.
    Ignored,
}

/// What happened to an inbound sync data payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOutcome {
    /// The payload decoded and was written to the store.
    Applied(ReplaceResult),
    /// A binary payload was applied as a size-only snapshot.
    Degraded { binary_size: usize },
    /// The payload did not decode; the held snapshot is unchanged.
    Rejected,
}

/// Configuration for sync behavior.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Text published on channel 254 by [`SyncEngine::request_sync`].
    pub request_sentinel: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_sentinel: SYNC_REQUEST_SENTINEL.to_string(),
        }
    }
}

/// The per-participant sync protocol engine.
///
/// Handlers take `&self` and may be called concurrently; the snapshot lives
/// behind the store's lock and is never held across a publish.
pub struct SyncEngine<T: Transport + ?Sized, S: SnapshotStore> {
    /// Addressing for this session's topics.
    scheme: TopicScheme,
    /// The transport layer.
    transport: Arc<T>,
    /// The held or cached snapshot, gated by role.
    store: GatedStore<S>,
    /// Configuration.
    config: SyncConfig,
    /// Current position in the sync cycle.
    state: watch::Sender<SyncState>,
    /// Running counters.
    report: Mutex<SyncReport>,
}

impl<T: Transport + ?Sized, S: SnapshotStore> SyncEngine<T, S> {
    /// Create an engine for the participant that owns `store`.
    pub fn new(
        scheme: TopicScheme,
        transport: Arc<T>,
        store: GatedStore<S>,
        config: SyncConfig,
    ) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        Self {
            scheme,
            transport,
            store,
            config,
            state,
            report: Mutex::new(SyncReport::default()),
        }
    }

    /// The participant's role.
    pub fn role(&self) -> ParticipantRole {
        self.store.role()
    }

    /// The topic scheme this engine publishes with.
    pub fn scheme(&self) -> &TopicScheme {
        &self.scheme
    }

    /// Current sync state.
    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change.
    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Snapshot of the counters.
    pub fn report(&self) -> SyncReport {
        self.report.lock().unwrap().clone()
    }

    /// The held (authority) or cached (peer) snapshot.
    pub async fn snapshot(&self) -> Result<Option<SyncSnapshot>> {
        Ok(self.store.current().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Outbound
    // ─────────────────────────────────────────────────────────────────────────

    /// Hold `snapshot` and publish it on the sync data channel.
    ///
    /// Only the authority may call this. Every call is an independent publish.
    pub async fn broadcast_snapshot(&self, snapshot: SyncSnapshot) -> Result<()> {
        let message = SyncMessage::data(&snapshot)?;
        self.store.originate(snapshot).await?;
        self.set_state(SyncState::Synced);

        self.publish(&message).await?;
        self.record(|r| r.broadcasts += 1);
        tracing::info!(bytes = message.body().len(), "broadcast snapshot");
        Ok(())
    }

    /// Publish the held snapshot again. Returns `false` if none is held.
    pub async fn rebroadcast(&self) -> Result<bool> {
        if !self.role().is_authority() {
            return Err(SyncError::WrongRole {
                role: self.role(),
                operation: "rebroadcast a snapshot",
            });
        }

        match self.store.current().await? {
            Some(snapshot) => {
                self.publish(&SyncMessage::data(&snapshot)?).await?;
                self.record(|r| r.broadcasts += 1);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Ask the authority for the current state.
    ///
    /// No timeout is enforced here; see [`wait_for_sync`](Self::wait_for_sync).
    pub async fn request_sync(&self) -> Result<()> {
        if self.role().is_authority() {
            return Err(SyncError::WrongRole {
                role: self.role(),
                operation: "request a sync",
            });
        }

        // Enter AwaitingSync before publishing so a fast answer is not lost.
        let previous = self.state.send_replace(SyncState::AwaitingSync);
        let sentinel = PacketBody::from(self.config.request_sentinel.as_str());
        let message = SyncMessage::Request(sentinel);
        if let Err(e) = self.publish(&message).await {
            self.set_state(previous);
            return Err(e);
        }

        self.record(|r| r.requests_sent += 1);
        tracing::debug!("sync request sent");
        Ok(())
    }

    /// Wait until a snapshot is held, for at most `timeout`.
    ///
    /// Returns `None` on timeout; the engine stays in its current state.
    pub async fn wait_for_sync(&self, timeout: Duration) -> Option<SyncSnapshot> {
        let mut rx = self.state.subscribe();
        let synced = tokio::time::timeout(timeout, rx.wait_for(|s| *s == SyncState::Synced))
            .await
            .map(|changed| changed.is_ok())
            .unwrap_or(false);

        if !synced {
            return None;
        }
        self.snapshot().await.ok().flatten()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inbound
    // ─────────────────────────────────────────────────────────────────────────

    /// Handle a packet received on a reserved channel.
    pub async fn handle(&self, message: SyncMessage) -> Result<()> {
        match message {
            SyncMessage::Request(body) => self.on_sync_request(&body).await.map(|_| ()),
            SyncMessage::Data(body) => self.on_sync_data(&body).await.map(|_| ()),
        }
    }

    /// Handle a packet on channel 254. The payload is only logged.
    pub async fn on_sync_request(&self, body: &PacketBody) -> Result<RequestOutcome> {
        tracing::debug!(role = %self.role(), body = ?body, "sync request received");

        if !self.role().is_authority() {
            self.record(|r| r.requests_ignored += 1);
            return Ok(RequestOutcome::Ignored);
        }

        let Some(snapshot) = self.store.current().await? else {
            self.record(|r| r.requests_unserved += 1);
            tracing::debug!("no snapshot held yet, nothing to serve");
            return Ok(RequestOutcome::NothingToServe);
        };

        self.publish(&SyncMessage::data(&snapshot)?).await?;
        self.record(|r| {
            r.requests_served += 1;
            r.broadcasts += 1;
        });
        tracing::debug!("served sync request");
        Ok(RequestOutcome::Served)
    }

    /// Handle a packet on channel 255.
    ///
    /// Text is decoded as a JSON object and replaces the held snapshot. A
    /// peer applies binary payloads as a size-only snapshot; the authority
    /// rejects them. Decode failures are logged and leave state untouched.
    pub async fn on_sync_data(&self, body: &PacketBody) -> Result<DataOutcome> {
        let role = self.role();

        match body {
            PacketBody::Text(text) => match SyncSnapshot::from_json_str(text) {
                Ok(snapshot) => {
                    let result = self.store.observe(snapshot).await?;
                    self.set_state(SyncState::Synced);
                    if role.is_authority() {
                        self.record(|r| r.echoes_observed += 1);
                        tracing::debug!(?result, "observed own broadcast");
                    } else {
                        self.record(|r| r.snapshots_applied += 1);
                        tracing::info!(?result, "applied snapshot");
                    }
                    Ok(DataOutcome::Applied(result))
                }
                Err(e) => {
                    self.record(|r| r.decode_failures += 1);
                    tracing::warn!(%role, error = %e, "failed to parse sync data");
                    Ok(DataOutcome::Rejected)
                }
            },
            PacketBody::Binary(bytes) if !role.is_authority() => {
                let binary_size = bytes.len();
                self.store
                    .observe(SyncSnapshot::binary_fallback(binary_size))
                    .await?;
                self.set_state(SyncState::Synced);
                self.record(|r| r.binary_fallbacks += 1);
                tracing::info!(binary_size, preview = %body.preview(), "applied binary sync payload");
                Ok(DataOutcome::Degraded { binary_size })
            }
            PacketBody::Binary(bytes) => {
                self.record(|r| r.decode_failures += 1);
                tracing::warn!(%role, bytes = bytes.len(), "ignoring binary sync data");
                Ok(DataOutcome::Rejected)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    async fn publish(&self, message: &SyncMessage) -> Result<()> {
        let topic = self.scheme.topic_for(message.channel());
        self.transport.publish(&topic, message.encode()).await
    }

    fn set_state(&self, state: SyncState) {
        self.state.send_replace(state);
    }

    fn record(&self, update: impl FnOnce(&mut SyncReport)) {
        update(&mut self.report.lock().unwrap());
    }
}

/// Topic of the sync request channel for `scheme`.
pub fn request_topic(scheme: &TopicScheme) -> String {
    scheme.topic_for(SYNC_REQUEST_CHANNEL)
}

/// Topic of the sync data channel for `scheme`.
pub fn data_topic(scheme: &TopicScheme) -> String {
    scheme.topic_for(SYNC_DATA_CHANNEL)
}
