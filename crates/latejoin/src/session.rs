//! The session controller: transport lifecycle and inbound dispatch.
//!
//! One controller owns one transport session, one snapshot store and, once
//! channels are set up, one sync engine. Inbound messages are handed from the
//! transport's handlers to a single pump task, so the engine sees them one at
//! a time regardless of how the transport schedules its callbacks.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use latejoin_core::{
    ChannelId, Packet, PacketBody, ParticipantId, ParticipantRole, SyncSnapshot, TopicScheme,
};
use latejoin_store::{GatedStore, MemorySnapshotStore, SnapshotStore};
use latejoin_sync::{
    Connector, MessageHandler, Subscription, SyncConfig, SyncEngine, SyncMessage, SyncReport,
    SyncState, Transport, TransportConfig,
};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::transport::connector_for;

/// The sync engine as driven by a session controller.
pub type SessionEngine = SyncEngine<dyn Transport, MemorySnapshotStore>;

/// Which channels [`SessionController::setup_channels`] managed to subscribe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupReport {
    /// Channels with a live subscription.
    pub subscribed: Vec<ChannelId>,
    /// Channels whose subscription failed, with the reason.
    pub failed: Vec<(ChannelId, String)>,
}

impl SetupReport {
    /// Whether every channel was subscribed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A raw delivery waiting for dispatch.
struct Inbound {
    channel: ChannelId,
    payload: Bytes,
}

/// Routes decoded packets to the sync engine or the application consumer.
pub struct Dispatcher {
    scheme: TopicScheme,
    engine: SessionEngine,
    applications: mpsc::UnboundedSender<Packet>,
}

impl Dispatcher {
    /// The sync engine behind the reserved channels.
    pub fn engine(&self) -> &SessionEngine {
        &self.engine
    }

    /// Decode `raw` and route it by channel.
    pub async fn dispatch(&self, channel: ChannelId, raw: Bytes) -> Result<()> {
        let packet = Packet::decode(channel, raw);
        tracing::trace!(
            %channel,
            bytes = packet.body().len(),
            binary = packet.body().is_binary(),
            "packet received"
        );

        match SyncMessage::from_packet(packet) {
            Ok(message) => self.engine.handle(message).await?,
            Err(packet) => {
                if self.applications.send(packet).is_err() {
                    tracing::trace!(%channel, "no application consumer, packet dropped");
                }
            }
        }
        Ok(())
    }

    /// Resolve `topic` to a channel of this session and dispatch `raw` on it.
    ///
    /// Topics outside the addressing scheme are logged and dropped.
    pub async fn dispatch_topic(&self, topic: &str, raw: Bytes) -> Result<()> {
        match self.scheme.channel_for(topic) {
            Ok(channel) => self.dispatch(channel, raw).await,
            Err(e) => {
                tracing::warn!(topic, error = %e, "dropping message on unrecognized topic");
                Err(e.into())
            }
        }
    }
}

/// Live channel state, present between `setup_channels` and `shutdown`.
struct Channels {
    dispatcher: Arc<Dispatcher>,
    subscriptions: Vec<Subscription>,
    pump: JoinHandle<()>,
}

/// Owns a participant's transport session and drives the sync protocol.
pub struct SessionController {
    connector: Arc<dyn Connector>,
    participant: ParticipantId,
    sync_config: SyncConfig,
    store: Arc<MemorySnapshotStore>,
    transport: Option<Arc<dyn Transport>>,
    channels: Option<Channels>,
    applications: Option<mpsc::UnboundedReceiver<Packet>>,
}

impl SessionController {
    /// Create a controller that opens its transport through `connector`.
    pub fn new(connector: Arc<dyn Connector>, participant: ParticipantId) -> Self {
        Self {
            connector,
            participant,
            sync_config: SyncConfig::default(),
            store: Arc::new(MemorySnapshotStore::new()),
            transport: None,
            channels: None,
            applications: None,
        }
    }

    /// Create a controller for `config`, picking the connector from its endpoint.
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let connector = connector_for(&config.endpoint)?;
        Ok(Self::new(connector, config.participant).with_sync_config(config.sync.clone()))
    }

    /// Use `config` for the sync engine created by `setup_channels`.
    pub fn with_sync_config(mut self, config: SyncConfig) -> Self {
        self.sync_config = config;
        self
    }

    /// This participant's id.
    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    /// This participant's role.
    pub fn role(&self) -> ParticipantRole {
        self.participant.role()
    }

    /// Whether a transport session is open.
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Open the transport session at `endpoint`.
    pub async fn connect(&mut self, endpoint: &str) -> Result<()> {
        self.connect_with(&TransportConfig::connect(endpoint)).await
    }

    /// Open the transport session described by `config`.
    pub async fn connect_with(&mut self, config: &TransportConfig) -> Result<()> {
        if self.transport.is_some() {
            return Err(SessionError::AlreadyConnected);
        }

        match self.connector.open(config).await {
            Ok(transport) => {
                tracing::info!(endpoints = ?config.connect, role = %self.role(), "connected");
                self.transport = Some(transport);
                Ok(())
            }
            Err(e) => {
                tracing::error!(endpoints = ?config.connect, error = %e, "failed to connect");
                Err(e.into())
            }
        }
    }

    /// Subscribe to all 256 channel topics of `session_id`.
    ///
    /// A failed subscription is logged and recorded in the report; the
    /// remaining channels are still subscribed.
    pub async fn setup_channels(&mut self, session_id: &str) -> Result<SetupReport> {
        let transport = self.transport.clone().ok_or(SessionError::NotConnected)?;
        if let Some(channels) = &self.channels {
            let current = channels.dispatcher.scheme.session_id().to_string();
            return Err(SessionError::ChannelsAlreadySetUp(current));
        }

        let scheme = TopicScheme::new(session_id)?;
        // A snapshot lives exactly as long as the session it was set up for.
        self.store = Arc::new(MemorySnapshotStore::new());
        let (app_tx, app_rx) = mpsc::unbounded_channel();
        let engine = SyncEngine::new(
            scheme.clone(),
            transport.clone(),
            GatedStore::new(self.role(), self.store.clone()),
            self.sync_config.clone(),
        );
        let dispatcher = Arc::new(Dispatcher {
            scheme: scheme.clone(),
            engine,
            applications: app_tx,
        });

        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<Inbound>();
        let mut report = SetupReport::default();
        let mut subscriptions = Vec::with_capacity(256);

        for (channel, topic) in scheme.topics() {
            let tx = inbound_tx.clone();
            let handler: MessageHandler = Arc::new(move |payload: Bytes| {
                if tx.send(Inbound { channel, payload }).is_err() {
                    tracing::trace!(%channel, "dispatch pump stopped, delivery dropped");
                }
            });

            match transport.subscribe(&topic, handler).await {
                Ok(subscription) => {
                    subscriptions.push(subscription);
                    report.subscribed.push(channel);
                }
                Err(e) => {
                    tracing::warn!(%channel, %topic, error = %e, "failed to subscribe");
                    report.failed.push((channel, e.to_string()));
                }
            }
        }
        drop(inbound_tx);

        let pump_dispatcher = dispatcher.clone();
        let pump = tokio::spawn(async move {
            while let Some(Inbound { channel, payload }) = inbound_rx.recv().await {
                if let Err(e) = pump_dispatcher.dispatch(channel, payload).await {
                    tracing::warn!(%channel, error = %e, "dispatch failed");
                }
            }
        });

        tracing::info!(
            session = session_id,
            subscribed = report.subscribed.len(),
            failed = report.failed.len(),
            "channels set up"
        );

        self.channels = Some(Channels {
            dispatcher,
            subscriptions,
            pump,
        });
        self.applications = Some(app_rx);
        Ok(report)
    }

    /// Release the transport session.
    ///
    /// Subscriptions are dropped and the pump stopped before the transport is
    /// closed, so no handler runs against a closed session. Calling this
    /// again, or without ever connecting, is a no-op.
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(channels) = self.channels.take() {
            drop(channels.subscriptions);
            channels.pump.abort();
        }
        self.applications = None;

        if let Some(transport) = self.transport.take() {
            transport.close().await?;
            tracing::info!(role = %self.role(), "session closed");
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Messaging
    // ─────────────────────────────────────────────────────────────────────────

    /// Decode `raw` and route it as if it arrived on `channel`.
    pub async fn dispatch(&self, channel: ChannelId, raw: Bytes) -> Result<()> {
        self.dispatcher()?.dispatch(channel, raw).await
    }

    /// Route `raw` by the channel encoded in `topic`.
    pub async fn dispatch_topic(&self, topic: &str, raw: Bytes) -> Result<()> {
        self.dispatcher()?.dispatch_topic(topic, raw).await
    }

    /// Encode `value` and publish it on `channel`.
    pub async fn send_packet(&self, channel: ChannelId, value: impl Into<PacketBody>) -> Result<()> {
        let transport = self.transport.as_ref().ok_or(SessionError::NotConnected)?;
        let dispatcher = self.dispatcher()?;

        let payload = latejoin_core::encode(value);
        let topic = dispatcher.scheme.topic_for(channel);
        tracing::debug!(%channel, bytes = payload.len(), "sending packet");
        transport.publish(&topic, payload).await?;
        Ok(())
    }

    /// Take the receiver of packets on application channels. Returns `None`
    /// before `setup_channels` or if already taken.
    pub fn take_application_packets(&mut self) -> Option<mpsc::UnboundedReceiver<Packet>> {
        self.applications.take()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync
    // ─────────────────────────────────────────────────────────────────────────

    /// The sync engine for the current session.
    pub fn engine(&self) -> Result<&SessionEngine> {
        Ok(self.dispatcher()?.engine())
    }

    /// Hold and publish `snapshot`. Authority only.
    pub async fn broadcast_snapshot(&self, snapshot: SyncSnapshot) -> Result<()> {
        Ok(self.engine()?.broadcast_snapshot(snapshot).await?)
    }

    /// Ask the authority for the current state. Peer only.
    pub async fn request_sync(&self) -> Result<()> {
        Ok(self.engine()?.request_sync().await?)
    }

    /// Wait up to `timeout` for a snapshot to be held.
    pub async fn wait_for_sync(&self, timeout: Duration) -> Result<Option<SyncSnapshot>> {
        Ok(self.engine()?.wait_for_sync(timeout).await)
    }

    /// The held (authority) or cached (peer) snapshot of the current
    /// session. Cleared when channels are set up for a new session.
    pub async fn snapshot(&self) -> Result<Option<SyncSnapshot>> {
        Ok(self.store.current().await?)
    }

    /// Current sync state; `Idle` before channels are set up.
    pub fn state(&self) -> SyncState {
        self.engine().map(|e| e.state()).unwrap_or(SyncState::Idle)
    }

    /// Sync counters; all zero before channels are set up.
    pub fn report(&self) -> SyncReport {
        self.engine().map(|e| e.report()).unwrap_or_default()
    }

    fn dispatcher(&self) -> Result<&Dispatcher> {
        if self.transport.is_none() {
            return Err(SessionError::NotConnected);
        }
        self.channels
            .as_ref()
            .map(|c| c.dispatcher.as_ref())
            .ok_or(SessionError::ChannelsNotReady)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latejoin_sync::{MemoryBroker, SyncError};

    const ENDPOINT: &str = "memory/session-tests";

    fn controller(broker: &Arc<MemoryBroker>, participant: u64) -> SessionController {
        SessionController::new(Arc::new(broker.connector()), ParticipantId(participant))
    }

    #[tokio::test]
    async fn test_operations_before_connect() {
        let broker = MemoryBroker::new();
        let mut session = controller(&broker, 2);

        assert!(!session.is_connected());
        assert!(matches!(
            session.setup_channels("pong_test").await,
            Err(SessionError::NotConnected)
        ));
        assert!(matches!(
            session.send_packet(ChannelId(3), "hello").await,
            Err(SessionError::NotConnected)
        ));
        assert!(matches!(session.request_sync().await, Err(SessionError::NotConnected)));
        assert_eq!(session.state(), SyncState::Idle);
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_twice() {
        let broker = MemoryBroker::new();
        let mut session = controller(&broker, 2);

        session.connect(ENDPOINT).await.unwrap();
        assert!(matches!(
            session.connect(ENDPOINT).await,
            Err(SessionError::AlreadyConnected)
        ));
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let broker = MemoryBroker::new();
        let mut session = controller(&broker, 2);

        let err = session.connect("tcp/127.0.0.1:7447").await.unwrap_err();
        assert!(err.is_connect_failure());
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_setup_subscribes_every_channel() {
        let broker = MemoryBroker::new();
        let mut session = controller(&broker, 2);
        session.connect(ENDPOINT).await.unwrap();

        let report = session.setup_channels("pong_test").await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.subscribed.len(), 256);
        assert_eq!(broker.subscriber_count("pong_test/channel000"), 1);
        assert_eq!(broker.subscriber_count("pong_test/channel255"), 1);

        assert!(matches!(
            session.setup_channels("other").await,
            Err(SessionError::ChannelsAlreadySetUp(id)) if id == "pong_test"
        ));
    }

    #[tokio::test]
    async fn test_setup_rejects_bad_session_id() {
        let broker = MemoryBroker::new();
        let mut session = controller(&broker, 2);
        session.connect(ENDPOINT).await.unwrap();

        assert!(matches!(
            session.setup_channels("bad/*").await,
            Err(SessionError::Address(_))
        ));
    }

    #[tokio::test]
    async fn test_application_packets_are_forwarded() {
        let broker = MemoryBroker::new();
        let mut session = controller(&broker, 2);
        session.connect(ENDPOINT).await.unwrap();
        session.setup_channels("pong_test").await.unwrap();
        let mut packets = session.take_application_packets().unwrap();
        assert!(session.take_application_packets().is_none());

        session
            .dispatch(ChannelId(7), Bytes::from_static(b"paddle up"))
            .await
            .unwrap();

        let packet = packets.recv().await.unwrap();
        assert_eq!(packet.channel(), ChannelId(7));
        assert_eq!(packet.body(), &PacketBody::Text("paddle up".into()));
    }

    #[tokio::test]
    async fn test_delivery_after_pump_stopped() {
        let broker = MemoryBroker::new();
        let mut session = controller(&broker, 2);
        session.connect(ENDPOINT).await.unwrap();
        session.setup_channels("pong_test").await.unwrap();
        let mut packets = session.take_application_packets().unwrap();

        let channels = session.channels.take().unwrap();
        channels.pump.abort();
        assert!(channels.pump.await.unwrap_err().is_cancelled());

        // Handlers are still subscribed but have nowhere to send.
        broker
            .create_transport()
            .publish("pong_test/channel007", Bytes::from_static(b"late"))
            .await
            .unwrap();

        assert_eq!(channels.subscriptions.len(), 256);
        assert!(packets.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_unrecognized_topic() {
        let broker = MemoryBroker::new();
        let mut session = controller(&broker, 2);
        session.connect(ENDPOINT).await.unwrap();
        session.setup_channels("pong_test").await.unwrap();

        for topic in ["pong_test/channel256", "other/channel001", "pong_test/lobby"] {
            assert!(matches!(
                session.dispatch_topic(topic, Bytes::from_static(b"x")).await,
                Err(SessionError::Address(_))
            ));
        }
        assert_eq!(session.report(), SyncReport::default());
    }

    #[tokio::test]
    async fn test_peer_cannot_broadcast() {
        let broker = MemoryBroker::new();
        let mut session = controller(&broker, 2);
        session.connect(ENDPOINT).await.unwrap();
        session.setup_channels("pong_test").await.unwrap();

        let err = session
            .broadcast_snapshot(SyncSnapshot::new().with("score", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Sync(SyncError::StoreError(_))));
        assert_eq!(session.snapshot().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_send_packet_publishes_encoded_body() {
        let broker = MemoryBroker::new();
        let mut session = controller(&broker, 1);
        session.connect(ENDPOINT).await.unwrap();
        session.setup_channels("pong_test").await.unwrap();

        session.send_packet(ChannelId(42), "hello").await.unwrap();
        session
            .send_packet(ChannelId(42), vec![0xffu8, 0x00])
            .await
            .unwrap();

        assert_eq!(broker.publish_count("pong_test/channel042"), 2);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let broker = MemoryBroker::new();
        let mut session = controller(&broker, 1);
        session.connect(ENDPOINT).await.unwrap();
        session.setup_channels("pong_test").await.unwrap();

        session.shutdown().await.unwrap();
        session.shutdown().await.unwrap();

        assert!(!session.is_connected());
        assert_eq!(broker.subscriber_count("pong_test/channel254"), 0);
        assert!(matches!(
            session.send_packet(ChannelId(1), "late").await,
            Err(SessionError::NotConnected)
        ));
    }
}
