//! Transport abstraction for the sync protocol.
//!
//! The transport is a topic-addressed publish/subscribe substrate. It is
//! assumed to deliver at least once, in order within a topic, with no
//! ordering across topics, and to deliver a publisher's own messages back
//! to its local subscribers.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Callback invoked for every payload delivered on a subscribed topic.
///
/// Handlers may run concurrently on transport-owned tasks and must return
/// promptly.
pub type MessageHandler = Arc<dyn Fn(Bytes) + Send + Sync>;

/// Endpoints the transport should connect to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportConfig {
    /// Transport-specific endpoint strings, e.g. `tcp/127.0.0.1:7447`.
    pub connect: Vec<String>,
}

impl TransportConfig {
    /// Config with a single connect endpoint.
    pub fn connect(endpoint: impl Into<String>) -> Self {
        Self {
            connect: vec![endpoint.into()],
        }
    }
}

/// A live subscription. Dropping it stops delivery to its handler.
pub struct Subscription {
    topic: String,
    _guard: Box<dyn Send>,
}

impl Subscription {
    /// Wrap a transport-specific guard whose drop undeclares the subscriber.
    pub fn new(topic: impl Into<String>, guard: impl Send + 'static) -> Self {
        Self {
            topic: topic.into(),
            _guard: Box::new(guard),
        }
    }

    /// The subscribed topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

/// An open pub/sub session.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Subscribe `handler` to every payload published on `topic`.
    async fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<Subscription>;

    /// Publish `payload` on `topic`. Fire-and-forget: success means the
    /// transport accepted the payload, not that anyone received it.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()>;

    /// Release the session. Further publishes and subscribes fail.
    async fn close(&self) -> Result<()>;
}

/// Opens transport sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open one session using `config`.
    async fn open(&self, config: &TransportConfig) -> Result<Arc<dyn Transport>>;
}

/// A simple in-memory transport for testing.
///
/// A [`memory::MemoryBroker`] plays the role of the pub/sub router: every
/// publish is delivered synchronously to all handlers subscribed to the exact
/// topic, including the publisher's own.
pub mod memory {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, Weak};

    use crate::error::SyncError;

    /// Scheme prefix accepted by [`MemoryConnector`].
    pub const MEMORY_SCHEME: &str = "memory/";

    /// Shared state for the in-memory pub/sub network.
    #[derive(Default)]
    pub struct MemoryBroker {
        inner: Mutex<BrokerInner>,
    }

    #[derive(Default)]
    struct BrokerInner {
        next_id: u64,
        /// Handlers per exact topic.
        subscribers: HashMap<String, Vec<(u64, MessageHandler)>>,
        /// Topics on which subscriptions are refused.
        denied: HashSet<String>,
        /// Number of accepted publishes per topic.
        published: HashMap<String, usize>,
    }

    impl MemoryBroker {
        /// Create a new broker.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Create a transport attached to this broker.
        pub fn create_transport(self: &Arc<Self>) -> MemoryTransport {
            MemoryTransport {
                broker: Arc::clone(self),
                closed: AtomicBool::new(false),
            }
        }

        /// A connector that opens transports on this broker.
        pub fn connector(self: &Arc<Self>) -> MemoryConnector {
            MemoryConnector {
                broker: Arc::clone(self),
            }
        }

        /// Refuse every future subscription on `topic`.
        pub fn deny_topic(&self, topic: impl Into<String>) {
            self.inner.lock().unwrap().denied.insert(topic.into());
        }

        /// Number of handlers currently subscribed to `topic`.
        pub fn subscriber_count(&self, topic: &str) -> usize {
            let inner = self.inner.lock().unwrap();
            inner.subscribers.get(topic).map_or(0, Vec::len)
        }

        /// Number of publishes accepted on `topic` so far.
        pub fn publish_count(&self, topic: &str) -> usize {
            let inner = self.inner.lock().unwrap();
            inner.published.get(topic).copied().unwrap_or(0)
        }

        fn add_subscriber(
            self: &Arc<Self>,
            topic: &str,
            handler: MessageHandler,
        ) -> Result<SubscriberGuard> {
            let mut inner = self.inner.lock().unwrap();
            if inner.denied.contains(topic) {
                return Err(SyncError::SubscribeFailure {
                    topic: topic.to_string(),
                    reason: "subscription denied by broker".into(),
                });
            }

            inner.next_id += 1;
            let id = inner.next_id;
            inner
                .subscribers
                .entry(topic.to_string())
                .or_default()
                .push((id, handler));

            Ok(SubscriberGuard {
                broker: Arc::downgrade(self),
                topic: topic.to_string(),
                id,
            })
        }

        fn remove_subscriber(&self, topic: &str, id: u64) {
            let mut inner = self.inner.lock().unwrap();
            if let Some(handlers) = inner.subscribers.get_mut(topic) {
                handlers.retain(|(handler_id, _)| *handler_id != id);
                if handlers.is_empty() {
                    inner.subscribers.remove(topic);
                }
            }
        }

        fn deliver(&self, topic: &str, payload: Bytes) {
            // Collect handlers first so none runs under the broker lock.
            let handlers: Vec<MessageHandler> = {
                let mut inner = self.inner.lock().unwrap();
                *inner.published.entry(topic.to_string()).or_default() += 1;
                inner
                    .subscribers
                    .get(topic)
                    .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
                    .unwrap_or_default()
            };

            for handler in handlers {
                handler(payload.clone());
            }
        }
    }

    /// Removes its handler from the broker when dropped.
    struct SubscriberGuard {
        broker: Weak<MemoryBroker>,
        topic: String,
        id: u64,
    }

    impl Drop for SubscriberGuard {
        fn drop(&mut self) {
            if let Some(broker) = self.broker.upgrade() {
                broker.remove_subscriber(&self.topic, self.id);
            }
        }
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        broker: Arc<MemoryBroker>,
        closed: AtomicBool,
    }

    impl MemoryTransport {
        /// Whether [`Transport::close`] has been called.
        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::Acquire)
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<Subscription> {
            if self.is_closed() {
                return Err(SyncError::Closed);
            }
            let guard = self.broker.add_subscriber(topic, handler)?;
            Ok(Subscription::new(topic, guard))
        }

        async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
            if self.is_closed() {
                return Err(SyncError::Closed);
            }
            self.broker.deliver(topic, payload);
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.closed.store(true, Ordering::Release);
            Ok(())
        }
    }

    /// Opens [`MemoryTransport`]s for `memory/...` endpoints.
    #[derive(Clone)]
    pub struct MemoryConnector {
        broker: Arc<MemoryBroker>,
    }

    #[async_trait]
    impl Connector for MemoryConnector {
        async fn open(&self, config: &TransportConfig) -> Result<Arc<dyn Transport>> {
            if config.connect.is_empty() {
                return Err(SyncError::ConnectFailure("no connect endpoint configured".into()));
            }
            if let Some(endpoint) = config
                .connect
                .iter()
                .find(|endpoint| !endpoint.starts_with(MEMORY_SCHEME))
            {
                return Err(SyncError::ConnectFailure(format!(
                    "endpoint {endpoint} is unreachable from the in-memory broker"
                )));
            }
            Ok(Arc::new(self.broker.create_transport()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryBroker;
    use super::*;
    use crate::error::SyncError;
    use std::sync::Mutex;

    fn recorder() -> (MessageHandler, Arc<Mutex<Vec<Bytes>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: MessageHandler =
            Arc::new(move |payload: Bytes| sink.lock().unwrap().push(payload));
        (handler, seen)
    }

    #[tokio::test]
    async fn test_memory_publish_reaches_all_subscribers() {
        let broker = MemoryBroker::new();
        let transport_a = broker.create_transport();
        let transport_b = broker.create_transport();

        let (handler_a, seen_a) = recorder();
        let (handler_b, seen_b) = recorder();
        let _sub_a = transport_a.subscribe("g/channel001", handler_a).await.unwrap();
        let _sub_b = transport_b.subscribe("g/channel001", handler_b).await.unwrap();

        transport_a
            .publish("g/channel001", Bytes::from_static(b"hi"))
            .await
            .unwrap();

        // The publisher hears its own message too.
        assert_eq!(seen_a.lock().unwrap().as_slice(), &[Bytes::from_static(b"hi")]);
        assert_eq!(seen_b.lock().unwrap().as_slice(), &[Bytes::from_static(b"hi")]);
        assert_eq!(broker.publish_count("g/channel001"), 1);
    }

    #[tokio::test]
    async fn test_memory_topics_are_exact() {
        let broker = MemoryBroker::new();
        let transport = broker.create_transport();

        let (handler, seen) = recorder();
        let _sub = transport.subscribe("g/channel001", handler).await.unwrap();

        transport
            .publish("g/channel002", Bytes::from_static(b"x"))
            .await
            .unwrap();

        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_drop_unsubscribes() {
        let broker = MemoryBroker::new();
        let transport = broker.create_transport();

        let (handler, seen) = recorder();
        let sub = transport.subscribe("g/channel003", handler).await.unwrap();
        assert_eq!(sub.topic(), "g/channel003");
        assert_eq!(broker.subscriber_count("g/channel003"), 1);

        drop(sub);
        transport
            .publish("g/channel003", Bytes::from_static(b"late"))
            .await
            .unwrap();

        assert_eq!(broker.subscriber_count("g/channel003"), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_denied_topic() {
        let broker = MemoryBroker::new();
        broker.deny_topic("g/channel009");
        let transport = broker.create_transport();

        let (handler, _) = recorder();
        let err = transport.subscribe("g/channel009", handler).await.unwrap_err();

        assert!(matches!(err, SyncError::SubscribeFailure { .. }));
    }

    #[tokio::test]
    async fn test_memory_closed_transport() {
        let broker = MemoryBroker::new();
        let transport = broker.create_transport();
        transport.close().await.unwrap();

        let (handler, _) = recorder();
        assert!(transport.is_closed());
        assert!(matches!(
            transport.publish("g/channel000", Bytes::new()).await,
            Err(SyncError::Closed)
        ));
        assert!(matches!(
            transport.subscribe("g/channel000", handler).await,
            Err(SyncError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_memory_connector_endpoints() {
        let broker = MemoryBroker::new();
        let connector = broker.connector();

        assert!(connector
            .open(&TransportConfig::connect("memory/local"))
            .await
            .is_ok());
        assert!(matches!(
            connector.open(&TransportConfig::connect("tcp/127.0.0.1:7447")).await,
            Err(SyncError::ConnectFailure(_))
        ));
        assert!(matches!(
            connector.open(&TransportConfig::default()).await,
            Err(SyncError::ConnectFailure(_))
        ));
    }
}
