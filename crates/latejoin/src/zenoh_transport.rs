//! Zenoh transport adapter.
//!
//! Zenoh delivers a session's own puts to its local subscribers, so an
//! authority running on this transport always hears its own broadcasts.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use latejoin_sync::{
    Connector, MessageHandler, Result, Subscription, SyncError, Transport, TransportConfig,
};

/// Opens zenoh sessions connected to the configured endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZenohConnector;

#[async_trait]
impl Connector for ZenohConnector {
    async fn open(&self, config: &TransportConfig) -> Result<Arc<dyn Transport>> {
        let endpoints = serde_json::to_string(&config.connect)
            .map_err(|e| SyncError::ConnectFailure(e.to_string()))?;

        let mut zconfig = zenoh::Config::default();
        zconfig
            .insert_json5("connect/endpoints", &endpoints)
            .map_err(|e| SyncError::ConnectFailure(e.to_string()))?;

        let session = zenoh::open(zconfig)
            .await
            .map_err(|e| SyncError::ConnectFailure(e.to_string()))?;
        tracing::debug!(zid = %session.zid(), "zenoh session opened");

        Ok(Arc::new(ZenohTransport { session }))
    }
}

/// A [`Transport`] backed by one zenoh session.
pub struct ZenohTransport {
    session: zenoh::Session,
}

#[async_trait]
impl Transport for ZenohTransport {
    async fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<Subscription> {
        let subscriber = self
            .session
            .declare_subscriber(topic.to_string())
            .callback(move |sample| {
                handler(Bytes::from(sample.payload().to_bytes().into_owned()));
            })
            .await
            .map_err(|e| SyncError::SubscribeFailure {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Subscription::new(topic, subscriber))
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        self.session
            .put(topic.to_string(), payload.to_vec())
            .await
            .map_err(|e| SyncError::PublishFailure {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn close(&self) -> Result<()> {
        self.session
            .close()
            .await
            .map_err(|e| SyncError::TransportError(e.to_string()))
    }
}
