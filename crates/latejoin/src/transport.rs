//! Connector selection by endpoint.

use std::sync::Arc;

use latejoin_sync::transport::memory::MEMORY_SCHEME;
use latejoin_sync::{Connector, MemoryBroker};

use crate::error::Result;

/// Pick a connector able to reach `endpoint`.
///
/// `memory/...` endpoints get a fresh in-process broker, which only connects
/// participants that share the returned connector. Every other endpoint needs
/// the `zenoh` feature.
pub fn connector_for(endpoint: &str) -> Result<Arc<dyn Connector>> {
    if endpoint.starts_with(MEMORY_SCHEME) {
        return Ok(Arc::new(MemoryBroker::new().connector()));
    }

    #[cfg(feature = "zenoh")]
    {
        Ok(Arc::new(crate::zenoh_transport::ZenohConnector))
    }

    #[cfg(not(feature = "zenoh"))]
    {
        Err(crate::error::SessionError::UnsupportedEndpoint(
            endpoint.to_string(),
        ))
    }
}
