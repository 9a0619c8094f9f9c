use crate::registry::GameRegistry;
use crate::{LobbyServer, ServerConfig, ServerError};
use std::sync::Arc;
use std::time::Duration;

/// Builder for constructing a [`LobbyServer`].
pub struct ServerBuilder {
    config: ServerConfig,
    registry: Option<Arc<GameRegistry>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            registry: None,
        }
    }

    /// Set server configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the listening address.
    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    /// Cap on concurrently live sessions. Default: 1024.
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.config.max_sessions = max;
        self
    }

    /// Per-client event queue length. Default: 256.
    pub fn observer_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.observer_queue_capacity = capacity;
        self
    }

    /// Per-frame write timeout. Default: 5 seconds.
    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.config.delivery_timeout = timeout;
        self
    }

    /// Pause after a failed accept. Default: 100 ms.
    pub fn accept_backoff(mut self, backoff: Duration) -> Self {
        self.config.accept_backoff = backoff;
        self
    }

    /// Cap on in-flight `ServerFull` replies. Default: 64.
    pub fn max_pending_rejections(mut self, max: usize) -> Self {
        self.config.max_pending_rejections = max;
        self
    }

    /// Serve an existing registry instead of a fresh one.
    ///
    /// The caller keeps its `Arc` and can mutate the registry directly; those
    /// changes reach clients like any other.
    pub fn registry(mut self, registry: Arc<GameRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the server.
    pub fn build(self) -> Result<LobbyServer, ServerError> {
        if self.config.bind_addr.trim().is_empty() {
            return Err(ServerError::Config("bind_addr is required".into()));
        }
        if self.config.max_sessions == 0 {
            return Err(ServerError::Config("max_sessions must be at least 1".into()));
        }
        // The first queued event is the snapshot, so a client needs room for
        // at least one more.
        if self.config.observer_queue_capacity < 2 {
            return Err(ServerError::Config(
                "observer_queue_capacity must be at least 2".into(),
            ));
        }
        if self.config.delivery_timeout.is_zero() {
            return Err(ServerError::Config("delivery_timeout must be non-zero".into()));
        }

        Ok(LobbyServer {
            config: self.config,
            registry: self.registry.unwrap_or_default(),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
