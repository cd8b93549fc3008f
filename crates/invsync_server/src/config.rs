//! Server configuration.

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum number of operations accepted in one push batch.
    pub max_push_batch: u32,
}

impl ServerConfig {
    /// Creates a configuration with the given batch limit.
    pub fn new(max_push_batch: u32) -> Self {
        Self { max_push_batch }
    }

    /// Sets the push batch limit.
    pub fn with_max_push_batch(mut self, limit: u32) -> Self {
        self.max_push_batch = limit;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(500)
    }
}
