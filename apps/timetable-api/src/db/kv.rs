use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::ApiError;

/// Abstraction over a key-value store used for access tokens and verification codes.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), ApiError>;
    async fn get(&self, key: &str) -> Result<Option<String>, ApiError>;
    async fn del(&self, key: &str) -> Result<(), ApiError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

struct StoredValue {
    value: String,
    expires_at: Instant,
}

/// Writes between full sweeps of expired entries.
const SWEEP_INTERVAL: usize = 64;

/// Process-local store. Expired keys are treated as absent, dropped on the
/// next read of that key, and swept in bulk every [`SWEEP_INTERVAL`] writes.
pub struct MemoryStore {
    data: Mutex<HashMap<String, StoredValue>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            writes: AtomicUsize::new(0),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), ApiError> {
        let now = Instant::now();
        let mut data = self.data.lock();
        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0 {
            data.retain(|_, stored| stored.expires_at > now);
        }
        data.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: now + Duration::from_secs(ttl_secs),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        let mut data = self.data.lock();
        match data.get(key) {
            Some(stored) if stored.expires_at > Instant::now() => Ok(Some(stored.value.clone())),
            Some(_) => {
                data.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn del(&self, key: &str) -> Result<(), ApiError> {
        self.data.lock().remove(key);
        Ok(())
    }
}
