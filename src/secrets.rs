use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{GatewayError, Result};

const SECRET_TTL: Duration = Duration::from_secs(300);

/// Vends upstream API keys by logical name.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<String>;
}

/// Default store: the logical secret name is an environment variable.
#[derive(Debug, Default)]
pub struct EnvSecretStore;

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn fetch(&self, name: &str) -> Result<String> {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| GatewayError::ProviderUnconfigured(format!("missing secret: {name}")))
    }
}

struct CachedSecret {
    value: String,
    expires_at: Instant,
}

/// TTL read-through cache over a [`SecretStore`]. The lock is held across
/// the fetch so concurrent misses for the same name collapse into one
/// upstream call.
pub struct SecretCache {
    store: Arc<dyn SecretStore>,
    entries: Mutex<HashMap<String, CachedSecret>>,
}

impl SecretCache {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self {
            store,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, name: &str) -> Result<String> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        if let Some(entry) = entries.get(name) {
            if now < entry.expires_at {
                return Ok(entry.value.clone());
            }
        }
        let value = self.store.fetch(name).await?;
        entries.insert(
            name.to_string(),
            CachedSecret {
                value: value.clone(),
                expires_at: now + SECRET_TTL,
            },
        );
        Ok(value)
    }
}
