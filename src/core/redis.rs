use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::{cmd, Client, RedisError};
use tokio::sync::RwLock;

/// Fixed-window limit: at most `limit` hits per `window_seconds` for one key.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RateLimit {
    pub(crate) scope: &'static str,
    pub(crate) limit: u64,
    pub(crate) window_seconds: u64,
}

impl RateLimit {
    pub(crate) const fn new(scope: &'static str, limit: u64, window_seconds: u64) -> Self {
        Self { scope, limit, window_seconds }
    }

    pub(crate) fn key(&self, subject: &str) -> String {
        format!("rl:{}:{}", self.scope, subject)
    }
}

#[derive(Clone)]
pub(crate) struct RedisHandle {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

#[derive(Debug, Clone)]
pub(crate) enum RedisHealth {
    Healthy,
    Disconnected,
    Unhealthy(String),
}

impl RedisHandle {
    pub(crate) fn new(url: String) -> Self {
        Self { url, manager: Arc::new(RwLock::new(None)) }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let client = Client::open(self.url.clone())?;
        let manager = ConnectionManager::new(client).await?;
        let mut guard = self.manager.write().await;
        *guard = Some(manager);
        Ok(())
    }

    pub(crate) async fn disconnect(&self) {
        let mut guard = self.manager.write().await;
        *guard = None;
    }

    pub(crate) async fn health(&self) -> RedisHealth {
        let manager = { self.manager.read().await.clone() };
        let Some(mut manager) = manager else {
            return RedisHealth::Disconnected;
        };

        match cmd("PING").query_async::<_, String>(&mut manager).await {
            Ok(_) => RedisHealth::Healthy,
            Err(err) => RedisHealth::Unhealthy(err.to_string()),
        }
    }

    /// Returns `Ok(true)` when the hit is within the limit. Without a live
    /// connection every hit is allowed.
    pub(crate) async fn check(&self, policy: RateLimit, subject: &str) -> Result<bool, RedisError> {
        let manager = { self.manager.read().await.clone() };
        let Some(mut manager) = manager else {
            return Ok(true);
        };

        let script = redis::Script::new(
            r#"
            local current = redis.call("INCR", KEYS[1])
            if current == 1 then
                redis.call("EXPIRE", KEYS[1], ARGV[1])
            end
            return current
        "#,
        );

        let current: i64 = script
            .key(policy.key(subject))
            .arg(policy.window_seconds as i64)
            .invoke_async(&mut manager)
            .await?;

        Ok(current <= policy.limit as i64)
    }

    /// Like [`check`](Self::check) but treats Redis failures as "allowed" and logs them.
    pub(crate) async fn allow(&self, policy: RateLimit, subject: &str) -> bool {
        match self.check(policy, subject).await {
            Ok(allowed) => allowed,
            Err(err) => {
                tracing::warn!(error = %err, scope = policy.scope, "Rate limit check failed");
                true
            }
        }
    }
}
