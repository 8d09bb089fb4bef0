//! Session persistence.
//!
//! The engine keeps no session state of its own. Each user's current
//! question lives in an external key-value store as a single string under
//! a namespaced key:
//!
//! ```text
//! [{namespace}:]{channel}:{user_id}  ->  current question text
//! ```
//!
//! A missing key means the user has no active question.

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::{RedisSettings, RedisStore};

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Errors from the key-value store. All of them are transient from the
/// engine's point of view.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("session store did not answer within {0:?}")]
    Timeout(Duration),
}

/// Minimal key-value contract the sessions are kept in.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// A user on a particular chat channel, e.g. `("telegram", "42")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserIdentity {
    channel: String,
    user_id: String,
}

impl UserIdentity {
    pub fn new(channel: impl Into<String>, user_id: impl ToString) -> Self {
        Self {
            channel: channel.into(),
            user_id: user_id.to_string(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.user_id)
    }
}

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Session-shaped view of a [`KeyValueStore`].
///
/// Every call is bounded by `timeout`. Reads and writes are independent
/// requests: nothing here makes a read followed by a write atomic.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
    namespace: Option<String>,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            namespace: None,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn key(&self, user: &UserIdentity) -> String {
        match &self.namespace {
            Some(namespace) => format!("{namespace}:{user}"),
            None => user.to_string(),
        }
    }

    pub async fn current_question(&self, user: &UserIdentity) -> Result<Option<String>, StoreError> {
        let key = self.key(user);
        self.bounded(self.backend.get(&key)).await
    }

    pub async fn set_current_question(
        &self,
        user: &UserIdentity,
        question: &str,
    ) -> Result<(), StoreError> {
        let key = self.key(user);
        self.bounded(self.backend.set(&key, question)).await
    }

    pub async fn clear(&self, user: &UserIdentity) -> Result<(), StoreError> {
        let key = self.key(user);
        self.bounded(self.backend.delete(&key)).await
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowStore;

    #[async_trait]
    impl KeyValueStore for SlowStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn keys_are_namespaced_by_channel() {
        let sessions = SessionStore::new(Arc::new(MemoryStore::new()));
        assert_eq!(sessions.key(&UserIdentity::new("telegram", 42)), "telegram:42");
        assert_eq!(
            sessions
                .with_namespace("quiz")
                .key(&UserIdentity::new("vk", "alice")),
            "quiz:vk:alice"
        );
    }

    #[tokio::test]
    async fn same_user_id_on_two_channels_does_not_collide() {
        let sessions = SessionStore::new(Arc::new(MemoryStore::new()));
        let telegram = UserIdentity::new("telegram", 7);
        let vk = UserIdentity::new("vk", 7);

        sessions.set_current_question(&telegram, "Q1").await.unwrap();
        sessions.set_current_question(&vk, "Q2").await.unwrap();
        sessions.clear(&vk).await.unwrap();

        assert_eq!(
            sessions.current_question(&telegram).await.unwrap().as_deref(),
            Some("Q1")
        );
        assert_eq!(sessions.current_question(&vk).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_calls_time_out() {
        let sessions = SessionStore::new(Arc::new(SlowStore)).with_timeout(Duration::from_millis(250));
        let user = UserIdentity::new("telegram", 1);

        let err = sessions.current_question(&user).await.unwrap_err();
        assert!(matches!(err, StoreError::Timeout(d) if d == Duration::from_millis(250)));
        let err = sessions.set_current_question(&user, "Q").await.unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));
        sessions.clear(&user).await.unwrap();
    }
}
