use std::time::Duration;

use async_trait::async_trait;
use log::info;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisError};

use super::{KeyValueStore, StoreError};

#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    /// Applied to every `set`; `None` keeps sessions until they are deleted.
    pub ttl: Option<Duration>,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            ttl: None,
        }
    }
}

impl RedisSettings {
    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: 0,
                password: self.password.clone(),
                ..Default::default()
            },
        }
    }
}

/// Redis-backed store. The connection manager reconnects on its own after
/// the server goes away, so a failed call does not poison later ones.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    ttl: Option<Duration>,
}

impl RedisStore {
    pub async fn connect(settings: &RedisSettings) -> Result<Self, StoreError> {
        let client = redis::Client::open(settings.connection_info()).map_err(unavailable)?;
        let connection = ConnectionManager::new(client).await.map_err(unavailable)?;
        info!(
            "Connected to Redis at {}:{}",
            settings.host, settings.port
        );
        Ok(Self {
            connection,
            ttl: settings.ttl,
        })
    }
}

fn unavailable(err: RedisError) -> StoreError {
    StoreError::Unavailable(Box::new(err))
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.connection.clone();
        connection.get(key).await.map_err(unavailable)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        match self.ttl {
            Some(ttl) => connection
                .set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                .await
                .map_err(unavailable),
            None => connection
                .set::<_, _, ()>(key, value)
                .await
                .map_err(unavailable),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        connection.del::<_, ()>(key).await.map_err(unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_info_carries_credentials() {
        let settings = RedisSettings {
            host: "redis.internal".to_string(),
            port: 16379,
            password: Some("s3cret".to_string()),
            ttl: None,
        };
        let info = settings.connection_info();
        assert!(matches!(
            info.addr,
            ConnectionAddr::Tcp(ref host, 16379) if host == "redis.internal"
        ));
        assert_eq!(info.redis.db, 0);
        assert_eq!(info.redis.password.as_deref(), Some("s3cret"));
    }
}
