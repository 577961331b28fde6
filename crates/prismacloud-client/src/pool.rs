//! Connection pool: one client handle per logical connection.
//!
//! The pool is an explicit object owned by the host session and passed to
//! every table; there is no process-global cache.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use crate::client::{ApiRequest, PrismaClient};
use crate::config::ConnectionConfig;
use crate::error::Result;

/// A named, materialized connection.
#[derive(Debug)]
pub struct Connection {
    name: String,
    client: PrismaClient,
    session_email: OnceCell<Option<String>>,
}

impl Connection {
    pub fn new(name: impl Into<String>, client: PrismaClient) -> Self {
        Self {
            name: name.into(),
            client,
            session_email: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &PrismaClient {
        &self.client
    }

    /// Email of the user owning the session, fetched from `GET user/me` once
    /// per connection.
    pub async fn session_email(&self) -> Result<Option<String>> {
        let email = self
            .session_email
            .get_or_try_init(|| async {
                let profile = self.client.execute(&ApiRequest::get(&["user", "me"])).await?;
                Ok::<_, crate::error::ClientError>(
                    profile
                        .get("email")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                )
            })
            .await?;
        Ok(email.clone())
    }
}

/// Caches one `Connection` per connection name for the lifetime of the session.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    entries: Mutex<HashMap<String, Arc<OnceCell<Arc<Connection>>>>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached connection for `name`, building it from `config` on
    /// first use.
    ///
    /// Concurrent first callers share a single initialization. A cached entry
    /// is never replaced, even if a later call passes a different config. A
    /// failed initialization leaves the slot empty so the next call retries.
    pub async fn connect(&self, name: &str, config: &ConnectionConfig) -> Result<Arc<Connection>> {
        let slot = {
            let mut entries = self.entries.lock().await;
            Arc::clone(entries.entry(name.to_string()).or_default())
        };

        if let Some(conn) = slot.get() {
            debug!("Connection pool hit for '{}'", name);
            return Ok(Arc::clone(conn));
        }

        let conn = slot
            .get_or_try_init(|| async {
                let validated = config.validate()?;
                let client = PrismaClient::connect(validated).await?;
                info!("Connection '{}' established", name);
                Ok::<_, crate::error::ClientError>(Arc::new(Connection::new(name, client)))
            })
            .await?;
        Ok(Arc::clone(conn))
    }

    /// Cached connection for `name`, if one has been materialized.
    pub async fn get(&self, name: &str) -> Option<Arc<Connection>> {
        let entries = self.entries.lock().await;
        entries.get(name).and_then(|slot| slot.get().cloned())
    }

    /// Number of materialized connections.
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        entries.values().filter(|slot| slot.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
