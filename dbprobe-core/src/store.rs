//! Persisted connection records and the store they live in.
//!
//! The store is consumed through [`ConnectionStore`]; [`InMemoryConnectionStore`]
//! ships for tests and the CLI.
//!
//! # Security
//! - Passwords are never serialized
//! - Reads strip the password unless it is explicitly requested
//! - Connection strings are serialized and debug-printed with any embedded
//!   password masked

use crate::connection::{ConnectionSpec, Endpoint, LocalEndpoint};
use crate::error::{ProbeError, Result};
use crate::models::{ConnectionStatus, EngineType, Topology};
use crate::security::Credentials;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use zeroize::Zeroizing;

/// A registered database connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub id: Uuid,
    pub name: String,
    pub engine: EngineType,
    pub topology: Topology,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    /// Write-only; present only on reads that ask for it
    #[serde(skip)]
    pub password: Option<Zeroizing<String>>,
    pub database: Option<String>,
    #[serde(serialize_with = "serialize_masked")]
    pub connection_string: Option<String>,
    pub tls: bool,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for ConnectionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("engine", &self.engine)
            .field("topology", &self.topology)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field(
                "connection_string",
                &self.connection_string.as_deref().map(mask_connection_string),
            )
            .field("tls", &self.tls)
            .field("status", &self.status)
            .finish()
    }
}

/// Masks the password inside a URL-shaped connection string.
///
/// Strings that do not parse as URLs, or carry no password, are returned
/// unchanged.
pub fn mask_connection_string(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("****"));
            parsed.to_string()
        }
        _ => raw.to_string(),
    }
}

fn serialize_masked<S: Serializer>(value: &Option<String>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(raw) => serializer.serialize_some(&mask_connection_string(raw)),
        None => serializer.serialize_none(),
    }
}

impl ConnectionRecord {
    /// Rebuilds the probe spec for this record.
    ///
    /// The record must have been loaded with its password for local
    /// topologies, otherwise validation will reject the spec.
    pub fn to_spec(&self) -> ConnectionSpec {
        let endpoint = match self.topology {
            Topology::Local => Endpoint::Local(LocalEndpoint {
                host: self.host.clone().unwrap_or_default(),
                port: self.port,
                credentials: Credentials::new(
                    self.username.clone().unwrap_or_default(),
                    self.password.as_ref().map(|p| p.to_string()),
                ),
            }),
            Topology::External => {
                Endpoint::external(self.connection_string.clone().unwrap_or_default())
            }
        };
        ConnectionSpec {
            engine: self.engine,
            endpoint,
            database: self.database.clone().filter(|d| !d.is_empty()),
            tls: self.tls,
        }
    }

    /// Copy without the password
    pub fn without_password(&self) -> Self {
        Self {
            password: None,
            ..self.clone()
        }
    }
}

/// Identity of a connection target, for duplicate detection.
#[derive(Debug, Clone, Copy)]
pub enum TargetKey<'a> {
    /// Same engine, host, port and database
    Local {
        engine: EngineType,
        host: &'a str,
        port: Option<u16>,
        database: Option<&'a str>,
    },
    /// Same connection string
    External { connection_string: &'a str },
}

impl TargetKey<'_> {
    fn matches(&self, record: &ConnectionRecord) -> bool {
        match *self {
            TargetKey::Local {
                engine,
                host,
                port,
                database,
            } => {
                record.topology == Topology::Local
                    && record.engine == engine
                    && record.host.as_deref() == Some(host)
                    && record.port == port
                    && record.database.as_deref() == database
            }
            TargetKey::External { connection_string } => {
                record.topology == Topology::External
                    && record.connection_string.as_deref() == Some(connection_string)
            }
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub total_pages: usize,
    pub page: usize,
}

/// Storage for connection records.
///
/// Implementations must never return a password unless `include_password`
/// is set.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Looks up a record by id
    async fn find(&self, id: Uuid, include_password: bool) -> Result<Option<ConnectionRecord>>;

    /// Looks up a record by its unique name
    async fn find_by_name(&self, name: &str) -> Result<Option<ConnectionRecord>>;

    /// Finds another record pointing at the same target
    async fn find_duplicate(
        &self,
        key: TargetKey<'_>,
        exclude: Option<Uuid>,
    ) -> Result<Option<ConnectionRecord>>;

    /// Lists records, newest first. `page` is 1-based.
    async fn list(&self, page: usize, limit: usize) -> Result<Page<ConnectionRecord>>;

    /// Inserts a new record
    async fn create(&self, record: ConnectionRecord) -> Result<ConnectionRecord>;

    /// Replaces an existing record
    async fn update(&self, record: ConnectionRecord) -> Result<ConnectionRecord>;

    /// Sets only the status of a record
    async fn set_status(&self, id: Uuid, status: ConnectionStatus) -> Result<()>;

    /// Removes a record; returns whether it existed
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Store backed by a map behind an async lock.
#[derive(Debug, Default)]
pub struct InMemoryConnectionStore {
    records: RwLock<HashMap<Uuid, ConnectionRecord>>,
}

impl InMemoryConnectionStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

fn strip(record: &ConnectionRecord, include_password: bool) -> ConnectionRecord {
    if include_password {
        record.clone()
    } else {
        record.without_password()
    }
}

#[async_trait]
impl ConnectionStore for InMemoryConnectionStore {
    async fn find(&self, id: Uuid, include_password: bool) -> Result<Option<ConnectionRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&id).map(|r| strip(r, include_password)))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<ConnectionRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.name == name)
            .map(ConnectionRecord::without_password))
    }

    async fn find_duplicate(
        &self,
        key: TargetKey<'_>,
        exclude: Option<Uuid>,
    ) -> Result<Option<ConnectionRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| Some(r.id) != exclude)
            .find(|r| key.matches(r))
            .map(ConnectionRecord::without_password))
    }

    async fn list(&self, page: usize, limit: usize) -> Result<Page<ConnectionRecord>> {
        if limit == 0 {
            return Err(ProbeError::validation("limit must be greater than 0"));
        }
        let page = page.max(1);

        let records = self.records.read().await;
        let mut all: Vec<&ConnectionRecord> = records.values().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.name.cmp(&b.name)));

        let total = all.len();
        let items = all
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .map(ConnectionRecord::without_password)
            .collect();

        Ok(Page {
            items,
            total,
            total_pages: total.div_ceil(limit),
            page,
        })
    }

    async fn create(&self, record: ConnectionRecord) -> Result<ConnectionRecord> {
        let mut records = self.records.write().await;
        if records.values().any(|r| r.name == record.name) {
            return Err(ProbeError::conflict(
                "Database connection with this name already exists",
            ));
        }
        records.insert(record.id, record.clone());
        Ok(record.without_password())
    }

    async fn update(&self, record: ConnectionRecord) -> Result<ConnectionRecord> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record;
                Ok(existing.without_password())
            }
            None => Err(ProbeError::not_found("Database connection")),
        }
    }

    async fn set_status(&self, id: Uuid, status: ConnectionStatus) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| ProbeError::not_found("Database connection"))?;
        record.status = status;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut records = self.records.write().await;
        Ok(records.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> ConnectionRecord {
        let now = Utc::now();
        ConnectionRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            engine: EngineType::PostgreSQL,
            topology: Topology::Local,
            host: Some("localhost".to_string()),
            port: Some(5432),
            username: Some("postgres".to_string()),
            password: Some(Zeroizing::new("s3cret-pw".to_string())),
            database: Some("app".to_string()),
            connection_string: None,
            tls: false,
            status: ConnectionStatus::Connected,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_password_never_serialized() {
        let json = serde_json::to_string(&record("main")).unwrap();
        assert!(!json.contains("s3cret-pw"));
        assert!(!json.contains("\"password\""));
        assert!(json.contains("\"status\":\"Connected\""));
    }

    #[test]
    fn test_connection_string_is_masked_when_serialized() {
        let mut external = record("ext");
        external.topology = Topology::External;
        external.connection_string = Some("https://u:topsecret@ch:8443/db".to_string());
        let json = serde_json::to_string(&external).unwrap();
        assert!(!json.contains("topsecret"));
        assert!(!format!("{:?}", external).contains("topsecret"));
    }

    #[test]
    fn test_mask_connection_string_leaves_plain_hosts() {
        assert_eq!(mask_connection_string("analytics.example.com"), "analytics.example.com");
        assert_eq!(mask_connection_string("http://ch:8123/db"), "http://ch:8123/db");
    }

    #[test]
    fn test_to_spec_round_trips_local_fields() {
        let spec = record("main").to_spec();
        assert!(spec.validate().is_ok());
        let local = spec.local_endpoint().unwrap();
        assert_eq!(local.host, "localhost");
        assert_eq!(local.credentials.password(), Some("s3cret-pw"));
        assert_eq!(spec.database.as_deref(), Some("app"));
    }

    #[tokio::test]
    async fn test_find_strips_password_unless_requested() {
        let store = InMemoryConnectionStore::new();
        let created = store.create(record("main")).await.unwrap();
        assert!(created.password.is_none());

        let plain = store.find(created.id, false).await.unwrap().unwrap();
        assert!(plain.password.is_none());

        let full = store.find(created.id, true).await.unwrap().unwrap();
        assert_eq!(full.password.as_deref().map(String::as_str), Some("s3cret-pw"));
    }

    #[tokio::test]
    async fn test_duplicate_detection_excludes_self() {
        let store = InMemoryConnectionStore::new();
        let created = store.create(record("main")).await.unwrap();
        let key = TargetKey::Local {
            engine: EngineType::PostgreSQL,
            host: "localhost",
            port: Some(5432),
            database: Some("app"),
        };

        assert!(store.find_duplicate(key, None).await.unwrap().is_some());
        assert!(store.find_duplicate(key, Some(created.id)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_paginates_newest_first() {
        let store = InMemoryConnectionStore::new();
        for i in 0..5 {
            let mut r = record(&format!("db{}", i));
            r.created_at = Utc::now() + chrono::Duration::seconds(i);
            store.create(r).await.unwrap();
        }

        let first = store.list(1, 2).await.unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.items[0].name, "db4");
        assert!(first.items.iter().all(|r| r.password.is_none()));

        let last = store.list(3, 2).await.unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].name, "db0");
    }

    #[tokio::test]
    async fn test_set_status_missing_record() {
        let store = InMemoryConnectionStore::new();
        let err = store
            .set_status(Uuid::new_v4(), ConnectionStatus::Testing)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Database connection not found");
    }
}
