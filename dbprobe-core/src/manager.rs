//! Record lifecycle: add, test, connect, disconnect, update, delete and the
//! read views, driving each record's status from probe outcomes.
//!
//! Every operation takes a [`Caller`]. A revoked caller is rejected before
//! any other work, including lookups.

use crate::adapters::{INVALID_TABLE_NAME, validate_table_name};
use crate::connection::{ConnectionSpec, Endpoint, LocalEndpoint};
use crate::error::{ProbeError, Result};
use crate::models::{ConnectionStatus, EngineType, ProbeResult, Row, Topology};
use crate::prober::ConnectionProber;
use crate::schema::SchemaBrowser;
use crate::security::Credentials;
use crate::store::{ConnectionRecord, ConnectionStore, Page, TargetKey};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use zeroize::Zeroizing;

const TOKEN_REVOKED: &str = "Token revoked. User account no longer exists.";
const RECORD: &str = "Database connection";
const DUPLICATE_NAME: &str = "Database connection with this name already exists";
const DUPLICATE_LOCAL_TARGET: &str = "A connection to this database already exists";
const DUPLICATE_EXTERNAL_TARGET: &str = "This external connection already exists";

/// The authenticated user behind a request.
///
/// Revocation is decided upstream; this layer only honors the flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Identifier used only in logs
    pub user_id: String,
    /// Session revoked upstream
    pub revoked: bool,
}

impl Caller {
    /// An active caller
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            revoked: false,
        }
    }

    /// Marks the caller's session as revoked
    pub fn revoked(mut self) -> Self {
        self.revoked = true;
        self
    }

    fn authorize(&self) -> Result<()> {
        if self.revoked {
            tracing::warn!(target: "dbprobe::manager", user_id = %self.user_id, "rejected revoked caller");
            return Err(ProbeError::Unauthorized {
                message: TOKEN_REVOKED.to_string(),
            });
        }
        Ok(())
    }
}

/// Fields for creating or updating a record.
///
/// Local requests carry host, port, username and password; external requests
/// carry a connection string. On update an omitted password keeps the stored
/// one.
#[derive(Clone, Deserialize)]
pub struct ConnectionRequest {
    pub name: String,
    pub engine: EngineType,
    pub topology: Topology,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub connection_string: Option<String>,
    #[serde(default)]
    pub tls: bool,
}

impl std::fmt::Debug for ConnectionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRequest")
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
                &self
                    .connection_string
                    .as_deref()
                    .map(crate::store::mask_connection_string),
            )
            .field("tls", &self.tls)
            .finish()
    }
}

impl ConnectionRequest {
    /// Request for individually supplied parameters
    pub fn local(
        name: impl Into<String>,
        engine: EngineType,
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            engine,
            topology: Topology::Local,
            host: Some(host.into()),
            port: Some(port),
            username: Some(username.into()),
            password: Some(password.into()),
            database: None,
            connection_string: None,
            tls: false,
        }
    }

    /// Request for an opaque connection string
    pub fn external(
        name: impl Into<String>,
        engine: EngineType,
        connection_string: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            engine,
            topology: Topology::External,
            host: None,
            port: None,
            username: None,
            password: None,
            database: None,
            connection_string: Some(connection_string.into()),
            tls: false,
        }
    }

    /// Sets the database name
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Requests TLS
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Omits the password (update keeps the stored one)
    pub fn without_password(mut self) -> Self {
        self.password = None;
        self
    }

    /// Spec for probing this request as supplied
    pub fn to_spec(&self) -> ConnectionSpec {
        self.spec_with_password(self.password.clone())
    }

    fn spec_with_password(&self, password: Option<String>) -> ConnectionSpec {
        let endpoint = match self.topology {
            Topology::Local => Endpoint::Local(LocalEndpoint {
                host: self.host.clone().unwrap_or_default(),
                port: self.port,
                credentials: Credentials::new(self.username.clone().unwrap_or_default(), password),
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

    fn target_key(&self) -> TargetKey<'_> {
        match self.topology {
            Topology::Local => TargetKey::Local {
                engine: self.engine,
                host: self.host.as_deref().unwrap_or_default(),
                port: self.port,
                database: self.database.as_deref(),
            },
            Topology::External => TargetKey::External {
                connection_string: self.connection_string.as_deref().unwrap_or_default(),
            },
        }
    }
}

/// Result of a lifecycle operation that changed a record's status.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleOutcome {
    /// Warning when one was raised, else the operation's success message
    pub message: String,
    pub status: ConnectionStatus,
    /// The record after the operation, without its password
    pub record: ConnectionRecord,
}

/// Orchestrates record lifecycle over a store and a prober.
#[derive(Clone)]
pub struct ConnectionManager {
    store: Arc<dyn ConnectionStore>,
    prober: ConnectionProber,
    browser: SchemaBrowser,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("prober", &self.prober)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Creates a manager over `store`, probing with `prober`
    pub fn new(store: Arc<dyn ConnectionStore>, prober: ConnectionProber) -> Self {
        let browser = SchemaBrowser::new(prober.clone());
        Self {
            store,
            prober,
            browser,
        }
    }

    /// Registers a new connection after a successful probe.
    ///
    /// Nothing is persisted when the probe fails.
    pub async fn add(&self, caller: &Caller, request: ConnectionRequest) -> Result<LifecycleOutcome> {
        caller.authorize()?;
        reject_disabled(request.engine)?;

        let spec = request.to_spec();
        spec.validate()?;

        if self.store.find_by_name(&request.name).await?.is_some() {
            return Err(ProbeError::conflict(DUPLICATE_NAME));
        }
        self.reject_duplicate_target(&request, None).await?;

        let result = self.prober.test(&spec).await;
        if !result.success {
            return Err(connect_failure(request.engine, result));
        }

        let status = ConnectionStatus::from_probe(&result);
        let now = Utc::now();
        let local = request.topology == Topology::Local;
        let record = ConnectionRecord {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            engine: request.engine,
            topology: request.topology,
            host: if local { request.host.clone() } else { None },
            port: if local { request.port } else { None },
            username: if local { request.username.clone() } else { None },
            password: if local {
                request.password.clone().map(Zeroizing::new)
            } else {
                None
            },
            database: request.database.clone(),
            connection_string: if local {
                None
            } else {
                request.connection_string.clone()
            },
            tls: request.tls,
            status,
            created_at: now,
            updated_at: now,
        };

        let record = self.store.create(record).await?;
        tracing::info!(target: "dbprobe::manager", id = %record.id, engine = %record.engine, %status, "connection added");

        Ok(LifecycleOutcome {
            message: result
                .user_message("Database connection added successfully")
                .to_string(),
            status,
            record,
        })
    }

    /// Re-tests a stored connection and updates its status.
    pub async fn test(&self, caller: &Caller, id: Uuid) -> Result<LifecycleOutcome> {
        self.reprobe(caller, id, ConnectionStatus::Testing, None).await
    }

    /// Connects a stored connection: same as [`test`](Self::test) with a
    /// different transitional status and success message.
    pub async fn connect(&self, caller: &Caller, id: Uuid) -> Result<LifecycleOutcome> {
        self.reprobe(
            caller,
            id,
            ConnectionStatus::Connecting,
            Some("Database connected successfully"),
        )
        .await
    }

    async fn reprobe(
        &self,
        caller: &Caller,
        id: Uuid,
        transitional: ConnectionStatus,
        success_message: Option<&str>,
    ) -> Result<LifecycleOutcome> {
        caller.authorize()?;
        let record = self.require(id, false).await?;
        reject_disabled(record.engine)?;

        self.store.set_status(id, transitional).await?;
        let with_password = self.require(id, true).await?;

        let result = self.prober.test(&with_password.to_spec()).await;
        if !result.success {
            self.store.set_status(id, ConnectionStatus::Disconnected).await?;
            return Err(connect_failure(record.engine, result));
        }

        let status = ConnectionStatus::from_probe(&result);
        self.store.set_status(id, status).await?;
        tracing::info!(target: "dbprobe::manager", %id, %status, "connection re-tested");

        let fallback = success_message.unwrap_or(&result.message);
        Ok(LifecycleOutcome {
            message: result.user_message(fallback).to_string(),
            status,
            record: ConnectionRecord {
                status,
                ..record
            },
        })
    }

    /// Marks a stored connection as disconnected.
    pub async fn disconnect(&self, caller: &Caller, id: Uuid) -> Result<LifecycleOutcome> {
        caller.authorize()?;
        let record = self.require(id, false).await?;

        self.store.set_status(id, ConnectionStatus::Disconnecting).await?;
        self.store.set_status(id, ConnectionStatus::Disconnected).await?;

        Ok(LifecycleOutcome {
            message: "Database disconnected successfully".to_string(),
            status: ConnectionStatus::Disconnected,
            record: ConnectionRecord {
                status: ConnectionStatus::Disconnected,
                ..record
            },
        })
    }

    /// Replaces a record's connection fields after a successful probe.
    ///
    /// Switching to external clears the local fields (password included), and
    /// switching to local clears the connection string.
    pub async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        request: ConnectionRequest,
    ) -> Result<LifecycleOutcome> {
        caller.authorize()?;
        reject_disabled(request.engine)?;
        let existing = self.require(id, true).await?;

        if request.name != existing.name
            && let Some(other) = self.store.find_by_name(&request.name).await?
            && other.id != id
        {
            return Err(ProbeError::conflict(DUPLICATE_NAME));
        }
        self.reject_duplicate_target(&request, Some(id)).await?;

        let password = request
            .password
            .clone()
            .or_else(|| existing.password.as_ref().map(|p| p.to_string()));
        let spec = request.spec_with_password(password);
        spec.validate()?;

        let result = self.prober.test(&spec).await;
        if !result.success {
            return Err(connect_failure(request.engine, result));
        }
        let status = ConnectionStatus::from_probe(&result);

        let mut record = ConnectionRecord {
            name: request.name.clone(),
            engine: request.engine,
            topology: request.topology,
            database: request.database.clone(),
            tls: request.tls,
            status,
            updated_at: Utc::now(),
            ..existing
        };
        match request.topology {
            Topology::Local => {
                record.host = request.host.clone();
                record.port = request.port;
                record.username = request.username.clone();
                if let Some(password) = &request.password {
                    record.password = Some(Zeroizing::new(password.clone()));
                }
                record.connection_string = None;
            }
            Topology::External => {
                record.host = None;
                record.port = None;
                record.username = None;
                record.password = None;
                record.connection_string = request.connection_string.clone();
            }
        }

        let record = self.store.update(record).await?;
        tracing::info!(target: "dbprobe::manager", %id, %status, "connection updated");

        Ok(LifecycleOutcome {
            message: result
                .user_message("Database connection updated successfully")
                .to_string(),
            status,
            record,
        })
    }

    /// Deletes a record.
    pub async fn delete(&self, caller: &Caller, id: Uuid) -> Result<()> {
        caller.authorize()?;
        if !self.store.delete(id).await? {
            return Err(ProbeError::not_found(RECORD));
        }
        tracing::info!(target: "dbprobe::manager", %id, "connection deleted");
        Ok(())
    }

    /// Record for the edit view; the password is never included.
    pub async fn details(&self, caller: &Caller, id: Uuid) -> Result<ConnectionRecord> {
        caller.authorize()?;
        self.require(id, false).await
    }

    /// Lists records, newest first, without passwords.
    pub async fn list(&self, caller: &Caller, page: usize, limit: usize) -> Result<Page<ConnectionRecord>> {
        caller.authorize()?;
        self.store.list(page, limit).await
    }

    /// Lists tables of a connected record.
    pub async fn tables(&self, caller: &Caller, id: Uuid) -> Result<Vec<String>> {
        caller.authorize()?;
        let record = self.require(id, true).await?;
        self.browser.list_tables(&record).await
    }

    /// Previews rows of a table in a connected record.
    pub async fn preview(
        &self,
        caller: &Caller,
        id: Uuid,
        table: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Row>> {
        caller.authorize()?;
        if !validate_table_name(table) {
            return Err(ProbeError::validation(INVALID_TABLE_NAME));
        }
        let record = self.require(id, true).await?;
        self.browser.preview_rows(&record, table, limit).await
    }

    /// Gate a chat front end calls before handing over a question.
    ///
    /// Succeeds only for an existing, enabled, connected record.
    pub async fn ensure_connected(&self, caller: &Caller, id: Uuid) -> Result<ConnectionRecord> {
        caller.authorize()?;
        let record = self.require(id, false).await?;
        reject_disabled(record.engine)?;
        if !record.status.is_connected() {
            return Err(ProbeError::not_connected("ask questions"));
        }
        Ok(record)
    }

    async fn require(&self, id: Uuid, include_password: bool) -> Result<ConnectionRecord> {
        self.store
            .find(id, include_password)
            .await?
            .ok_or_else(|| ProbeError::not_found(RECORD))
    }

    async fn reject_duplicate_target(
        &self,
        request: &ConnectionRequest,
        exclude: Option<Uuid>,
    ) -> Result<()> {
        if self
            .store
            .find_duplicate(request.target_key(), exclude)
            .await?
            .is_some()
        {
            let message = match request.topology {
                Topology::Local => DUPLICATE_LOCAL_TARGET,
                Topology::External => DUPLICATE_EXTERNAL_TARGET,
            };
            return Err(ProbeError::conflict(message));
        }
        Ok(())
    }
}

fn reject_disabled(engine: EngineType) -> Result<()> {
    if engine.is_disabled() {
        return Err(ProbeError::DisabledEngine { engine });
    }
    Ok(())
}

fn connect_failure(engine: EngineType, result: ProbeResult) -> ProbeError {
    ProbeError::Connect {
        engine,
        message: result.message,
    }
}
