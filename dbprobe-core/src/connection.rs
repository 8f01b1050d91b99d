//! Per-call connection parameters.
//!
//! A [`ConnectionSpec`] is built from user input or from a stored record and
//! handed to the prober. It is never persisted as-is.

use crate::error::{ProbeError, Result, redact_database_url};
use crate::models::{EngineType, Topology};
use crate::security::Credentials;
use zeroize::Zeroizing;

/// Message for incomplete local connection parameters
pub const LOCAL_FIELDS_REQUIRED: &str =
    "Host, port, username, and password are required for local connections";

/// Message for a missing external connection string
pub const CONNECTION_STRING_REQUIRED: &str =
    "Connection string is required for external connections";

/// Individually supplied connection parameters
#[derive(Debug, Clone)]
pub struct LocalEndpoint {
    pub host: String,
    pub port: Option<u16>,
    pub credentials: Credentials,
}

/// Where to connect: individual fields or one opaque string.
#[derive(Clone)]
pub enum Endpoint {
    Local(LocalEndpoint),
    External(Zeroizing<String>),
}

impl Endpoint {
    /// Builds an external endpoint from a connection string
    pub fn external(connection_string: impl Into<String>) -> Self {
        Self::External(Zeroizing::new(connection_string.into()))
    }

    /// Topology this endpoint represents
    pub fn topology(&self) -> Topology {
        match self {
            Endpoint::Local(_) => Topology::Local,
            Endpoint::External(_) => Topology::External,
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Local(local) => f.debug_tuple("Local").field(local).finish(),
            Endpoint::External(s) => f
                .debug_tuple("External")
                .field(&redact_database_url(s))
                .finish(),
        }
    }
}

/// Everything needed to probe one database.
///
/// # Example
///
/// ```rust
/// use dbprobe_core::{ConnectionSpec, EngineType};
///
/// let spec = ConnectionSpec::local(EngineType::PostgreSQL, "localhost", 5432, "postgres", "")
///     .with_database("app");
/// assert!(spec.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    pub engine: EngineType,
    pub endpoint: Endpoint,
    pub database: Option<String>,
    pub tls: bool,
}

impl ConnectionSpec {
    /// Local topology with all four required fields
    pub fn local(
        engine: EngineType,
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            endpoint: Endpoint::Local(LocalEndpoint {
                host: host.into(),
                port: Some(port),
                credentials: Credentials::new(username, Some(password.into())),
            }),
            database: None,
            tls: false,
        }
    }

    /// External topology from an opaque connection string
    pub fn external(engine: EngineType, connection_string: impl Into<String>) -> Self {
        Self {
            engine,
            endpoint: Endpoint::external(connection_string),
            database: None,
            tls: false,
        }
    }

    /// Sets the database name; empty names are treated as absent
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        let database = database.into();
        self.database = (!database.is_empty()).then_some(database);
        self
    }

    /// Requests TLS
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Topology of the endpoint
    pub fn topology(&self) -> Topology {
        self.endpoint.topology()
    }

    /// Local parameters, if this is a local spec
    pub fn local_endpoint(&self) -> Option<&LocalEndpoint> {
        match &self.endpoint {
            Endpoint::Local(local) => Some(local),
            Endpoint::External(_) => None,
        }
    }

    /// The secret that must never reach a response: the local password, or
    /// the password embedded in an external URL.
    pub fn secret(&self) -> Option<String> {
        match &self.endpoint {
            Endpoint::Local(local) => local.credentials.password().map(str::to_string),
            Endpoint::External(s) => url::Url::parse(s)
                .ok()
                .and_then(|u| u.password().map(str::to_string))
                .map(|p| {
                    urlencoding::decode(&p)
                        .map(|d| d.into_owned())
                        .unwrap_or(p)
                }),
        }
    }

    /// Checks the topology fields are complete. No I/O.
    ///
    /// # Errors
    /// Returns [`ProbeError::Validation`] with the user-facing message.
    pub fn validate(&self) -> Result<()> {
        match &self.endpoint {
            Endpoint::Local(local) => {
                let complete = !local.host.trim().is_empty()
                    && local.port.is_some_and(|p| p != 0)
                    && local.credentials.username().is_some()
                    && local.credentials.has_password();
                if complete {
                    Ok(())
                } else {
                    Err(ProbeError::validation(LOCAL_FIELDS_REQUIRED))
                }
            }
            Endpoint::External(s) => {
                if s.trim().is_empty() {
                    Err(ProbeError::validation(CONNECTION_STRING_REQUIRED))
                } else {
                    Ok(())
                }
            }
        }
    }
}
