//! Connection target construction.
//!
//! [`build_target`] turns a [`ConnectionSpec`] into what an adapter needs to
//! open a client. It is pure: no I/O, and it never fails. Malformed strings
//! are passed through and rejected later by the adapter.

use crate::connection::{ConnectionSpec, Endpoint};
use crate::error::redact_database_url;
use crate::models::{EngineType, Topology};
use regex::Regex;
use std::sync::OnceLock;
use zeroize::Zeroizing;

/// Port used for the ClickHouse HTTP interface when none is given
pub const DEFAULT_COLUMN_STORE_PORT: u16 = 8123;

/// Database used for ClickHouse when none is given
pub const DEFAULT_COLUMN_STORE_DATABASE: &str = "default";

/// Individually supplied relational parameters
#[derive(Clone)]
pub struct RelationalFields {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    /// Absent when the supplied password was empty
    pub password: Option<Zeroizing<String>>,
    pub database: Option<String>,
}

impl std::fmt::Debug for RelationalFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalFields")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .finish()
    }
}

/// How a relational client gets its parameters
#[derive(Clone)]
pub enum RelationalSource {
    Fields(RelationalFields),
    /// Opaque connection string, used verbatim
    Url(Zeroizing<String>),
}

impl std::fmt::Debug for RelationalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationalSource::Fields(fields) => f.debug_tuple("Fields").field(fields).finish(),
            RelationalSource::Url(url) => f
                .debug_tuple("Url")
                .field(&redact_database_url(url))
                .finish(),
        }
    }
}

/// Target for PostgreSQL or MySQL
#[derive(Debug, Clone)]
pub struct RelationalTarget {
    pub engine: EngineType,
    pub source: RelationalSource,
    /// Layered on at connect time for both topologies
    pub tls: bool,
}

impl RelationalTarget {
    /// Database named by the target, from the fields or the URL path
    pub fn database(&self) -> Option<String> {
        match &self.source {
            RelationalSource::Fields(fields) => fields.database.clone(),
            RelationalSource::Url(url) => url::Url::parse(url).ok().and_then(|u| {
                let path = u.path().trim_start_matches('/');
                (!path.is_empty()).then(|| path.to_string())
            }),
        }
    }
}

/// Target for the ClickHouse HTTP interface.
///
/// The URL may embed credentials; use [`ColumnStoreTarget::redacted_url`]
/// for anything that is logged.
#[derive(Clone)]
pub struct ColumnStoreTarget {
    pub url: Zeroizing<String>,
    pub origin: Topology,
}

impl ColumnStoreTarget {
    /// True when the URL scheme is exactly `https`
    pub fn uses_https(&self) -> bool {
        self.url.starts_with("https://")
    }

    /// URL safe for logs
    pub fn redacted_url(&self) -> String {
        redact_database_url(&self.url)
    }

    /// Database named in the URL path, if any
    pub fn database_in_url(&self) -> Option<String> {
        database_from_url(&self.url)
    }
}

impl std::fmt::Debug for ColumnStoreTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnStoreTarget")
            .field("url", &self.redacted_url())
            .field("origin", &self.origin)
            .finish()
    }
}

/// What an adapter connects to
#[derive(Debug, Clone)]
pub enum ConnectionTarget {
    Relational(RelationalTarget),
    ColumnStore(ColumnStoreTarget),
    /// Engine is switched off; adapters fail without I/O
    Disabled(EngineType),
}

impl ConnectionTarget {
    /// Engine this target belongs to
    pub fn engine(&self) -> EngineType {
        match self {
            ConnectionTarget::Relational(t) => t.engine,
            ConnectionTarget::ColumnStore(_) => EngineType::ClickHouse,
            ConnectionTarget::Disabled(engine) => *engine,
        }
    }
}

/// Builds the connection target for a spec.
///
/// # Example
///
/// ```rust
/// use dbprobe_core::dsn::{ConnectionTarget, build_target};
/// use dbprobe_core::{ConnectionSpec, EngineType};
///
/// let spec = ConnectionSpec::local(EngineType::ClickHouse, "db.internal", 8123, "metrics", "")
///     .with_tls(true);
/// match build_target(&spec) {
///     ConnectionTarget::ColumnStore(t) => {
///         assert_eq!(t.url.as_str(), "https://metrics@db.internal:8123/default");
///     }
///     other => panic!("unexpected target {:?}", other),
/// }
/// ```
pub fn build_target(spec: &ConnectionSpec) -> ConnectionTarget {
    match spec.engine {
        EngineType::MongoDB => ConnectionTarget::Disabled(spec.engine),
        EngineType::PostgreSQL | EngineType::MySQL => {
            let source = match &spec.endpoint {
                Endpoint::Local(local) => RelationalSource::Fields(RelationalFields {
                    host: local.host.clone(),
                    port: local.port.unwrap_or_else(|| default_port(spec.engine)),
                    username: local.credentials.username().map(str::to_string),
                    password: local
                        .credentials
                        .connect_password()
                        .map(|p| Zeroizing::new(p.to_string())),
                    database: spec.database.clone(),
                }),
                Endpoint::External(s) => RelationalSource::Url(s.clone()),
            };
            ConnectionTarget::Relational(RelationalTarget {
                engine: spec.engine,
                source,
                tls: spec.tls,
            })
        }
        EngineType::ClickHouse => {
            let url = match &spec.endpoint {
                Endpoint::Local(local) => {
                    let scheme = if spec.tls { "https" } else { "http" };
                    let port = local.port.unwrap_or(DEFAULT_COLUMN_STORE_PORT);
                    let database = spec
                        .database
                        .as_deref()
                        .unwrap_or(DEFAULT_COLUMN_STORE_DATABASE);
                    let userinfo = match (
                        local.credentials.username(),
                        local.credentials.connect_password(),
                    ) {
                        (Some(user), Some(password)) => format!(
                            "{}:{}@",
                            urlencoding::encode(user),
                            urlencoding::encode(password)
                        ),
                        (Some(user), None) => format!("{}@", urlencoding::encode(user)),
                        (None, _) => String::new(),
                    };
                    format!(
                        "{}://{}{}:{}/{}",
                        scheme, userinfo, local.host, port, database
                    )
                }
                Endpoint::External(s) if s.contains("://") => s.to_string(),
                Endpoint::External(s) => format!(
                    "http://{}:{}/{}",
                    s.as_str(),
                    DEFAULT_COLUMN_STORE_PORT,
                    DEFAULT_COLUMN_STORE_DATABASE
                ),
            };
            ConnectionTarget::ColumnStore(ColumnStoreTarget {
                url: Zeroizing::new(url),
                origin: spec.topology(),
            })
        }
    }
}

/// Default wire port per relational engine
pub fn default_port(engine: EngineType) -> u16 {
    match engine {
        EngineType::PostgreSQL => 5432,
        EngineType::MySQL => 3306,
        EngineType::ClickHouse => DEFAULT_COLUMN_STORE_PORT,
        EngineType::MongoDB => 27017,
    }
}

/// Extracts the database segment from a URL-like string.
///
/// Accepts strings the `url` crate would reject,
/// and yields `None` when there is no non-empty path segment.
pub fn database_from_url(url: &str) -> Option<String> {
    static DATABASE_SEGMENT: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = DATABASE_SEGMENT
        .get_or_init(|| Regex::new(r"//([^:]+:[^@]+@)?[^/]+/([^?]+)").ok())
        .as_ref()?;

    pattern
        .captures(url)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
}
