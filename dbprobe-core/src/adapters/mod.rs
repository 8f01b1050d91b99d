//! Engine adapters behind one capability interface.
//!
//! Each adapter opens a transient client per operation and releases it on
//! every exit path. Adapters never classify errors: they return
//! [`EngineError`] with the driver's code and message intact.
//!
//! # Module Structure
//! - `unavailable`: macro for adapters that fail without I/O (disabled engines,
//!   drivers not compiled in)
//! - `relational`: sqlx plumbing shared by PostgreSQL and MySQL
//! - Engine modules (postgres, mysql, clickhouse)

use crate::dsn::ConnectionTarget;
use crate::error::EngineError;
use crate::models::{EngineType, Row};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[macro_use]
mod unavailable;

#[cfg(any(feature = "postgresql", feature = "mysql"))]
mod relational;

#[cfg(feature = "postgresql")]
pub mod postgres;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "clickhouse")]
pub mod clickhouse;

/// Result type for adapter operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Uniform capability surface over one engine's client library.
///
/// # Resource Guarantees
/// - Every call opens at most one client and closes it before returning
/// - Connects are bounded by the adapter's connect timeout
/// - No pooling and no retries
///
/// # Object Safety
/// Adapters are selected at runtime and held as `Arc<dyn EngineAdapter>`.
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    /// Engine this adapter speaks to
    fn engine(&self) -> EngineType;

    /// Opens a client, authenticates and runs a trivial query.
    async fn probe(&self, target: &ConnectionTarget) -> EngineResult<()>;

    /// Returns whether the named database exists on the server.
    async fn check_database_exists(
        &self,
        target: &ConnectionTarget,
        database: &str,
    ) -> EngineResult<bool>;

    /// Lists table names, in server order.
    ///
    /// `database` narrows the listing where the engine supports it; `None`
    /// means the engine's current or default database.
    async fn list_tables(
        &self,
        target: &ConnectionTarget,
        database: Option<&str>,
    ) -> EngineResult<Vec<String>>;

    /// Returns at most `limit` rows of `table`.
    ///
    /// The table name must already have passed [`validate_table_name`].
    async fn preview_rows(
        &self,
        target: &ConnectionTarget,
        table: &str,
        limit: u32,
    ) -> EngineResult<Vec<Row>>;
}

/// Selects the adapter for an engine.
///
/// Injectable so tests can substitute fake adapters.
pub trait AdapterFactory: Send + Sync {
    /// Adapter for `engine`
    fn adapter_for(&self, engine: EngineType) -> Arc<dyn EngineAdapter>;
}

define_unavailable_adapter!(
    /// Adapter for the switched-off document store.
    MongoAdapter,
    EngineType::MongoDB,
    EngineError::disabled
);

#[cfg(not(feature = "postgresql"))]
define_unavailable_adapter!(
    /// Stand-in when the PostgreSQL driver is not compiled in.
    PostgresUnavailable,
    EngineType::PostgreSQL,
    EngineError::not_compiled
);

#[cfg(not(feature = "mysql"))]
define_unavailable_adapter!(
    /// Stand-in when the MySQL driver is not compiled in.
    MySqlUnavailable,
    EngineType::MySQL,
    EngineError::not_compiled
);

#[cfg(not(feature = "clickhouse"))]
define_unavailable_adapter!(
    /// Stand-in when the ClickHouse client is not compiled in.
    ClickHouseUnavailable,
    EngineType::ClickHouse,
    EngineError::not_compiled
);

/// Factory backed by the real drivers.
#[derive(Debug, Clone)]
pub struct DefaultAdapterFactory {
    connect_timeout: Duration,
}

impl DefaultAdapterFactory {
    /// Creates a factory whose adapters use `connect_timeout`
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for DefaultAdapterFactory {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::config::DEFAULT_CONNECT_TIMEOUT_MS))
    }
}

impl AdapterFactory for DefaultAdapterFactory {
    fn adapter_for(&self, engine: EngineType) -> Arc<dyn EngineAdapter> {
        match engine {
            #[cfg(feature = "postgresql")]
            EngineType::PostgreSQL => Arc::new(postgres::PostgresAdapter::new(self.connect_timeout)),
            #[cfg(not(feature = "postgresql"))]
            EngineType::PostgreSQL => Arc::new(PostgresUnavailable),
            #[cfg(feature = "mysql")]
            EngineType::MySQL => Arc::new(mysql::MySqlAdapter::new(self.connect_timeout)),
            #[cfg(not(feature = "mysql"))]
            EngineType::MySQL => Arc::new(MySqlUnavailable),
            #[cfg(feature = "clickhouse")]
            EngineType::ClickHouse => {
                Arc::new(clickhouse::ClickHouseAdapter::new(self.connect_timeout))
            }
            #[cfg(not(feature = "clickhouse"))]
            EngineType::ClickHouse => Arc::new(ClickHouseUnavailable),
            EngineType::MongoDB => Arc::new(MongoAdapter),
        }
    }
}

/// Message for a table name that fails the shape check
pub const INVALID_TABLE_NAME: &str = "Invalid table name";

/// Shape check on a user-supplied table name.
///
/// Rejects empty names and the literal strings `null` and `undefined`. This is
/// not an injection sanitizer; identifiers are only quoted per engine.
pub fn validate_table_name(table: &str) -> bool {
    !(table.is_empty() || table == "null" || table == "undefined")
}

/// Quotes a table identifier the way each engine expects.
///
/// PostgreSQL uses double quotes, MySQL backticks, and ClickHouse receives the
/// name unquoted.
pub fn quote_identifier(engine: EngineType, table: &str) -> String {
    match engine {
        EngineType::PostgreSQL => format!("\"{}\"", table),
        EngineType::MySQL => format!("`{}`", table),
        EngineType::ClickHouse | EngineType::MongoDB => table.to_string(),
    }
}

/// Error for a target handed to the wrong adapter
pub(crate) fn mismatched_target(engine: EngineType, target: &ConnectionTarget) -> EngineError {
    EngineError::new(format!(
        "{} adapter cannot use a {} connection target",
        engine,
        target.engine()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsn::build_target;
    use crate::{ConnectionSpec, DISABLED_ENGINE_SENTINEL};

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("users"));
        assert!(!validate_table_name(""));
        assert!(!validate_table_name("null"));
        assert!(!validate_table_name("undefined"));
    }

    #[test]
    fn test_quote_identifier_per_engine() {
        assert_eq!(quote_identifier(EngineType::PostgreSQL, "users"), "\"users\"");
        assert_eq!(quote_identifier(EngineType::MySQL, "users"), "`users`");
        assert_eq!(quote_identifier(EngineType::ClickHouse, "events"), "events");
    }

    #[test]
    fn test_factory_selects_adapter_by_engine() {
        let factory = DefaultAdapterFactory::default();
        for engine in EngineType::ALL {
            assert_eq!(factory.adapter_for(engine).engine(), engine);
        }
    }

    #[tokio::test]
    async fn test_mongo_adapter_fails_every_operation() {
        let adapter = MongoAdapter;
        let target = build_target(&ConnectionSpec::external(
            EngineType::MongoDB,
            "mongodb://localhost:27017/app",
        ));

        let probe = adapter.probe(&target).await.unwrap_err();
        assert!(probe.message().contains(DISABLED_ENGINE_SENTINEL));

        let tables = adapter.list_tables(&target, None).await.unwrap_err();
        assert_eq!(tables.message(), "MongoDB connections are temporarily disabled");

        let rows = adapter.preview_rows(&target, "users", 10).await.unwrap_err();
        assert!(rows.message().contains(DISABLED_ENGINE_SENTINEL));

        let exists = adapter.check_database_exists(&target, "app").await.unwrap_err();
        assert!(exists.message().contains(DISABLED_ENGINE_SENTINEL));
    }
}
