//! PostgreSQL adapter over a single unpooled sqlx connection.
//!
//! # Security Features
//! - TLS is required when requested, for fields and connection strings alike
//! - Local targets without TLS connect in plaintext rather than negotiating
//! - Connection strings are redacted before they are logged

use super::relational::{close_quietly, connect_within, map_sqlx_error};
use super::{EngineAdapter, EngineResult, mismatched_target, quote_identifier};
use crate::dsn::{ConnectionTarget, RelationalSource, RelationalTarget};
use crate::error::{EngineError, redact_database_url};
use crate::models::{EngineType, Row};
use async_trait::async_trait;
use sqlx::Connection;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use std::str::FromStr;
use std::time::Duration;

/// PostgreSQL engine adapter
#[derive(Debug, Clone)]
pub struct PostgresAdapter {
    connect_timeout: Duration,
}

impl PostgresAdapter {
    /// Creates an adapter whose connects are bounded by `connect_timeout`
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    fn relational<'a>(&self, target: &'a ConnectionTarget) -> EngineResult<&'a RelationalTarget> {
        match target {
            ConnectionTarget::Relational(t) if t.engine == EngineType::PostgreSQL => Ok(t),
            other => Err(mismatched_target(EngineType::PostgreSQL, other)),
        }
    }

    async fn connect(&self, target: &ConnectionTarget) -> EngineResult<PgConnection> {
        let target = self.relational(target)?;
        let options = connect_options(target)?;
        tracing::debug!(
            target: "dbprobe::adapters::postgres",
            endpoint = %describe(target),
            tls = target.tls,
            "opening transient connection"
        );
        connect_within(self.connect_timeout, PgConnection::connect_with(&options)).await
    }
}

/// Builds connect options from either fields or a connection string.
pub(crate) fn connect_options(target: &RelationalTarget) -> EngineResult<PgConnectOptions> {
    let options = match &target.source {
        RelationalSource::Fields(fields) => {
            let mut options = PgConnectOptions::new_without_pgpass()
                .host(&fields.host)
                .port(fields.port);
            if let Some(username) = &fields.username {
                options = options.username(username);
            }
            if let Some(password) = &fields.password {
                options = options.password(password);
            }
            if let Some(database) = &fields.database {
                options = options.database(database);
            }
            options
        }
        RelationalSource::Url(url) => PgConnectOptions::from_str(url).map_err(|e| {
            EngineError::new(format!("Invalid PostgreSQL connection string: {}", e))
        })?,
    };
    Ok(match ssl_mode(target) {
        Some(mode) => options.ssl_mode(mode),
        None => options,
    })
}

/// TLS mode to force, if any.
///
/// Requested TLS is always required. Without it, local targets connect in
/// plaintext and connection strings keep their own `sslmode`.
fn ssl_mode(target: &RelationalTarget) -> Option<PgSslMode> {
    match (&target.source, target.tls) {
        (_, true) => Some(PgSslMode::Require),
        (RelationalSource::Fields(_), false) => Some(PgSslMode::Disable),
        (RelationalSource::Url(_), false) => None,
    }
}

fn describe(target: &RelationalTarget) -> String {
    match &target.source {
        RelationalSource::Fields(f) => format!("{}:{}", f.host, f.port),
        RelationalSource::Url(url) => redact_database_url(url),
    }
}

#[async_trait]
impl EngineAdapter for PostgresAdapter {
    fn engine(&self) -> EngineType {
        EngineType::PostgreSQL
    }

    async fn probe(&self, target: &ConnectionTarget) -> EngineResult<()> {
        let mut conn = self.connect(target).await?;
        let result = sqlx::query("SELECT 1")
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_sqlx_error);
        close_quietly(conn).await;
        result
    }

    async fn check_database_exists(
        &self,
        target: &ConnectionTarget,
        database: &str,
    ) -> EngineResult<bool> {
        let mut conn = self.connect(target).await?;
        let result = sqlx::query_scalar::<_, i32>("SELECT 1 FROM pg_database WHERE datname = $1")
            .bind(database)
            .fetch_optional(&mut conn)
            .await
            .map(|found| found.is_some())
            .map_err(map_sqlx_error);
        close_quietly(conn).await;
        result
    }

    async fn list_tables(
        &self,
        target: &ConnectionTarget,
        _database: Option<&str>,
    ) -> EngineResult<Vec<String>> {
        // The connection is already scoped to the target database.
        let query = r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_type = 'BASE TABLE'
            ORDER BY table_name
        "#;

        let mut conn = self.connect(target).await?;
        let result = sqlx::query_scalar::<_, String>(query)
            .fetch_all(&mut conn)
            .await
            .map(|names| names.into_iter().filter(|n| !n.is_empty()).collect())
            .map_err(map_sqlx_error);
        close_quietly(conn).await;
        result
    }

    async fn preview_rows(
        &self,
        target: &ConnectionTarget,
        table: &str,
        limit: u32,
    ) -> EngineResult<Vec<Row>> {
        // row_to_json keeps every column type serializable without per-type decoding.
        let query = format!(
            "SELECT row_to_json(t.*) AS row_data FROM {} t LIMIT $1",
            quote_identifier(EngineType::PostgreSQL, table)
        );
        tracing::debug!(target: "dbprobe::adapters::postgres", table, limit, "previewing rows");

        let mut conn = self.connect(target).await?;
        let result = sqlx::query_scalar::<_, serde_json::Value>(&query)
            .bind(i64::from(limit))
            .fetch_all(&mut conn)
            .await
            .map(|rows| {
                rows.into_iter()
                    .filter_map(|value| match value {
                        serde_json::Value::Object(map) => Some(map),
                        _ => None,
                    })
                    .collect()
            })
            .map_err(map_sqlx_error);
        close_quietly(conn).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConnectionSpec;
    use crate::dsn::build_target;

    fn relational_target(spec: &ConnectionSpec) -> RelationalTarget {
        match build_target(spec) {
            ConnectionTarget::Relational(t) => t,
            other => panic!("unexpected target {:?}", other),
        }
    }

    #[test]
    fn test_local_options_use_fields() {
        let spec = ConnectionSpec::local(EngineType::PostgreSQL, "db", 5433, "app", "pw")
            .with_database("orders");
        let options = connect_options(&relational_target(&spec)).unwrap();
        assert_eq!(options.get_host(), "db");
        assert_eq!(options.get_port(), 5433);
    }

    #[test]
    fn test_ssl_mode_follows_tls_flag() {
        let local = ConnectionSpec::local(EngineType::PostgreSQL, "db", 5432, "app", "pw");
        assert!(matches!(
            ssl_mode(&relational_target(&local)),
            Some(PgSslMode::Disable)
        ));
        assert!(matches!(
            ssl_mode(&relational_target(&local.with_tls(true))),
            Some(PgSslMode::Require)
        ));

        let external = ConnectionSpec::external(
            EngineType::PostgreSQL,
            "postgres://u:p@db.example.com/app?sslmode=verify-full",
        );
        assert!(ssl_mode(&relational_target(&external)).is_none());
        assert!(matches!(
            ssl_mode(&relational_target(&external.with_tls(true))),
            Some(PgSslMode::Require)
        ));
    }

    #[test]
    fn test_invalid_url_is_engine_error() {
        let spec = ConnectionSpec::external(EngineType::PostgreSQL, "postgres://[::1");
        assert!(connect_options(&relational_target(&spec)).is_err());
    }

    #[tokio::test]
    async fn test_wrong_target_is_rejected() {
        let adapter = PostgresAdapter::new(Duration::from_millis(100));
        let target = ConnectionTarget::Disabled(EngineType::MongoDB);
        let err = adapter.probe(&target).await.unwrap_err();
        assert!(err.message().contains("cannot use"));
    }
}
