//! MySQL adapter over a single unpooled sqlx connection.

use super::relational::{close_quietly, connect_within, map_sqlx_error};
use super::{EngineAdapter, EngineResult, mismatched_target, quote_identifier};
use crate::dsn::{ConnectionTarget, RelationalSource, RelationalTarget};
use crate::error::{EngineError, redact_database_url};
use crate::models::{EngineType, Row};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow, MySqlSslMode};
use sqlx::{Connection, Row as _};
use std::str::FromStr;
use std::time::Duration;

/// MySQL engine adapter
#[derive(Debug, Clone)]
pub struct MySqlAdapter {
    connect_timeout: Duration,
}

impl MySqlAdapter {
    /// Creates an adapter whose connects are bounded by `connect_timeout`
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn connect(&self, target: &ConnectionTarget) -> EngineResult<MySqlConnection> {
        let target = match target {
            ConnectionTarget::Relational(t) if t.engine == EngineType::MySQL => t,
            other => return Err(mismatched_target(EngineType::MySQL, other)),
        };
        let options = connect_options(target)?;
        let endpoint = match &target.source {
            RelationalSource::Fields(f) => format!("{}:{}", f.host, f.port),
            RelationalSource::Url(url) => redact_database_url(url),
        };
        tracing::debug!(
            target: "dbprobe::adapters::mysql",
            endpoint = %endpoint,
            tls = target.tls,
            "opening transient connection"
        );
        connect_within(self.connect_timeout, MySqlConnection::connect_with(&options)).await
    }
}

pub(crate) fn connect_options(target: &RelationalTarget) -> EngineResult<MySqlConnectOptions> {
    let options = match &target.source {
        RelationalSource::Fields(fields) => {
            let mut options = MySqlConnectOptions::new()
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
        RelationalSource::Url(url) => MySqlConnectOptions::from_str(url).map_err(|e| {
            EngineError::new(format!("Invalid MySQL connection string: {}", e))
        })?,
    };
    Ok(match ssl_mode(target) {
        Some(mode) => options.ssl_mode(mode),
        None => options,
    })
}

fn ssl_mode(target: &RelationalTarget) -> Option<MySqlSslMode> {
    match (&target.source, target.tls) {
        (_, true) => Some(MySqlSslMode::Required),
        (RelationalSource::Fields(_), false) => Some(MySqlSslMode::Disabled),
        (RelationalSource::Url(_), false) => None,
    }
}

/// Converts a MySQL row to a JSON object.
fn row_to_json(row: &MySqlRow) -> Row {
    use sqlx::Column;

    let mut map = serde_json::Map::new();
    for column in row.columns() {
        let column_name = column.name();
        map.insert(column_name.to_string(), extract_column_value(row, column_name));
    }
    map
}

/// Extracts a column value as JSON, trying common types in order.
fn extract_column_value(row: &MySqlRow, column_name: &str) -> JsonValue {
    if let Ok(v) = row.try_get::<Option<String>, _>(column_name) {
        return v.map(JsonValue::String).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(column_name) {
        return v
            .map(|n| JsonValue::Number(n.into()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(column_name) {
        return v
            .map(|n| JsonValue::Number(n.into()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(column_name) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(column_name) {
        return v.map(JsonValue::Bool).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(column_name) {
        return v
            .map(|ts| JsonValue::String(ts.to_string()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(column_name) {
        return v
            .map(|d| JsonValue::String(d.to_string()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<JsonValue>, _>(column_name) {
        return v.unwrap_or(JsonValue::Null);
    }

    JsonValue::Null
}

#[async_trait]
impl EngineAdapter for MySqlAdapter {
    fn engine(&self) -> EngineType {
        EngineType::MySQL
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
        let result = sqlx::query("SELECT SCHEMA_NAME FROM INFORMATION_SCHEMA.SCHEMATA WHERE SCHEMA_NAME = ?")
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
        database: Option<&str>,
    ) -> EngineResult<Vec<String>> {
        let query = r#"
            SELECT CAST(TABLE_NAME AS CHAR) AS table_name
            FROM information_schema.tables
            WHERE table_schema = COALESCE(?, DATABASE())
            ORDER BY table_name
        "#;

        let mut conn = self.connect(target).await?;
        let result = sqlx::query_scalar::<_, String>(query)
            .bind(database)
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
        let query = format!(
            "SELECT * FROM {} LIMIT ?",
            quote_identifier(EngineType::MySQL, table)
        );
        tracing::debug!(target: "dbprobe::adapters::mysql", table, limit, "previewing rows");

        let mut conn = self.connect(target).await?;
        let result = sqlx::query(&query)
            .bind(limit)
            .fetch_all(&mut conn)
            .await
            .map(|rows| rows.iter().map(row_to_json).collect())
            .map_err(map_sqlx_error);
        close_quietly(conn).await;
        result
    }
}
