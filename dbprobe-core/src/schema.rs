//! Table listing and row previews for connected records.
//!
//! Both operations refuse to touch the network unless the record is in a
//! connected state, and both reopen a transient client through the same
//! adapters the prober uses.

use crate::adapters::{INVALID_TABLE_NAME, validate_table_name};
use crate::dsn::build_target;
use crate::error::{ProbeError, Result};
use crate::models::Row;
use crate::prober::ConnectionProber;
use crate::store::ConnectionRecord;

/// Context for a failed table listing
pub const SCHEMA_FETCH_FAILED: &str = "Failed to fetch database schema";
/// Context for a failed row preview
pub const TABLE_DATA_FETCH_FAILED: &str = "Failed to fetch table data";

/// Browses tables and rows of connected records.
#[derive(Debug, Clone)]
pub struct SchemaBrowser {
    prober: ConnectionProber,
}

impl SchemaBrowser {
    /// Creates a browser sharing the prober's adapters and limits
    pub fn new(prober: ConnectionProber) -> Self {
        Self { prober }
    }

    /// Lists tables of a connected record.
    ///
    /// # Errors
    /// - `DisabledEngine` for switched-off engines
    /// - `NotConnected` unless the record is connected
    /// - `Query` when the engine rejects the listing
    pub async fn list_tables(&self, record: &ConnectionRecord) -> Result<Vec<String>> {
        ensure_browsable(record, "view schema")?;

        let spec = record.to_spec();
        let target = build_target(&spec);
        let adapter = self.prober.adapter_for(record.engine);

        let tables = adapter
            .list_tables(&target, spec.database.as_deref())
            .await
            .map_err(|e| ProbeError::query_failed(SCHEMA_FETCH_FAILED, e))?;

        tracing::debug!(
            target: "dbprobe::schema",
            engine = %record.engine,
            count = tables.len(),
            "listed tables"
        );
        Ok(tables)
    }

    /// Returns up to `limit` rows of `table`, never more than the row cap.
    ///
    /// # Errors
    /// - `DisabledEngine` for switched-off engines
    /// - `NotConnected` unless the record is connected
    /// - `Validation` for an empty, `null` or `undefined` table name
    /// - `Query` when the engine rejects the query
    pub async fn preview_rows(
        &self,
        record: &ConnectionRecord,
        table: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Row>> {
        ensure_browsable(record, "view data")?;
        if !validate_table_name(table) {
            return Err(ProbeError::validation(INVALID_TABLE_NAME));
        }

        let limit = self.prober.config().preview_limit(limit);
        let spec = record.to_spec();
        let target = build_target(&spec);
        let adapter = self.prober.adapter_for(record.engine);

        let mut rows = adapter
            .preview_rows(&target, table, limit)
            .await
            .map_err(|e| ProbeError::query_failed(TABLE_DATA_FETCH_FAILED, e))?;
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

/// Disabled engines are rejected before the connection state is considered.
fn ensure_browsable(record: &ConnectionRecord, action: &str) -> Result<()> {
    if record.engine.is_disabled() {
        return Err(ProbeError::DisabledEngine {
            engine: record.engine,
        });
    }
    if !record.status.is_connected() {
        return Err(ProbeError::not_connected(action));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConnectionStatus, EngineType, Topology};
    use chrono::Utc;
    use uuid::Uuid;

    fn record(engine: EngineType, status: ConnectionStatus) -> ConnectionRecord {
        ConnectionRecord {
            id: Uuid::new_v4(),
            name: "r".to_string(),
            engine,
            topology: Topology::External,
            host: None,
            port: None,
            username: None,
            password: None,
            database: None,
            connection_string: Some("mongodb://h/db".to_string()),
            tls: false,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_disabled_engine_checked_before_status() {
        let err = ensure_browsable(
            &record(EngineType::MongoDB, ConnectionStatus::Disconnected),
            "view data",
        )
        .unwrap_err();
        assert!(matches!(err, ProbeError::DisabledEngine { .. }));
    }

    #[test]
    fn test_warning_status_is_browsable() {
        assert!(
            ensure_browsable(
                &record(EngineType::PostgreSQL, ConnectionStatus::ConnectedWarning),
                "view schema"
            )
            .is_ok()
        );
        let err = ensure_browsable(
            &record(EngineType::PostgreSQL, ConnectionStatus::Testing),
            "view schema",
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Database is not connected. Please connect first to view schema."
        );
    }
}
