//! sqlx plumbing shared by the PostgreSQL and MySQL adapters.
//!
//! Both adapters open one unpooled connection per operation, run their
//! queries and close it through [`close_quietly`] whether or not the queries
//! succeeded.

use super::EngineResult;
use crate::error::{DriverCode, EngineError};
use std::future::Future;
use std::time::Duration;

/// Opens a connection under the connect budget.
///
/// Expiry is reported as a timed-out driver error.
pub(crate) async fn connect_within<C, F>(budget: Duration, connect: F) -> EngineResult<C>
where
    F: Future<Output = Result<C, sqlx::Error>>,
{
    match tokio::time::timeout(budget, connect).await {
        Ok(result) => result.map_err(map_sqlx_error),
        Err(_) => Err(EngineError::with_code(
            DriverCode::TimedOut,
            format!("connection timed out after {} ms", budget.as_millis()),
        )),
    }
}

/// Closes a transient connection, logging instead of failing.
pub(crate) async fn close_quietly<C: sqlx::Connection>(conn: C) {
    if let Err(e) = conn.close().await {
        tracing::debug!(target: "dbprobe::adapters", error = %e, "transient connection did not close cleanly");
    }
}

/// Converts a sqlx error into an engine error, preserving the driver code.
pub(crate) fn map_sqlx_error(error: sqlx::Error) -> EngineError {
    let code = driver_code(&error);
    let message = error.to_string();
    let engine_error = match code {
        Some(code) => EngineError::with_code(code, message),
        None => EngineError::new(message),
    };
    engine_error.caused_by(error)
}

fn driver_code(error: &sqlx::Error) -> Option<DriverCode> {
    match error {
        sqlx::Error::Database(db_err) => {
            #[cfg(feature = "mysql")]
            if let Some(mysql_err) = db_err.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>() {
                return Some(DriverCode::MySql(mysql_err.number()));
            }
            db_err
                .code()
                .map(|state| DriverCode::SqlState(state.into_owned()))
        }
        sqlx::Error::Io(io_err) => io_error_code(io_err),
        sqlx::Error::PoolTimedOut => Some(DriverCode::TimedOut),
        _ => None,
    }
}

fn io_error_code(io_err: &std::io::Error) -> Option<DriverCode> {
    use std::io::ErrorKind;

    match io_err.kind() {
        ErrorKind::ConnectionRefused => Some(DriverCode::ConnectionRefused),
        ErrorKind::TimedOut => Some(DriverCode::TimedOut),
        _ => {
            let text = io_err.to_string();
            let unresolved = text.contains("failed to lookup address")
                || text.contains("Name or service not known")
                || text.contains("nodename nor servname");
            unresolved.then_some(DriverCode::HostNotFound)
        }
    }
}
