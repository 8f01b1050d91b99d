//! Connection verification and schema introspection for PostgreSQL, MySQL and
//! ClickHouse.
//!
//! The crate answers one question reliably: can this set of connection
//! parameters reach a database right now? Given a [`ConnectionSpec`], the
//! [`ConnectionProber`] opens a transient client, runs a trivial query,
//! confirms the target database exists and returns a [`ProbeResult`] with a
//! normalized, engine-prefixed message. Once a record is connected, the
//! [`SchemaBrowser`] lists its tables and previews a bounded number of rows.
//!
//! # Security Guarantees
//! - Passwords live in `Zeroizing` containers and never appear in `Debug`
//!   output, logs or result messages
//! - Connection strings are masked whenever they leave the crate
//! - All engine operations are read-only; clients are never pooled or reused
//!
//! # Architecture
//! - Adapter trait plus factory for engine selection at runtime
//! - Ordered rule table for failure classification
//! - Storage trait for connection records, with an in-memory implementation

pub mod adapters;
pub mod classifier;
pub mod config;
pub mod connection;
pub mod dsn;
pub mod error;
pub mod logging;
pub mod manager;
pub mod models;
pub mod prober;
pub mod schema;
pub mod security;
pub mod store;

// Re-export commonly used types
pub use adapters::{AdapterFactory, DefaultAdapterFactory, EngineAdapter, EngineResult};
pub use config::ProbeConfig;
pub use connection::{ConnectionSpec, Endpoint, LocalEndpoint};
pub use dsn::{ConnectionTarget, build_target};
pub use error::{
    DISABLED_ENGINE_SENTINEL, DriverCode, EngineError, ProbeError, Result, redact_database_url,
};
pub use manager::{Caller, ConnectionManager, ConnectionRequest, LifecycleOutcome};
pub use models::{ConnectionStatus, EngineType, ProbeResult, Row, Topology};
pub use prober::ConnectionProber;
pub use schema::SchemaBrowser;
pub use security::Credentials;
pub use store::{ConnectionRecord, ConnectionStore, InMemoryConnectionStore, Page, TargetKey};
