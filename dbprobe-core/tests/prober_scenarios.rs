//! Connection prober scenarios against scripted adapters.
//!
//! These tests drive the full test pipeline (validation, target building,
//! probe, existence check, classification) without a live engine.

mod common;

use common::{FakeAdapter, FakeFactory};
use dbprobe_core::connection::LOCAL_FIELDS_REQUIRED;
use dbprobe_core::prober::DEFAULT_CREDENTIALS_WARNING;
use dbprobe_core::{
    ConnectionProber, ConnectionSpec, ConnectionStatus, DriverCode, EngineType, ProbeConfig,
};
use std::sync::Arc;
use std::time::Duration;

fn prober_with(adapter: FakeAdapter) -> (ConnectionProber, Arc<FakeAdapter>) {
    let adapter = Arc::new(adapter);
    let prober = ConnectionProber::with_factory(
        ProbeConfig::default(),
        Arc::new(FakeFactory::new(adapter.clone())),
    );
    (prober, adapter)
}

#[tokio::test]
async fn test_default_postgres_credentials_raise_warning() {
    let (prober, _) = prober_with(FakeAdapter::new(EngineType::PostgreSQL).with_databases(&["app"]));
    let spec = ConnectionSpec::local(EngineType::PostgreSQL, "localhost", 5432, "postgres", "")
        .with_database("app");

    let result = prober.test(&spec).await;

    assert!(result.success);
    assert_eq!(result.message, "Connection successful to PostgreSQL database 'app'");
    assert_eq!(result.warning.as_deref(), Some(DEFAULT_CREDENTIALS_WARNING));
    assert!(!result.secure);
    assert_eq!(ConnectionStatus::from_probe(&result), ConnectionStatus::ConnectedWarning);
}

#[tokio::test]
async fn test_host_not_found_round_trip() {
    let (prober, _) = prober_with(
        FakeAdapter::new(EngineType::PostgreSQL)
            .failing_probe(Some(DriverCode::HostNotFound), "getaddrinfo ENOTFOUND db.invalid"),
    );
    let spec = ConnectionSpec::local(EngineType::PostgreSQL, "db.invalid", 5432, "app", "pw");

    let result = prober.test(&spec).await;

    assert!(!result.success);
    assert_eq!(
        result.message,
        "PostgreSQL connection failed: Host not found. Check the hostname or IP address."
    );
    assert_eq!(ConnectionStatus::from_probe(&result), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_missing_column_store_database_fails_after_successful_probe() {
    let (prober, adapter) = prober_with(FakeAdapter::new(EngineType::ClickHouse));
    let spec = ConnectionSpec::local(EngineType::ClickHouse, "db.internal", 8123, "default", "")
        .with_database("metrics");

    let result = prober.test(&spec).await;

    assert!(!result.success);
    assert!(
        result.message.ends_with("Database 'metrics' does not exist"),
        "unexpected message: {}",
        result.message
    );
    // probe plus existence check
    assert_eq!(adapter.calls(), 2);
}

#[tokio::test]
async fn test_missing_relational_database_by_code() {
    let (prober, _) = prober_with(FakeAdapter::new(EngineType::MySQL).failing_probe(
        Some(DriverCode::MySql(1049)),
        "Unknown database 'shop'",
    ));
    let spec = ConnectionSpec::local(EngineType::MySQL, "db", 3306, "app", "pw").with_database("shop");

    let result = prober.test(&spec).await;

    assert_eq!(result.message, "MySQL connection failed: Database 'shop' does not exist.");
}

#[tokio::test]
async fn test_missing_database_named_from_external_url() {
    let (prober, _) = prober_with(FakeAdapter::new(EngineType::PostgreSQL).failing_probe(
        Some(DriverCode::SqlState("3D000".to_string())),
        "database \"shop\" does not exist",
    ));
    let spec = ConnectionSpec::external(EngineType::PostgreSQL, "postgres://u:pw@h:5432/shop");

    let result = prober.test(&spec).await;

    assert!(!result.success);
    assert_eq!(
        result.message,
        "PostgreSQL connection failed: Database 'shop' does not exist."
    );
}

#[tokio::test]
async fn test_missing_postgres_database_defaults_to_username() {
    let (prober, _) = prober_with(FakeAdapter::new(EngineType::PostgreSQL).failing_probe(
        Some(DriverCode::SqlState("3D000".to_string())),
        "database \"app\" does not exist",
    ));
    let spec = ConnectionSpec::local(EngineType::PostgreSQL, "db", 5432, "app", "secret");

    let result = prober.test(&spec).await;

    assert_eq!(
        result.message,
        "PostgreSQL connection failed: Database 'app' does not exist."
    );
}

#[tokio::test]
async fn test_disabled_engine_performs_no_io() {
    let (prober, adapter) = prober_with(FakeAdapter::new(EngineType::PostgreSQL));
    let spec = ConnectionSpec::external(EngineType::MongoDB, "mongodb://u:p@h:27017/db");

    let result = prober.test(&spec).await;

    assert!(!result.success);
    assert_eq!(
        result.message,
        "MongoDB connection failed: MongoDB connections are temporarily disabled."
    );
    assert_eq!(adapter.calls(), 0);
}

#[tokio::test]
async fn test_missing_local_fields_fail_validation_without_io() {
    let (prober, adapter) = prober_with(FakeAdapter::new(EngineType::MySQL));
    let mut spec = ConnectionSpec::local(EngineType::MySQL, "db", 3306, "app", "pw");
    if let dbprobe_core::Endpoint::Local(local) = &mut spec.endpoint {
        local.port = None;
    }

    let result = prober.test(&spec).await;

    assert!(!result.success);
    assert_eq!(result.message, LOCAL_FIELDS_REQUIRED);
    assert_eq!(adapter.calls(), 0);
}

#[tokio::test]
async fn test_failure_message_never_contains_password() {
    let (prober, _) = prober_with(
        FakeAdapter::new(EngineType::PostgreSQL)
            .failing_probe(None, "server rejected startup for secret-pw-42"),
    );
    let spec = ConnectionSpec::local(EngineType::PostgreSQL, "db", 5432, "app", "secret-pw-42");

    let result = prober.test(&spec).await;

    assert!(!result.success);
    assert!(!result.message.contains("secret-pw-42"));
}

#[tokio::test]
async fn test_short_password_is_masked_in_failure_message() {
    let (prober, _) = prober_with(
        FakeAdapter::new(EngineType::MySQL).failing_probe(None, "bad handshake with password 'pw'"),
    );
    let spec = ConnectionSpec::local(EngineType::MySQL, "db", 3306, "app", "pw");

    let result = prober.test(&spec).await;

    assert!(!result.success);
    assert!(!result.message.contains("'pw'"), "{}", result.message);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_probe_times_out() {
    let adapter = Arc::new(FakeAdapter::new(EngineType::PostgreSQL).stalled());
    let prober = ConnectionProber::with_factory(
        ProbeConfig::default().with_probe_timeout(Duration::from_secs(1)),
        Arc::new(FakeFactory::new(adapter)),
    );
    let spec = ConnectionSpec::local(EngineType::PostgreSQL, "db", 5432, "app", "pw");

    let result = prober.test(&spec).await;

    assert_eq!(
        result.message,
        "PostgreSQL connection failed: Connection timed out. Check network connectivity."
    );
}

#[tokio::test]
async fn test_tls_column_store_is_secure_without_warning() {
    let (prober, _) = prober_with(FakeAdapter::new(EngineType::ClickHouse).with_databases(&["default"]));
    let spec = ConnectionSpec::local(EngineType::ClickHouse, "ch", 8443, "default", "pw").with_tls(true);

    let result = prober.test(&spec).await;

    assert!(result.success);
    assert!(result.secure);
    assert!(result.warning.is_none());
    assert_eq!(result.message, "Connection successful to ClickHouse database 'default'");
    assert_eq!(ConnectionStatus::from_probe(&result), ConnectionStatus::Connected);
}

#[tokio::test]
async fn test_relational_without_database_skips_existence_check() {
    let (prober, adapter) = prober_with(FakeAdapter::new(EngineType::MySQL));
    let spec = ConnectionSpec::local(EngineType::MySQL, "db", 3306, "app", "pw");

    let result = prober.test(&spec).await;

    assert!(result.success);
    assert_eq!(result.message, "Connection successful to MySQL database");
    assert_eq!(adapter.calls(), 1);
}

#[tokio::test]
async fn test_empty_password_reaches_adapter_as_absent() {
    let (prober, adapter) = prober_with(FakeAdapter::new(EngineType::PostgreSQL));

    prober
        .test(&ConnectionSpec::local(EngineType::PostgreSQL, "db", 5432, "app", ""))
        .await;
    assert_eq!(adapter.last_password(), None);

    prober
        .test(&ConnectionSpec::local(EngineType::PostgreSQL, "db", 5432, "app", "x"))
        .await;
    assert_eq!(adapter.last_password().as_deref(), Some("x"));
}
