//! Relational adapters against a port nothing listens on.

use dbprobe_core::classifier::CONNECTION_REFUSED;
use dbprobe_core::{ConnectionProber, ConnectionSpec, EngineType, ProbeConfig};

async fn probe_closed_port(engine: EngineType) -> String {
    let spec = ConnectionSpec::local(engine, "127.0.0.1", 1, "app", "pw").with_database("app");
    ConnectionProber::new(ProbeConfig::default()).test(&spec).await.message
}

#[cfg(feature = "postgresql")]
#[tokio::test]
async fn test_postgres_refused_connection() {
    assert_eq!(
        probe_closed_port(EngineType::PostgreSQL).await,
        format!("PostgreSQL connection failed: {}", CONNECTION_REFUSED)
    );
}

#[cfg(feature = "mysql")]
#[tokio::test]
async fn test_mysql_refused_connection() {
    assert_eq!(
        probe_closed_port(EngineType::MySQL).await,
        format!("MySQL connection failed: {}", CONNECTION_REFUSED)
    );
}
