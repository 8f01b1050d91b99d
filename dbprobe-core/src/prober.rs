//! Connection prober.
//!
//! [`ConnectionProber::test`] validates a spec, builds its target, probes it,
//! confirms the database exists and folds everything into one
//! [`ProbeResult`]. It never returns an error: failures are results with
//! `success == false` and a classified, engine-prefixed message.
//!
//! # Security
//! - Messages pass through a final scrub so the probed password never
//!   appears in a result, even when a driver echoes it
//! - Targets are logged only in redacted form

use crate::adapters::{AdapterFactory, DefaultAdapterFactory, EngineAdapter};
use crate::classifier::{ClassifyContext, classify, failure_message};
use crate::config::ProbeConfig;
use crate::connection::ConnectionSpec;
use crate::dsn::{ConnectionTarget, DEFAULT_COLUMN_STORE_DATABASE, build_target};
use crate::error::{EngineError, redact_database_url};
use crate::models::{EngineType, ProbeResult, Topology};
use crate::security::scrub_secret;
use std::sync::Arc;

/// Advisory raised for the stock local PostgreSQL superuser
pub const DEFAULT_CREDENTIALS_WARNING: &str =
    "Warning: Using default PostgreSQL credentials. Consider changing for security.";

/// Verifies connectivity for any supported engine.
#[derive(Clone)]
pub struct ConnectionProber {
    config: ProbeConfig,
    factory: Arc<dyn AdapterFactory>,
}

impl std::fmt::Debug for ConnectionProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProber")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for ConnectionProber {
    fn default() -> Self {
        Self::new(ProbeConfig::default())
    }
}

impl ConnectionProber {
    /// Creates a prober backed by the real engine drivers
    pub fn new(config: ProbeConfig) -> Self {
        let factory = Arc::new(DefaultAdapterFactory::new(config.connect_timeout()));
        Self { config, factory }
    }

    /// Creates a prober with a custom adapter factory
    pub fn with_factory(config: ProbeConfig, factory: Arc<dyn AdapterFactory>) -> Self {
        Self { config, factory }
    }

    /// Configuration in use
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Adapter for an engine, from the configured factory
    pub fn adapter_for(&self, engine: EngineType) -> Arc<dyn EngineAdapter> {
        self.factory.adapter_for(engine)
    }

    /// Tests a connection and returns a normalized result.
    ///
    /// The whole call is bounded by the configured probe timeout; expiry is
    /// reported as a timed-out connection.
    pub async fn test(&self, spec: &ConnectionSpec) -> ProbeResult {
        let secret = spec.secret();

        if let Err(e) = spec.validate() {
            return ProbeResult::failed(e.to_string());
        }

        let target = build_target(spec);
        let deadline = self.config.probe_timeout();
        let outcome = match tokio::time::timeout(deadline, self.run(spec, &target)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Failure {
                error: EngineError::timed_out(deadline),
                database: reported_database(spec, &target),
            }),
        };

        let result = match outcome {
            Ok(result) => result,
            Err(failure) => {
                let ctx = ClassifyContext {
                    engine: spec.engine,
                    database: failure.database.as_deref(),
                };
                let message = classify(&failure.error, &ctx);
                tracing::info!(
                    target: "dbprobe::prober",
                    engine = %spec.engine,
                    raw = %scrub_secret(failure.error.message(), secret.as_deref()),
                    "connection test failed"
                );
                ProbeResult::failed(failure_message(spec.engine, &message))
            }
        };

        scrub_result(result, spec, secret.as_deref())
    }

    async fn run(&self, spec: &ConnectionSpec, target: &ConnectionTarget) -> Result<ProbeResult, Failure> {
        let adapter = self.factory.adapter_for(spec.engine);
        tracing::debug!(
            target: "dbprobe::prober",
            engine = %spec.engine,
            topology = %spec.topology(),
            tls = spec.tls,
            "probing"
        );

        let fail = |error: EngineError, database: Option<String>| Failure { error, database };

        adapter
            .probe(target)
            .await
            .map_err(|e| fail(e, reported_database(spec, target)))?;

        let database = effective_database(spec, target);
        if let Some(name) = &database {
            let exists = adapter
                .check_database_exists(target, name)
                .await
                .map_err(|e| fail(e, database.clone()))?;
            if !exists {
                return Err(fail(EngineError::missing_database(name), database.clone()));
            }
        }

        let secure = is_secure(spec, target);
        let warning = default_credentials_warning(spec).then(|| DEFAULT_CREDENTIALS_WARNING.to_string());
        let message = match &database {
            Some(name) => format!("Connection successful to {} database '{}'", spec.engine, name),
            None => format!("Connection successful to {} database", spec.engine),
        };

        tracing::info!(
            target: "dbprobe::prober",
            engine = %spec.engine,
            secure,
            warned = warning.is_some(),
            "connection test succeeded"
        );
        Ok(ProbeResult::succeeded(message, warning, secure))
    }
}

/// A probe failure plus the database name used in its message.
struct Failure {
    error: EngineError,
    database: Option<String>,
}

/// Database whose existence is confirmed after the probe.
///
/// ClickHouse always has one: explicit, else from the URL, else `default`.
/// Relational engines use the explicit name or the connection string path,
/// and skip the check when neither is known.
fn effective_database(spec: &ConnectionSpec, target: &ConnectionTarget) -> Option<String> {
    if let Some(database) = &spec.database {
        return Some(database.clone());
    }
    match target {
        ConnectionTarget::ColumnStore(t) => Some(
            t.database_in_url()
                .unwrap_or_else(|| DEFAULT_COLUMN_STORE_DATABASE.to_string()),
        ),
        ConnectionTarget::Relational(t) => t.database(),
        ConnectionTarget::Disabled(_) => None,
    }
}

/// Database named in failure messages.
///
/// A local PostgreSQL login without a database lands in the one named after
/// the user, so that is the name a missing-database error refers to.
fn reported_database(spec: &ConnectionSpec, target: &ConnectionTarget) -> Option<String> {
    effective_database(spec, target).or_else(|| {
        (spec.engine == EngineType::PostgreSQL)
            .then(|| spec.local_endpoint())
            .flatten()
            .and_then(|local| local.credentials.username().map(str::to_string))
    })
}

/// TLS was requested and is actually in use.
///
/// External ClickHouse strings are never upgraded, so they count as secure
/// only when their own scheme is `https`.
fn is_secure(spec: &ConnectionSpec, target: &ConnectionTarget) -> bool {
    if !spec.tls {
        return false;
    }
    match target {
        ConnectionTarget::ColumnStore(t) if t.origin == Topology::External => t.uses_https(),
        _ => true,
    }
}

fn default_credentials_warning(spec: &ConnectionSpec) -> bool {
    spec.engine == EngineType::PostgreSQL
        && spec.local_endpoint().is_some_and(|local| {
            local.host == "localhost"
                && local.port == Some(5432)
                && local.credentials.username() == Some("postgres")
        })
}

/// Removes the password and any raw connection string from result text.
fn scrub_result(mut result: ProbeResult, spec: &ConnectionSpec, secret: Option<&str>) -> ProbeResult {
    result.message = scrub_secret(&result.message, secret);
    if let crate::connection::Endpoint::External(raw) = &spec.endpoint
        && result.message.contains(raw.as_str())
    {
        result.message = result.message.replace(raw.as_str(), &redact_database_url(raw));
    }
    result
}
