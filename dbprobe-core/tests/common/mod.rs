//! Scripted adapters for exercising the prober, browser and manager without
//! a live engine.

#![allow(dead_code)]

use async_trait::async_trait;
use dbprobe_core::adapters::{AdapterFactory, DefaultAdapterFactory, EngineAdapter, EngineResult};
use dbprobe_core::dsn::{ConnectionTarget, RelationalSource};
use dbprobe_core::{DriverCode, EngineError, EngineType, Row};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Adapter whose answers are fixed up front.
#[derive(Default)]
pub struct FakeAdapter {
    engine: Option<EngineType>,
    probe_failure: Option<(Option<DriverCode>, String)>,
    query_failure: Option<String>,
    stall: bool,
    databases: Vec<String>,
    tables: Vec<String>,
    rows: Vec<Row>,
    calls: AtomicUsize,
    last_password: Mutex<Option<String>>,
}

impl FakeAdapter {
    pub fn new(engine: EngineType) -> Self {
        Self {
            engine: Some(engine),
            ..Self::default()
        }
    }

    pub fn failing_probe(mut self, code: Option<DriverCode>, message: &str) -> Self {
        self.probe_failure = Some((code, message.to_string()));
        self
    }

    pub fn failing_queries(mut self, message: &str) -> Self {
        self.query_failure = Some(message.to_string());
        self
    }

    /// Probe never completes
    pub fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn with_databases(mut self, names: &[&str]) -> Self {
        self.databases = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_tables(mut self, names: &[&str]) -> Self {
        self.tables = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// `count` rows of `{"id": n}`
    pub fn with_rows(mut self, count: usize) -> Self {
        self.rows = (0..count)
            .map(|n| {
                let mut row = Row::new();
                row.insert("id".to_string(), serde_json::json!(n));
                row
            })
            .collect();
        self
    }

    /// Number of adapter operations invoked so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Password carried by the most recent probed target
    pub fn last_password(&self) -> Option<String> {
        self.last_password.lock().ok().and_then(|p| p.clone())
    }

    fn record_call(&self, target: &ConnectionTarget) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let password = match target {
            ConnectionTarget::Relational(t) => match &t.source {
                RelationalSource::Fields(fields) => fields.password.as_ref().map(|p| p.to_string()),
                RelationalSource::Url(_) => None,
            },
            _ => None,
        };
        if let Ok(mut last) = self.last_password.lock() {
            *last = password;
        }
    }

    fn query_result<T>(&self, value: T) -> EngineResult<T> {
        match &self.query_failure {
            Some(message) => Err(EngineError::new(message.clone())),
            None => Ok(value),
        }
    }
}

#[async_trait]
impl EngineAdapter for FakeAdapter {
    fn engine(&self) -> EngineType {
        self.engine.unwrap_or(EngineType::PostgreSQL)
    }

    async fn probe(&self, target: &ConnectionTarget) -> EngineResult<()> {
        self.record_call(target);
        if self.stall {
            std::future::pending::<()>().await;
        }
        match &self.probe_failure {
            Some((Some(code), message)) => Err(EngineError::with_code(code.clone(), message.clone())),
            Some((None, message)) => Err(EngineError::new(message.clone())),
            None => Ok(()),
        }
    }

    async fn check_database_exists(
        &self,
        target: &ConnectionTarget,
        database: &str,
    ) -> EngineResult<bool> {
        self.record_call(target);
        Ok(self.databases.iter().any(|d| d == database))
    }

    async fn list_tables(
        &self,
        target: &ConnectionTarget,
        _database: Option<&str>,
    ) -> EngineResult<Vec<String>> {
        self.record_call(target);
        self.query_result(self.tables.clone())
    }

    async fn preview_rows(
        &self,
        target: &ConnectionTarget,
        _table: &str,
        _limit: u32,
    ) -> EngineResult<Vec<Row>> {
        self.record_call(target);
        // Ignores the limit so callers' truncation is observable
        self.query_result(self.rows.clone())
    }
}

/// Hands out one fake for every enabled engine; MongoDB keeps its real
/// disabled adapter.
pub struct FakeFactory {
    adapter: Arc<FakeAdapter>,
}

impl FakeFactory {
    pub fn new(adapter: Arc<FakeAdapter>) -> Self {
        Self { adapter }
    }
}

impl AdapterFactory for FakeFactory {
    fn adapter_for(&self, engine: EngineType) -> Arc<dyn EngineAdapter> {
        if engine.is_disabled() {
            return DefaultAdapterFactory::default().adapter_for(engine);
        }
        self.adapter.clone()
    }
}
