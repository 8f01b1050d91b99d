//! Core value types shared by the prober, the adapters and the record store.

use serde::{Deserialize, Serialize};

/// A single result row, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Supported database engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineType {
    PostgreSQL,
    MySQL,
    ClickHouse,
    /// Document store kept behind a kill-switch; every operation fails fast
    MongoDB,
}

impl EngineType {
    /// All engines, in the order they are presented to users
    pub const ALL: [EngineType; 4] = [
        EngineType::PostgreSQL,
        EngineType::MySQL,
        EngineType::ClickHouse,
        EngineType::MongoDB,
    ];

    /// True for engines spoken to over a relational wire protocol
    pub fn is_relational(self) -> bool {
        matches!(self, EngineType::PostgreSQL | EngineType::MySQL)
    }

    /// True when the engine is switched off
    pub fn is_disabled(self) -> bool {
        matches!(self, EngineType::MongoDB)
    }
}

impl std::fmt::Display for EngineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineType::PostgreSQL => write!(f, "PostgreSQL"),
            EngineType::MySQL => write!(f, "MySQL"),
            EngineType::ClickHouse => write!(f, "ClickHouse"),
            EngineType::MongoDB => write!(f, "MongoDB"),
        }
    }
}

impl std::str::FromStr for EngineType {
    type Err = crate::error::ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(EngineType::PostgreSQL),
            "mysql" => Ok(EngineType::MySQL),
            "clickhouse" | "ch" => Ok(EngineType::ClickHouse),
            "mongodb" | "mongo" => Ok(EngineType::MongoDB),
            _ => Err(crate::error::ProbeError::validation(format!(
                "Unsupported database type: {}",
                s
            ))),
        }
    }
}

/// How connection parameters are supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Host, port, username, password and database supplied individually
    Local,
    /// One opaque connection string
    External,
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topology::Local => write!(f, "local"),
            Topology::External => write!(f, "external"),
        }
    }
}

/// Persisted connection status, driven by probe outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionStatus {
    #[serde(rename = "Disconnected")]
    Disconnected,
    #[serde(rename = "Testing...")]
    Testing,
    #[serde(rename = "Connecting...")]
    Connecting,
    #[serde(rename = "Disconnecting...")]
    Disconnecting,
    #[serde(rename = "Connected")]
    Connected,
    #[serde(rename = "Connected (Warning)")]
    ConnectedWarning,
}

impl ConnectionStatus {
    /// True when schema and data browsing is allowed
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            ConnectionStatus::Connected | ConnectionStatus::ConnectedWarning
        )
    }

    /// Derives the status to persist after a probe.
    ///
    /// A secure connection is plainly `Connected` even when an advisory
    /// warning was raised.
    pub fn from_probe(result: &ProbeResult) -> Self {
        if !result.success {
            ConnectionStatus::Disconnected
        } else if result.secure {
            ConnectionStatus::Connected
        } else if result.warning.is_some() {
            ConnectionStatus::ConnectedWarning
        } else {
            ConnectionStatus::Connected
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Testing => "Testing...",
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Disconnecting => "Disconnecting...",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::ConnectedWarning => "Connected (Warning)",
        };
        f.write_str(label)
    }
}

/// Normalized outcome of a connection probe.
///
/// A failed result never carries a warning, and `message` never contains the
/// probed password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub success: bool,
    pub message: String,
    pub warning: Option<String>,
    /// TLS was requested and actually used
    pub secure: bool,
}

impl ProbeResult {
    /// Successful probe
    pub fn succeeded(message: impl Into<String>, warning: Option<String>, secure: bool) -> Self {
        Self {
            success: true,
            message: message.into(),
            warning,
            secure,
        }
    }

    /// Failed probe
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            warning: None,
            secure: false,
        }
    }

    /// Message to show the user: the advisory if one exists, else `fallback`
    pub fn user_message<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.warning.as_deref().unwrap_or(fallback)
    }
}
