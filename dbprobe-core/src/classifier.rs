//! Maps raw engine failures to user-facing messages.
//!
//! Classification is an ordered rule table; the first matching rule wins.
//! Code rules come first, then message-marker rules, then the fallback that
//! returns the driver's message verbatim.

use crate::error::{DISABLED_ENGINE_SENTINEL, DriverCode, EngineError, MALFORMED_COLUMN_STORE_URL};
use crate::models::EngineType;

/// Message for a refused TCP connection
pub const CONNECTION_REFUSED: &str =
    "Connection refused. Check if host and port are correct and server is running.";
/// Message for an unresolvable host
pub const HOST_NOT_FOUND: &str = "Host not found. Check the hostname or IP address.";
/// Message for an expired connect or probe deadline
pub const TIMED_OUT: &str = "Connection timed out. Check network connectivity.";
/// Message for rejected credentials
pub const AUTHENTICATION_FAILED: &str = "Authentication failed: Invalid username or password.";
/// Message for an unusable ClickHouse connection string
pub const INVALID_COLUMN_STORE_FORMAT: &str = "Invalid ClickHouse connection format. For external connections, use full URL format: http[s]://[username:password@]hostname:port[/database]";

const AUTH_MARKERS: &[&str] = &[
    "Authentication failed",
    "password is incorrect",
    "Wrong credentials",
    "password authentication failed",
    "Access denied for user",
    "401",
    "403",
];

const HOST_MARKERS: &[&str] = &["ENOTFOUND", "failed to lookup address", "dns error"];

const TIMEOUT_MARKERS: &[&str] = &["timed out", "timeout"];

const REFUSED_MARKERS: &[&str] = &["ECONNREFUSED", "Connection refused"];

/// What the classifier knows about the attempted connection.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    pub engine: EngineType,
    /// Database the connection targets, used in "does not exist" messages
    pub database: Option<&'a str>,
}

/// What a rule looks at.
#[derive(Debug, Clone, Copy)]
enum Signal {
    Code(fn(&DriverCode) -> bool),
    AnyMarker(&'static [&'static str]),
}

/// What a matching rule produces.
#[derive(Debug, Clone, Copy)]
enum Outcome {
    Fixed(&'static str),
    MissingDatabase,
    DisabledEngine,
    Verbatim,
}

struct Rule {
    signal: Signal,
    outcome: Outcome,
}

const RULES: &[Rule] = &[
    Rule {
        signal: Signal::Code(|c| matches!(c, DriverCode::ConnectionRefused)),
        outcome: Outcome::Fixed(CONNECTION_REFUSED),
    },
    Rule {
        signal: Signal::Code(|c| matches!(c, DriverCode::HostNotFound)),
        outcome: Outcome::Fixed(HOST_NOT_FOUND),
    },
    Rule {
        signal: Signal::Code(|c| matches!(c, DriverCode::TimedOut)),
        outcome: Outcome::Fixed(TIMED_OUT),
    },
    Rule {
        signal: Signal::Code(is_invalid_catalog),
        outcome: Outcome::MissingDatabase,
    },
    Rule {
        signal: Signal::Code(is_invalid_password),
        outcome: Outcome::Fixed(AUTHENTICATION_FAILED),
    },
    Rule {
        signal: Signal::AnyMarker(AUTH_MARKERS),
        outcome: Outcome::Fixed(AUTHENTICATION_FAILED),
    },
    Rule {
        signal: Signal::AnyMarker(HOST_MARKERS),
        outcome: Outcome::Fixed(HOST_NOT_FOUND),
    },
    Rule {
        signal: Signal::AnyMarker(TIMEOUT_MARKERS),
        outcome: Outcome::Fixed(TIMED_OUT),
    },
    Rule {
        signal: Signal::AnyMarker(&[DISABLED_ENGINE_SENTINEL]),
        outcome: Outcome::DisabledEngine,
    },
    Rule {
        signal: Signal::AnyMarker(&[MALFORMED_COLUMN_STORE_URL]),
        outcome: Outcome::Fixed(INVALID_COLUMN_STORE_FORMAT),
    },
    Rule {
        signal: Signal::AnyMarker(&["does not exist"]),
        outcome: Outcome::Verbatim,
    },
    Rule {
        signal: Signal::AnyMarker(REFUSED_MARKERS),
        outcome: Outcome::Fixed(CONNECTION_REFUSED),
    },
];

fn is_invalid_catalog(code: &DriverCode) -> bool {
    match code {
        DriverCode::SqlState(state) => state == "3D000",
        DriverCode::MySql(number) => *number == 1049,
        _ => false,
    }
}

fn is_invalid_password(code: &DriverCode) -> bool {
    match code {
        DriverCode::SqlState(state) => state == "28P01",
        DriverCode::MySql(number) => *number == 1045,
        _ => false,
    }
}

impl Signal {
    fn matches(self, error: &EngineError) -> bool {
        match self {
            Signal::Code(predicate) => error.code().is_some_and(predicate),
            Signal::AnyMarker(markers) => markers.iter().any(|m| error.message().contains(m)),
        }
    }
}

/// Returns the user-facing message for a failed probe.
///
/// # Example
///
/// ```rust
/// use dbprobe_core::classifier::{ClassifyContext, classify};
/// use dbprobe_core::error::{DriverCode, EngineError};
/// use dbprobe_core::EngineType;
///
/// let raw = EngineError::with_code(DriverCode::SqlState("3D000".into()), "database \"app\" does not exist");
/// let ctx = ClassifyContext { engine: EngineType::PostgreSQL, database: Some("app") };
/// assert_eq!(classify(&raw, &ctx), "Database 'app' does not exist.");
/// ```
pub fn classify(error: &EngineError, ctx: &ClassifyContext<'_>) -> String {
    let outcome = RULES
        .iter()
        .find(|rule| rule.signal.matches(error))
        .map_or(Outcome::Verbatim, |rule| rule.outcome);

    match outcome {
        Outcome::Fixed(message) => message.to_string(),
        Outcome::MissingDatabase => {
            format!("Database '{}' does not exist.", ctx.database.unwrap_or(""))
        }
        Outcome::DisabledEngine => format!("{} {}.", ctx.engine, DISABLED_ENGINE_SENTINEL),
        Outcome::Verbatim => error.message().to_string(),
    }
}

/// Prefixes a classified message with the engine name.
pub fn failure_message(engine: EngineType, message: &str) -> String {
    format!("{} connection failed: {}", engine, message)
}
