//! ClickHouse adapter over the HTTP interface.
//!
//! Queries are sent as `POST` bodies with `FORMAT JSONEachRow` appended and
//! the response is read as newline-delimited JSON objects. Credentials are
//! taken out of the target URL and sent as basic auth, so the URL handed to
//! the HTTP client (and echoed in its errors) never carries them.
//!
//! Filter values are bound as server-side query parameters
//! (`{name:String}` placeholders with `param_name` arguments).

use super::{EngineAdapter, EngineResult, mismatched_target, quote_identifier};
use crate::dsn::{ColumnStoreTarget, ConnectionTarget, DEFAULT_COLUMN_STORE_DATABASE};
use crate::error::{DriverCode, EngineError};
use crate::models::{EngineType, Row};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;
use zeroize::Zeroizing;

/// ClickHouse engine adapter
#[derive(Debug, Clone)]
pub struct ClickHouseAdapter {
    request_timeout: Duration,
}

/// A target URL split into what the HTTP client needs.
struct HttpEndpoint {
    base: Url,
    username: Option<String>,
    password: Option<Zeroizing<String>>,
    database: String,
}

impl HttpEndpoint {
    fn parse(target: &ColumnStoreTarget) -> EngineResult<Self> {
        let mut base = Url::parse(&target.url).map_err(EngineError::malformed_url)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(EngineError::malformed_url(format!(
                "unsupported scheme '{}'",
                base.scheme()
            )));
        }
        if base.host_str().is_none_or(str::is_empty) {
            return Err(EngineError::malformed_url("missing host"));
        }

        let username = Some(decode(base.username())).filter(|u| !u.is_empty());
        let password = base
            .password()
            .map(decode)
            .filter(|p| !p.is_empty())
            .map(Zeroizing::new);
        let database = target
            .database_in_url()
            .unwrap_or_else(|| DEFAULT_COLUMN_STORE_DATABASE.to_string());

        // Credentials travel as basic auth only.
        let _ = base.set_username("");
        let _ = base.set_password(None);
        base.set_path("/");
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self {
            base,
            username,
            password,
            database,
        })
    }
}

fn decode(component: &str) -> String {
    urlencoding::decode(component)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| component.to_string())
}

impl ClickHouseAdapter {
    /// Creates an adapter whose requests are bounded by `request_timeout`
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }

    fn endpoint(&self, target: &ConnectionTarget) -> EngineResult<HttpEndpoint> {
        match target {
            ConnectionTarget::ColumnStore(t) => HttpEndpoint::parse(t),
            other => Err(mismatched_target(EngineType::ClickHouse, other)),
        }
    }

    /// Runs one query on a transient client and returns its rows.
    ///
    /// `database` selects the session database; `params` are bound as
    /// `param_<name>` arguments.
    async fn query(
        &self,
        endpoint: &HttpEndpoint,
        sql: &str,
        database: Option<&str>,
        params: &[(&str, &str)],
    ) -> EngineResult<Vec<Row>> {
        let client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.request_timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(map_reqwest_error)?;

        let mut query_args: Vec<(String, String)> = Vec::with_capacity(params.len() + 1);
        if let Some(database) = database {
            query_args.push(("database".to_string(), database.to_string()));
        }
        for (name, value) in params {
            query_args.push((format!("param_{}", name), (*value).to_string()));
        }

        let mut request = client
            .post(endpoint.base.clone())
            .query(&query_args)
            .body(format!("{} FORMAT JSONEachRow", sql));
        if let Some(username) = &endpoint.username {
            let password = endpoint.password.as_deref().map(String::as_str);
            request = request.basic_auth(username, password);
        }

        tracing::debug!(
            target: "dbprobe::adapters::clickhouse",
            url = %endpoint.base,
            database = database.unwrap_or(""),
            "sending query"
        );

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            return Err(EngineError::with_code(
                DriverCode::Http(status.as_u16()),
                format!("HTTP {}: {}", status.as_u16(), body.trim()),
            ));
        }

        parse_json_each_row(&body)
    }
}

/// Parses a `JSONEachRow` body: one JSON object per non-empty line.
pub(crate) fn parse_json_each_row(body: &str) -> EngineResult<Vec<Row>> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str::<Row>(line).map_err(|e| {
                EngineError::new(format!("Unexpected ClickHouse response: {}", e)).caused_by(e)
            })
        })
        .collect()
}

/// Converts a reqwest error, preserving connect and timeout causes.
///
/// The URL is dropped from the error first; the message is built from the
/// whole source chain so resolver and socket details stay visible.
fn map_reqwest_error(error: reqwest::Error) -> EngineError {
    let error = error.without_url();
    let mut message = error.to_string();
    let mut code = error.is_timeout().then_some(DriverCode::TimedOut);

    let mut source = std::error::Error::source(&error);
    while let Some(cause) = source {
        let text = cause.to_string();
        if code.is_none()
            && let Some(io_err) = cause.downcast_ref::<std::io::Error>()
        {
            code = match io_err.kind() {
                std::io::ErrorKind::ConnectionRefused => Some(DriverCode::ConnectionRefused),
                std::io::ErrorKind::TimedOut => Some(DriverCode::TimedOut),
                _ => None,
            };
        }
        if code.is_none() && (text.contains("dns error") || text.contains("failed to lookup address")) {
            code = Some(DriverCode::HostNotFound);
        }
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }

    let engine_error = match code {
        Some(code) => EngineError::with_code(code, message),
        None => EngineError::new(message),
    };
    engine_error.caused_by(error)
}

fn name_column(rows: Vec<Row>) -> Vec<String> {
    rows.into_iter()
        .filter_map(|mut row| match row.remove("name") {
            Some(serde_json::Value::String(name)) if !name.is_empty() => Some(name),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl EngineAdapter for ClickHouseAdapter {
    fn engine(&self) -> EngineType {
        EngineType::ClickHouse
    }

    async fn probe(&self, target: &ConnectionTarget) -> EngineResult<()> {
        // No session database: a missing database is reported by the existence check.
        let endpoint = self.endpoint(target)?;
        self.query(&endpoint, "SELECT 1 AS test", None, &[]).await?;
        Ok(())
    }

    async fn check_database_exists(
        &self,
        target: &ConnectionTarget,
        database: &str,
    ) -> EngineResult<bool> {
        let endpoint = self.endpoint(target)?;
        let rows = self
            .query(
                &endpoint,
                "SELECT name FROM system.databases WHERE name = {name:String}",
                None,
                &[("name", database)],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn list_tables(
        &self,
        target: &ConnectionTarget,
        database: Option<&str>,
    ) -> EngineResult<Vec<String>> {
        let endpoint = self.endpoint(target)?;
        let database = database.unwrap_or(endpoint.database.as_str());
        let rows = self
            .query(
                &endpoint,
                "SELECT name FROM system.tables WHERE database = {db:String}",
                Some(database),
                &[("db", database)],
            )
            .await?;
        Ok(name_column(rows))
    }

    async fn preview_rows(
        &self,
        target: &ConnectionTarget,
        table: &str,
        limit: u32,
    ) -> EngineResult<Vec<Row>> {
        let endpoint = self.endpoint(target)?;
        let sql = format!(
            "SELECT * FROM {} LIMIT {}",
            quote_identifier(EngineType::ClickHouse, table),
            limit
        );
        self.query(&endpoint, &sql, Some(&endpoint.database), &[]).await
    }
}
