//! Minimal Snowflake SQL API v2 client.
//!
//! Submits one statement with positional bindings to
//! `POST /api/v2/statements` and returns the first result partition.
//! Statements that are still running (`202 Accepted`) are polled on their
//! handle a bounded number of times.

use std::collections::BTreeMap;
use std::time::Duration;

use gamewizard_config::BackendConfig;
use gamewizard_core::error::{ProviderError, RetrievalError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A positional bind value.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Text(String),
    Fixed(i64),
}

impl Binding {
    fn to_wire(&self) -> WireBinding {
        match self {
            Binding::Text(value) => WireBinding {
                r#type: "TEXT",
                value: value.clone(),
            },
            Binding::Fixed(value) => WireBinding {
                r#type: "FIXED",
                value: value.to_string(),
            },
        }
    }
}

/// Column names plus string-encoded rows, as the SQL API returns them.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    /// Position of a column, compared case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Value at `row` in column `name`; `None` for NULL, out of range or unknown column.
    pub fn value(&self, row: usize, name: &str) -> Option<&str> {
        let col = self.column_index(name)?;
        self.rows.get(row)?.get(col)?.as_deref()
    }
}

/// Errors from the SQL API transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SqlApiError {
    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    #[error("Statement failed: {message} (status: {status_code})")]
    Statement { status_code: u16, message: String },

    #[error("Statement still running after {0} polls")]
    StillRunning(u32),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<SqlApiError> for RetrievalError {
    fn from(err: SqlApiError) -> Self {
        match err {
            SqlApiError::NotConfigured(m) => RetrievalError::Unavailable(m),
            SqlApiError::Network(m) => RetrievalError::Network(m),
            SqlApiError::Timeout(m) => RetrievalError::Timeout(m),
            SqlApiError::Authentication(m) => RetrievalError::AuthenticationFailed(m),
            SqlApiError::RateLimited(secs) => RetrievalError::RateLimited {
                retry_after_secs: secs,
            },
            SqlApiError::Statement {
                status_code,
                message,
            } => RetrievalError::ApiError {
                status_code,
                message,
            },
            SqlApiError::StillRunning(polls) => {
                RetrievalError::Timeout(format!("search still running after {polls} polls"))
            }
            SqlApiError::Malformed(m) => RetrievalError::MalformedResult(m),
        }
    }
}

impl From<SqlApiError> for ProviderError {
    fn from(err: SqlApiError) -> Self {
        match err {
            SqlApiError::NotConfigured(m) => ProviderError::NotConfigured(m),
            SqlApiError::Network(m) => ProviderError::Network(m),
            SqlApiError::Timeout(m) => ProviderError::Timeout(m),
            SqlApiError::Authentication(m) => ProviderError::AuthenticationFailed(m),
            SqlApiError::RateLimited(secs) => ProviderError::RateLimited {
                retry_after_secs: secs,
            },
            SqlApiError::Statement {
                status_code,
                message,
            } => ProviderError::ApiError {
                status_code,
                message,
            },
            SqlApiError::StillRunning(polls) => {
                ProviderError::Timeout(format!("completion still running after {polls} polls"))
            }
            SqlApiError::Malformed(m) => ProviderError::MalformedResponse(m),
        }
    }
}

/// What one SQL API response means.
#[derive(Debug)]
enum Outcome {
    Done(ResultSet),
    Running(String),
}

/// HTTP client for one Snowflake account.
pub struct SqlApiClient {
    base_url: String,
    token: String,
    token_type: String,
    warehouse: Option<String>,
    database: Option<String>,
    schema: Option<String>,
    role: Option<String>,
    statement_timeout_secs: u64,
    max_poll_attempts: u32,
    poll_interval: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for SqlApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlApiClient")
            .field("base_url", &self.base_url)
            .field("token_type", &self.token_type)
            .field("warehouse", &self.warehouse)
            .finish_non_exhaustive()
    }
}

impl SqlApiClient {
    /// Build a client from the `[backend]` configuration section.
    pub fn from_config(config: &BackendConfig) -> Result<Self, SqlApiError> {
        let base_url = config.base_url().ok_or_else(|| {
            SqlApiError::NotConfigured(
                "set backend.account or GAMEWIZARD_SNOWFLAKE_ACCOUNT".into(),
            )
        })?;
        let token = config.token.clone().ok_or_else(|| {
            SqlApiError::NotConfigured("set backend.token or GAMEWIZARD_SNOWFLAKE_TOKEN".into())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("gamewizard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SqlApiError::Network(e.to_string()))?;

        Ok(Self {
            base_url,
            token,
            token_type: config.token_type.clone(),
            warehouse: config.warehouse.clone(),
            database: config.database.clone(),
            schema: config.schema.clone(),
            role: config.role.clone(),
            statement_timeout_secs: config.statement_timeout_secs,
            max_poll_attempts: config.max_poll_attempts,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run `statement` with positional `bindings` and wait for its result.
    pub async fn execute(
        &self,
        statement: &str,
        bindings: &[Binding],
    ) -> Result<ResultSet, SqlApiError> {
        let url = format!("{}/api/v2/statements", self.base_url);
        let body = self.request_body(statement, bindings);

        debug!(bindings = bindings.len(), "Submitting SQL API statement");

        let response = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(transport_error)?;

        let mut handle = match interpret(status, &text)? {
            Outcome::Done(result) => return Ok(result),
            Outcome::Running(handle) => handle,
        };

        for attempt in 1..=self.max_poll_attempts {
            tokio::time::sleep(self.poll_interval).await;
            debug!(attempt, handle = %handle, "Polling running statement");

            let url = format!("{}/api/v2/statements/{}", self.base_url, handle);
            let response = self
                .authorized(self.client.get(&url))
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status().as_u16();
            let text = response.text().await.map_err(transport_error)?;

            match interpret(status, &text)? {
                Outcome::Done(result) => return Ok(result),
                Outcome::Running(next) => handle = next,
            }
        }

        warn!(handle = %handle, "Statement did not finish in time");
        Err(SqlApiError::StillRunning(self.max_poll_attempts))
    }

    /// Cheap round trip used by health checks.
    pub async fn ping(&self) -> Result<bool, SqlApiError> {
        let result = self.execute("SELECT 1", &[]).await?;
        Ok(!result.rows.is_empty())
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-Snowflake-Authorization-Token-Type", &self.token_type)
            .header("Accept", "application/json")
    }

    fn request_body(&self, statement: &str, bindings: &[Binding]) -> StatementRequest {
        let bindings = bindings
            .iter()
            .enumerate()
            .map(|(i, b)| ((i + 1).to_string(), b.to_wire()))
            .collect();

        StatementRequest {
            statement: statement.to_string(),
            timeout: self.statement_timeout_secs,
            warehouse: self.warehouse.clone(),
            database: self.database.clone(),
            schema: self.schema.clone(),
            role: self.role.clone(),
            bindings,
        }
    }
}

fn transport_error(e: reqwest::Error) -> SqlApiError {
    if e.is_timeout() {
        SqlApiError::Timeout(e.to_string())
    } else {
        SqlApiError::Network(e.to_string())
    }
}

/// Map a status code and body onto a result, a running handle or an error.
fn interpret(status: u16, body: &str) -> Result<Outcome, SqlApiError> {
    match status {
        200 => {
            let parsed: StatementResponse = serde_json::from_str(body)
                .map_err(|e| SqlApiError::Malformed(format!("Failed to parse response: {e}")))?;
            let columns = parsed
                .result_set_meta_data
                .map(|m| m.row_type.into_iter().map(|c| c.name).collect())
                .unwrap_or_default();
            Ok(Outcome::Done(ResultSet {
                columns,
                rows: parsed.data,
            }))
        }
        202 => {
            let parsed: StatementResponse = serde_json::from_str(body)
                .map_err(|e| SqlApiError::Malformed(format!("Failed to parse response: {e}")))?;
            parsed
                .statement_handle
                .map(Outcome::Running)
                .ok_or_else(|| SqlApiError::Malformed("202 response without statementHandle".into()))
        }
        401 | 403 => Err(SqlApiError::Authentication(
            error_message(body).unwrap_or_else(|| "Invalid token or insufficient privileges".into()),
        )),
        408 => Err(SqlApiError::Timeout(
            error_message(body).unwrap_or_else(|| "Statement timed out".into()),
        )),
        429 => Err(SqlApiError::RateLimited(5)),
        _ => {
            let message = error_message(body).unwrap_or_else(|| body.to_string());
            warn!(status, message = %message, "SQL API returned error");
            Err(SqlApiError::Statement {
                status_code: status,
                message,
            })
        }
    }
}

/// Pull `message` out of an error body, if it is JSON.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<StatementResponse>(body)
        .ok()
        .and_then(|r| r.message)
        .filter(|m| !m.is_empty())
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct StatementRequest {
    statement: String,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    bindings: BTreeMap<String, WireBinding>,
}

#[derive(Debug, Serialize)]
struct WireBinding {
    r#type: &'static str,
    value: String,
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "statementHandle")]
    statement_handle: Option<String>,
    #[serde(default, rename = "resultSetMetaData")]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Deserialize)]
struct ResultSetMetaData {
    #[serde(default, rename = "rowType")]
    row_type: Vec<ColumnType>,
}

#[derive(Debug, Deserialize)]
struct ColumnType {
    name: String,
}
