//! Neo4j Aura probe client.
//!
//! Runs the single verification query against an Aura instance through its
//! TLS-only Query API, authenticating with the identity token as a bearer
//! credential. Connections are pooled inside the `reqwest` client and
//! released when it drops, on success and failure alike.

use crate::error::DbError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Domain all Aura instances live under.
const AURA_DOMAIN: &str = "databases.neo4j.io";

/// The fixed verification query; its single field is what gets printed.
const PROBE_QUERY: &str = r#"RETURN "SSO connected!" AS message"#;

/// HTTP request timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// HTTP connection timeout.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for one Aura instance.
pub struct AuraClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl AuraClient {
    /// Create a client for the instance identified by `db_id`.
    pub fn new(db_id: &str) -> Result<Self> {
        Self::from_url(format!("https://{db_id}.{AURA_DOMAIN}"))
    }

    /// Create a client against an explicit base URL. Tests use this to point
    /// at a stub server.
    pub fn from_url(base_url: String) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    /// Run the verification query and return its `message` field.
    pub async fn probe(&self, id_token: &str) -> Result<String, DbError> {
        let url = format!("{}/db/neo4j/query/v2", self.base_url);

        tracing::debug!("Running probe query against {}", url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(id_token)
            .json(&QueryRequest {
                statement: PROBE_QUERY,
            })
            .send()
            .await
            .map_err(|e| DbError::RequestFailed(e.to_string()))?;

        match response.status().as_u16() {
            200 | 202 => {
                let query_response: QueryResponse = response
                    .json()
                    .await
                    .map_err(|e| DbError::ParseFailed(e.to_string()))?;
                query_response.message()
            }
            401 | 403 => Err(DbError::Unauthorized),
            status => Err(DbError::RequestFailed(format!("HTTP {}", status))),
        }
    }
}

/// Query API request body.
#[derive(Debug, Serialize)]
struct QueryRequest {
    statement: &'static str,
}

/// Query API response envelope.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    data: Option<QueryData>,
    #[serde(default)]
    errors: Vec<QueryError>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    fields: Vec<String>,
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct QueryError {
    message: String,
}

impl QueryResponse {
    /// Extract the `message` column of the first result row.
    fn message(self) -> Result<String, DbError> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(DbError::QueryFailed(error.message));
        }

        let data = self
            .data
            .ok_or_else(|| DbError::ParseFailed("response has no data".to_string()))?;

        let column = data
            .fields
            .iter()
            .position(|f| f == "message")
            .ok_or_else(|| DbError::ParseFailed("no message field in result".to_string()))?;

        let row = data
            .values
            .into_iter()
            .next()
            .ok_or_else(|| DbError::ParseFailed("query returned no rows".to_string()))?;

        row.get(column)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| DbError::ParseFailed("message field is not a string".to_string()))
    }
}
