//! BigQuery v2 REST implementation of [`Warehouse`].
//!
//! Queries go through `jobs.query` with named parameters. When the job does
//! not finish within the initial wait, results are polled (and paged) through
//! `jobs.getQueryResults`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::config::WarehouseConfig;
use crate::error::{InsertError, WarehouseError};
use crate::params::{QueryParameter, Statement};
use crate::table::TableRef;
use crate::token::TokenSource;
use crate::{Row, Warehouse};

/// BigQuery REST client.
#[derive(Clone)]
pub struct BigQueryClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    config: WarehouseConfig,
    tokens: TokenSource,
}

impl BigQueryClient {
    pub fn new(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        let tokens = TokenSource::from_config(config.access_token.as_deref());
        Self::with_token_source(config, tokens)
    }

    /// Build a client with an explicit token source.
    pub fn with_token_source(
        config: WarehouseConfig,
        tokens: TokenSource,
    ) -> Result<Self, WarehouseError> {
        if config.project_id.trim().is_empty() {
            return Err(WarehouseError::Config(
                "project_id must be non-empty".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(WarehouseError::Transport)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                config,
                tokens,
            }),
        })
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.inner.config
    }

    fn project_url(&self) -> String {
        format!(
            "{}/projects/{}",
            self.inner.config.api_base_url, self.inner.config.project_id
        )
    }

    async fn run_job(&self, statement: &Statement) -> Result<QueryResponse, WarehouseError> {
        let config = &self.inner.config;
        let body = QueryRequest {
            query: &statement.sql,
            use_legacy_sql: false,
            parameter_mode: "NAMED",
            query_parameters: statement.params.iter().map(rest_parameter).collect(),
            location: &config.location,
            timeout_ms: config.job_wait.as_millis() as u64,
        };

        let url = format!("{}/queries", self.project_url());
        let mut response: QueryResponse = self.send(self.inner.http.post(&url).json(&body)).await?;
        response.check_errors()?;

        // Wait for completion, then drain any remaining result pages.
        let mut rows = response.rows.take().unwrap_or_default();
        while !response.job_complete || response.page_token.is_some() {
            let job = response.job_reference.clone().ok_or_else(|| {
                WarehouseError::Decode("incomplete job without jobReference".to_string())
            })?;
            let page_token = if response.job_complete {
                response.page_token.take()
            } else {
                None
            };

            debug!(job_id = %job.job_id, complete = response.job_complete, "Polling query results");

            let url = format!("{}/queries/{}", self.project_url(), job.job_id);
            let mut query = vec![
                ("timeoutMs", config.job_wait.as_millis().to_string()),
                (
                    "location",
                    job.location.clone().unwrap_or_else(|| config.location.clone()),
                ),
            ];
            if let Some(token) = page_token {
                query.push(("pageToken", token));
            }

            let mut next: QueryResponse =
                self.send(self.inner.http.get(&url).query(&query)).await?;
            next.check_errors()?;
            rows.extend(next.rows.take().unwrap_or_default());
            if next.schema.is_none() {
                next.schema = response.schema.take();
            }
            if next.job_reference.is_none() {
                next.job_reference = Some(job);
            }
            response = next;
        }

        response.rows = Some(rows);
        Ok(response)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, WarehouseError> {
        let token = self.inner.tokens.token(&self.inner.http).await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(WarehouseError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ApiErrorBody>().await {
                Ok(body) => body.error.message,
                Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
            };
            error!(status = status.as_u16(), message = %message, "Warehouse API request failed");
            return Err(WarehouseError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| WarehouseError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Warehouse for BigQueryClient {
    async fn execute_query(&self, statement: &Statement) -> Result<Vec<Row>, WarehouseError> {
        let response = self.run_job(statement).await?;
        response.into_rows()
    }

    async fn execute_statement(&self, statement: &Statement) -> Result<u64, WarehouseError> {
        let response = self.run_job(statement).await?;
        match response.num_dml_affected_rows.as_deref() {
            Some(count) => count
                .parse()
                .map_err(|_| WarehouseError::Decode(format!("invalid numDmlAffectedRows: {count}"))),
            None => Ok(0),
        }
    }

    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: Vec<Row>,
    ) -> Result<Vec<InsertError>, WarehouseError> {
        let url = format!(
            "{}/projects/{}/datasets/{}/tables/{}/insertAll",
            self.inner.config.api_base_url, table.project_id, table.dataset_id, table.table_id
        );
        let body = json!({
            "skipInvalidRows": false,
            "ignoreUnknownValues": false,
            "rows": rows.into_iter().map(|row| json!({ "json": row })).collect::<Vec<_>>(),
        });

        let response: InsertAllResponse = self.send(self.inner.http.post(&url).json(&body)).await?;

        let errors = response
            .insert_errors
            .unwrap_or_default()
            .into_iter()
            .flat_map(|entry| {
                entry.errors.into_iter().map(move |e| InsertError {
                    index: entry.index,
                    reason: e.reason.unwrap_or_default(),
                    message: e.message.unwrap_or_default(),
                })
            })
            .collect();

        Ok(errors)
    }
}

// =============================================================================
// REST wire types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    parameter_mode: &'static str,
    query_parameters: Vec<Value>,
    location: &'a str,
    timeout_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    job_reference: Option<JobReference>,
    schema: Option<TableSchema>,
    rows: Option<Vec<TableRow>>,
    page_token: Option<String>,
    num_dml_affected_rows: Option<String>,
    errors: Option<Vec<ErrorProto>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
struct FieldSchema {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    reason: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    insert_errors: Option<Vec<InsertErrorEntry>>,
}

#[derive(Debug, Deserialize)]
struct InsertErrorEntry {
    index: usize,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

impl QueryResponse {
    fn check_errors(&self) -> Result<(), WarehouseError> {
        // `errors` may carry warnings on jobs that still produced a result.
        let Some(errors) = self.errors.as_ref().filter(|e| !e.is_empty()) else {
            return Ok(());
        };
        if self.job_complete && (self.schema.is_some() || self.num_dml_affected_rows.is_some()) {
            return Ok(());
        }
        let message = errors
            .iter()
            .filter_map(|e| e.message.as_deref())
            .collect::<Vec<_>>()
            .join("; ");
        Err(WarehouseError::Job(message))
    }

    fn into_rows(self) -> Result<Vec<Row>, WarehouseError> {
        let rows = self.rows.unwrap_or_default();
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let schema = self
            .schema
            .ok_or_else(|| WarehouseError::Decode("rows returned without schema".to_string()))?;

        rows.into_iter()
            .map(|row| {
                if row.f.len() != schema.fields.len() {
                    return Err(WarehouseError::Decode(format!(
                        "row has {} cells but schema has {} fields",
                        row.f.len(),
                        schema.fields.len()
                    )));
                }
                Ok(schema
                    .fields
                    .iter()
                    .zip(row.f)
                    .map(|(field, cell)| (field.name.clone(), normalize_cell(&field.field_type, cell.v)))
                    .collect())
            })
            .collect()
    }
}

fn rest_parameter(param: &QueryParameter) -> Value {
    let value = match param.value.wire_value() {
        Some(v) => json!({ "value": v }),
        None => json!({}),
    };
    json!({
        "name": param.name,
        "parameterType": { "type": param.value.type_name() },
        "parameterValue": value,
    })
}

/// Convert BigQuery's string-encoded scalar cells into natural JSON values.
fn normalize_cell(field_type: &str, value: Value) -> Value {
    let Value::String(raw) = value else {
        return value;
    };

    match field_type {
        "INTEGER" | "INT64" => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::String(raw)),
        "FLOAT" | "FLOAT64" => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::String(raw)),
        "BOOLEAN" | "BOOL" => match raw.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw),
        },
        "TIMESTAMP" => raw
            .parse::<f64>()
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp_micros((secs * 1_000_000.0).round() as i64))
            .map(|ts| Value::String(ts.to_rfc3339_opts(SecondsFormat::Micros, true)))
            .unwrap_or(Value::String(raw)),
        _ => Value::String(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_rest_parameter_encoding() {
        let param = QueryParameter::string("status", "Active");
        assert_eq!(
            rest_parameter(&param),
            json!({
                "name": "status",
                "parameterType": { "type": "STRING" },
                "parameterValue": { "value": "Active" }
            })
        );
    }

    #[test]
    fn test_null_parameter_has_no_value() {
        let param = QueryParameter::nullable_string("tier", None);
        assert_eq!(rest_parameter(&param)["parameterValue"], json!({}));
    }

    #[rstest]
    #[case("INTEGER", json!("12"), json!(12))]
    #[case("INT64", json!("7"), json!(7))]
    #[case("BOOLEAN", json!("true"), json!(true))]
    #[case("STRING", json!("AB,ON"), json!("AB,ON"))]
    #[case("TIMESTAMP", json!("1.7040672E9"), json!("2024-01-01T00:00:00.000000Z"))]
    #[case("STRING", Value::Null, Value::Null)]
    fn test_normalize_cell(#[case] field_type: &str, #[case] raw: Value, #[case] expected: Value) {
        assert_eq!(normalize_cell(field_type, raw), expected);
    }

    #[test]
    fn test_rows_are_keyed_by_schema() {
        let response: QueryResponse = serde_json::from_value(json!({
            "jobComplete": true,
            "schema": { "fields": [
                { "name": "id", "type": "STRING" },
                { "name": "total_partnerships", "type": "INTEGER" }
            ]},
            "rows": [ { "f": [ { "v": "LL" }, { "v": "3" } ] } ]
        }))
        .unwrap();

        let rows = response.into_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!("LL"));
        assert_eq!(rows[0]["total_partnerships"], json!(3));
    }

    #[test]
    fn test_job_errors_are_surfaced() {
        let response: QueryResponse = serde_json::from_value(json!({
            "jobComplete": true,
            "errors": [ { "reason": "invalidQuery", "message": "Unrecognized name: nme" } ]
        }))
        .unwrap();

        let err = response.check_errors().unwrap_err();
        assert!(matches!(err, WarehouseError::Job(msg) if msg.contains("Unrecognized name")));
    }

    #[test]
    fn test_new_rejects_empty_project() {
        let result = BigQueryClient::new(WarehouseConfig::default());
        assert!(matches!(result, Err(WarehouseError::Config(_))));
    }
}
