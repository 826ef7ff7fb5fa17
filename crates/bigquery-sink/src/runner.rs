//! Query execution against the BigQuery jobs API.

use async_trait::async_trait;
use gcp_bigquery_client::model::get_query_results_parameters::GetQueryResultsParameters;
use gcp_bigquery_client::model::query_request::QueryRequest;
use gcp_bigquery_client::model::query_response::{QueryResponse, ResultSet};
use gcp_bigquery_client::Client;
use std::sync::Arc;
use std::time::Duration;
use sync_engine::{Result, SyncError};
use tracing::{debug, info};

use crate::config::BigQueryConfig;
use crate::error::classify_bigquery_error;

/// Runs GoogleSQL statements.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Run one statement and return the named fields of every result row as
    /// strings. DDL passes no fields and gets no rows back.
    async fn query(&self, sql: &str, fields: &[&str]) -> Result<Vec<Vec<Option<String>>>>;

    /// Run a DML statement at most once per `request_id`. Sending the same
    /// statement with the same id again, while BigQuery still remembers the
    /// id, returns the first outcome instead of applying it twice.
    async fn execute_once(&self, sql: &str, request_id: &str) -> Result<()>;
}

#[async_trait]
impl<T: QueryRunner + ?Sized> QueryRunner for Arc<T> {
    async fn query(&self, sql: &str, fields: &[&str]) -> Result<Vec<Vec<Option<String>>>> {
        self.as_ref().query(sql, fields).await
    }

    async fn execute_once(&self, sql: &str, request_id: &str) -> Result<()> {
        self.as_ref().execute_once(sql, request_id).await
    }
}

/// [`QueryRunner`] over an authenticated BigQuery client.
pub struct BigQueryClient {
    client: Client,
    project_id: String,
    location: Option<String>,
    timeout: Duration,
}

impl BigQueryClient {
    /// Authenticate with the configured service account key, or with
    /// Application Default Credentials.
    pub async fn connect(config: &BigQueryConfig) -> anyhow::Result<Self> {
        let client = match &config.credentials_file {
            Some(path) => {
                let key = gcp_bigquery_client::yup_oauth2::read_service_account_key(path)
                    .await
                    .map_err(|e| {
                        anyhow::anyhow!(
                            "Failed to read credentials from '{}': {}",
                            path.display(),
                            e
                        )
                    })?;
                Client::from_service_account_key(key, false)
                    .await
                    .map_err(|e| {
                        anyhow::anyhow!("Failed to create BigQuery client from key file: {e}")
                    })?
            }
            None => Client::from_application_default_credentials()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to create BigQuery client with ADC: {e}"))?,
        };
        info!(
            "Connected to BigQuery project {} (dataset {})",
            config.project_id, config.dataset_id
        );

        Ok(Self {
            client,
            project_id: config.project_id.clone(),
            location: config.location.clone(),
            timeout: Duration::from_secs(config.query_timeout_secs),
        })
    }

    fn timeout_ms(&self) -> i32 {
        i32::try_from(self.timeout.as_millis()).unwrap_or(i32::MAX)
    }

    /// Long-poll a job that outlived the initial query call.
    async fn wait_for_job(&self, response: QueryResponse) -> Result<QueryResponse> {
        let job = response
            .job_reference
            .ok_or_else(|| SyncError::failed("Incomplete BigQuery job has no job reference"))?;
        let job_id = job
            .job_id
            .ok_or_else(|| SyncError::failed("Incomplete BigQuery job has no job id"))?;

        loop {
            debug!(job_id = %job_id, "Waiting for BigQuery job");
            let parameters = GetQueryResultsParameters {
                location: job.location.clone(),
                timeout_ms: Some(self.timeout_ms()),
                ..Default::default()
            };
            let results = self
                .client
                .job()
                .get_query_results(&self.project_id, &job_id, parameters)
                .await
                .map_err(classify_bigquery_error)?;
            if results.job_complete == Some(true) {
                return Ok(QueryResponse::from(results));
            }
        }
    }

    /// Submit a statement and wait for its job to complete.
    async fn run(&self, sql: &str, request_id: Option<&str>) -> Result<QueryResponse> {
        let mut request = QueryRequest::new(sql);
        request.location = self.location.clone();
        request.timeout_ms = Some(self.timeout_ms());
        request.request_id = request_id.map(str::to_string);

        let response = self
            .client
            .job()
            .query(&self.project_id, request)
            .await
            .map_err(classify_bigquery_error)?;
        if response.job_complete == Some(false) {
            return self.wait_for_job(response).await;
        }
        Ok(response)
    }
}

#[async_trait]
impl QueryRunner for BigQueryClient {
    async fn query(&self, sql: &str, fields: &[&str]) -> Result<Vec<Vec<Option<String>>>> {
        let response = self.run(sql, None).await?;
        let mut result_set = ResultSet::new_from_query_response(response);
        let mut rows = Vec::new();
        while result_set.next_row() {
            let mut row = Vec::with_capacity(fields.len());
            for field in fields {
                row.push(
                    result_set
                        .get_string_by_name(field)
                        .map_err(classify_bigquery_error)?,
                );
            }
            rows.push(row);
        }
        Ok(rows)
    }

    async fn execute_once(&self, sql: &str, request_id: &str) -> Result<()> {
        debug!(request_id, "Submitting idempotent statement");
        self.run(sql, Some(request_id)).await.map(|_| ())
    }
}
