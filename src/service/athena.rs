//! Amazon Athena implementation of the query service.
//!
//! Wraps `aws_sdk_athena::Client` and translates SDK shapes into the crate's
//! own request/response types.

use async_trait::async_trait;
use aws_sdk_athena::error::DisplayErrorContext;
use aws_sdk_athena::types::{
    QueryExecutionContext, ResultConfiguration, ResultReuseByAgeConfiguration,
    ResultReuseConfiguration,
};
use aws_sdk_athena::Client;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{
    ExecutionState, ExecutionStatistics, QueryExecution, QueryService, ResultPage,
    ServiceColumn, StartExecutionRequest, TableColumn, TableListPage, TableMetadata,
};
use crate::error::{AthenaError, ErrorDetail, Result};

/// Athena query service client.
#[derive(Debug, Clone)]
pub struct AthenaService {
    client: Client,
}

impl AthenaService {
    /// Creates a service from an existing SDK client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a service from a loaded SDK configuration.
    pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

/// Normalizes SDK scalar fields that are plain values in some model versions
/// and optional in others.
fn opt<T, V: Into<Option<T>>>(value: V) -> Option<T> {
    value.into()
}

fn sdk_error<E>(operation: &str, e: E) -> AthenaError
where
    E: std::error::Error,
{
    AthenaError::service(format!("{operation} failed: {}", DisplayErrorContext(&e)))
}

fn convert_table(meta: &aws_sdk_athena::types::TableMetadata) -> TableMetadata {
    let convert_columns = |columns: &Option<Vec<aws_sdk_athena::types::Column>>| {
        columns
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|c| TableColumn {
                name: c.name.clone(),
                type_name: c.r#type.clone(),
            })
            .collect::<Vec<_>>()
    };

    TableMetadata {
        name: meta.name.clone(),
        table_type: meta.table_type.clone(),
        parameters: meta.parameters.clone().unwrap_or_default(),
        columns: convert_columns(&meta.columns),
        partition_keys: convert_columns(&meta.partition_keys),
    }
}

#[async_trait]
impl QueryService for AthenaService {
    async fn start_execution(&self, request: &StartExecutionRequest) -> Result<String> {
        let mut builder = self
            .client
            .start_query_execution()
            .query_string(&request.query)
            .result_configuration(
                ResultConfiguration::builder()
                    .output_location(&request.output_location)
                    .build(),
            );

        if request.database.is_some() || request.catalog.is_some() {
            let context = QueryExecutionContext::builder()
                .set_database(request.database.clone())
                .set_catalog(request.catalog.clone())
                .build();
            builder = builder.query_execution_context(context);
        }

        if let Some(work_group) = &request.work_group {
            builder = builder.work_group(work_group);
        }

        if let Some(reuse) = request.result_reuse {
            let by_age = ResultReuseByAgeConfiguration::builder()
                .enabled(reuse.enabled)
                .max_age_in_minutes(reuse.max_age_minutes)
                .build();
            builder = builder.result_reuse_configuration(
                ResultReuseConfiguration::builder()
                    .result_reuse_by_age_configuration(by_age)
                    .build(),
            );
        }

        let output = builder
            .send()
            .await
            .map_err(|e| sdk_error("StartQueryExecution", e))?;

        output
            .query_execution_id
            .ok_or_else(|| AthenaError::service("StartQueryExecution returned no execution id"))
    }

    async fn get_execution(&self, execution_id: &str) -> Result<QueryExecution> {
        let output = self
            .client
            .get_query_execution()
            .query_execution_id(execution_id)
            .send()
            .await
            .map_err(|e| sdk_error("GetQueryExecution", e))?;

        let execution = output.query_execution.ok_or_else(|| {
            AthenaError::service(format!("No execution returned for {execution_id}"))
        })?;

        let status = execution.status.as_ref();
        let state_name = status
            .and_then(|s| s.state.as_ref())
            .map(|s| s.as_str())
            .unwrap_or("QUEUED");
        let state = ExecutionState::parse(state_name).ok_or_else(|| {
            AthenaError::service(format!("Unknown execution state '{state_name}'"))
        })?;

        let error = status.and_then(|s| s.athena_error.as_ref()).map(|e| ErrorDetail {
            category: opt(e.error_category),
            error_type: opt(e.error_type),
            retryable: opt(e.retryable).unwrap_or(false),
            message: e.error_message.clone(),
        });

        let submitted_at = status
            .and_then(|s| s.submission_date_time.as_ref())
            .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.secs(), dt.subsec_nanos()));

        let statistics = execution
            .statistics
            .as_ref()
            .map(|s| ExecutionStatistics {
                data_manifest_location: s.data_manifest_location.clone(),
                data_scanned_bytes: opt(s.data_scanned_in_bytes),
                engine_execution_time_ms: opt(s.engine_execution_time_in_millis),
                total_execution_time_ms: opt(s.total_execution_time_in_millis),
                reused_previous_result: s
                    .result_reuse_information
                    .as_ref()
                    .and_then(|r| opt(r.reused_previous_result))
                    .unwrap_or(false),
            })
            .unwrap_or_default();

        Ok(QueryExecution {
            execution_id: execution
                .query_execution_id
                .clone()
                .unwrap_or_else(|| execution_id.to_string()),
            query: execution.query.clone(),
            state,
            state_change_reason: status.and_then(|s| s.state_change_reason.clone()),
            error,
            statement_type: execution.statement_type.as_ref().map(|t| t.as_str().to_string()),
            substatement_type: execution.substatement_type.clone(),
            submitted_at,
            statistics,
        })
    }

    async fn get_results(
        &self,
        execution_id: &str,
        next_token: Option<&str>,
        max_results: i32,
    ) -> Result<ResultPage> {
        let output = self
            .client
            .get_query_results()
            .query_execution_id(execution_id)
            .set_next_token(next_token.map(String::from))
            .max_results(max_results)
            .send()
            .await
            .map_err(|e| sdk_error("GetQueryResults", e))?;

        let mut page = ResultPage {
            next_token: output.next_token.clone(),
            update_count: opt(output.update_count),
            ..Default::default()
        };

        if let Some(result_set) = output.result_set.as_ref() {
            if let Some(metadata) = result_set.result_set_metadata.as_ref() {
                page.columns = metadata
                    .column_info
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .map(|c| ServiceColumn {
                        name: c.name.clone(),
                        type_name: c.r#type.clone(),
                        precision: opt(c.precision).unwrap_or(0),
                        scale: opt(c.scale).unwrap_or(0),
                        nullable: c.nullable.as_ref().map(|n| n.as_str().to_string()),
                    })
                    .collect();
            }

            page.rows = result_set
                .rows
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|row| {
                    row.data
                        .as_deref()
                        .unwrap_or_default()
                        .iter()
                        .map(|datum| datum.var_char_value.clone())
                        .collect()
                })
                .collect();
        }

        Ok(page)
    }

    async fn get_table_metadata(
        &self,
        catalog: &str,
        database: &str,
        table: &str,
    ) -> Result<Option<TableMetadata>> {
        let response = self
            .client
            .get_table_metadata()
            .catalog_name(catalog)
            .database_name(database)
            .table_name(table)
            .send()
            .await;

        match response {
            Ok(output) => Ok(output.table_metadata.as_ref().map(convert_table)),
            Err(e) => {
                // Missing tables surface as service exceptions; treat every lookup failure as absent.
                debug!(
                    "Table metadata lookup for {database}.{table} failed: {}",
                    DisplayErrorContext(&e)
                );
                Ok(None)
            }
        }
    }

    async fn list_table_metadata(
        &self,
        catalog: &str,
        database: &str,
        next_token: Option<&str>,
        max_results: i32,
    ) -> Result<TableListPage> {
        let output = self
            .client
            .list_table_metadata()
            .catalog_name(catalog)
            .database_name(database)
            .set_next_token(next_token.map(String::from))
            .max_results(max_results)
            .send()
            .await
            .map_err(|e| sdk_error("ListTableMetadata", e))?;

        Ok(TableListPage {
            tables: output
                .table_metadata_list
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(convert_table)
                .collect(),
            next_token: output.next_token.clone(),
        })
    }
}
