// Relay channel HTTP surface.
//
//   POST /api/excel/relay/{operation}   bridge client replays an operation
//   GET  /api/excel/agent/jobs          add-in runtime long-polls for work
//   POST /api/excel/agent/jobs/{id}     add-in runtime reports the outcome

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sheetbridge_common::protocol::rpc_methods::{OperationKind, AGENT_JOBS_PATH, RELAY_PATH_PREFIX};
use sheetbridge_common::types::SessionLocator;
use tracing::info;
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::error::{ErrorCode, RelayError};
use crate::hub::{HubError, JobOutcome, RelayHub};

#[derive(Debug, Clone)]
struct ApiState {
    hub: RelayHub,
    config: RelayConfig,
}

pub fn router(hub: RelayHub, config: RelayConfig) -> Router {
    Router::new()
        .route(&format!("{RELAY_PATH_PREFIX}/{{operation}}"), post(submit_operation))
        .route(AGENT_JOBS_PATH, get(claim_job))
        .route(&format!("{AGENT_JOBS_PATH}/{{job_id}}"), post(complete_job))
        .with_state(ApiState { hub, config })
}

async fn submit_operation(
    State(state): State<ApiState>,
    Path(operation): Path<String>,
    body: Bytes,
) -> Result<Response, RelayError> {
    let operation = operation
        .parse::<OperationKind>()
        .map_err(|error| RelayError::new(ErrorCode::NotFound, error.to_string()))?;
    let params = parse_object_body(&body)?;

    let outcome = state.hub.submit(operation, params).await.map_err(hub_error)?;
    if outcome.ok {
        return Ok((StatusCode::OK, Json(outcome.data.unwrap_or(Value::Null))).into_response());
    }

    let message = outcome
        .error
        .as_ref()
        .and_then(|error| error.get("message").and_then(Value::as_str).or_else(|| error.as_str()))
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| ErrorCode::RelayExecutionFailed.default_message().to_string());
    Err(RelayError::new(ErrorCode::RelayExecutionFailed, message)
        .with_details(json!({ "operation": operation, "error": outcome.error })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimQuery {
    workbook_id: Option<String>,
    session_id: Option<String>,
    wait_ms: Option<u64>,
}

async fn claim_job(
    State(state): State<ApiState>,
    Query(query): Query<ClaimQuery>,
) -> Response {
    let session = SessionLocator::new(query.workbook_id, query.session_id);
    let wait = state.config.poll_wait(query.wait_ms);

    match state.hub.claim(&session, wait).await {
        Some(job) => {
            info!(
                job_id = %job.id,
                operation = %job.operation,
                workbook_id = session.workbook_id.as_deref(),
                session_id = session.session_id.as_deref(),
                "relay job handed to add-in"
            );
            (StatusCode::OK, Json(job)).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn complete_job(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, RelayError> {
    let job_id = Uuid::parse_str(&job_id).map_err(|_| {
        RelayError::new(ErrorCode::ValidationFailed, "job id must be a uuid")
            .with_details(json!({ "job_id": job_id }))
    })?;
    let outcome: JobOutcome = serde_json::from_slice(&body).map_err(|error| {
        RelayError::new(ErrorCode::ValidationFailed, "job outcome must be {ok, data?, error?}")
            .with_details(json!({ "reason": error.to_string() }))
    })?;

    state.hub.complete(job_id, outcome).map_err(hub_error)?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_object_body(body: &[u8]) -> Result<Value, RelayError> {
    let params: Value = serde_json::from_slice(body).map_err(|error| {
        RelayError::new(ErrorCode::ValidationFailed, "request body must be JSON")
            .with_details(json!({ "reason": error.to_string() }))
    })?;
    if !params.is_object() {
        return Err(RelayError::new(ErrorCode::ValidationFailed, "request body must be a JSON object"));
    }
    Ok(params)
}

fn hub_error(error: HubError) -> RelayError {
    match error {
        HubError::TimedOut { job_id, after } => RelayError::from_code(ErrorCode::RelayTimeout)
            .with_details(json!({ "job_id": job_id, "timeout_ms": after.as_millis() as u64 })),
        HubError::UnknownJob(job_id) => RelayError::new(ErrorCode::NotFound, error.to_string())
            .with_details(json!({ "job_id": job_id })),
        HubError::Abandoned(job_id) => RelayError::new(ErrorCode::InternalError, error.to_string())
            .with_details(json!({ "job_id": job_id })),
    }
}
