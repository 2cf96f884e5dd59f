//! Workflow lifecycle endpoints.
//!
//! These are a thin translation over [`crate::engine::WorkflowEngine`]; all
//! state-machine rules live there.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::{InstanceStatus, ListFilter};
use crate::rest::dto::{
    AdvanceResponse, CompleteStepRequest, StartWorkflowRequest, TransitionRequest,
    WorkflowResponse,
};
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;

/// Query parameters for listing workflows
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct ListWorkflowsQuery {
    /// Only workflows for this ticket
    pub ticket: Option<String>,
    /// Only workflows owned by this user
    pub owner: Option<String>,
    /// Only workflows in this status (e.g., "active", "completed")
    pub status: Option<String>,
}

fn parse_status(value: &str) -> Result<InstanceStatus, ApiError> {
    match value {
        "not_started" => Ok(InstanceStatus::NotStarted),
        "active" => Ok(InstanceStatus::Active),
        "paused" => Ok(InstanceStatus::Paused),
        "completed" => Ok(InstanceStatus::Completed),
        "cancelled" => Ok(InstanceStatus::Cancelled),
        other => Err(ApiError::BadRequest(format!(
            "Unknown status filter '{other}'"
        ))),
    }
}

/// Start a workflow for a ticket
#[utoipa::path(
    post,
    path = "/api/v1/workflows",
    tag = "Workflows",
    request_body = StartWorkflowRequest,
    responses(
        (status = 200, description = "Workflow started", body = WorkflowResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 409, description = "Ticket already has an active workflow", body = ErrorResponse)
    )
)]
pub async fn start(
    State(state): State<ApiState>,
    Json(request): Json<StartWorkflowRequest>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    let snapshot = state
        .engine
        .start_workflow(request.template_id, &request.ticket_id, &request.owner_id)
        .await?;
    Ok(Json(WorkflowResponse::from(&snapshot)))
}

/// List workflows, optionally filtered
#[utoipa::path(
    get,
    path = "/api/v1/workflows",
    tag = "Workflows",
    params(ListWorkflowsQuery),
    responses(
        (status = 200, description = "Matching workflows, newest first", body = Vec<WorkflowResponse>),
        (status = 400, description = "Unknown status filter", body = ErrorResponse)
    )
)]
pub async fn list(
    State(state): State<ApiState>,
    Query(query): Query<ListWorkflowsQuery>,
) -> Result<Json<Vec<WorkflowResponse>>, ApiError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let filter = ListFilter {
        ticket_id: query.ticket,
        owner_id: query.owner,
        status,
    };

    let snapshots = state.engine.list(&filter).await;
    Ok(Json(snapshots.iter().map(WorkflowResponse::from).collect()))
}

/// Get the live snapshot of one workflow
#[utoipa::path(
    get,
    path = "/api/v1/workflows/{id}",
    tag = "Workflows",
    params(
        ("id" = Uuid, Path, description = "Workflow instance id")
    ),
    responses(
        (status = 200, description = "Live workflow snapshot", body = WorkflowResponse),
        (status = 404, description = "Workflow not found", body = ErrorResponse)
    )
)]
pub async fn get_one(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    let snapshot = state.engine.get_state(id).await?;
    Ok(Json(WorkflowResponse::from(&snapshot)))
}

/// Pause a workflow, freezing its clock
#[utoipa::path(
    post,
    path = "/api/v1/workflows/{id}/pause",
    tag = "Workflows",
    params(
        ("id" = Uuid, Path, description = "Workflow instance id")
    ),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Workflow paused", body = WorkflowResponse),
        (status = 404, description = "Workflow not found", body = ErrorResponse),
        (status = 409, description = "Not pausable in its current status", body = ErrorResponse)
    )
)]
pub async fn pause(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    let snapshot = state
        .engine
        .pause_workflow(id, request.expected_version)
        .await?;
    Ok(Json(WorkflowResponse::from(&snapshot)))
}

/// Resume a paused workflow
#[utoipa::path(
    post,
    path = "/api/v1/workflows/{id}/resume",
    tag = "Workflows",
    params(
        ("id" = Uuid, Path, description = "Workflow instance id")
    ),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Workflow resumed", body = WorkflowResponse),
        (status = 404, description = "Workflow not found", body = ErrorResponse),
        (status = 409, description = "Not resumable in its current status", body = ErrorResponse)
    )
)]
pub async fn resume(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    let snapshot = state
        .engine
        .resume_workflow(id, request.expected_version)
        .await?;
    Ok(Json(WorkflowResponse::from(&snapshot)))
}

/// Complete the current step
#[utoipa::path(
    post,
    path = "/api/v1/workflows/{id}/complete-step",
    tag = "Workflows",
    params(
        ("id" = Uuid, Path, description = "Workflow instance id")
    ),
    request_body = CompleteStepRequest,
    responses(
        (status = 200, description = "Next step or completion summary", body = AdvanceResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 404, description = "Workflow not found", body = ErrorResponse),
        (status = 409, description = "Stale version or illegal transition", body = ErrorResponse)
    )
)]
pub async fn complete_step(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CompleteStepRequest>,
) -> Result<Json<AdvanceResponse>, ApiError> {
    let links = request.links.into_iter().map(Into::into).collect();
    let advance = state
        .engine
        .complete_step(id, request.notes, links, request.expected_version)
        .await?;
    Ok(Json(AdvanceResponse::from(&advance)))
}

/// Skip the current step; its time is still recorded
#[utoipa::path(
    post,
    path = "/api/v1/workflows/{id}/skip-step",
    tag = "Workflows",
    params(
        ("id" = Uuid, Path, description = "Workflow instance id")
    ),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Next step or completion summary", body = AdvanceResponse),
        (status = 404, description = "Workflow not found", body = ErrorResponse),
        (status = 409, description = "Stale version or illegal transition", body = ErrorResponse)
    )
)]
pub async fn skip_step(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<AdvanceResponse>, ApiError> {
    let advance = state
        .engine
        .skip_step(id, request.expected_version)
        .await?;
    Ok(Json(AdvanceResponse::from(&advance)))
}

/// Cancel a workflow. Irreversible.
#[utoipa::path(
    post,
    path = "/api/v1/workflows/{id}/cancel",
    tag = "Workflows",
    params(
        ("id" = Uuid, Path, description = "Workflow instance id")
    ),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Workflow cancelled", body = WorkflowResponse),
        (status = 404, description = "Workflow not found", body = ErrorResponse),
        (status = 409, description = "Already terminal", body = ErrorResponse)
    )
)]
pub async fn cancel(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    let snapshot = state
        .engine
        .cancel_workflow(id, request.expected_version)
        .await?;
    Ok(Json(WorkflowResponse::from(&snapshot)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("active").unwrap(), InstanceStatus::Active);
        assert_eq!(
            parse_status("completed").unwrap(),
            InstanceStatus::Completed
        );
        assert!(parse_status("bogus").is_err());
    }
}
