//! Data Transfer Objects for the REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::engine::{CompletionSummary, StepAdvance, StepSnapshot, WorkflowSnapshot};
use crate::templates::schema::{StepLink, StepSpec, TemplateSource, WorkflowTemplate};
use crate::variance::Gap;

// =============================================================================
// Health DTOs
// =============================================================================

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Service status with engine info
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub template_count: usize,
    pub instance_count: usize,
}

// =============================================================================
// Template DTOs
// =============================================================================

/// Summary response for listing templates
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TemplateSummary {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub source: String,
    pub step_count: usize,
    pub total_estimated_seconds: i64,
}

impl From<&WorkflowTemplate> for TemplateSummary {
    fn from(t: &WorkflowTemplate) -> Self {
        Self {
            id: t.id,
            name: t.name.clone(),
            description: t.description.clone(),
            category: t.category.clone(),
            source: source_display(t.source),
            step_count: t.step_count(),
            total_estimated_seconds: t.total_estimated_seconds(),
        }
    }
}

/// Full template response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TemplateResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub source: String,
    pub steps: Vec<StepSpecResponse>,
}

impl From<&WorkflowTemplate> for TemplateResponse {
    fn from(t: &WorkflowTemplate) -> Self {
        Self {
            id: t.id,
            name: t.name.clone(),
            description: t.description.clone(),
            category: t.category.clone(),
            source: source_display(t.source),
            steps: t.steps.iter().map(StepSpecResponse::from).collect(),
        }
    }
}

/// One step of a template
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StepSpecResponse {
    pub name: String,
    pub description: String,
    pub estimated_seconds: i64,
}

impl From<&StepSpec> for StepSpecResponse {
    fn from(s: &StepSpec) -> Self {
        Self {
            name: s.name.clone(),
            description: s.description.clone(),
            estimated_seconds: s.estimated_seconds,
        }
    }
}

fn source_display(source: TemplateSource) -> String {
    match source {
        TemplateSource::Builtin => "builtin".to_string(),
        TemplateSource::User => "user".to_string(),
    }
}

// =============================================================================
// Workflow request DTOs
// =============================================================================

/// Request to start a workflow for a ticket
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StartWorkflowRequest {
    pub template_id: Uuid,
    pub ticket_id: String,
    pub owner_id: String,
}

/// Request body for pause/resume/skip/cancel transitions
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct TransitionRequest {
    /// Version the caller last saw; mismatches are rejected with a conflict
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// Request to complete the current step
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CompleteStepRequest {
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub links: Vec<LinkDto>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// A link attached to a completed step
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LinkDto {
    pub title: String,
    pub url: String,
}

impl From<LinkDto> for StepLink {
    fn from(dto: LinkDto) -> Self {
        Self {
            title: dto.title,
            url: dto.url,
        }
    }
}

impl From<&StepLink> for LinkDto {
    fn from(link: &StepLink) -> Self {
        Self {
            title: link.title.clone(),
            url: link.url.clone(),
        }
    }
}

// =============================================================================
// Workflow response DTOs
// =============================================================================

/// Gap classification for a step or an instance
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GapResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
    pub class: String,
}

impl From<&Gap> for GapResponse {
    fn from(gap: &Gap) -> Self {
        Self {
            ratio: gap.ratio,
            class: gap.class.to_string(),
        }
    }
}

/// One step of a workflow, with live elapsed time
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StepResponse {
    pub step_index: usize,
    pub name: String,
    pub estimated_seconds: i64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub links: Vec<LinkDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap: Option<GapResponse>,
}

impl From<&StepSnapshot> for StepResponse {
    fn from(s: &StepSnapshot) -> Self {
        Self {
            step_index: s.step_index,
            name: s.name.clone(),
            estimated_seconds: s.estimated_seconds,
            status: s.status.to_string(),
            notes: s.notes.clone(),
            links: s.links.iter().map(LinkDto::from).collect(),
            elapsed_seconds: s.elapsed_seconds,
            gap: s.gap.as_ref().map(GapResponse::from),
        }
    }
}

/// Live snapshot of a workflow instance
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WorkflowResponse {
    pub instance_id: Uuid,
    pub template_id: Uuid,
    pub template_name: String,
    pub ticket_id: String,
    pub owner_id: String,
    pub status: String,
    pub current_step: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub version: u64,
    pub steps: Vec<StepResponse>,
    pub total_elapsed_seconds: i64,
    pub total_estimated_seconds: i64,
    pub total_gap: GapResponse,
}

impl From<&WorkflowSnapshot> for WorkflowResponse {
    fn from(s: &WorkflowSnapshot) -> Self {
        Self {
            instance_id: s.instance_id,
            template_id: s.template_id,
            template_name: s.template_name.clone(),
            ticket_id: s.ticket_id.clone(),
            owner_id: s.owner_id.clone(),
            status: s.status.to_string(),
            current_step: s.current_step,
            started_at: s.started_at,
            completed_at: s.completed_at,
            version: s.version,
            steps: s.steps.iter().map(StepResponse::from).collect(),
            total_elapsed_seconds: s.total_elapsed_seconds,
            total_estimated_seconds: s.total_estimated_seconds,
            total_gap: GapResponse::from(&s.total_gap),
        }
    }
}

/// Totals reported when an instance completes
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompletionSummaryResponse {
    pub instance_id: Uuid,
    pub ticket_id: String,
    pub completed_at: DateTime<Utc>,
    pub total_actual_seconds: i64,
    pub total_estimated_seconds: i64,
    pub total_gap: GapResponse,
    pub steps_completed: usize,
    pub steps_skipped: usize,
}

impl From<&CompletionSummary> for CompletionSummaryResponse {
    fn from(s: &CompletionSummary) -> Self {
        Self {
            instance_id: s.instance_id,
            ticket_id: s.ticket_id.clone(),
            completed_at: s.completed_at,
            total_actual_seconds: s.total_actual_seconds,
            total_estimated_seconds: s.total_estimated_seconds,
            total_gap: GapResponse::from(&s.total_gap),
            steps_completed: s.steps_completed,
            steps_skipped: s.steps_skipped,
        }
    }
}

/// Result of completing or skipping a step
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdvanceResponse {
    /// True once the instance reached its terminal Completed status
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<StepResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<CompletionSummaryResponse>,
    pub workflow: WorkflowResponse,
}

impl From<&StepAdvance> for AdvanceResponse {
    fn from(advance: &StepAdvance) -> Self {
        match advance {
            StepAdvance::Next {
                next_step,
                snapshot,
            } => Self {
                done: false,
                next_step: Some(StepResponse::from(next_step)),
                summary: None,
                workflow: WorkflowResponse::from(snapshot),
            },
            StepAdvance::Finished { summary, snapshot } => Self {
                done: true,
                next_step: None,
                summary: Some(CompletionSummaryResponse::from(summary)),
                workflow: WorkflowResponse::from(snapshot),
            },
        }
    }
}
