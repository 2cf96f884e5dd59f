//! OpenAPI specification builder using utoipa.

use utoipa::OpenApi;

use crate::rest::dto::{
    AdvanceResponse, CompleteStepRequest, CompletionSummaryResponse, GapResponse, HealthResponse,
    LinkDto, StartWorkflowRequest, StatusResponse, StepResponse, StepSpecResponse,
    TemplateResponse, TemplateSummary, TransitionRequest, WorkflowResponse,
};
use crate::rest::error::ErrorResponse;

/// OpenAPI documentation for the tempo REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tempo API",
        version = "0.1.0",
        description = "REST API for guided workflow execution and time tracking.",
        license(name = "MIT")
    ),
    paths(
        // Health endpoints
        crate::rest::routes::health::health,
        crate::rest::routes::health::status,
        // Template endpoints
        crate::rest::routes::templates::list,
        crate::rest::routes::templates::get_one,
        // Workflow endpoints
        crate::rest::routes::workflows::start,
        crate::rest::routes::workflows::list,
        crate::rest::routes::workflows::get_one,
        crate::rest::routes::workflows::pause,
        crate::rest::routes::workflows::resume,
        crate::rest::routes::workflows::complete_step,
        crate::rest::routes::workflows::skip_step,
        crate::rest::routes::workflows::cancel,
    ),
    components(
        schemas(
            // Response types
            HealthResponse,
            StatusResponse,
            TemplateSummary,
            TemplateResponse,
            StepSpecResponse,
            WorkflowResponse,
            StepResponse,
            GapResponse,
            AdvanceResponse,
            CompletionSummaryResponse,
            ErrorResponse,
            // Request types
            StartWorkflowRequest,
            TransitionRequest,
            CompleteStepRequest,
            LinkDto,
        )
    ),
    tags(
        (name = "Health", description = "Health check and status endpoints"),
        (name = "Templates", description = "Read-only workflow template catalog"),
        (name = "Workflows", description = "Workflow lifecycle and time tracking"),
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate the OpenAPI specification as a JSON string
    pub fn json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_json_generates() {
        let json = ApiDoc::json().unwrap();
        assert!(json.contains("/api/v1/workflows"));
        assert!(json.contains("Tempo API"));
    }
}
