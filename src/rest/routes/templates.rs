//! Template catalog endpoints (read-only).

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::rest::dto::{TemplateResponse, TemplateSummary};
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;

/// Query parameters for listing templates
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct ListTemplatesQuery {
    /// Only templates for this work-item category
    pub category: Option<String>,
}

/// List all templates
#[utoipa::path(
    get,
    path = "/api/v1/templates",
    tag = "Templates",
    params(ListTemplatesQuery),
    responses(
        (status = 200, description = "List of templates", body = Vec<TemplateSummary>)
    )
)]
pub async fn list(
    State(state): State<ApiState>,
    Query(query): Query<ListTemplatesQuery>,
) -> Json<Vec<TemplateSummary>> {
    let registry = state.engine.templates();
    let templates = match query.category {
        Some(category) => registry.by_category(&category),
        None => registry.all(),
    };
    Json(templates.into_iter().map(TemplateSummary::from).collect())
}

/// Get a single template by id
#[utoipa::path(
    get,
    path = "/api/v1/templates/{id}",
    tag = "Templates",
    params(
        ("id" = Uuid, Path, description = "Template id")
    ),
    responses(
        (status = 200, description = "Template details", body = TemplateResponse),
        (status = 404, description = "Template not found", body = ErrorResponse)
    )
)]
pub async fn get_one(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TemplateResponse>, ApiError> {
    let template = state
        .engine
        .templates()
        .get(id)
        .ok_or_else(|| ApiError::NotFound(format!("Template '{id}' not found")))?;

    Ok(Json(TemplateResponse::from(template)))
}
