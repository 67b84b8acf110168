use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::common::{created_response, json_body, map_service_error, success_response, validate_input};
use crate::auth::AuthUser;
use crate::errors::{ApiError, ServiceError};
use crate::services::production::{CreateBatchFromRecipe, CreatedBatch, ImpactPreview};
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchFromRecipeRequest {
    pub recipe_id: Option<Uuid>,
    #[schema(example = 250)]
    pub target_portions: Option<i64>,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp
    #[schema(example = "2024-08-01")]
    pub scheduled_date: Option<String>,
    pub kitchen_id: Option<Uuid>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewImpactRequest {
    pub recipe_id: Option<Uuid>,
    #[schema(example = 250)]
    pub target_portions: Option<i64>,
}

fn require_recipe_id(recipe_id: Option<Uuid>) -> Result<Uuid, ApiError> {
    recipe_id
        .ok_or_else(|| ServiceError::InvalidArgument("recipeId is required".to_string()).into())
}

/// Accepts a plain date or the date part of an RFC 3339 timestamp.
pub fn parse_scheduled_date(raw: &str) -> Result<NaiveDate, ApiError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|ts| ts.date_naive()))
        .map_err(|_| {
            ServiceError::InvalidArgument(format!(
                "scheduledDate '{}' is not a valid date",
                raw
            ))
            .into()
        })
}

/// Create a production plan and batch from a recipe
#[utoipa::path(
    post,
    path = "/api/v1/production/batches/from-recipe",
    request_body = CreateBatchFromRecipeRequest,
    responses(
        (status = 201, description = "Production batch created", body = ApiResponse<CreatedBatch>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request, inactive recipe or insufficient inventory", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Recipe not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "production"
)]
pub async fn create_batch_from_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateBatchFromRecipeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(payload)?;
    validate_input(&request)?;

    let recipe_id = require_recipe_id(request.recipe_id)?;
    let scheduled_date = request
        .scheduled_date
        .as_deref()
        .ok_or_else(|| {
            ApiError::from(ServiceError::InvalidArgument(
                "scheduledDate is required".to_string(),
            ))
        })
        .and_then(parse_scheduled_date)?;

    let created = state
        .production
        .create_batch_from_recipe(CreateBatchFromRecipe {
            recipe_id,
            target_portions: request.target_portions,
            scheduled_date,
            kitchen_id: request.kitchen_id,
            notes: request.notes,
            created_by: Some(user.user_id),
        })
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ApiResponse::success(created)))
}

/// Preview the inventory impact of producing a recipe
#[utoipa::path(
    post,
    path = "/api/v1/production/batches/preview-impact",
    request_body = PreviewImpactRequest,
    responses(
        (status = 200, description = "Impact preview, including infeasible plans", body = ApiResponse<ImpactPreview>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Recipe not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "production"
)]
pub async fn preview_impact(
    State(state): State<AppState>,
    payload: Result<Json<PreviewImpactRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(payload)?;
    validate_input(&request)?;
    let recipe_id = require_recipe_id(request.recipe_id)?;

    let preview = state
        .production
        .preview_impact(recipe_id, request.target_portions)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(preview)))
}
