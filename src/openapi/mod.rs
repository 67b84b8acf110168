use axum::Json;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Path of the generated document
pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SPPG Production API",
        version = "0.1.0",
        description = r#"
# SPPG Production API

Scales recipes to a target portion count, checks the scaled requirement
against on-hand inventory lots (oldest stock first) and creates production
plans with their batches.

## Authentication

The caller is authenticated upstream and identified by the `x-user-id`
header. Requests without it are rejected with 401; callers lacking the
route's permission get 403.

## Error Handling

Errors share one body. Shortfalls carry the per-material detail:

```json
{
  "error": "Bad Request",
  "message": "Insufficient inventory for 1 material(s)",
  "insufficientItems": [{"materialName": "Beras", "required": "20", "available": "10", "shortfall": "10"}],
  "timestamp": "2024-08-01T00:00:00Z"
}
```

Decimal quantities and prices are encoded as strings.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "production", description = "Recipe scaling, impact preview and batch creation")
    ),
    paths(
        crate::handlers::production::create_batch_from_recipe,
        crate::handlers::production::preview_impact,
    ),
    components(
        schemas(
            crate::handlers::production::CreateBatchFromRecipeRequest,
            crate::handlers::production::PreviewImpactRequest,
            crate::services::inventory_availability::InsufficientItem,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&UserIdSecurity),
    security(("user_id" = []))
)]
pub struct ApiDocV1;

struct UserIdSecurity;

impl Modify for UserIdSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "user_id",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(
                    crate::auth::USER_ID_HEADER,
                ))),
            );
        }
    }
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDocV1::openapi())
}
