use std::sync::Arc;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{catch, get, options, post, Request, State};
use tracing::{debug, info};

use crate::app_state::AppState;
use crate::collector::collect_recipes;
use crate::error::ApiError;
use crate::prompt::{build_prompt, normalize_ingredients};
use crate::types::{ErrorResponse, GenerateRecipesRequest, GenerateRecipesResponse, HealthResponse};

#[get("/health")]
pub async fn health(state: &State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: state.config.service_name.clone(),
    })
}

#[post("/generate-recipes", data = "<req>")]
pub async fn generate_recipes(
    state: &State<Arc<AppState>>,
    req: Json<GenerateRecipesRequest>,
) -> Result<Json<GenerateRecipesResponse>, ApiError> {
    // 1) reject empty input before touching the model
    if req.ingredients.is_empty() {
        return Err(ApiError::NoIngredients);
    }

    let ingredients = normalize_ingredients(&req.ingredients);
    if ingredients.is_empty() {
        return Err(ApiError::NoValidIngredients);
    }

    // 2) prompt -> raw candidates, off the async workers
    let prompt = build_prompt(&ingredients);
    info!(items = %ingredients.join(", "), "generating recipes");

    let raw_outputs = state.generate(&prompt).await?;
    for (i, raw) in raw_outputs.iter().enumerate() {
        debug!(candidate = i, raw = %raw, "raw model output");
    }

    // 3) parse, drop duplicate titles, cap the count
    let recipes = collect_recipes(&raw_outputs, state.special_tokens());
    info!(count = recipes.len(), "generated recipes");

    Ok(Json(GenerateRecipesResponse { recipes }))
}

/// CORS preflight for any path.
#[options("/<_..>")]
pub fn preflight() -> Status {
    Status::NoContent
}

#[catch(default)]
pub fn default_catcher(status: Status, _req: &Request<'_>) -> Json<ErrorResponse> {
    Json(ErrorResponse {
        detail: status.reason_lossy().to_string(),
    })
}
