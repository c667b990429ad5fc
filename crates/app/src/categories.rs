use axum::extract::{Path, State};
use serde_json::json;
use tracing::info;

use rentdesk_core::payload::{CategoryPatch, NewCategoryRequest};

use crate::envelope::{created, ok, ApiJson, ApiResult};
use crate::router::AppState;

pub async fn add(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewCategoryRequest>,
) -> ApiResult {
    let draft = body.into_draft()?;
    let category = state.storage().categories().insert(&draft, state.now()).await?;
    info!(stage = "categories", category_id = %category.id, name = %category.name, "category created");
    Ok(created(category))
}

pub async fn list(State(state): State<AppState>) -> ApiResult {
    Ok(ok(state.storage().categories().list().await?))
}

pub async fn get(State(state): State<AppState>, Path(category_id): Path<String>) -> ApiResult {
    Ok(ok(state.storage().categories().fetch(&category_id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(category_id): Path<String>,
    ApiJson(patch): ApiJson<CategoryPatch>,
) -> ApiResult {
    let category = state
        .storage()
        .categories()
        .update(&category_id, patch, state.now())
        .await?;
    Ok(ok(category))
}

pub async fn delete(State(state): State<AppState>, Path(category_id): Path<String>) -> ApiResult {
    state.storage().categories().delete(&category_id).await?;
    info!(stage = "categories", %category_id, "category deleted");
    Ok(ok(json!({})))
}
