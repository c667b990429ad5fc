use axum::extract::{Path, State};
use serde_json::json;
use tracing::info;

use rentdesk_core::payload::{BranchPatch, NewBranchRequest};

use crate::envelope::{created, ok, ApiJson, ApiResult};
use crate::router::AppState;

pub async fn add(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewBranchRequest>,
) -> ApiResult {
    let draft = body.into_draft()?;
    let branch = state.storage().branches().insert(&draft, state.now()).await?;
    info!(stage = "branches", branch_id = %branch.id, city = %branch.city, "branch created");
    Ok(created(branch))
}

pub async fn list(State(state): State<AppState>) -> ApiResult {
    Ok(ok(state.storage().branches().list().await?))
}

pub async fn get(State(state): State<AppState>, Path(branch_id): Path<String>) -> ApiResult {
    Ok(ok(state.storage().branches().fetch(&branch_id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(branch_id): Path<String>,
    ApiJson(patch): ApiJson<BranchPatch>,
) -> ApiResult {
    let branch = state
        .storage()
        .branches()
        .update(&branch_id, patch, state.now())
        .await?;
    Ok(ok(branch))
}

pub async fn delete(State(state): State<AppState>, Path(branch_id): Path<String>) -> ApiResult {
    state.storage().branches().delete(&branch_id).await?;
    info!(stage = "branches", %branch_id, "branch deleted");
    Ok(ok(json!({})))
}
