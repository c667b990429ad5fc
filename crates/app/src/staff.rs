use axum::extract::{Path, State};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use rentdesk_core::password::{generate_temporary_password, hash_password_with_cost};
use rentdesk_core::payload::{NewStaffRequest, StaffPatch};
use rentdesk_core::types::{StaffMember, UserRole};

use crate::envelope::{created, ok, ApiError, ApiJson, ApiResult};
use crate::router::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatedStaff {
    #[serde(flatten)]
    member: StaffMember,
    #[serde(skip_serializing_if = "Option::is_none")]
    temporary_password: Option<String>,
}

pub async fn add(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewStaffRequest>,
) -> ApiResult {
    let (draft, password) = body.into_draft()?;

    let users = state.storage().users();
    if users.email_exists(&draft.email).await? {
        return Err(ApiError::conflict("a user with this email already exists"));
    }

    let (plain, temporary_password) = match password {
        Some(plain) => (plain, None),
        None => {
            let generated = generate_temporary_password();
            (generated.clone(), Some(generated))
        }
    };
    let hash = hash_in_background(&state, plain).await?;

    let member = users
        .insert(&draft, UserRole::Staff, &hash, state.now())
        .await?;
    info!(
        stage = "staff",
        staff_id = %member.id,
        temporary_password = temporary_password.is_some(),
        "staff member created"
    );
    Ok(created(CreatedStaff {
        member,
        temporary_password,
    }))
}

pub async fn list(State(state): State<AppState>) -> ApiResult {
    Ok(ok(state.storage().users().list_staff().await?))
}

pub async fn get(State(state): State<AppState>, Path(staff_id): Path<String>) -> ApiResult {
    Ok(ok(state.storage().users().fetch_staff(&staff_id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(staff_id): Path<String>,
    ApiJson(mut patch): ApiJson<StaffPatch>,
) -> ApiResult {
    let hash = match patch.take_password() {
        Some(plain) => Some(hash_in_background(&state, plain).await?),
        None => None,
    };
    let member = state
        .storage()
        .users()
        .update_staff(&staff_id, patch, hash.as_deref(), state.now())
        .await?;
    if hash.is_some() {
        info!(stage = "staff", %staff_id, "staff password changed");
    }
    Ok(ok(member))
}

pub async fn delete(State(state): State<AppState>, Path(staff_id): Path<String>) -> ApiResult {
    state.storage().users().delete_staff(&staff_id).await?;
    info!(stage = "staff", %staff_id, "staff member deleted");
    Ok(ok(json!({})))
}

async fn hash_in_background(state: &AppState, plain: String) -> Result<String, ApiError> {
    let cost = state.password_cost();
    let hashed = tokio::task::spawn_blocking(move || hash_password_with_cost(&plain, cost))
        .await
        .map_err(ApiError::internal)?;
    Ok(hashed?)
}
