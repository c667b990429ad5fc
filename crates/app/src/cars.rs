use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension,
};
use metrics::counter;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use rentdesk_carsxe::{normalize_image_link, CarsxeClient, CarsxeError};
use rentdesk_core::payload::{CarPatch, NewCarRequest};

use crate::auth::AdminUser;
use crate::envelope::{created, ok, ApiError, ApiJson, ApiResult};
use crate::router::AppState;

pub async fn add(
    State(state): State<AppState>,
    Extension(AdminUser(admin)): Extension<AdminUser>,
    ApiJson(body): ApiJson<NewCarRequest>,
) -> ApiResult {
    let draft = body.into_draft()?;
    let car = state.storage().cars().insert(&draft, state.now()).await?;
    info!(
        stage = "cars",
        car_id = %car.id,
        plate = %car.license_plate,
        admin_id = %admin.id,
        "car added"
    );
    Ok(created(car))
}

pub async fn list(State(state): State<AppState>) -> ApiResult {
    Ok(ok(state.storage().cars().list().await?))
}

pub async fn get(State(state): State<AppState>, Path(car_id): Path<String>) -> ApiResult {
    Ok(ok(state.storage().cars().fetch(&car_id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(car_id): Path<String>,
    ApiJson(patch): ApiJson<CarPatch>,
) -> ApiResult {
    let car = state
        .storage()
        .cars()
        .update(&car_id, patch, state.now())
        .await?;
    Ok(ok(car))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(AdminUser(admin)): Extension<AdminUser>,
    Path(car_id): Path<String>,
) -> ApiResult {
    state.storage().cars().delete(&car_id).await?;
    info!(stage = "cars", %car_id, admin_id = %admin.id, "car deleted");
    Ok(ok(json!({})))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    plate_number: Option<String>,
    country_code: Option<String>,
}

/// `GET /api/admin/cars/search`: decodes a plate and attaches stock images.
pub async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> ApiResult {
    let (Some(plate), Some(country)) = (
        present(query.plate_number),
        present(query.country_code),
    ) else {
        return Err(ApiError::bad_request(
            "Plate number and country code are required",
        ));
    };
    let client = lookup_client(&state)?;

    let decoded = client.decode_plate(&plate, &country).await;
    record_lookup("decode", &decoded);
    let mut vehicle = decoded.map_err(|err| {
        warn!(stage = "lookup", %plate, %country, error = %err, "plate decode failed");
        ApiError::from(err)
    })?;

    let make_and_model = vehicle
        .make_and_model()
        .map(|(make, model)| (make.to_string(), model.to_string()));
    if let Some((make, model)) = make_and_model {
        let images = client.fetch_images(&make, &model).await;
        record_lookup("images", &images);
        let links = images.unwrap_or_else(|err| {
            warn!(stage = "lookup", %make, %model, error = %err, "image fetch failed");
            Vec::new()
        });
        vehicle.images = Some(links.into_iter().map(normalize_image_link).collect());
    }

    info!(stage = "lookup", %plate, %country, "vehicle decoded");
    Ok(ok(vehicle))
}

#[derive(Debug, Default, Deserialize)]
pub struct ImagesQuery {
    make: Option<String>,
    model: Option<String>,
}

/// `GET /api/admin/cars/images`: stock image links for a make and model.
/// Upstream failures yield an empty list.
pub async fn images(State(state): State<AppState>, Query(query): Query<ImagesQuery>) -> ApiResult {
    let (Some(make), Some(model)) = (present(query.make), present(query.model)) else {
        return Err(ApiError::bad_request("Make and model are required"));
    };
    let client = lookup_client(&state)?;

    let images = client.fetch_images(&make, &model).await;
    record_lookup("images", &images);
    let links = images.unwrap_or_else(|err| {
        warn!(stage = "lookup", %make, %model, error = %err, "image fetch failed");
        Vec::new()
    });

    let links: Vec<String> = links.into_iter().map(normalize_image_link).collect();
    Ok(ok(links))
}

fn lookup_client(state: &AppState) -> Result<&CarsxeClient, ApiError> {
    state.carsxe().ok_or_else(|| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Vehicle lookup is not configured",
        )
    })
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn record_lookup<T>(kind: &'static str, result: &Result<T, CarsxeError>) {
    let label = if result.is_ok() { "success" } else { "error" };
    counter!("vehicle_lookup_total", "kind" => kind, "result" => label).increment(1);
}
