use axum::extract::{Query, State};
use serde::Deserialize;
use tracing::debug;

use rentdesk_core::reports::{
    parse_date_range, parse_optional_date_range, revenue_report, trends_report, usage_report,
};
use rentdesk_core::types::BookingStatus;

use crate::envelope::{ok, ApiResult};
use crate::router::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodQuery {
    start_date: Option<String>,
    end_date: Option<String>,
}

/// `GET /api/admin/reports/revenue`
pub async fn revenue(State(state): State<AppState>, Query(query): Query<PeriodQuery>) -> ApiResult {
    let range = parse_date_range(query.start_date.as_deref(), query.end_date.as_deref())?;
    let payments = state
        .storage()
        .payments()
        .list_completed_within(range)
        .await?;
    let report = revenue_report(range, payments);
    debug!(
        stage = "reports",
        payments = report.payments.len(),
        total = report.total_revenue,
        "revenue report built"
    );
    Ok(ok(report))
}

/// `GET /api/admin/reports/usage`
pub async fn usage(State(state): State<AppState>) -> ApiResult {
    let cars = state.storage().cars().list().await?;
    let bookings = state
        .storage()
        .bookings()
        .list_by_status(BookingStatus::Completed)
        .await?;
    Ok(ok(usage_report(cars, &bookings)))
}

/// `GET /api/admin/reports/trends`
pub async fn trends(State(state): State<AppState>, Query(query): Query<PeriodQuery>) -> ApiResult {
    let range =
        parse_optional_date_range(query.start_date.as_deref(), query.end_date.as_deref())?;
    let bookings = state
        .storage()
        .bookings()
        .list_created_within(range)
        .await?;
    Ok(ok(trends_report(&bookings, range)))
}
