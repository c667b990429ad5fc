use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer};

use rentdesk_carsxe::CarsxeClient;
use rentdesk_core::password::DEFAULT_COST;
use rentdesk_storage::Database;
use rentdesk_util::RateLimitConfig;

use crate::auth::{self, TokenService};
use crate::rate_limit::{self, RateLimiter};
use crate::{branches, cars, categories, reports, staff, telemetry};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
    tokens: TokenService,
    carsxe: Option<CarsxeClient>,
    rate_limiter: RateLimiter,
    frontend_origin: Option<HeaderValue>,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    password_cost: u32,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        storage: Database,
        tokens: TokenService,
        carsxe: Option<CarsxeClient>,
        rate_limit: &RateLimitConfig,
    ) -> Self {
        Self {
            metrics,
            storage,
            tokens,
            carsxe,
            rate_limiter: RateLimiter::new(rate_limit),
            frontend_origin: None,
            clock: Arc::new(Utc::now),
            password_cost: DEFAULT_COST,
        }
    }

    /// Allows cross-origin requests with credentials from the admin frontend.
    pub fn with_frontend_origin(mut self, origin: HeaderValue) -> Self {
        self.frontend_origin = Some(origin);
        self
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    #[cfg(test)]
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn storage(&self) -> &Database {
        &self.storage
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn carsxe(&self) -> Option<&CarsxeClient> {
        self.carsxe.as_ref()
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn password_cost(&self) -> u32 {
        self.password_cost
    }
}

pub fn app_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/cars", get(cars::list).post(cars::add))
        .route("/cars/search", get(cars::search))
        .route("/cars/images", get(cars::images))
        .route(
            "/cars/:car_id",
            get(cars::get).put(cars::update).delete(cars::delete),
        )
        .route("/categories", get(categories::list).post(categories::add))
        .route(
            "/categories/:category_id",
            get(categories::get)
                .put(categories::update)
                .delete(categories::delete),
        )
        .route("/branches", get(branches::list).post(branches::add))
        .route(
            "/branches/:branch_id",
            get(branches::get)
                .put(branches::update)
                .delete(branches::delete),
        )
        .route("/staff", get(staff::list).post(staff::add))
        .route(
            "/staff/:staff_id",
            get(staff::get).put(staff::update).delete(staff::delete),
        )
        .route("/reports/revenue", get(reports::revenue))
        .route("/reports/usage", get(reports::usage))
        .route("/reports/trends", get(reports::trends))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ))
        .route_layer(middleware::from_fn(record_request));

    let api = Router::new()
        .route("/auth/login", post(auth::login))
        .nest("/admin", admin)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::limit_requests,
        ));

    let cors = state.frontend_origin.clone().map(|origin| {
        CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
    });

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .nest("/api", api)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ));

    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };
    router.with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

/// Counts admin API requests by resource (`cars`, `staff`, ...) and outcome.
async fn record_request(request: Request, next: Next) -> Response {
    let resource = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| resource_label(path.as_str()))
        .unwrap_or("unknown");

    let response = next.run(request).await;
    let status = response.status();
    let result = if status.is_success() {
        "success"
    } else if status.is_client_error() {
        "client_error"
    } else {
        "server_error"
    };
    counter!("api_requests_total", "resource" => resource, "result" => result).increment(1);
    response
}

fn resource_label(path: &str) -> &'static str {
    let rest = path.trim_start_matches("/api/admin").trim_start_matches('/');
    match rest.split('/').next() {
        Some("cars") => "cars",
        Some("categories") => "categories",
        Some("branches") => "branches",
        Some("staff") => "staff",
        Some("reports") => "reports",
        _ => "unknown",
    }
}
