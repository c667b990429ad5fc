use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use rentdesk_carsxe::CarsxeError;
use rentdesk_core::password::PasswordError;
use rentdesk_core::ValidationError;
use rentdesk_storage::{
    BookingError, BranchError, CarError, CategoryError, PaymentError, UserError,
};

pub type ApiResult = Result<Response, ApiError>;

#[derive(Debug, Serialize)]
struct Success<T> {
    success: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct Failure {
    success: bool,
    error: String,
}

/// `200 { success: true, data }`
pub fn ok<T: Serialize>(data: T) -> Response {
    Json(Success {
        success: true,
        data,
    })
    .into_response()
}

/// `201 { success: true, data }`
pub fn created<T: Serialize>(data: T) -> Response {
    let mut response = ok(data);
    *response.status_mut() = StatusCode::CREATED;
    response
}

/// Error rendered as `{ success: false, error }` with its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// Logs the underlying failure and hides it from the client.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        error!(stage = "app", error = %err, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Failure {
            success: false,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// JSON body extractor whose rejections use the error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooShort => Self::bad_request(err.to_string()),
            PasswordError::Hash(_) => Self::internal(err),
        }
    }
}

impl From<CategoryError> for ApiError {
    fn from(err: CategoryError) -> Self {
        match err {
            CategoryError::NotFound => Self::not_found(err.to_string()),
            CategoryError::DuplicateName | CategoryError::InUse => Self::conflict(err.to_string()),
            CategoryError::Validation(inner) => inner.into(),
            CategoryError::Database(_) => Self::internal(err),
        }
    }
}

impl From<BranchError> for ApiError {
    fn from(err: BranchError) -> Self {
        match err {
            BranchError::NotFound => Self::not_found(err.to_string()),
            BranchError::InUse => Self::conflict(err.to_string()),
            BranchError::Validation(inner) => inner.into(),
            BranchError::Database(_) => Self::internal(err),
        }
    }
}

impl From<CarError> for ApiError {
    fn from(err: CarError) -> Self {
        match err {
            CarError::NotFound => Self::not_found(err.to_string()),
            CarError::UnknownCategory | CarError::UnknownBranch => {
                Self::bad_request(err.to_string())
            }
            CarError::DuplicatePlate | CarError::HasBookings => Self::conflict(err.to_string()),
            CarError::Validation(inner) => inner.into(),
            CarError::Corrupt(_) | CarError::Json(_) | CarError::Database(_) => {
                Self::internal(err)
            }
        }
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => Self::not_found(err.to_string()),
            UserError::DuplicateEmail | UserError::InUse => Self::conflict(err.to_string()),
            UserError::UnknownBranch => Self::bad_request(err.to_string()),
            UserError::Validation(inner) => inner.into(),
            UserError::Corrupt(_) | UserError::Database(_) => Self::internal(err),
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        Self::internal(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        Self::internal(err)
    }
}

impl From<CarsxeError> for ApiError {
    fn from(err: CarsxeError) -> Self {
        let status = err
            .status()
            .filter(|status| status.is_client_error() || status.is_server_error())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        Self::new(status, err.upstream_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};

    async fn body_json(response: Response) -> Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn success_and_failure_envelopes() {
        let response = created(json!({ "name": "SUV" }));
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            body_json(response).await,
            json!({ "success": true, "data": { "name": "SUV" } })
        );

        let response = ApiError::not_found("Car not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({ "success": false, "error": "Car not found" })
        );
    }

    #[test]
    fn storage_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(CarError::DuplicatePlate).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(CarError::UnknownBranch).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(CategoryError::InUse).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(UserError::NotFound).message(),
            "Staff member not found"
        );
        let err = ApiError::from(CarError::Validation(ValidationError::MissingFields(vec![
            "make",
        ])));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Missing required fields");
    }

    #[test]
    fn upstream_errors_keep_error_statuses_only() {
        let err = ApiError::from(CarsxeError::Status {
            status: StatusCode::NOT_FOUND,
            body: r#"{"message":"Plate not found"}"#.to_string(),
        });
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), "Plate not found");

        let err = ApiError::from(CarsxeError::Status {
            status: StatusCode::FOUND,
            body: String::new(),
        });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

        let err = ApiError::from(CarsxeError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "stack trace with internals".to_string(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "Vehicle lookup failed");
    }
}
