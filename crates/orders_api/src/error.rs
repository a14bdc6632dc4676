use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use orders_core::ServiceError;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure of one HTTP request.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed path, query or body; the store was never touched.
    BadRequest(String),
    Service(ServiceError),
    /// The handler deadline expired before the store answered.
    Timeout { operation: &'static str },
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Service(ServiceError::Invalid(_)) => StatusCode::BAD_REQUEST,
            Self::Service(err) if err.is_not_found() => StatusCode::NOT_FOUND,
            Self::Service(_) | Self::Timeout { .. } | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(details) => write!(f, "bad request: {details}"),
            Self::Service(err) => write!(f, "{err}"),
            Self::Timeout { operation } => write!(f, "{operation} timed out"),
            Self::Internal(details) => write!(f, "internal error: {details}"),
        }
    }
}

impl Error for ApiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Service(err) => Some(err),
            Self::BadRequest(_) | Self::Timeout { .. } | Self::Internal(_) => None,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(
                "event=http_error module=api status=error code={} error={}",
                status.as_u16(),
                self
            );
            // Store details stay in the log.
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
