use crate::model::ErrorResponse;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use snipper_core::ShortenerError;
use tracing::debug;

pub type Result<T> = std::result::Result<T, AppError>;

/// Errors returned by handlers.
///
/// Infrastructure failures collapse into [`AppError::Internal`]. The
/// shortener has already logged their detail, which is never sent to the
/// client.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    EmptyBody,
    /// The URL was shortened before; carries the existing short URL.
    Conflict(String),
    NotFound,
    Gone,
    ShuttingDown,
    Internal,
}

impl From<ShortenerError> for AppError {
    fn from(value: ShortenerError) -> Self {
        match value {
            ShortenerError::InvalidUrl(message) => Self::BadRequest(message),
            ShortenerError::Duplicate(short_url) => Self::Conflict(short_url),
            ShortenerError::NotFound(_) => Self::NotFound,
            ShortenerError::ShuttingDown => Self::ShuttingDown,
            ShortenerError::Timeout(_) | ShortenerError::Storage(_) => Self::Internal,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(error = %rejection, "rejecting json body");
        let message = match rejection {
            JsonRejection::MissingJsonContentType(_) => "expected an application/json body",
            JsonRejection::JsonSyntaxError(_) => "request body is not valid JSON",
            JsonRejection::JsonDataError(_) => "request body does not have the expected fields",
            _ => "request body could not be read",
        };
        Self::BadRequest(message.to_string())
    }
}

fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(message) => json_error(StatusCode::BAD_REQUEST, message),
            AppError::EmptyBody => {
                json_error(StatusCode::UNPROCESSABLE_ENTITY, "request body is empty")
            }
            AppError::Conflict(short_url) => (StatusCode::CONFLICT, short_url).into_response(),
            AppError::NotFound => json_error(StatusCode::NOT_FOUND, "short url not found"),
            AppError::Gone => json_error(StatusCode::GONE, "short url has been deleted"),
            AppError::ShuttingDown => {
                json_error(StatusCode::SERVICE_UNAVAILABLE, "service is shutting down")
            }
            AppError::Internal => {
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}
