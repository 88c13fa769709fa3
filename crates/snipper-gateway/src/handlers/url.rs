use crate::auth::UserToken;
use crate::error::{AppError, Result};
use crate::model::{ShortenRequest, ShortenResponse, UserUrlResponse};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use snipper_core::{BatchItem, ShortCode, ShortenerError};
use tracing::{debug, error, warn};

/// `POST /` with the URL as a plain-text body.
pub async fn shorten_text_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserToken>,
    body: String,
) -> Result<Response> {
    let original_url = body.trim();
    if original_url.is_empty() {
        return Err(AppError::EmptyBody);
    }

    let short_url = state.shortener.save_data(&user.0, original_url).await?;
    Ok((StatusCode::CREATED, short_url).into_response())
}

/// `POST /api/shorten` with `{"url": ...}`.
pub async fn shorten_json_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserToken>,
    payload: std::result::Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload?;
    match state.shortener.save_data(&user.0, request.url.trim()).await {
        Ok(short_url) => Ok((
            StatusCode::CREATED,
            Json(ShortenResponse { result: short_url }),
        )
            .into_response()),
        Err(ShortenerError::Duplicate(short_url)) => Ok((
            StatusCode::CONFLICT,
            Json(ShortenResponse { result: short_url }),
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}

/// `POST /api/shorten/batch`.
pub async fn shorten_batch_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserToken>,
    payload: std::result::Result<Json<Vec<BatchItem>>, JsonRejection>,
) -> Result<Response> {
    let Json(items) = payload?;
    if items.is_empty() {
        return Err(AppError::BadRequest("batch is empty".to_string()));
    }

    let results = state.shortener.save_data_batch(&user.0, items).await?;
    Ok((StatusCode::CREATED, Json(results)).into_response())
}

/// `GET /{id}/` redirects to the original URL.
pub async fn redirect_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let short_url = state.shortener.short_url_for(&ShortCode::new_unchecked(id));
    let record = state.shortener.get_original_url(&short_url).await?;

    if record.deleted {
        debug!(short_url = %short_url, "short url is tombstoned");
        return Err(AppError::Gone);
    }

    let location = HeaderValue::from_str(&record.original_url).map_err(|e| {
        error!(short_url = %short_url, error = %e, "stored url is not a valid location");
        AppError::Internal
    })?;
    Ok((StatusCode::TEMPORARY_REDIRECT, [(LOCATION, location)]).into_response())
}

/// `GET /api/user/urls` lists what the caller has shortened.
pub async fn user_urls_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserToken>,
) -> Result<Response> {
    let records = state.shortener.get_user_urls(&user.0).await?;
    if records.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<UserUrlResponse> = records.into_iter().map(UserUrlResponse::from).collect();
    Ok(Json(body).into_response())
}

/// `DELETE /api/user/urls` with a JSON array of bare identifiers.
///
/// Answers before the deletion reaches storage.
pub async fn delete_urls_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Vec<String>>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(ids) = payload?;
    state.shortener.delete_urls(ids)?;
    Ok(StatusCode::ACCEPTED)
}

/// `GET /ping` checks that storage answers.
pub async fn ping_handler(State(state): State<AppState>) -> StatusCode {
    match state.shortener.ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            warn!(error = %e, "storage ping failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
