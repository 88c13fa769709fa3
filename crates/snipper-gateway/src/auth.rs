use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jiff::Timestamp;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, trace};
use uuid::Uuid;

pub const AUTH_COOKIE: &str = "AuthToken";
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// The opaque identity that owns the short URLs created by one browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserToken(pub String);

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Signs and verifies the `AuthToken` cookie.
///
/// The cookie value is an HS256 JWT whose subject is the user token.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user_token: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let iat = Timestamp::now().as_second();
        let claims = Claims {
            sub: user_token.to_string(),
            iat,
            exp: iat.saturating_add(i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX)),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
    }

    /// Returns the user token carried by a valid, unexpired cookie value.
    pub fn verify(&self, cookie_value: &str) -> Option<String> {
        match decode::<Claims>(cookie_value, &self.decoding_key, &Validation::default()) {
            Ok(data) => Some(data.claims.sub),
            Err(e) => {
                debug!(error = %e, "rejecting auth cookie");
                None
            }
        }
    }
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Attaches a [`UserToken`] to every request.
///
/// A request without a valid cookie gets a fresh token, and the response
/// carries the matching `Set-Cookie`.
pub async fn user_token_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let known = cookie_value(request.headers(), AUTH_COOKIE).and_then(|v| state.tokens.verify(v));

    if let Some(token) = known {
        trace!("request carries a valid auth cookie");
        request.extensions_mut().insert(UserToken(token));
        return next.run(request).await;
    }

    let token = Uuid::new_v4().to_string();
    let signed = match state.tokens.issue(&token) {
        Ok(signed) => signed,
        Err(e) => {
            error!(error = %e, "failed to sign auth cookie");
            return AppError::Internal.into_response();
        }
    };
    debug!("issued a new user token");

    request.extensions_mut().insert(UserToken(token));
    let mut response = next.run(request).await;

    match HeaderValue::from_str(&format!(
        "{AUTH_COOKIE}={signed}; Path=/; HttpOnly; SameSite=Lax"
    )) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => error!(error = %e, "auth cookie is not a valid header value"),
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies() {
        let issuer = TokenIssuer::new("secret", DEFAULT_TOKEN_TTL);

        let signed = issuer.issue("user-1").unwrap();

        assert_eq!(issuer.verify(&signed).as_deref(), Some("user-1"));
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let ours = TokenIssuer::new("secret", DEFAULT_TOKEN_TTL);
        let theirs = TokenIssuer::new("other", DEFAULT_TOKEN_TTL);

        let signed = theirs.issue("user-1").unwrap();

        assert!(ours.verify(&signed).is_none());
        assert!(ours.verify("garbage").is_none());
    }

    #[test]
    fn cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; AuthToken=abc.def.ghi; lang=en"),
        );

        assert_eq!(cookie_value(&headers, AUTH_COOKIE), Some("abc.def.ghi"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }
}
