use crate::error::{CoreError, Result};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt::Display;

/// Number of base64url characters kept from the digest.
pub const ID_LENGTH: usize = 8;

/// The bare identifier part of a short URL.
///
/// Identifiers are derived from the original URL, so shortening the same
/// URL twice always yields the same code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShortCode(String);

impl ShortCode {
    /// Derives the identifier for `original_url`: the SHA-1 digest,
    /// base64url-encoded, truncated to [`ID_LENGTH`] characters.
    pub fn from_url(original_url: &str) -> Self {
        let digest = Sha1::digest(original_url.as_bytes());
        let encoded = URL_SAFE.encode(digest);
        Self(encoded[..ID_LENGTH].to_string())
    }

    /// Wraps an identifier without checking it.
    ///
    /// Use this for identifiers taken from request paths or storage, where
    /// an unknown value simply fails the lookup.
    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Recovers the identifier from a full short URL such as
    /// `http://localhost:8080/tVnH7dP7/`.
    pub fn from_short_url(short_url: &str) -> Result<Self> {
        let parsed = url::Url::parse(short_url)
            .map_err(|e| CoreError::InvalidShortUrl(format!("{short_url}: {e}")))?;
        let id = parsed.path().trim_matches('/');
        if id.is_empty() {
            return Err(CoreError::InvalidShortUrl(format!(
                "no identifier in path: {short_url}"
            )));
        }
        Ok(Self(id.to_string()))
    }

    /// Builds the full short URL, `{host}/{id}/`.
    pub fn to_url(&self, host_url: &str) -> String {
        format!("{}/{}/", host_url.trim_end_matches('/'), self)
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
