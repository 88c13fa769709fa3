use serde::{Deserialize, Serialize};
use snipper_core::UrlRecord;

#[derive(Deserialize)]
pub struct ShortenRequest {
    pub url: String,
}

#[derive(Serialize)]
pub struct ShortenResponse {
    pub result: String,
}

#[derive(Serialize)]
pub struct UserUrlResponse {
    pub short_url: String,
    pub original_url: String,
}

impl From<UrlRecord> for UserUrlResponse {
    fn from(record: UrlRecord) -> Self {
        Self {
            short_url: record.short_url,
            original_url: record.original_url,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
