use crate::auth::TokenIssuer;
use snipper_core::Shortener;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub shortener: Arc<dyn Shortener>,
    pub tokens: Arc<TokenIssuer>,
}

impl AppState {
    pub fn new(shortener: Arc<dyn Shortener>, tokens: TokenIssuer) -> Self {
        Self {
            shortener,
            tokens: Arc::new(tokens),
        }
    }
}
