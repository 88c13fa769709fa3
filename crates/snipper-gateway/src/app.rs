use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

use crate::auth::user_token_middleware;
use crate::handlers::{
    delete_urls_handler, health_handler, ping_handler, redirect_handler, shorten_batch_handler,
    shorten_json_handler, shorten_text_handler, user_urls_handler,
};
use crate::state::AppState;

pub struct App {}

impl App {
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/", post(shorten_text_handler))
            .route("/{id}", get(redirect_handler))
            .route("/{id}/", get(redirect_handler))
            .route("/ping", get(ping_handler))
            .nest(
                "/api",
                Router::new()
                    .route("/shorten", post(shorten_json_handler))
                    .route("/shorten/batch", post(shorten_batch_handler))
                    .route(
                        "/user/urls",
                        get(user_urls_handler).delete(delete_urls_handler),
                    ),
            )
            // Routes above this line get a user token.
            .route_layer(from_fn_with_state(state.clone(), user_token_middleware))
            .route("/health", get(health_handler))
            .layer(RequestDecompressionLayer::new())
            .layer(CompressionLayer::new())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
