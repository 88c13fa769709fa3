//! HTTP surface of the Snipper URL shortener.

pub mod app;
pub mod auth;
pub mod cli;
pub mod error;
pub mod handlers;
pub mod model;
pub mod state;

pub use app::App;
pub use auth::{TokenIssuer, UserToken};
pub use state::AppState;
