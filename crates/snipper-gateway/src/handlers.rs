mod health;
mod url;

pub use health::health_handler;
pub use url::{
    delete_urls_handler, ping_handler, redirect_handler, shorten_batch_handler,
    shorten_json_handler, shorten_text_handler, user_urls_handler,
};
