// Middleware modules
pub mod api_key;
pub mod logging;

pub use api_key::{api_key_middleware, hash_api_key, API_KEY_HEADER};
pub use logging::logging_middleware;
