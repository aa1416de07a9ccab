//! Configuration, paths and logging setup for the Campus client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, TokenExpiryMode, DEFAULT_API_BASE_URL, DEFAULT_LOG_LEVEL,
    DEFAULT_USAGE_LIMIT_THRESHOLD, DEFAULT_USER_AGENT,
};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
