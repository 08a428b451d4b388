use thiserror::Error;

use crate::feed::{Feed, ReplyRoute};

/// Failures inside a platform client. List and delivery calls fold these
/// into their result shapes; only construction and transforms return them.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Missing credential or identifier in the channel config.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx answer. `message` is the platform's own error message when
    /// the body carried one.
    #[error("platform returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response body: {0}")]
    Decode(String),

    /// A native record could not be normalized.
    #[error("malformed record: {0}")]
    Transform(String),

    #[error("{feed:?} is not served by the {platform} client")]
    UnsupportedFeed { feed: Feed, platform: &'static str },

    #[error("{route:?} is not served by the {platform} client")]
    UnsupportedRoute { route: ReplyRoute, platform: &'static str },
}

impl PlatformError {
    pub fn missing(field: &str, platform: &str) -> Self {
        Self::Config(format!("{platform} channel config is missing {field}"))
    }
}

/// A non-blank credential from the channel config, or a configuration error.
pub(crate) fn credential(value: Option<&str>, field: &str, platform: &str) -> Result<String, PlatformError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| PlatformError::missing(field, platform))
}
