//! Error types for notigate.

use std::time::Duration;

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invite error: {0}")]
    Invite(#[from] InviteError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Transport-level errors: network failures and platform API rejections.
///
/// None of these are fatal to the core. The poller backs off and retries,
/// and broadcast paths attribute them to a single recipient.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Platform API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Rate limited by platform, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Invalid response from platform: {0}")]
    InvalidResponse(String),

    #[error("SMTP error: {0}")]
    Smtp(String),
}

/// Invite resolution errors.
#[derive(Debug, thiserror::Error)]
pub enum InviteError {
    /// The code never existed, was already consumed, or expired.
    #[error("Invite code not found or expired: {code}")]
    NotFound { code: String },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
