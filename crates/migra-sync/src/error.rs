//! # Sync Error Types
//!
//! Error types for the sync cycle and the CRM source.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Source      │  │        Store            │ │
//! │  │  (startup)      │  │  (SourceError)  │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  Store                  │ │
//! │  │  MissingCred.   │  │  Timeout        │  │  StoreRejected          │ │
//! │  │                 │  │                 │  │  SerializationFailed    │ │
//! │  │  InvalidUrl     │  │  Http{status}   │  │                         │ │
//! │  │  ConfigLoad     │  │  Unauthorized   │  │                         │ │
//! │  │                 │  │  Decode         │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Every error aborts the cycle. Nothing is retried in-process; the      │
//! │  scheduler consults `is_retryable()` and runs the next cycle.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

// =============================================================================
// Source Errors
// =============================================================================

/// Failure talking to the CRM API.
///
/// "No more data" is never an error: it is `SourcePage::has_more == false`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// Could not reach the API (DNS, TCP, TLS).
    #[error("Connection to source failed: {0}")]
    Connection(String),

    /// The request exceeded the client timeout.
    #[error("Source request timed out: {0}")]
    Timeout(String),

    /// Non-success HTTP status other than 401/403.
    #[error("Source returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The access token was rejected.
    #[error("Source rejected credentials (HTTP {0})")]
    Unauthorized(u16),

    /// Response body was not the expected shape.
    #[error("Could not decode source response: {0}")]
    Decode(String),
}

impl SourceError {
    /// Returns true if running the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Connection(_) | SourceError::Timeout(_) => true,
            SourceError::Http { status, .. } => *status == 429 || *status >= 500,
            SourceError::Unauthorized(_) | SourceError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else if err.is_connect() {
            SourceError::Connection(err.to_string())
        } else if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            SourceError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Decode(err.to_string())
    }
}

// =============================================================================
// Sync Errors
// =============================================================================

/// Error covering every way a cycle (or its startup) can fail.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required credential is absent.
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// A configured URL does not parse or has the wrong scheme.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to read or parse the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Cycle Errors
    // =========================================================================
    /// Fetching from the CRM failed.
    #[error("Source fetch failed: {0}")]
    SourceFetch(#[from] SourceError),

    /// Reading or writing the destination store failed.
    #[error("Store error: {0}")]
    Store(String),

    /// The store refused or could not interpret the data itself.
    ///
    /// ## When This Occurs
    /// - A stored document is not a JSON object
    /// - A batch contained a lead without a usable key
    /// - The schema migration does not apply
    #[error("Store rejected data: {0}")]
    StoreRejected(String),

    /// A record or payload could not be serialized.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// The completion notification could not be delivered.
    #[error("Notification failed: {0}")]
    NotificationFailed(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<migra_db::DbError> for SyncError {
    fn from(err: migra_db::DbError) -> Self {
        if err.is_transient() {
            SyncError::Store(err.to_string())
        } else {
            SyncError::StoreRejected(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if the next scheduled cycle may succeed without operator
    /// intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::SourceFetch(source) => source.is_transient(),
            SyncError::Store(_) => true,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::MissingCredential(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
        )
    }
}
