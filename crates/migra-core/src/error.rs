//! # Error Types
//!
//! Domain-specific error types for migra-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  migra-core errors (this file)                                         │
//! │  └── CoreError        - Malformed documents                            │
//! │                                                                         │
//! │  migra-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  migra-sync errors (separate crate)                                    │
//! │  ├── SourceError      - CRM fetch failures                             │
//! │  └── SyncError        - What the scheduler sees                        │
//! │                                                                         │
//! │  Flow: CoreError → DbError → SyncError → scheduler                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Discrepancies are NOT errors. A validation run that finds mismatches
//! succeeds and returns them as data.

use thiserror::Error;

/// Core data contract errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A document could not be interpreted as a record.
    ///
    /// ## When This Occurs
    /// - The CRM returned a non-object entry inside `data`
    /// - A stored document was corrupted outside of Migra
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// A tag string does not name a known variant.
    #[error("Unknown {kind}: '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
