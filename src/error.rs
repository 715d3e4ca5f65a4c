//! Error types for the simulation boundary.
//!
//! The tick pipeline itself never fails; these errors only surface from
//! configuration loading, unit creation and order issuing.

use crate::components::UnitId;
use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for the simulation API.
#[derive(Debug, Error)]
pub enum SimError {
    /// Configuration rejected by validation.
    #[error("Invalid simulation config: {0}")]
    InvalidConfig(String),

    /// Unit configuration rejected at creation time.
    #[error("Invalid unit config: {reason}")]
    InvalidUnit {
        /// Which constraint was violated.
        reason: String,
    },

    /// An order or query referenced a unit that does not exist.
    #[error("Unknown unit: {0:?}")]
    UnknownUnit(UnitId),

    /// JSON (de)serialization failure.
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),
}
