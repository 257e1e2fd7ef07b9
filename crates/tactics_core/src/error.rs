//! Error types for the tactics engine.

use thiserror::Error;

/// Result type alias using [`TacticsError`].
pub type Result<T> = std::result::Result<T, TacticsError>;

/// Top-level error type for the tactics engine.
///
/// The numerical core has no recoverable failure modes of its own; these
/// variants cover caller contract violations and configuration problems.
#[derive(Debug, Error)]
pub enum TacticsError {
    /// Two grids that must share a shape do not.
    #[error("Grid dimensions mismatch: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        /// Dimensions the caller was bound to.
        expected: (u32, u32),
        /// Dimensions actually supplied.
        found: (u32, u32),
    },

    /// A grid was built from a buffer of the wrong length.
    #[error("Grid buffer holds {found} cells, {width}x{height} needs {expected}")]
    BufferLength {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// Cells required by the dimensions.
        expected: usize,
        /// Cells actually supplied.
        found: usize,
    },

    /// A grid was requested with a zero dimension.
    #[error("Grid dimensions must be positive, got {width}x{height}")]
    EmptyGrid {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// A configuration value is out of its valid range.
    #[error("Invalid tactics config: {0}")]
    InvalidConfig(String),

    /// Failed to parse a RON configuration document.
    #[error("Failed to parse tactics config: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),
}
