// error.rs — Error type for the stencil model and its formatters
//
// Every fallible operation on dimensions, grids, expressions, equations,
// solutions, and formatters reports one of these variants. Failures are
// detected synchronously; the faulting call leaves prior state unchanged.

use std::path::PathBuf;

use thiserror::Error;

use crate::dims::DimKind;

/// Stencil compiler result type.
pub type Result<T> = std::result::Result<T, StencilError>;

#[derive(Debug, Error)]
pub enum StencilError {
    #[error("arity mismatch for '{name}': expected {expected} value(s), got {actual}")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("grid '{name}' already exists in solution '{solution}'")]
    DuplicateName { name: String, solution: String },

    #[error("grid '{name}' is not registered in solution '{solution}'")]
    UnknownGrid { name: String, solution: String },

    #[error("causality violation in '{equation}': {reason}")]
    Causality { equation: String, reason: String },

    #[error("division by zero constant in '{expr}'")]
    DivisionByZero { expr: String },

    #[error("unsupported element width {0} bytes (expected 4 or 8)")]
    UnsupportedWidth(u32),

    #[error("unsupported format '{id}' (available: {available})")]
    UnsupportedTarget { id: String, available: String },

    #[error("index {index} out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid {what} name '{name}': expected [A-Za-z_][A-Za-z0-9_]*")]
    InvalidName { what: &'static str, name: String },

    #[error("invalid dimensions for grid '{grid}': {reason}")]
    InvalidDimensions { grid: String, reason: String },

    #[error("dimension '{name}' is already declared as {existing} (requested {requested})")]
    DimensionConflict {
        name: String,
        existing: DimKind,
        requested: DimKind,
    },

    #[error("format '{0}' is already registered")]
    DuplicateFormat(String),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("manifest serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let e = StencilError::UnsupportedWidth(2);
        assert_eq!(
            e.to_string(),
            "unsupported element width 2 bytes (expected 4 or 8)"
        );

        let e = StencilError::DimensionConflict {
            name: "x".into(),
            existing: DimKind::Domain,
            requested: DimKind::Step,
        };
        assert_eq!(
            e.to_string(),
            "dimension 'x' is already declared as domain (requested step)"
        );

        let e = StencilError::InvalidName {
            what: "grid",
            name: "u-next".into(),
        };
        assert_eq!(
            e.to_string(),
            "invalid grid name 'u-next': expected [A-Za-z_][A-Za-z0-9_]*"
        );
    }
}
