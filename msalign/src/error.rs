use thiserror::Error;

/// Errors surfaced by the alignment core.
///
/// Numeric degeneracies (empty candidate sets, zero maxima) never show up
/// here; they fall back to a score of zero where they occur.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AlignError {
    #[error("dimension mismatch in {what}: expected {expected_rows}x{expected_cols}, got {rows}x{cols}")]
    DimensionMismatch {
        what: &'static str,
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("matching method {method} requires a pairwise feature library")]
    MissingLibrary { method: &'static str },

    #[error("matching method {method} produced an invalid matching over {n_master}x{n_incoming} rows")]
    InvalidMatching { method: &'static str, n_master: usize, n_incoming: usize },

    #[error("duplicate row id {0} in table")]
    DuplicateRowId(usize),

    #[error("a row must hold at least one feature")]
    EmptyRow,
}

pub type Result<T> = std::result::Result<T, AlignError>;

impl AlignError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        AlignError::InvalidParameter { name, reason: reason.into() }
    }
}
