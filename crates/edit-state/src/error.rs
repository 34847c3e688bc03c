//! Engine error taxonomy.
//!
//! Only caller-visible failures live here. Race conditions (snapshot ancestry violations,
//! superseded analysis generations) are deliberately *not* errors: they resolve internally
//! to empty/best-effort results and the next scheduled analysis converges.

use thiserror::Error;

/// Errors reported to the caller of the document-facing API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A replace request addressed bytes outside the current buffer, or bytes that do not
    /// fall on a character boundary. The document is left unchanged.
    #[error("invalid range: offset {offset} + length {length} exceeds buffer of {buffer_len} bytes")]
    InvalidRange {
        /// Requested byte offset.
        offset: usize,
        /// Requested removed length.
        length: usize,
        /// Buffer length at the time of the request.
        buffer_len: usize,
    },
    /// A placeholder expansion request did not cover a whole placeholder token.
    #[error("invalid placeholder length {0}")]
    InvalidPlaceholder(usize),
    /// No document is open under the given path.
    #[error("no open document for path `{0}`")]
    MissingDocument(String),
    /// The front end reported a failure for an analysis request. Cached semantic state is
    /// left untouched when this happens.
    #[error("semantic analysis failed: {0}")]
    AnalysisFailed(String),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
