//! Runtime errors.
//!
//! Only programmer-facing contract violations live here; structural content
//! problems (missing nodes, unknown tags, bad attributes) are recovered
//! locally as inline error results so a bad node degrades gracefully instead
//! of blanking the document.

use thiserror::Error;

/// Runtime result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Runtime errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A reference string that violates the reference syntax.
    #[error("malformed reference '{reference}': {reason}")]
    MalformedReference {
        /// The offending reference string
        reference: String,
        /// What is wrong with it
        reason: String,
    },

    /// Parent-relative references (`../foo`) are reserved syntax with no
    /// assigned semantics yet.
    #[error("unsupported reference '{reference}': parent-relative references are reserved")]
    UnsupportedReference {
        /// The offending reference string
        reference: String,
    },
}
