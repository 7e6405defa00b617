//! Error types for rule registration and rendering.
//!
//! Most malformed input is not an error: unresolved references degrade to
//! literal text, unclosed blocks are closed at end of input, and bad
//! attribute syntax is left in place. The variants here cover the cases
//! where the caller configured the converter inconsistently.

use crate::token::TokenKind;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the converter.
#[derive(Debug, Error)]
pub enum Error {
    /// A token reached render dispatch but no emitter is installed for its kind.
    ///
    /// This means a rule produces a kind nobody renders. It is not
    /// recovered internally.
    #[error("no emitter registered for token kind {kind}")]
    MissingEmitter { kind: TokenKind },

    /// A rule pattern failed to compile.
    #[error("invalid rule pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A rule pattern matches the empty string and would stall the scanner.
    #[error("rule pattern `{pattern}` matches the empty string")]
    EmptyMatch { pattern: String },

    /// A rule tried to produce a kind that only the block engine may create.
    #[error("token kind {kind} is reserved for the block engine")]
    ReservedKind { kind: TokenKind },
}

impl Error {
    pub(crate) fn missing_emitter(kind: &TokenKind) -> Self {
        Error::MissingEmitter { kind: kind.clone() }
    }

    pub(crate) fn invalid_pattern(pattern: &str, source: regex::Error) -> Self {
        Error::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        }
    }

    /// Whether this error comes from registering an extension rather than
    /// from rendering a document.
    pub fn is_registration(&self) -> bool {
        !matches!(self, Error::MissingEmitter { .. })
    }
}
