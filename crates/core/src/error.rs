//! Error types for controller operations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Rejection returned by a controller operation.
///
/// Every failure here is a synchronous local rejection: when one of these
/// comes back, nothing was mutated and no command was broadcast. Stale
/// replies and lost endpoints are not errors at all; the controller absorbs
/// them silently.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The operation's guard failed against the current phase or owner.
    #[error("invalid session state: {0}")]
    InvalidState(&'static str),

    /// A category filter named both an inclusion and an exclusion set.
    #[error("included and excluded categories are mutually exclusive")]
    InvalidFilter,
}
