//! Error types for the cache library
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Errors raised while constructing a cache.
///
/// Runtime operations never fail: absence is reported through `Option` or
/// `bool` return values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Capacity must be strictly positive
    #[error("invalid cache size ({0}), must be bigger than zero")]
    InvalidSize(usize),
}

// == Result Type Alias ==
/// Convenience Result type for the cache library.
pub type Result<T> = std::result::Result<T, CacheError>;
