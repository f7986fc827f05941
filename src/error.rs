// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core error type for the storage engine and the worker event loop.
//!
//! Per-command protocol outcomes (`NOT_FOUND`, `NOT_STORED`, `EXISTS`, ...)
//! are *not* modeled here — they are ordinary response frames written by
//! [`crate::command::Processor`], not failures of the core. `CacheError`
//! is reserved for conditions the caller cannot recover from locally: a
//! value that will never fit, a connection that has gone away, or an
//! invariant violation.

#[derive(Debug)]
pub enum CacheError {
    // ========================================================================
    // Storage Errors
    // ========================================================================
    /// Value does not fit the fixed slot footprint (`VAL_MAX`).
    ValueTooLarge { len: usize, max: usize },
    /// Key exceeds `KEY_MAX`.
    KeyTooLarge { len: usize, max: usize },
    /// `incr`/`decr` requested on a slot holding a non-integer value.
    TypeMismatch,

    // ========================================================================
    // Connection / I/O Errors
    // ========================================================================
    /// Writing the response frame to the caller's output buffer failed.
    ConnectionClosed,
    /// Underlying I/O error from the transport.
    Io(std::io::Error),

    // ========================================================================
    // Internal Invariant Errors
    // ========================================================================
    /// Forced eviction did not make progress after `MAX_HOPS` displacements.
    /// Should never occur in practice (eviction always frees the final
    /// victim's slot); surfaced so callers can fail loudly instead of
    /// silently corrupting the table.
    StorageFull,
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::ValueTooLarge { len, max } => {
                write!(f, "value too large: {len} bytes (max {max})")
            }
            CacheError::KeyTooLarge { len, max } => {
                write!(f, "key too large: {len} bytes (max {max})")
            }
            CacheError::TypeMismatch => write!(f, "value is not an integer"),
            CacheError::ConnectionClosed => write!(f, "connection closed"),
            CacheError::Io(e) => write!(f, "I/O error: {e}"),
            CacheError::StorageFull => write!(f, "storage full after forced eviction"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        CacheError::Io(e)
    }
}

/// Convenient alias for results using the public [`CacheError`] type.
pub type Result<T> = std::result::Result<T, CacheError>;
