//! Errors surfaced by the public API.

use thiserror::Error;

/// The maximum value length a leaf can store: values must fit in a `u32`.
pub const MAX_VALUE_LEN: usize = u32::MAX as usize;

/// Failure modes for [`crate::Tree::insert`].
///
/// All other preconditions (duplicate key, missing key) are expected
/// outcomes signaled by the boolean/optional return types, not by this
/// error type.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InsertError {
    /// The insert would have pushed `current_memory_use` past the
    /// configured `memory_limit`, or the underlying allocator refused. The
    /// tree is left unchanged; any charge made before the failure is
    /// reversed.
    #[error("insert would exceed the configured memory limit")]
    OutOfMemory,

    /// The value is longer than [`MAX_VALUE_LEN`] bytes.
    #[error("value length {len} exceeds the maximum of {MAX_VALUE_LEN} bytes")]
    ValueTooLong {
        /// The offending value's length.
        len: usize,
    },
}
