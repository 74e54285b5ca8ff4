//! Ring Buffer Error Types

use thiserror::Error;

/// Errors that prevent a ring buffer from being constructed
#[derive(Debug, Error)]
pub enum RingBufferError {
    /// Records must be at least one byte
    #[error("Element size must be greater than zero")]
    ZeroElementSize,

    /// Buffer must hold at least one record
    #[error("Capacity must be greater than zero")]
    ZeroCapacity,

    /// `element_size * capacity` does not fit in the address space
    #[error("Storage size overflows: {element_size} bytes x {capacity} elements")]
    SizeOverflow { element_size: usize, capacity: usize },

    /// Allocator could not provide the storage region
    #[error("Failed to allocate {bytes} bytes of storage")]
    AllocationFailed { bytes: usize },

    /// Caller-supplied storage is not exactly the required size
    #[error("Storage size mismatch: expected {expected} bytes, got {actual}")]
    StorageSizeMismatch { expected: usize, actual: usize },

    /// Configuration could not be read or deserialized
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Errors while moving typed records in and out of slots
#[derive(Debug, Error)]
pub enum RecordError {
    /// Encoded record is larger than one slot
    #[error("Encoded record does not fit in a {element_size}-byte slot")]
    RecordTooLarge { element_size: usize },

    #[error("Record encoding failed: {0}")]
    Encode(postcard::Error),

    #[error("Record decoding failed: {0}")]
    Decode(postcard::Error),
}
