//! Ring Buffer Configuration

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::RingBufferError;

/// Default record size in bytes
pub const DEFAULT_ELEMENT_SIZE: usize = 32;

/// Default number of slots
pub const DEFAULT_CAPACITY: usize = 64;

/// Prefix for environment overrides, e.g. `RING_BUFFER_CAPACITY=128`
pub const ENV_PREFIX: &str = "RING_BUFFER";

/// Ring buffer geometry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingBufferConfig {
    /// Size of one record (bytes)
    pub element_size: usize,
    /// Maximum number of records held at once
    pub capacity: usize,
}

impl Default for RingBufferConfig {
    fn default() -> Self {
        Self {
            element_size: DEFAULT_ELEMENT_SIZE,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl RingBufferConfig {
    /// Create a config with the given geometry
    pub fn new(element_size: usize, capacity: usize) -> Self {
        Self {
            element_size,
            capacity,
        }
    }

    /// Load from a config file, with `RING_BUFFER_*` environment variables
    /// taking precedence
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RingBufferError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `RING_BUFFER_*` environment variables over the defaults
    pub fn from_env() -> Result<Self, RingBufferError> {
        let settings = Config::builder()
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check the construction rules and return the storage size in bytes
    pub fn validate(&self) -> Result<usize, RingBufferError> {
        storage_len(self.element_size, self.capacity)
    }
}

/// Bytes needed for `capacity` records of `element_size` bytes
pub(crate) fn storage_len(element_size: usize, capacity: usize) -> Result<usize, RingBufferError> {
    if element_size == 0 {
        return Err(RingBufferError::ZeroElementSize);
    }
    if capacity == 0 {
        return Err(RingBufferError::ZeroCapacity);
    }

    // Allocations are capped at isize::MAX bytes
    element_size
        .checked_mul(capacity)
        .filter(|&bytes| bytes <= isize::MAX as usize)
        .ok_or(RingBufferError::SizeOverflow {
            element_size,
            capacity,
        })
}
