//! Fixed-Capacity Ring Buffer
//!
//! Provides a type-erased SPSC ring buffer for fixed-size binary records.
//! Storage is sized once at construction, full buffers reject inserts, and
//! every cursor update runs inside a pluggable critical section so an
//! interrupt-context producer can feed a main-loop consumer.

mod buffer;
mod error;
mod record;
mod section;
mod settings;

pub use buffer::{Consumer, Producer, RingBuffer};
pub use error::{RecordError, RingBufferError};
pub use record::{decode_record, encode_record};
pub use section::{CriticalSection, FnSection, NoopSection, SectionGuard, SpinSection};
pub use settings::{RingBufferConfig, DEFAULT_CAPACITY, DEFAULT_ELEMENT_SIZE, ENV_PREFIX};
