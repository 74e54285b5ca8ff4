//! Typed Records over Fixed-Size Slots
//!
//! The buffer stores raw bytes; these helpers let callers impose a record
//! type by encoding it with postcard into a zero-padded slot.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::RecordError;

/// Encode `record` into `slot`, zero-filling the unused tail
pub fn encode_record<T: Serialize>(record: &T, slot: &mut [u8]) -> Result<(), RecordError> {
    slot.fill(0);
    match postcard::to_slice(record, slot) {
        Ok(_) => Ok(()),
        Err(postcard::Error::SerializeBufferFull) => Err(RecordError::RecordTooLarge {
            element_size: slot.len(),
        }),
        Err(err) => Err(RecordError::Encode(err)),
    }
}

/// Decode a record from the start of `slot`; trailing padding is ignored
pub fn decode_record<T: DeserializeOwned>(slot: &[u8]) -> Result<T, RecordError> {
    postcard::from_bytes(slot).map_err(RecordError::Decode)
}
