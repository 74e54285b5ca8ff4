//! Fixed-Capacity Ring Buffer Implementation

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};
use std::slice;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{RecordError, RingBufferError};
use crate::record::{decode_record, encode_record};
use crate::section::{CriticalSection, NoopSection};
use crate::settings::{storage_len, RingBufferConfig};

/// Write position and occupancy. The tail is derived, never stored.
#[derive(Debug, Default)]
struct Cursor {
    /// Slot the next insert writes to
    head: usize,
    /// Occupied slots
    count: usize,
}

impl Cursor {
    /// Slot holding the oldest record
    fn tail(&self, capacity: usize) -> usize {
        (self.head + capacity - self.count) % capacity
    }
}

/// Fixed-capacity FIFO of fixed-size binary records.
///
/// Storage is one contiguous region of `element_size * capacity` bytes,
/// either allocated and owned by the buffer ([`new`](Self::new),
/// [`with_section`](Self::with_section)) or borrowed from the caller for
/// `'a` ([`from_storage`](Self::from_storage)). It is never reallocated.
///
/// Inserting into a full buffer is rejected; the oldest record is never
/// evicted. Every cursor update runs inside the `C` critical section.
pub struct RingBuffer<'a, C: CriticalSection = NoopSection> {
    /// Start of the storage region
    storage: NonNull<u8>,
    /// Size of one record (bytes)
    element_size: usize,
    /// Number of slots
    capacity: usize,
    /// Whether `storage` came from `Box::into_raw` and must be freed
    owned: bool,
    cursor: UnsafeCell<Cursor>,
    section: C,
    _storage: PhantomData<&'a mut [u8]>,
}

impl RingBuffer<'static, NoopSection> {
    /// Allocate a buffer with no critical section.
    ///
    /// Safe only while producer and consumer never overlap in time; use
    /// [`with_section`](Self::with_section) otherwise.
    pub fn new(element_size: usize, capacity: usize) -> Result<Self, RingBufferError> {
        Self::with_section(element_size, capacity, NoopSection::new())
    }

    /// Allocate a buffer sized by `config`, with no critical section
    pub fn from_config(config: &RingBufferConfig) -> Result<Self, RingBufferError> {
        Self::new(config.element_size, config.capacity)
    }
}

impl<C: CriticalSection> RingBuffer<'static, C> {
    /// Allocate a zero-filled, buffer-owned region and guard it with `section`
    pub fn with_section(
        element_size: usize,
        capacity: usize,
        section: C,
    ) -> Result<Self, RingBufferError> {
        let bytes = storage_len(element_size, capacity).inspect_err(|e| {
            warn!("Ring buffer construction failed: {}", e);
        })?;

        let mut region = Vec::new();
        if region.try_reserve_exact(bytes).is_err() {
            warn!("Ring buffer could not allocate {} bytes", bytes);
            return Err(RingBufferError::AllocationFailed { bytes });
        }
        region.resize(bytes, 0u8);

        let region = Box::into_raw(region.into_boxed_slice());
        // SAFETY: Box::into_raw never returns null
        let storage = unsafe { NonNull::new_unchecked(region.cast::<u8>()) };

        Ok(Self::assemble(storage, element_size, capacity, true, section))
    }

    /// Allocate a buffer sized by `config` and guard it with `section`
    pub fn with_section_from_config(
        config: &RingBufferConfig,
        section: C,
    ) -> Result<Self, RingBufferError> {
        Self::with_section(config.element_size, config.capacity, section)
    }
}

impl<'a, C: CriticalSection> RingBuffer<'a, C> {
    /// Build a buffer over caller-supplied storage.
    ///
    /// `storage` must be exactly `element_size * capacity` bytes. It is
    /// zero-filled, borrowed for `'a`, and never freed by the buffer.
    pub fn from_storage(
        storage: &'a mut [u8],
        element_size: usize,
        capacity: usize,
        section: C,
    ) -> Result<Self, RingBufferError> {
        let expected = storage_len(element_size, capacity).inspect_err(|e| {
            warn!("Ring buffer construction failed: {}", e);
        })?;
        if storage.len() != expected {
            warn!(
                "Ring buffer storage is {} bytes, expected {}",
                storage.len(),
                expected
            );
            return Err(RingBufferError::StorageSizeMismatch {
                expected,
                actual: storage.len(),
            });
        }

        storage.fill(0);
        let storage = NonNull::from(storage).cast::<u8>();

        Ok(Self::assemble(storage, element_size, capacity, false, section))
    }

    fn assemble(
        storage: NonNull<u8>,
        element_size: usize,
        capacity: usize,
        owned: bool,
        section: C,
    ) -> Self {
        debug!(
            "Creating ring buffer: element_size={}, capacity={}, owned={}, section={}",
            element_size,
            capacity,
            owned,
            std::any::type_name::<C>()
        );
        if !C::EXCLUSIVE {
            warn!(
                "Ring buffer uses a non-exclusive critical section; producer and consumer must never overlap in time"
            );
        }

        Self {
            storage,
            element_size,
            capacity,
            owned,
            cursor: UnsafeCell::new(Cursor::default()),
            section,
            _storage: PhantomData,
        }
    }

    /// Size of one record (bytes)
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Maximum number of records
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of records currently held
    pub fn len(&self) -> usize {
        self.critical(|cursor| cursor.count)
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.critical(|cursor| cursor.count == 0)
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.critical(|cursor| cursor.count == self.capacity)
    }

    /// Copy `record` in as the newest element.
    ///
    /// Returns `false` without touching the buffer when it is full.
    ///
    /// # Panics
    ///
    /// If `record.len()` differs from the element size.
    pub fn insert(&mut self, record: &[u8]) -> bool {
        self.push(record)
    }

    /// Borrow the record `index` places after the oldest one.
    ///
    /// Returns `None` when `index >= len()`.
    pub fn peek(&self, index: usize) -> Option<&[u8]> {
        self.peek_slot(index)
    }

    /// Move the oldest record into the first `element_size` bytes of
    /// `destination`.
    ///
    /// Returns `false` and leaves `destination` untouched when empty.
    ///
    /// # Panics
    ///
    /// If `destination` is shorter than the element size.
    pub fn remove_oldest(&mut self, destination: &mut [u8]) -> bool {
        self.pop(destination)
    }

    /// Encode `record` into the next slot; `Ok(false)` when full
    pub fn insert_record<T: Serialize>(&mut self, record: &T) -> Result<bool, RecordError> {
        self.push_record(record)
    }

    /// Decode the record `index` places after the oldest one without removing it
    pub fn peek_record<T: DeserializeOwned>(&self, index: usize) -> Result<Option<T>, RecordError> {
        self.peek_slot(index).map(decode_record).transpose()
    }

    /// Decode and remove the oldest record; `Ok(None)` when empty.
    ///
    /// A record that fails to decode stays in the buffer.
    pub fn remove_record<T: DeserializeOwned>(&mut self) -> Result<Option<T>, RecordError> {
        self.pop_record()
    }

    /// Hand out the single producer and the single consumer
    pub fn split(&mut self) -> (Producer<'_, 'a, C>, Consumer<'_, 'a, C>) {
        let buffer = &*self;
        (Producer { buffer }, Consumer { buffer })
    }

    /// Release the buffer and, if owned, its storage
    pub fn destroy(self) {
        drop(self);
    }

    /// Run `f` on the cursor inside the critical section.
    ///
    /// `f` must be crate code that never calls back out; record encoding
    /// and decoding run outside the section.
    fn critical<R>(&self, f: impl FnOnce(&mut Cursor) -> R) -> R {
        let _guard = self.section.lock();
        // SAFETY: the cursor is only reached here, inside the section, and
        // every `f` passed in is a plain cursor update that cannot re-enter
        f(unsafe { &mut *self.cursor.get() })
    }

    /// Pointer to the first byte of slot `index`
    fn slot_ptr(&self, index: usize) -> *mut u8 {
        debug_assert!(index < self.capacity);
        // SAFETY: index < capacity keeps the offset inside the region
        unsafe { self.storage.as_ptr().add(index * self.element_size) }
    }

    /// Let `fill` write the head slot and commit it if `fill` succeeds.
    /// Returns `Ok(false)` when full.
    ///
    /// `fill` runs outside the section, so it may call back into the
    /// consumer without deadlocking or aliasing the cursor.
    fn push_with<E>(&self, fill: impl FnOnce(&mut [u8]) -> Result<(), E>) -> Result<bool, E> {
        let head = self.critical(|cursor| (cursor.count < self.capacity).then_some(cursor.head));
        let Some(head) = head else {
            return Ok(false);
        };

        // SAFETY: the head slot is unoccupied. Only the producer, which holds
        // `&mut` for this call, writes or moves the head; the consumer only
        // frees occupied slots, so nothing else reads or writes this one.
        let slot = unsafe { slice::from_raw_parts_mut(self.slot_ptr(head), self.element_size) };
        fill(slot)?;

        // The consumer can only have shrunk `count` meanwhile, and never
        // moves `head`, so the slot is still the next free one
        self.critical(|cursor| {
            debug_assert_eq!(cursor.head, head);
            cursor.head = (head + 1) % self.capacity;
            cursor.count += 1;
        });
        Ok(true)
    }

    /// Let `take` read the tail slot and release it if `take` succeeds.
    /// Returns `Ok(None)` when empty.
    ///
    /// `take` runs outside the section, like `fill` in `push_with`.
    fn pop_with<R, E>(&self, take: impl FnOnce(&[u8]) -> Result<R, E>) -> Result<Option<R>, E> {
        let tail = self.critical(|cursor| (cursor.count > 0).then(|| cursor.tail(self.capacity)));
        let Some(tail) = tail else {
            return Ok(None);
        };

        // SAFETY: the tail slot stays occupied until the commit below; the
        // producer never writes occupied slots and only the consumer, which
        // holds `&mut` for this call, frees them
        let slot = unsafe { slice::from_raw_parts(self.slot_ptr(tail), self.element_size) };
        let value = take(slot)?;

        // Inserts meanwhile advance `head` and `count` together, leaving the
        // tail where it was
        self.critical(|cursor| {
            debug_assert_eq!(cursor.tail(self.capacity), tail);
            cursor.count -= 1;
        });
        Ok(Some(value))
    }

    fn push(&self, record: &[u8]) -> bool {
        assert_eq!(
            record.len(),
            self.element_size,
            "record length must equal the element size"
        );
        self.critical(|cursor| {
            if cursor.count == self.capacity {
                return false;
            }

            // SAFETY: the head slot is unoccupied, so no peeked record
            // aliases it, and only the producer writes there
            let slot = unsafe { slice::from_raw_parts_mut(self.slot_ptr(cursor.head), self.element_size) };
            slot.copy_from_slice(record);

            cursor.head = (cursor.head + 1) % self.capacity;
            cursor.count += 1;
            true
        })
    }

    fn pop(&self, destination: &mut [u8]) -> bool {
        assert!(
            destination.len() >= self.element_size,
            "destination must hold at least one element"
        );
        self.critical(|cursor| {
            if cursor.count == 0 {
                return false;
            }

            // SAFETY: the tail slot is occupied and the producer never
            // writes occupied slots
            let slot = unsafe { slice::from_raw_parts(self.slot_ptr(cursor.tail(self.capacity)), self.element_size) };
            destination[..self.element_size].copy_from_slice(slot);

            cursor.count -= 1;
            true
        })
    }

    fn peek_slot(&self, index: usize) -> Option<&[u8]> {
        let slot = self.critical(|cursor| {
            (index < cursor.count).then(|| (cursor.tail(self.capacity) + index) % self.capacity)
        })?;
        // SAFETY: the slot is occupied; only the consumer frees slots, and
        // every public signature ties the returned borrow to a shared borrow
        // that blocks removal
        Some(unsafe { slice::from_raw_parts(self.slot_ptr(slot), self.element_size) })
    }

    fn push_record<T: Serialize>(&self, record: &T) -> Result<bool, RecordError> {
        self.push_with(|slot| encode_record(record, slot))
    }

    fn pop_record<T: DeserializeOwned>(&self) -> Result<Option<T>, RecordError> {
        self.pop_with(decode_record)
    }
}

impl<C: CriticalSection> Drop for RingBuffer<'_, C> {
    fn drop(&mut self) {
        if self.owned {
            let bytes = self.element_size * self.capacity;
            let region = ptr::slice_from_raw_parts_mut(self.storage.as_ptr(), bytes);
            // SAFETY: the region came from Box::into_raw with exactly this
            // length and drop runs once
            drop(unsafe { Box::from_raw(region) });
            debug!("Released {} bytes of ring buffer storage", bytes);
        }
    }
}

impl<C: CriticalSection> std::fmt::Debug for RingBuffer<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("element_size", &self.element_size)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("owned", &self.owned)
            .finish()
    }
}

// SAFETY: storage is either owned or exclusively borrowed for 'a, so moving
// the buffer moves sole access to it
unsafe impl<C: CriticalSection + Send> Send for RingBuffer<'_, C> {}

// SAFETY: cursor and slot accesses happen inside the section, which excludes
// other threads whenever C is Sync (see `CriticalSection`). Peeked slots are
// occupied and never written by the producer.
unsafe impl<C: CriticalSection + Sync> Sync for RingBuffer<'_, C> {}

/// Insert side of a split buffer. Only one exists per split.
pub struct Producer<'b, 'a, C: CriticalSection = NoopSection> {
    buffer: &'b RingBuffer<'a, C>,
}

impl<C: CriticalSection> Producer<'_, '_, C> {
    /// See [`RingBuffer::insert`]
    pub fn insert(&mut self, record: &[u8]) -> bool {
        self.buffer.push(record)
    }

    /// See [`RingBuffer::insert_record`]
    pub fn insert_record<T: Serialize>(&mut self, record: &T) -> Result<bool, RecordError> {
        self.buffer.push_record(record)
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.buffer.is_full()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of records currently held
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Maximum number of records
    pub fn capacity(&self) -> usize {
        self.buffer.capacity
    }

    /// Size of one record (bytes)
    pub fn element_size(&self) -> usize {
        self.buffer.element_size
    }
}

/// Remove side of a split buffer. Only one exists per split.
pub struct Consumer<'b, 'a, C: CriticalSection = NoopSection> {
    buffer: &'b RingBuffer<'a, C>,
}

impl<C: CriticalSection> Consumer<'_, '_, C> {
    /// See [`RingBuffer::peek`]. The borrow ends before the next removal.
    pub fn peek(&self, index: usize) -> Option<&[u8]> {
        self.buffer.peek_slot(index)
    }

    /// See [`RingBuffer::remove_oldest`]
    pub fn remove_oldest(&mut self, destination: &mut [u8]) -> bool {
        self.buffer.pop(destination)
    }

    /// See [`RingBuffer::peek_record`]
    pub fn peek_record<T: DeserializeOwned>(&self, index: usize) -> Result<Option<T>, RecordError> {
        self.buffer.peek_slot(index).map(decode_record).transpose()
    }

    /// See [`RingBuffer::remove_record`]
    pub fn remove_record<T: DeserializeOwned>(&mut self) -> Result<Option<T>, RecordError> {
        self.buffer.pop_record()
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.buffer.is_full()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of records currently held
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Maximum number of records
    pub fn capacity(&self) -> usize {
        self.buffer.capacity
    }

    /// Size of one record (bytes)
    pub fn element_size(&self) -> usize {
        self.buffer.element_size
    }
}
