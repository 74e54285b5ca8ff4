//! Critical Section Strategies
//!
//! Every read-modify-write of the buffer's cursor and slots runs inside a
//! scoped critical section. The strategy is a type parameter of the buffer so
//! the platform decides what "exclusive" means: masking interrupts on a
//! single-core MCU, spinning on a flag on a hosted multi-core target, or
//! nothing at all on a strictly cooperative host.

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

/// Platform critical-section primitive.
///
/// # Safety
///
/// Between a call to [`enter`](CriticalSection::enter) and the matching
/// [`exit`](CriticalSection::exit), no other context may be inside the same
/// section, and writes made inside must be visible to the next context that
/// enters. If the implementing type is `Sync`, this exclusion must hold
/// across threads. A type that cannot provide it must not be `Sync` and must
/// set [`EXCLUSIVE`](CriticalSection::EXCLUSIVE) to `false`.
pub unsafe trait CriticalSection {
    /// Whether the section actually excludes the other role
    const EXCLUSIVE: bool = true;

    /// Enter the section, blocking the competing context
    fn enter(&self);

    /// Leave the section.
    ///
    /// # Safety
    ///
    /// Must only be called by the context that last called `enter` and has
    /// not exited since.
    unsafe fn exit(&self);

    /// Enter the section for the lifetime of the returned guard
    fn lock(&self) -> SectionGuard<'_, Self>
    where
        Self: Sized,
    {
        self.enter();
        SectionGuard { section: self }
    }
}

/// Scoped critical section; exits on drop
#[must_use = "the critical section is left as soon as the guard is dropped"]
pub struct SectionGuard<'s, C: CriticalSection> {
    section: &'s C,
}

impl<C: CriticalSection> Drop for SectionGuard<'_, C> {
    fn drop(&mut self) {
        // SAFETY: the guard is only built by `lock`, right after `enter`
        unsafe { self.section.exit() }
    }
}

/// Section that excludes nothing.
///
/// Only sound when producer and consumer never overlap in time. It is not
/// `Sync`, so a buffer using it cannot be shared between threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSection {
    _not_sync: PhantomData<Cell<()>>,
}

impl NoopSection {
    /// Create a no-op section
    pub const fn new() -> Self {
        Self {
            _not_sync: PhantomData,
        }
    }
}

// SAFETY: `NoopSection` is `!Sync` and reports itself as non-exclusive
unsafe impl CriticalSection for NoopSection {
    const EXCLUSIVE: bool = false;

    #[inline]
    fn enter(&self) {}

    #[inline]
    unsafe fn exit(&self) {}
}

/// Spin lock section for hosted targets where producer and consumer run on
/// separate threads
#[derive(Debug, Default)]
pub struct SpinSection {
    locked: AtomicBool,
}

impl SpinSection {
    /// Create an unlocked section
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }
}

// SAFETY: the acquire CAS admits one holder at a time and the release store
// publishes its writes to the next holder
unsafe impl CriticalSection for SpinSection {
    fn enter(&self) {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                std::hint::spin_loop();
            }
        }
    }

    unsafe fn exit(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

/// Section backed by a pair of platform hooks, e.g. interrupt disable and
/// enable on a single-core microcontroller.
///
/// The hooks are not nesting-aware: `exit` unconditionally undoes `enter`.
#[derive(Debug, Clone, Copy)]
pub struct FnSection {
    enter: fn(),
    exit: fn(),
}

impl FnSection {
    /// Wrap platform enter/exit hooks.
    ///
    /// # Safety
    ///
    /// While `enter` is in effect, the competing producer or consumer context
    /// must be unable to run, and `exit` must act as a memory barrier. The
    /// pair must uphold the [`CriticalSection`] contract for every context
    /// that shares the buffer.
    pub const unsafe fn new(enter: fn(), exit: fn()) -> Self {
        Self { enter, exit }
    }
}

// SAFETY: upheld by the caller of `FnSection::new`
unsafe impl CriticalSection for FnSection {
    fn enter(&self) {
        (self.enter)();
    }

    unsafe fn exit(&self) {
        (self.exit)();
    }
}
