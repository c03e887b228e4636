//! The program-break seam.
//!
//! The heap engine touches the operating system through exactly one
//! primitive: moving the data-segment break by a signed delta. [`Grower`]
//! captures that primitive so the engine can run against the real break
//! ([`BrkGrower`]) or against a bounded in-memory arena ([`BufferGrower`])
//! for tests and benchmarks.

use std::ptr::NonNull;

use errno::errno;
use libc::{c_void, intptr_t, sbrk};
use thiserror::Error;

/// Failure to move the break.
#[derive(Debug, Error)]
pub enum GrowError {
  /// The break syscall reported an error, typically `ENOMEM` or an exceeded
  /// `RLIMIT_DATA`.
  #[error("program break syscall failed: {0}")]
  Os(errno::Errno),

  /// A [`BufferGrower`] ran out of backing storage, or was asked to move
  /// below its base.
  #[error("arena buffer exhausted")]
  Exhausted,
}

/// A movable data-segment break.
///
/// `move_break` follows `sbrk(2)` semantics: it shifts the break by `delta`
/// bytes and returns the break position *before* the move, so a delta of
/// zero queries the current break. On failure the break is unchanged.
pub trait Grower {
  /// # Safety
  ///
  /// Growing hands out address space, which is always sound; a negative
  /// `delta` unmaps the top of the range, so the caller must guarantee
  /// nothing live is stored above the new break.
  unsafe fn move_break(
    &mut self,
    delta: isize,
  ) -> Result<NonNull<u8>, GrowError>;
}

/// The production grower: `sbrk(2)` on the process's own data segment.
pub struct BrkGrower;

impl Grower for BrkGrower {
  unsafe fn move_break(
    &mut self,
    delta: isize,
  ) -> Result<NonNull<u8>, GrowError> {
    let previous = unsafe { sbrk(delta as intptr_t) };

    // sbrk returns (void*)-1 on failure
    if previous == usize::MAX as *mut c_void {
      return Err(GrowError::Os(errno()));
    }

    Ok(unsafe { NonNull::new_unchecked(previous.cast()) })
  }
}

/// A break simulated over a caller-provided buffer.
///
/// The "break" starts at the buffer base and moves within
/// `[base, base + capacity]`; requests past either bound fail with
/// [`GrowError::Exhausted`] and leave the position untouched. Intended for
/// tests and benchmarks that need a deterministic, process-state-free arena.
pub struct BufferGrower {
  base: *mut u8,
  capacity: usize,
  used: usize,
}

impl BufferGrower {
  /// # Safety
  ///
  /// `base` must point to `capacity` writable bytes aligned to
  /// [`crate::align::ALIGNMENT`], exclusively owned by this grower for its
  /// whole lifetime.
  pub const unsafe fn new(
    base: *mut u8,
    capacity: usize,
  ) -> Self {
    Self {
      base,
      capacity,
      used: 0,
    }
  }
}

// The buffer is exclusively owned, so the raw base pointer may travel with
// the grower to another thread.
unsafe impl Send for BufferGrower {}

impl Grower for BufferGrower {
  unsafe fn move_break(
    &mut self,
    delta: isize,
  ) -> Result<NonNull<u8>, GrowError> {
    let previous = self.used;
    let moved = previous as isize + delta;

    if moved < 0 || moved as usize > self.capacity {
      return Err(GrowError::Exhausted);
    }

    self.used = moved as usize;

    Ok(unsafe { NonNull::new_unchecked(self.base.add(previous)) })
  }
}
