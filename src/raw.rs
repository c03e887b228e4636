//! Byte-granular memory primitives.
//!
//! Payload bytes are only ever touched through these helpers, so every read
//! and write in the crate that targets user data is visibly a single-byte
//! operation rather than a typed access to memory the directory does not
//! describe.

use std::process;

use thiserror::Error;
use tracing::error;

/// Error for a rejected bulk copy.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum CopyError {
  #[error("null address passed to a bulk copy")]
  NullAddress,
  #[error("destination overlaps the tail of the source range")]
  Overlap,
}

/// Reads one byte.
///
/// # Safety
///
/// `addr` must point to a readable byte. A null pointer aborts the process
/// instead of dereferencing it.
pub(crate) unsafe fn read_byte(addr: *const u8) -> u8 {
  if addr.is_null() {
    error!("read through a null address, aborting");
    process::abort();
  }

  unsafe { addr.read() }
}

/// Writes one byte.
///
/// # Safety
///
/// `addr` must point to a writable byte. A null pointer aborts the process
/// instead of dereferencing it.
pub(crate) unsafe fn write_byte(
  addr: *mut u8,
  value: u8,
) {
  if addr.is_null() {
    error!("write through a null address, aborting");
    process::abort();
  }

  unsafe { addr.write(value) };
}

/// Sets `len` bytes starting at `addr` to zero.
///
/// # Safety
///
/// The whole `[addr, addr + len)` range must be writable.
pub(crate) unsafe fn zero_fill(
  addr: *mut u8,
  len: usize,
) {
  for i in 0..len {
    unsafe { write_byte(addr.add(i), 0) };
  }
}

/// Copies `len` bytes from `src` to `dst`, front to back.
///
/// Because the copy runs in increasing address order, a destination inside
/// `(src, src + len)` would read bytes it already overwrote; such calls are
/// rejected. A destination at or below `src` is fine, and `dst == src` is a
/// no-op per byte.
///
/// # Safety
///
/// Both ranges must be valid for the access; the overlap check only covers
/// the one ordering the copy direction cannot handle.
pub(crate) unsafe fn copy_forward(
  src: *const u8,
  dst: *mut u8,
  len: usize,
) -> Result<(), CopyError> {
  if src.is_null() || dst.is_null() {
    error!("bulk copy with a null address");
    return Err(CopyError::NullAddress);
  }

  let src_end = src as usize + len;
  if (dst as usize) > (src as usize) && (dst as usize) < src_end {
    error!("bulk copy destination inside the source range");
    return Err(CopyError::Overlap);
  }

  for i in 0..len {
    let value = unsafe { read_byte(src.add(i)) };
    unsafe { write_byte(dst.add(i), value) };
  }

  Ok(())
}
