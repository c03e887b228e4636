//! The on-heap segment directory.
//!
//! The whole arena is one contiguous address range obtained from the
//! program break. Its first object is the [`Directory`] record; everything
//! after it is either an allocated block, framed by a [`Head`] and a
//! [`Tail`], or a free gap accounted for by the preceding tail.
//!
//! ```text
//!               base                                             end (break)
//!                │                                                 │
//!                ▼                                                 ▼
//!   ┌────────────┬──────┬─────────┬──────┬───────┬──────┬──...─────┐
//!   │ Directory  │ Head │ payload │ Tail │ (gap) │ Head │          │
//!   │ first, end │      │         │      │       │      │          │
//!   └────────────┴──────┴─────────┴──────┴───────┴──────┴──...─────┘
//!                ▲                    │ free_following │
//!                │                    └────────────────┘
//!           arena start
//! ```
//!
//! The blocks form a doubly linked list that is circular through the arena:
//! the first head's `prev_tail` points at the last block's tail, and the
//! last tail's `next_head` points back at the first head. Walking
//! `next_tail.next_head` from `first` therefore visits every block in
//! strictly increasing address order before returning to `first`.
//!
//! Nothing in here allocates: every record lives inside the arena it
//! describes, addressed by raw pointers, and consistency is enforced by the
//! invariants checked below rather than by the borrow checker.

use std::ptr::{self, NonNull};
use std::{mem, process};

use static_assertions::const_assert_eq;
use tracing::{debug, error};

use crate::align::ALIGNMENT;
use crate::grow::{GrowError, Grower};
use crate::round_up;

/// Root record at the base of the arena. Created on the first allocation
/// and alive for the rest of the process.
#[repr(C, align(16))]
pub(crate) struct Directory {
  /// Lowest-addressed block's head, or null while no block exists.
  pub first: *mut Head,
  /// One past the end of the arena; tracks the program break.
  pub end: *mut u8,
}

/// Per-block record immediately before the payload.
#[repr(C, align(16))]
pub(crate) struct Head {
  /// Tail of the previous block in address order; for the first block this
  /// is the last block's tail (circular).
  pub prev_tail: *mut Tail,
  /// This block's own tail.
  pub next_tail: *mut Tail,
  /// Payload size as requested by the caller, not rounded.
  pub size: usize,
}

/// Per-block record immediately after the payload.
#[repr(C, align(16))]
pub(crate) struct Tail {
  /// This block's own head.
  pub prev_head: *mut Head,
  /// Head of the next block in address order; for the last block this is
  /// the first block's head (circular).
  pub next_head: *mut Head,
  /// Free bytes between this tail and the next head, or the arena end.
  pub free_following: usize,
}

pub(crate) const DIR_SIZE: usize = mem::size_of::<Directory>();
pub(crate) const HEAD_SIZE: usize = mem::size_of::<Head>();
pub(crate) const TAIL_SIZE: usize = mem::size_of::<Tail>();

// Record sizes must be multiples of the fundamental alignment, otherwise
// back-to-back records would misalign every following payload.
const_assert_eq!(DIR_SIZE % ALIGNMENT, 0);
const_assert_eq!(HEAD_SIZE % ALIGNMENT, 0);
const_assert_eq!(TAIL_SIZE % ALIGNMENT, 0);

/// Total arena bytes a block with payload size `size` occupies.
pub(crate) fn footprint(size: usize) -> usize {
  HEAD_SIZE + round_up!(size, ALIGNMENT) + TAIL_SIZE
}

/// First usable byte after the directory record.
///
/// # Safety
///
/// `dir` must point to a live directory.
pub(crate) unsafe fn arena_start(dir: *mut Directory) -> *mut u8 {
  unsafe { dir.cast::<u8>().add(DIR_SIZE) }
}

/// Head record of the block owning the user address `user`.
///
/// # Safety
///
/// `user` must be an address previously handed out for a live block.
pub(crate) unsafe fn head_of(user: *mut u8) -> *mut Head {
  unsafe { user.sub(HEAD_SIZE).cast() }
}

/// Requested payload size of the live block at `user`.
///
/// # Safety
///
/// `user` must be an address previously handed out for a live block.
pub(crate) unsafe fn payload_size(user: *mut u8) -> usize {
  unsafe { (*head_of(user)).size }
}

/// Free bytes between the block at `user` and its successor.
///
/// # Safety
///
/// `user` must be an address previously handed out for a live block.
pub(crate) unsafe fn gap_after(user: *mut u8) -> usize {
  unsafe { (*(*head_of(user)).next_tail).free_following }
}

/// What lies immediately before an address inside the arena.
pub(crate) enum PrevRef {
  /// Nothing but the directory record precedes the address.
  Header,
  /// The named block is the closest one below the address.
  Block(*mut Head),
}

/// Requests arena storage for the directory record and initialises it.
///
/// Asks the break for the record plus one alignment unit of slack, then
/// places the record at the first aligned address inside that grant. `end`
/// starts directly past the record, so the arena is empty until the first
/// growth. Returns `None` if the break cannot move, in which case the
/// process simply has no heap.
///
/// # Safety
///
/// Must be called at most once per grower; the directory takes permanent
/// ownership of the break from its base upwards.
pub(crate) unsafe fn create<G: Grower>(grower: &mut G) -> Option<NonNull<Directory>> {
  let grant = match unsafe { grower.move_break((DIR_SIZE + ALIGNMENT) as isize) } {
    Ok(addr) => addr.as_ptr(),
    Err(err) => {
      error!("no storage for the directory record: {err}");
      return None;
    }
  };

  let dir = round_up!(grant as usize, ALIGNMENT) as *mut Directory;

  unsafe {
    (*dir).first = ptr::null_mut();
    (*dir).end = arena_start(dir);

    debug_assert_eq!((*dir).end as usize - dir as usize, DIR_SIZE);
  }

  debug!(directory = ?dir, "directory created");

  NonNull::new(dir)
}

/// Tail of the highest-addressed block.
///
/// # Safety
///
/// `dir` must point to a live directory holding at least one block.
pub(crate) unsafe fn last_tail(dir: *mut Directory) -> *mut Tail {
  unsafe {
    let first = (*dir).first;
    debug_assert!(!first.is_null());

    // The first head's back pointer is circular, so it names the last tail
    // without a walk.
    let tail = (*first).prev_tail;

    debug_assert!(tail.cast::<u8>().add(TAIL_SIZE) as usize <= (*dir).end as usize);
    debug_assert_eq!(
      tail.cast::<u8>().add(TAIL_SIZE) as usize + (*tail).free_following,
      (*dir).end as usize,
    );

    tail
  }
}

/// Finds the block immediately preceding `addr`, or reports that only the
/// directory record is below it.
///
/// Only called for addresses that start a gap, i.e. that sit directly after
/// some tail or directly after the directory record; for the former the
/// preceding head is recovered from the tail ending at `addr`.
///
/// # Safety
///
/// `dir` must point to a live directory and `addr` must lie strictly inside
/// the arena, at a gap start as described above.
pub(crate) unsafe fn prev_ref(
  dir: *mut Directory,
  addr: *mut u8,
) -> PrevRef {
  unsafe {
    debug_assert!((addr as usize) < (*dir).end as usize);
    debug_assert!(addr as usize >= arena_start(dir) as usize);

    let first = (*dir).first;

    if first.is_null() || first.cast::<u8>() as usize > addr as usize {
      return PrevRef::Header;
    }

    let tail: *mut Tail = addr.sub(TAIL_SIZE).cast();
    PrevRef::Block((*tail).prev_head)
  }
}

/// Empties the directory and hands the whole arena back to the system by
/// lowering the break to just past the directory record.
///
/// # Safety
///
/// `dir` must point to a live directory; every block in it is forgotten.
pub(crate) unsafe fn reset<G: Grower>(
  dir: *mut Directory,
  grower: &mut G,
) -> Result<(), GrowError> {
  unsafe {
    (*dir).first = ptr::null_mut();
    (*dir).end = arena_start(dir);

    let current = grower.move_break(0)?.as_ptr();
    let target = (*dir).end;

    debug_assert!(target as usize <= current as usize);

    grower.move_break(target as isize - current as isize)?;
  }

  debug!("directory reset");

  Ok(())
}

/// Aborts unless the break can be lowered by `delta` bytes. Used where a
/// failed shrink would leave the accounting ahead of the real break.
///
/// # Safety
///
/// Nothing live may be stored in the top `delta` bytes of the arena.
pub(crate) unsafe fn lower_break_or_abort<G: Grower>(
  grower: &mut G,
  delta: usize,
) {
  if let Err(err) = unsafe { grower.move_break(-(delta as isize)) } {
    error!("failed to lower the program break by {delta} bytes: {err}");
    process::abort();
  }
}

/// Walks the whole directory and checks every structural invariant: record
/// positions consistent with sizes, circular linkage, strictly ascending
/// addresses, and byte accounting that covers the arena exactly.
#[cfg(test)]
pub(crate) unsafe fn verify(dir: *mut Directory) {
  unsafe {
    let base = arena_start(dir) as usize;
    let end = (*dir).end as usize;
    assert!(base <= end);

    let first = (*dir).first;
    if first.is_null() {
      // The whole arena is one gap; nothing else to check.
      return;
    }

    // Bytes below the first block belong to the initial gap.
    let mut accounted = first as usize - base;
    let mut head = first;
    let mut previous = base;

    loop {
      let tail = (*head).next_tail;

      assert_eq!(head as usize % ALIGNMENT, 0);
      assert!(head as usize >= previous);
      assert_eq!(
        tail as usize,
        head as usize + HEAD_SIZE + round_up!((*head).size, ALIGNMENT),
      );
      assert_eq!((*tail).prev_head, head);
      assert_eq!((*(*tail).next_head).prev_tail, tail);

      accounted += footprint((*head).size) + (*tail).free_following;
      previous = head as usize;

      let next = (*tail).next_head;
      if next == first {
        // Closing the circle: the last tail plus its gap must end exactly
        // at the arena end.
        assert_eq!(
          tail.cast::<u8>().add(TAIL_SIZE) as usize + (*tail).free_following,
          end,
        );
        break;
      }

      assert!(next as usize > head as usize);
      head = next;
    }

    assert_eq!(accounted, end - base);
  }
}
