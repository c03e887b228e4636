//! Block lifecycle: carving blocks out of gaps, splicing them back out,
//! resizing them in place, and growing the arena when no gap suffices.
//!
//! Every operation here mutates only the records named in its case: the new
//! or dying block's head and tail, plus the two neighbouring tails whose
//! linkage and free accounting frame the affected gap. The directory's
//! structural invariants hold again by the time each function returns.

use std::ptr::{self, NonNull};

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::align::{ALIGNMENT, PAGE_SIZE};
use crate::directory::{
  self, Directory, HEAD_SIZE, Head, PrevRef, TAIL_SIZE, Tail, footprint,
};
use crate::grow::Grower;
use crate::{round_down, round_up};

/// Failure to resize a block in place.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ResizeError {
  #[error("shrink of {delta} bytes exceeds the block's {size}-byte payload")]
  ShrinkExceedsSize { delta: usize, size: usize },

  #[error("trailing gap of {free} bytes cannot absorb a {delta}-byte expansion")]
  GapTooSmall { delta: usize, free: usize },
}

/// Carves a new block out of the gap starting at `addr` and returns its
/// user address.
///
/// `addr` comes from a placement policy, so it names the first byte of a
/// gap at least `footprint(size)` bytes wide; policies only ever hand out
/// the gap start, so the head lands at `addr` itself. Returns `None` only
/// in the empty-arena case when the arena is smaller than the footprint,
/// which the caller answers by growing.
///
/// # Safety
///
/// `dir` must point to a live directory and `addr` to the start of a gap as
/// produced by a placement policy over that directory.
pub(crate) unsafe fn insert(
  dir: *mut Directory,
  cursor: &mut *mut Tail,
  addr: *mut u8,
  size: usize,
) -> Option<NonNull<u8>> {
  unsafe {
    let effective = round_up!(size, ALIGNMENT);
    let total = HEAD_SIZE + effective + TAIL_SIZE;

    debug_assert!(addr as usize + total <= (*dir).end as usize);
    debug_assert!(addr as usize >= directory::arena_start(dir) as usize);

    let new_head: *mut Head = addr.cast();

    if !(*dir).first.is_null() {
      match directory::prev_ref(dir, addr) {
        PrevRef::Header => {
          // The gap below the first block. Its upstream neighbour in the
          // circular chain is the last block's tail.
          let prev_tail = (*(*dir).first).prev_tail;

          let offset = addr as usize - directory::arena_start(dir) as usize;
          debug_assert_eq!(offset, 0);

          let start_gap =
            (*dir).first.cast::<u8>() as usize - directory::arena_start(dir) as usize;
          debug_assert!(start_gap >= offset + total);

          (*new_head).prev_tail = prev_tail;
          (*new_head).next_tail = addr.add(HEAD_SIZE + effective).cast();
          (*new_head).size = size;

          let new_tail = (*new_head).next_tail;
          (*new_tail).prev_head = new_head;
          (*new_tail).next_head = (*prev_tail).next_head;
          (*new_tail).free_following = start_gap - (offset + total);

          (*prev_tail).next_head = new_head;
          (*(*new_tail).next_head).prev_tail = new_tail;

          debug_assert_eq!(
            offset + total + (*new_tail).free_following,
            start_gap,
          );

          (*dir).first = new_head;
        }
        PrevRef::Block(prev) => {
          let prev_tail = (*prev).next_tail;
          debug_assert!(prev_tail.cast::<u8>().add(TAIL_SIZE) as usize <= addr as usize);

          let old_free = (*prev_tail).free_following;
          let offset = addr as usize - prev_tail.cast::<u8>().add(TAIL_SIZE) as usize;
          debug_assert_eq!(offset, 0);
          debug_assert!(old_free >= offset + total);

          (*new_head).prev_tail = prev_tail;
          (*new_head).next_tail = addr.add(HEAD_SIZE + effective).cast();
          (*new_head).size = size;

          // The bytes the new block skipped over stay with the previous
          // tail as its (possibly zero) remaining gap.
          (*prev_tail).free_following = offset;

          let new_tail = (*new_head).next_tail;
          (*new_tail).prev_head = new_head;
          (*new_tail).next_head = (*prev_tail).next_head;
          (*new_tail).free_following = old_free - (offset + total);

          (*prev_tail).next_head = new_head;
          (*(*new_tail).next_head).prev_tail = new_tail;

          debug_assert_eq!(
            (*prev_tail).free_following + total + (*new_tail).free_following,
            old_free,
          );
        }
      }
    } else {
      // Empty arena: the whole range past the directory record is one gap.
      let free = (*dir).end as usize - directory::arena_start(dir) as usize;
      let offset = addr as usize - directory::arena_start(dir) as usize;
      debug_assert_eq!(offset % ALIGNMENT, 0);

      if free < offset + total {
        warn!(size, "arena too small for the block, growth required");
        return None;
      }

      (*new_head).next_tail = addr.add(HEAD_SIZE + effective).cast();
      (*new_head).size = size;

      let new_tail = (*new_head).next_tail;
      (*new_tail).prev_head = new_head;
      (*new_tail).next_head = new_head;
      (*new_tail).free_following = free - (offset + total);

      // Single block: both circular edges point at itself.
      (*new_head).prev_tail = new_tail;

      (*dir).first = new_head;

      debug_assert_eq!(
        addr as usize + total + (*new_tail).free_following,
        (*dir).end as usize,
      );
    }

    *cursor = (*new_head).next_tail;

    let user = addr.add(HEAD_SIZE);
    debug!(size, ?user, "block inserted");
    Some(NonNull::new_unchecked(user))
  }
}

/// Splices the block owning `user` out of the directory.
///
/// The block's bytes and its trailing gap fold into the preceding tail's
/// free accounting (or into the initial gap when the first block dies).
/// When the removal leaves whole free pages at the top of the arena, the
/// break is lowered by that many pages; when the last block disappears the
/// directory is reset outright.
///
/// # Safety
///
/// `user` must be an address previously handed out and not yet removed;
/// anything else is the classic undefined heap misuse.
pub(crate) unsafe fn remove<G: Grower>(
  dir: *mut Directory,
  grower: &mut G,
  cursor: &mut *mut Tail,
  user: *mut u8,
) {
  unsafe {
    debug_assert!(user as usize >= directory::arena_start(dir) as usize + HEAD_SIZE);
    debug_assert!((user as usize) < (*dir).end as usize);

    let old = directory::head_of(user);
    let old_tail = (*old).next_tail;

    if (*dir).first != old {
      let pred = (*old).prev_tail;

      if old_tail == *cursor {
        *cursor = pred;
      }

      (*pred).free_following += footprint((*old).size) + (*old_tail).free_following;
      (*pred).next_head = (*old_tail).next_head;
      (*(*pred).next_head).prev_tail = pred;

      debug_assert!(
        pred.cast::<u8>().add(TAIL_SIZE) as usize + (*pred).free_following
          <= (*dir).end as usize
      );

      // With the block gone the predecessor may close the arena; whole
      // trailing pages go back to the system.
      if pred == (*(*dir).first).prev_tail && (*pred).free_following >= PAGE_SIZE {
        let reclaim = round_down!((*pred).free_following, PAGE_SIZE);
        debug_assert!(reclaim > 0 && reclaim <= (*pred).free_following);

        directory::lower_break_or_abort(grower, reclaim);

        (*pred).free_following -= reclaim;
        (*dir).end = (*dir).end.sub(reclaim);

        debug_assert_eq!(
          pred.cast::<u8>().add(TAIL_SIZE) as usize + (*pred).free_following,
          (*dir).end as usize,
        );

        debug!(reclaim, "trailing pages returned");
      }

      debug!(?user, "block removed");
    } else if (*old).prev_tail == old_tail {
      // Only block left. The arena empties completely, so the directory
      // resets and the break drops back to the record end.
      *cursor = ptr::null_mut();
      (*dir).first = ptr::null_mut();

      if let Err(err) = directory::reset(dir, grower) {
        error!("directory reset after the last removal failed: {err}");
        std::process::abort();
      }

      debug!(?user, "last block removed, directory reset");
    } else {
      // First of several. The dying block and its trailing gap become part
      // of the initial gap, which is implicit in the new first's position.
      let removed_footprint = footprint((*old).size);
      let trailing = (*old_tail).free_following;
      let offset = old.cast::<u8>() as usize - directory::arena_start(dir) as usize;

      let end_tail = (*(*dir).first).prev_tail;

      if old_tail == *cursor {
        *cursor = end_tail;
      }

      (*end_tail).next_head = (*old_tail).next_head;
      (*(*end_tail).next_head).prev_tail = end_tail;
      (*dir).first = (*end_tail).next_head;

      debug_assert_eq!(
        (*dir).first.cast::<u8>() as usize - directory::arena_start(dir) as usize,
        offset + removed_footprint + trailing,
      );

      debug!(?user, "first block removed");
    }
  }
}

/// Shrinks the block at `user` by `delta` payload bytes, pulling its tail
/// towards the head and widening the trailing gap.
///
/// # Safety
///
/// `user` must be an address previously handed out and still live.
pub(crate) unsafe fn shrink(
  cursor: &mut *mut Tail,
  user: *mut u8,
  delta: usize,
) -> Result<(), ResizeError> {
  unsafe {
    let head = directory::head_of(user);
    let size = (*head).size;

    if delta > size {
      warn!(delta, size, "shrink larger than the payload");
      return Err(ResizeError::ShrinkExceedsSize { delta, size });
    }

    let old_tail = (*head).next_tail;
    let next = (*old_tail).next_head;
    let free = (*old_tail).free_following;

    let effective = round_up!(size - delta, ALIGNMENT);
    let shifted: *mut Tail = head.cast::<u8>().add(HEAD_SIZE + effective).cast();

    // The old fields were read above; writing the relocated tail is safe
    // even where the two records overlap.
    (*shifted).prev_head = head;
    (*shifted).next_head = next;
    (*shifted).free_following = free + (old_tail as usize - shifted as usize);

    (*head).next_tail = shifted;
    (*head).size -= delta;

    (*next).prev_tail = shifted;

    debug_assert_eq!(
      head.cast::<u8>().add(HEAD_SIZE) as usize + round_up!((*head).size, ALIGNMENT),
      shifted as usize,
    );
    debug_assert_eq!(
      shifted as usize + TAIL_SIZE + (*shifted).free_following,
      old_tail as usize + TAIL_SIZE + free,
    );

    if old_tail == *cursor {
      *cursor = shifted;
    }

    debug!(?user, delta, "block shrunk in place");
    Ok(())
  }
}

/// Expands the block at `user` by `delta` payload bytes into its trailing
/// gap, pushing the tail forward.
///
/// Fails when the gap cannot absorb the growth; the block is untouched in
/// that case. The bytes gained are left as they were, zeroing is up to the
/// caller.
///
/// # Safety
///
/// `user` must be an address previously handed out and still live.
pub(crate) unsafe fn expand(
  cursor: &mut *mut Tail,
  user: *mut u8,
  delta: usize,
) -> Result<(), ResizeError> {
  unsafe {
    let head = directory::head_of(user);
    let size = (*head).size;
    let free = (*(*head).next_tail).free_following;

    let effective = round_up!(size + delta, ALIGNMENT);

    // The tail moves in whole alignment units, so the comparison runs on
    // rounded sizes.
    if effective > round_up!(free, ALIGNMENT) + round_up!(size, ALIGNMENT) {
      warn!(delta, free, "expansion does not fit the trailing gap");
      return Err(ResizeError::GapTooSmall { delta, free });
    }

    let old_tail = (*head).next_tail;
    let next = (*old_tail).next_head;

    let shifted: *mut Tail = head.cast::<u8>().add(HEAD_SIZE + effective).cast();

    (*shifted).prev_head = head;
    (*shifted).next_head = next;
    (*shifted).free_following = free - (shifted as usize - old_tail as usize);

    (*head).next_tail = shifted;
    (*head).size += delta;

    (*next).prev_tail = shifted;

    debug_assert_eq!(
      head.cast::<u8>().add(HEAD_SIZE) as usize + round_up!((*head).size, ALIGNMENT),
      shifted as usize,
    );
    debug_assert_eq!(
      shifted as usize + TAIL_SIZE + (*shifted).free_following,
      old_tail as usize + TAIL_SIZE + free,
    );

    if old_tail == *cursor {
      *cursor = shifted;
    }

    debug!(?user, delta, "block expanded in place");
    Ok(())
  }
}

/// Grows the arena until its trailing gap can host a `size`-byte block.
///
/// Only called once every policy came up empty. The break advances by
/// whole pages covering the missing bytes, and the new space lands in the
/// last tail's gap (or simply widens the empty arena). Returns the start
/// of the now-sufficient trailing gap, or `None` when the break refuses to
/// move, which the entry point reports as out-of-memory.
///
/// # Safety
///
/// `dir` must point to a live directory.
pub(crate) unsafe fn grow<G: Grower>(
  dir: *mut Directory,
  grower: &mut G,
  size: usize,
) -> Option<NonNull<u8>> {
  unsafe {
    let total = footprint(size);

    if (*dir).first.is_null() {
      let current = (*dir).end as usize - directory::arena_start(dir) as usize;
      debug_assert!(current < total);

      let grown = round_up!(total - current, PAGE_SIZE);

      if let Err(err) = grower.move_break(grown as isize) {
        error!("arena growth by {grown} bytes failed: {err}");
        return None;
      }

      (*dir).end = (*dir).end.add(grown);

      debug!(grown, "empty arena grown");
      return NonNull::new(directory::arena_start(dir));
    }

    let end_tail = directory::last_tail(dir);
    let trailing = (*end_tail).free_following;
    debug_assert!(trailing < total);

    let grown = round_up!(total - trailing, PAGE_SIZE);

    if let Err(err) = grower.move_break(grown as isize) {
      error!("arena growth by {grown} bytes failed: {err}");
      return None;
    }

    (*dir).end = (*dir).end.add(grown);
    (*end_tail).free_following += grown;

    debug_assert_eq!(
      end_tail.cast::<u8>().add(TAIL_SIZE) as usize + (*end_tail).free_following,
      (*dir).end as usize,
    );

    debug!(grown, "arena grown");
    NonNull::new(end_tail.cast::<u8>().add(TAIL_SIZE))
  }
}

#[cfg(test)]
mod tests {
  use crate::align::{ALIGNMENT, PAGE_SIZE};
  use crate::directory::{HEAD_SIZE, TAIL_SIZE};
  use crate::grow::BufferGrower;
  use crate::heap::Heap;

  fn test_heap(capacity: usize) -> Heap<BufferGrower> {
    let buffer = Box::leak(vec![0u128; capacity / 16].into_boxed_slice());
    unsafe { Heap::with_grower(BufferGrower::new(buffer.as_mut_ptr().cast(), capacity)) }
  }

  const OVERHEAD: usize = HEAD_SIZE + TAIL_SIZE;

  #[test]
  fn freed_blocks_are_reused_in_place() {
    let heap = test_heap(64 * 1024);

    unsafe {
      let a = heap.allocate(1);
      let b = heap.allocate(1);
      heap.verify();

      // Reuse before an existing block.
      heap.deallocate(a);
      assert_eq!(heap.allocate(1), a);

      // Reuse after an existing block.
      heap.deallocate(b);
      assert_eq!(heap.allocate(1), b);

      // Reuse between two blocks.
      let c = heap.allocate(1);
      heap.deallocate(b);
      assert_eq!(heap.allocate(1), b);

      heap.verify();
      let _ = c;
    }
  }

  #[test]
  fn a_hole_in_a_row_of_blocks_is_refilled() {
    let heap = test_heap(64 * 1024);

    unsafe {
      let mut blocks = [std::ptr::null_mut(); 8];
      for slot in blocks.iter_mut() {
        *slot = heap.allocate(1);
      }
      for pair in blocks.windows(2) {
        assert_eq!(pair[1] as usize, pair[0] as usize + ALIGNMENT + OVERHEAD);
      }

      heap.deallocate(blocks[3]);
      heap.verify();

      assert_eq!(heap.allocate(1), blocks[3]);
      heap.verify();
    }
  }

  #[test]
  fn removing_the_last_block_resets_the_arena() {
    let heap = test_heap(64 * 1024);

    unsafe {
      let a = heap.allocate(100);
      assert_eq!(heap.arena_extent(), PAGE_SIZE);

      heap.deallocate(a);

      assert_eq!(heap.arena_extent(), 0);
      heap.verify();

      // The arena comes back on the next allocation.
      let b = heap.allocate(1);
      assert_eq!(b, a);
      heap.verify();
    }
  }

  #[test]
  fn trailing_pages_are_returned_on_removal() {
    let heap = test_heap(64 * 1024);

    unsafe {
      let anchor = heap.allocate(1);
      let big = heap.allocate(2 * PAGE_SIZE);
      assert_eq!(heap.arena_extent(), 3 * PAGE_SIZE);

      heap.deallocate(big);
      heap.verify();

      // Two whole pages come off the top; the anchor keeps the remainder.
      assert_eq!(heap.arena_extent(), PAGE_SIZE);

      heap.deallocate(anchor);
      assert_eq!(heap.arena_extent(), 0);
    }
  }

  #[test]
  fn shrink_keeps_the_address_and_frees_the_difference() {
    let heap = test_heap(64 * 1024);

    unsafe {
      let p = heap.allocate(128);
      let barrier = heap.allocate(1);

      for size in (64..=127).rev() {
        assert_eq!(heap.reallocate(p, size), p);
        heap.verify();
      }
      assert_eq!(heap.reallocate(p, 1), p);
      heap.verify();

      // The shrink opened a gap wide enough for a whole new block between
      // the shrunken payload and the barrier.
      let q = heap.allocate(1);
      assert_eq!(q as usize, p as usize + ALIGNMENT + OVERHEAD);
      assert!((q as usize) < barrier as usize);
      heap.verify();
    }
  }

  #[test]
  fn expand_consumes_the_trailing_gap() {
    let heap = test_heap(64 * 1024);

    unsafe {
      let p = heap.allocate(16);

      for size in 17..=256 {
        assert_eq!(heap.reallocate(p, size), p);
      }
      heap.verify();

      // The next block starts after the grown payload.
      let q = heap.allocate(1);
      assert_eq!(
        q as usize,
        p as usize + crate::round_up!(256, ALIGNMENT) + OVERHEAD,
      );
      heap.verify();
    }
  }

  #[test]
  fn growth_failure_reports_out_of_memory() {
    // Room for the directory plus one page, nothing more.
    let heap = test_heap(PAGE_SIZE + 64);

    unsafe {
      let a = heap.allocate(64);
      assert!(!a.is_null());

      // A second page does not exist.
      assert!(heap.allocate(2 * PAGE_SIZE).is_null());

      // The first block survived the failed growth.
      heap.verify();
      heap.deallocate(a);
    }
  }
}
