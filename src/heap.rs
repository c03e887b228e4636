//! # Program-break heap
//!
//! The public face of the allocator: the four classic heap operations over
//! a single contiguous arena grown and shrunk through the program break.
//!
//! ## Overview
//!
//! ```text
//!                           HEAP ARENA (one contiguous range)
//!
//!    base                                                      end (break)
//!     │                                                           │
//!     ▼                                                           ▼
//!   ┌───────────┬────────────────┬───────┬────────────────┬──────┐
//!   │ Directory │ Head│data│Tail │ (gap) │ Head│data│Tail │ free │
//!   └───────────┴────────────────┴───────┴────────────────┴──────┘
//!                      ▲                        ▲
//!                      │                        │
//!               user address 1           user address 2
//! ```
//!
//! Every allocation is framed by a head and a tail record; the records of
//! neighbouring blocks link into one circular, address-ordered list rooted
//! in the directory. Gaps are not tracked by a separate free list: each
//! tail simply remembers how many free bytes follow it, so coalescing is
//! implicit in the representation.
//!
//! ## Allocation walk-through
//!
//! ```text
//!   STEP 1: the selected placement policy scans the gaps
//!   ┌──────────────────────────────────────────────────────────┐
//!   │  initial gap, then every tail's free_following, in       │
//!   │  ascending address order → first/best/worst/next fit     │
//!   └──────────────────────────────────────────────────────────┘
//!
//!   STEP 2: no gap? grow the arena by whole pages
//!   ┌──────────────────────────────────────────────────────────┐
//!   │  missing = footprint − trailing free                     │
//!   │  move_break(round_up(missing, PAGE_SIZE))                │
//!   └──────────────────────────────────────────────────────────┘
//!
//!   STEP 3: carve the block out of the chosen gap
//!   ┌──────────────────────────────────────────────────────────┐
//!   │  write Head and Tail, relink both neighbouring tails,    │
//!   │  move the next-fit cursor, return head address + 32      │
//!   └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Release reverses step 3 and folds the block's bytes into the preceding
//! tail's gap; when whole pages of free space pile up at the top of the
//! arena, the break moves back down.
//!
//! ## Concurrency
//!
//! One process-wide spin mutex serialises every mutating operation. A spin
//! lock is deliberate: it never allocates, so the entry points stay safe to
//! use as the allocator underneath everything else. For the same reason no
//! `tracing` subscriber may be installed in a process where this heap is
//! the global allocator; subscribers allocate while handling events.
//!
//! ## Misuse
//!
//! The classic heap contract applies unchanged: releasing an address twice,
//! releasing an address the heap never produced, or touching released
//! payload is undefined behaviour and goes undetected.

use std::alloc::{GlobalAlloc, Layout};
use std::process;
use std::ptr;

use tracing::{debug, error, instrument, warn};

use crate::align::ALIGNMENT;
use crate::directory::{self, Directory, HEAD_SIZE, TAIL_SIZE, Tail};
use crate::grow::{BrkGrower, Grower};
use crate::policy::{self, Policy};
use crate::round_up;
use crate::{raw, segment};

/// Largest representable request. Anything bigger would overflow the
/// footprint arithmetic once record overhead and rounding are applied, so
/// it fails up front.
const MAX_REQUEST: usize = isize::MAX as usize - (HEAD_SIZE + TAIL_SIZE + ALIGNMENT);

/// All process-wide heap state, guarded by the one lock.
struct State<G> {
  /// Root of the on-heap directory; null until the first allocation.
  directory: *mut Directory,
  /// Placement policy consulted for every allocation.
  policy: Policy,
  /// Next-fit cursor: the tail after which the latest placement happened.
  cursor: *mut Tail,
  /// The program-break primitive the arena lives on.
  grower: G,
}

// The raw pointers target the arena, which is owned by this state and only
// touched under the lock.
unsafe impl<G: Send> Send for State<G> {}

/// A heap over a movable program break.
///
/// The type is a thin shell: all state lives behind a spin mutex, created
/// lazily on the first allocation. The default grower is the real program
/// break, making `Heap::new()` the drop-in process heap; tests run the same
/// engine over a [`BufferGrower`](crate::BufferGrower) instead.
///
/// ```text
///   ┌───────────────────────────────────────────────┐
///   │                    Heap                       │
///   │   spin::Mutex ──► State                       │
///   │                   ├─ directory ──► (on-heap)  │
///   │                   ├─ policy: FirstFit         │
///   │                   ├─ cursor: *Tail / null     │
///   │                   └─ grower: sbrk / buffer    │
///   └───────────────────────────────────────────────┘
/// ```
pub struct Heap<G: Grower = BrkGrower> {
  state: spin::Mutex<State<G>>,
}

impl Heap<BrkGrower> {
  /// Creates a heap over the process's real program break.
  ///
  /// The arena is claimed lazily: nothing happens until the first
  /// allocation asks the break for the directory record.
  pub const fn new() -> Self {
    unsafe { Self::with_grower(BrkGrower) }
  }
}

impl Default for Heap<BrkGrower> {
  fn default() -> Self {
    Self::new()
  }
}

impl<G: Grower> Heap<G> {
  /// Creates a heap over an arbitrary break primitive.
  ///
  /// # Safety
  ///
  /// The grower's address range must be owned by this heap alone for the
  /// heap's whole lifetime; two heaps sharing one break corrupt each other.
  pub const unsafe fn with_grower(grower: G) -> Self {
    Self {
      state: spin::Mutex::new(State {
        directory: ptr::null_mut(),
        policy: Policy::FirstFit,
        cursor: ptr::null_mut(),
        grower,
      }),
    }
  }

  /// Allocates `size` bytes and returns their address, aligned to
  /// [`ALIGNMENT`]. Returns null for a zero `size` or when the arena
  /// cannot grow far enough.
  ///
  /// # Safety
  ///
  /// The returned range is valid until passed to [`deallocate`] or moved by
  /// [`reallocate`]; the caller upholds the classic heap contract.
  ///
  /// [`deallocate`]: Heap::deallocate
  /// [`reallocate`]: Heap::reallocate
  #[instrument(level = "debug", skip(self))]
  pub unsafe fn allocate(
    &self,
    size: usize,
  ) -> *mut u8 {
    if size == 0 {
      warn!("zero-size allocation request");
      return ptr::null_mut();
    }

    if size > MAX_REQUEST {
      warn!(size, "request exceeds the representable footprint");
      return ptr::null_mut();
    }

    let mut guard = self.state.lock();
    let state = &mut *guard;

    unsafe {
      if state.directory.is_null() {
        match directory::create(&mut state.grower) {
          Some(dir) => state.directory = dir.as_ptr(),
          // No break, no heap; every later call retries the creation.
          None => return ptr::null_mut(),
        }
      }

      let gap = match policy::find_gap(state.directory, state.policy, state.cursor, size) {
        Some(gap) => Some(gap),
        None => {
          debug!("no gap fits, growing the arena");
          segment::grow(state.directory, &mut state.grower, size)
        }
      };

      let Some(gap) = gap else {
        return ptr::null_mut();
      };

      match segment::insert(state.directory, &mut state.cursor, gap.as_ptr(), size) {
        Some(user) => user.as_ptr(),
        None => {
          error!("insert refused a gap the policy accepted");
          ptr::null_mut()
        }
      }
    }
  }

  /// Releases the block at `address`. A null address is a no-op.
  ///
  /// # Safety
  ///
  /// `address` must be null or an address previously returned by this heap
  /// and not yet released.
  #[instrument(level = "debug", skip(self))]
  pub unsafe fn deallocate(
    &self,
    address: *mut u8,
  ) {
    if address.is_null() {
      warn!("released a null address");
      return;
    }

    let mut guard = self.state.lock();
    let state = &mut *guard;

    debug_assert!(!state.directory.is_null());

    unsafe {
      segment::remove(state.directory, &mut state.grower, &mut state.cursor, address);
    }
  }

  /// Allocates `count * size` bytes and zeroes them. Returns null when
  /// either factor is zero, when the product overflows, or when allocation
  /// fails.
  ///
  /// # Safety
  ///
  /// Same contract as [`allocate`](Heap::allocate).
  #[instrument(level = "debug", skip(self))]
  pub unsafe fn allocate_zeroed(
    &self,
    count: usize,
    size: usize,
  ) -> *mut u8 {
    if count == 0 || size == 0 {
      warn!("zero-size zeroed allocation request");
      return ptr::null_mut();
    }

    let Some(bytes) = count.checked_mul(size) else {
      warn!(count, size, "zeroed allocation size overflows");
      return ptr::null_mut();
    };

    let address = unsafe { self.allocate(bytes) };
    if address.is_null() {
      return ptr::null_mut();
    }

    unsafe { raw::zero_fill(address, bytes) };

    address
  }

  /// Resizes the block at `address` to `size` bytes.
  ///
  /// The block shrinks or grows in place whenever its own span plus the
  /// trailing gap allows it, keeping its address. Otherwise a fresh block
  /// is allocated, the payload is copied over, and the old block is
  /// released; on failure the old block stays live and null is returned.
  ///
  /// Two deliberate contract edges:
  /// - a null `address` behaves exactly like [`allocate`](Heap::allocate);
  /// - `size == 0` returns null and leaves the block untouched, so the
  ///   caller who discards the old address on a zero resize leaks it.
  ///
  /// The lock is dropped around the out-of-place path, so a racing thread
  /// can exhaust the arena between the in-place check and the nested
  /// allocation; the call then fails with the original block intact.
  ///
  /// # Safety
  ///
  /// `address` must be null or an address previously returned by this heap
  /// and not yet released.
  #[instrument(level = "debug", skip(self))]
  pub unsafe fn reallocate(
    &self,
    address: *mut u8,
    size: usize,
  ) -> *mut u8 {
    if size == 0 {
      warn!("zero-size resize request leaves the block live");
      return ptr::null_mut();
    }

    if size > MAX_REQUEST {
      warn!(size, "request exceeds the representable footprint");
      return ptr::null_mut();
    }

    if address.is_null() {
      return unsafe { self.allocate(size) };
    }

    let mut guard = self.state.lock();
    let state = &mut *guard;

    unsafe {
      let old_size = directory::payload_size(address);

      if old_size == size {
        return address;
      }

      if size < old_size {
        return match segment::shrink(&mut state.cursor, address, old_size - size) {
          Ok(()) => address,
          Err(err) => {
            error!("in-place shrink failed: {err}");
            ptr::null_mut()
          }
        };
      }

      let gap = directory::gap_after(address);
      if round_up!(old_size, ALIGNMENT) + round_up!(gap, ALIGNMENT) >= round_up!(size, ALIGNMENT)
      {
        return match segment::expand(&mut state.cursor, address, size - old_size) {
          Ok(()) => address,
          Err(err) => {
            error!("in-place expand failed: {err}");
            ptr::null_mut()
          }
        };
      }

      drop(guard);

      // Out of place: allocate first so a failure leaves the old block
      // untouched, copy, then release the old block.
      let relocated = self.allocate(size);
      if relocated.is_null() {
        error!("no storage for the relocated block, the original stays live");
        return ptr::null_mut();
      }

      if let Err(err) = raw::copy_forward(address, relocated, old_size.min(size)) {
        error!("payload copy failed: {err}");
        return ptr::null_mut();
      }

      self.deallocate(address);

      relocated
    }
  }

  /// Selects the placement policy used by subsequent allocations.
  pub fn set_policy(
    &self,
    policy: Policy,
  ) {
    self.state.lock().policy = policy;
  }

  /// Forgets every block, lowers the break back to the directory record
  /// and clears the next-fit cursor. Aborts if the break refuses to move,
  /// since the accounting cannot be trusted past that point. Meant for
  /// tests and benchmarks that need a pristine heap.
  ///
  /// # Safety
  ///
  /// Every address previously returned by this heap becomes invalid.
  pub unsafe fn clear(&self) {
    let mut guard = self.state.lock();
    let state = &mut *guard;

    state.cursor = ptr::null_mut();

    if state.directory.is_null() {
      return;
    }

    if let Err(err) = unsafe { directory::reset(state.directory, &mut state.grower) } {
      error!("directory reset failed: {err}");
      process::abort();
    }
  }
}

#[cfg(test)]
impl<G: Grower> Heap<G> {
  /// Bytes between the directory record and the arena end.
  pub(crate) fn arena_extent(&self) -> usize {
    let state = self.state.lock();

    if state.directory.is_null() {
      return 0;
    }

    unsafe { (*state.directory).end as usize - directory::arena_start(state.directory) as usize }
  }

  /// Full structural check of the directory; panics on any broken
  /// invariant.
  pub(crate) fn verify(&self) {
    let state = self.state.lock();

    if state.directory.is_null() {
      return;
    }

    unsafe { directory::verify(state.directory) };
  }
}

unsafe impl<G: Grower> GlobalAlloc for Heap<G> {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    // Every address this heap produces is ALIGNMENT-aligned; stricter
    // layouts cannot be honoured and fail the allocation.
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    unsafe { self.allocate(layout.size()) }
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    unsafe { self.deallocate(ptr) }
  }

  unsafe fn alloc_zeroed(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    unsafe { self.allocate_zeroed(1, layout.size()) }
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    unsafe { self.reallocate(ptr, new_size) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::align::PAGE_SIZE;
  use crate::directory::{HEAD_SIZE, TAIL_SIZE};
  use crate::grow::BufferGrower;

  fn test_heap(capacity: usize) -> Heap<BufferGrower> {
    // Honour RUST_LOG so failing runs can be replayed verbosely. Safe here:
    // the heap under test is never the global allocator.
    let _ = tracing_subscriber::fmt()
      .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
      .with_test_writer()
      .try_init();

    let buffer = Box::leak(vec![0u128; capacity / 16].into_boxed_slice());
    unsafe { Heap::with_grower(BufferGrower::new(buffer.as_mut_ptr().cast(), capacity)) }
  }

  fn is_aligned(ptr: *mut u8) -> bool {
    (ptr as usize) % ALIGNMENT == 0
  }

  #[test]
  fn a_single_allocation_claims_one_page() {
    let heap = test_heap(64 * 1024);

    let address = unsafe { heap.allocate(1) };

    assert!(!address.is_null());
    assert!(is_aligned(address));
    assert_eq!(heap.arena_extent(), PAGE_SIZE);
    heap.verify();
  }

  #[test]
  fn every_size_comes_back_aligned() {
    let heap = test_heap(1024 * 1024);

    unsafe {
      for size in 1..500 {
        let address = heap.allocate(size);
        assert!(!address.is_null());
        assert!(is_aligned(address), "size {size} broke alignment");
      }
    }
    heap.verify();
  }

  #[test]
  fn payloads_do_not_bleed_into_each_other() {
    let heap = test_heap(64 * 1024);

    unsafe {
      let a = heap.allocate(64);
      let b = heap.allocate(64);

      for i in 0..64 {
        a.add(i).write(0xAA);
        b.add(i).write(0xBB);
      }

      assert!((0..64).all(|i| a.add(i).read() == 0xAA));
      assert!((0..64).all(|i| b.add(i).read() == 0xBB));
    }
    heap.verify();
  }

  #[test]
  fn zero_size_requests_yield_null() {
    let heap = test_heap(64 * 1024);

    unsafe {
      assert!(heap.allocate(0).is_null());
      assert!(heap.allocate_zeroed(0, 8).is_null());
      assert!(heap.allocate_zeroed(8, 0).is_null());
    }
  }

  #[test]
  fn releasing_null_is_a_no_op() {
    let heap = test_heap(64 * 1024);

    unsafe {
      heap.deallocate(ptr::null_mut());

      // Still fully functional afterwards.
      let address = heap.allocate(1);
      assert!(!address.is_null());
      heap.deallocate(address);
    }
    heap.verify();
  }

  #[test]
  fn zeroed_allocations_really_are_zero() {
    let heap = test_heap(64 * 1024);

    unsafe {
      // Dirty a block, release it, then demand zeroed storage at the same
      // spot.
      let dirty = heap.allocate(256);
      for i in 0..256 {
        dirty.add(i).write(0xFF);
      }
      heap.deallocate(dirty);

      let zeroed = heap.allocate_zeroed(16, 16);
      assert_eq!(zeroed, dirty);
      assert!((0..256).all(|i| zeroed.add(i).read() == 0));
    }
    heap.verify();
  }

  #[test]
  fn zeroed_allocation_overflow_yields_null() {
    let heap = test_heap(64 * 1024);

    unsafe {
      assert!(heap.allocate_zeroed(usize::MAX, 2).is_null());
    }
  }

  #[test]
  fn unrepresentable_requests_fail_up_front() {
    let heap = test_heap(64 * 1024);

    unsafe {
      assert!(heap.allocate(usize::MAX).is_null());

      let p = heap.allocate(16);
      p.write(0x7E);

      assert!(heap.reallocate(p, usize::MAX).is_null());
      assert_eq!(p.read(), 0x7E);
      heap.verify();
    }
  }

  #[test]
  fn resize_to_the_same_size_returns_the_same_address() {
    let heap = test_heap(64 * 1024);

    unsafe {
      let address = heap.allocate(100);
      assert_eq!(heap.reallocate(address, 100), address);
    }
    heap.verify();
  }

  #[test]
  fn resize_of_null_allocates() {
    let heap = test_heap(64 * 1024);

    unsafe {
      let address = heap.reallocate(ptr::null_mut(), 32);
      assert!(!address.is_null());
      assert!(is_aligned(address));
    }
    heap.verify();
  }

  #[test]
  fn resize_to_zero_returns_null_and_keeps_the_block() {
    let heap = test_heap(64 * 1024);

    unsafe {
      let address = heap.allocate(32);
      address.write(0x42);

      assert!(heap.reallocate(address, 0).is_null());

      // The block is still live and untouched; release it normally.
      assert_eq!(address.read(), 0x42);
      heap.verify();
      heap.deallocate(address);
    }
  }

  #[test]
  fn blocked_resize_moves_the_payload() {
    let heap = test_heap(64 * 1024);

    unsafe {
      let p = heap.allocate(16);
      for i in 0..16 {
        p.add(i).write((i % 256) as u8);
      }

      // The barrier sits directly behind `p`, forcing the resize out of
      // place.
      let barrier = heap.allocate(1);
      assert_eq!(
        barrier as usize,
        p as usize + ALIGNMENT + HEAD_SIZE + TAIL_SIZE,
      );

      let moved = heap.reallocate(p, 17);
      assert!(!moved.is_null());
      assert_ne!(moved, p);
      assert!((0..16).all(|i| moved.add(i).read() == (i % 256) as u8));
      heap.verify();
    }
  }

  #[test]
  fn resize_round_trip_preserves_the_payload() {
    let heap = test_heap(64 * 1024);

    unsafe {
      let p = heap.allocate(48);
      for i in 0..48 {
        p.add(i).write(i as u8);
      }
      let _barrier = heap.allocate(1);

      let grown = heap.reallocate(p, 300);
      assert!(!grown.is_null());
      let back = heap.reallocate(grown, 48);
      assert!(!back.is_null());

      assert!((0..48).all(|i| back.add(i).read() == i as u8));
      heap.verify();
    }
  }

  #[test]
  fn failed_resize_keeps_the_original_block() {
    let heap = test_heap(PAGE_SIZE + 64);

    unsafe {
      let p = heap.allocate(64);
      for i in 0..64 {
        p.add(i).write(i as u8);
      }

      // Nothing this size can ever fit the remaining arena.
      assert!(heap.reallocate(p, 8 * PAGE_SIZE).is_null());

      assert!((0..64).all(|i| p.add(i).read() == i as u8));
      heap.verify();
    }
  }

  #[test]
  fn allocate_and_release_restore_the_directory() {
    let heap = test_heap(64 * 1024);

    unsafe {
      let anchor = heap.allocate(1);
      let extent = heap.arena_extent();

      let addresses = [heap.allocate(10), heap.allocate(200), heap.allocate(3000)];
      for address in addresses {
        heap.deallocate(address);
      }

      // Back to a lone anchor; the extent may only have moved in whole
      // pages.
      assert_eq!(heap.arena_extent() % PAGE_SIZE, 0);
      heap.verify();

      heap.deallocate(anchor);
      assert_eq!(heap.arena_extent(), 0);
      let _ = extent;
    }
  }

  #[test]
  fn clear_empties_the_heap() {
    let heap = test_heap(64 * 1024);

    unsafe {
      heap.allocate(100);
      heap.allocate(200);
      assert_ne!(heap.arena_extent(), 0);

      heap.clear();

      assert_eq!(heap.arena_extent(), 0);
      heap.verify();

      // The heap keeps working after a clear.
      let address = heap.allocate(1);
      assert!(!address.is_null());
      heap.verify();
    }
  }

  #[test]
  fn global_alloc_respects_the_layout_contract() {
    let heap = test_heap(64 * 1024);

    unsafe {
      let layout = Layout::from_size_align(24, 8).unwrap();
      let address = GlobalAlloc::alloc(&heap, layout);
      assert!(!address.is_null());
      assert_eq!(address as usize % layout.align(), 0);

      let zeroed = GlobalAlloc::alloc_zeroed(&heap, layout);
      assert!((0..24).all(|i| zeroed.add(i).read() == 0));

      let grown = GlobalAlloc::realloc(&heap, address, layout, 64);
      assert!(!grown.is_null());

      GlobalAlloc::dealloc(&heap, grown, Layout::from_size_align(64, 8).unwrap());
      GlobalAlloc::dealloc(&heap, zeroed, layout);
      heap.verify();

      // Alignments past the fundamental one are refused.
      let huge_align = Layout::from_size_align(8, 64).unwrap();
      assert!(GlobalAlloc::alloc(&heap, huge_align).is_null());
    }
  }

  #[test]
  fn randomised_churn_preserves_every_invariant() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let heap = test_heap(1024 * 1024);
    let mut rng = StdRng::seed_from_u64(0x5E6A110C);
    let mut live: Vec<(*mut u8, usize, u8)> = Vec::new();

    for _ in 0..600 {
      match rng.gen_range(0..4) {
        // Allocate, tag the payload.
        0 | 1 => {
          let size = rng.gen_range(1..=512);
          let address = unsafe { heap.allocate(size) };
          if !address.is_null() {
            let tag = rng.r#gen::<u8>();
            unsafe {
              for i in 0..size {
                address.add(i).write(tag);
              }
            }
            live.push((address, size, tag));
          }
        }
        // Release a random block after checking its tag survived.
        2 if !live.is_empty() => {
          let index = rng.gen_range(0..live.len());
          let (address, size, tag) = live.swap_remove(index);
          unsafe {
            assert!((0..size).all(|i| address.add(i).read() == tag));
            heap.deallocate(address);
          }
        }
        // Resize a random block; the common prefix must survive.
        3 if !live.is_empty() => {
          let index = rng.gen_range(0..live.len());
          let (address, size, tag) = live[index];
          let new_size = rng.gen_range(1..=512);
          let moved = unsafe { heap.reallocate(address, new_size) };
          if !moved.is_null() {
            let kept = size.min(new_size);
            unsafe {
              assert!((0..kept).all(|i| moved.add(i).read() == tag));
              for i in 0..new_size {
                moved.add(i).write(tag);
              }
            }
            live[index] = (moved, new_size, tag);
          }
        }
        _ => {}
      }

      heap.verify();
    }

    for (address, ..) in live {
      unsafe { heap.deallocate(address) };
    }
    heap.verify();
  }

  #[test]
  fn the_heap_serialises_concurrent_callers() {
    use std::sync::Arc;

    let heap = Arc::new(test_heap(1024 * 1024));

    let workers: Vec<_> = (0..4usize)
      .map(|worker| {
        let heap = Arc::clone(&heap);
        std::thread::spawn(move || unsafe {
          for round in 0..200 {
            let size = 1 + (worker * 37 + round * 13) % 256;
            let address = heap.allocate(size);
            if address.is_null() {
              continue;
            }
            address.write(worker as u8);
            assert_eq!(address.read(), worker as u8);
            heap.deallocate(address);
          }
        })
      })
      .collect();

    for worker in workers {
      worker.join().unwrap();
    }

    heap.verify();
  }
}
