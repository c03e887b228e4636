//! # segalloc - A Segment-Directory Heap Allocator
//!
//! This crate implements the classic four-operation process heap —
//! allocate, release, zero-initialised allocate, resize — on top of a
//! single contiguous arena managed through the program break (`sbrk`).
//!
//! ## Overview
//!
//! ```text
//!   Arena Layout:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                          HEAP ARENA                                  │
//!   │                                                                      │
//!   │   ┌─────┬──────────┬─────┬──────────┬──────┬──────────┬───────────┐  │
//!   │   │ Dir │ block A  │ gap │ block B  │ gap  │ block C  │   free    │  │
//!   │   └─────┴──────────┴─────┴──────────┴──────┴──────────┴───────────┘  │
//!   │   ▲                                                             ▲    │
//!   │   │                                                             │    │
//!   │  base (fixed at first use)                          Program Break    │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Each block = Head record + payload + Tail record.
//!   Each tail records how many free bytes follow it, so the gaps need
//!   no free list of their own.
//! ```
//!
//! The blocks form a doubly linked list that is circular across the arena:
//! the first head points back at the last tail and the last tail points
//! forward at the first head. Four placement policies — first-fit,
//! best-fit, worst-fit and next-fit — scan the gaps described by that list;
//! resize works in place whenever the neighbouring gap allows it; and the
//! break only ever moves in whole pages, forward on growth and backward
//! when free pages collect at the top of the arena.
//!
//! ## Crate Structure
//!
//! ```text
//!   segalloc
//!   ├── align      - round_up!/round_down! macros, alignment constants
//!   ├── raw        - single-byte read/write, zero fill, forward copy
//!   ├── grow       - the program-break seam (Grower, BrkGrower, BufferGrower)
//!   ├── directory  - the on-heap directory, head and tail records
//!   ├── policy     - the four placement policies
//!   ├── segment    - block insert/remove, in-place resize, arena growth
//!   └── heap       - the public Heap type and its four operations
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use segalloc::{Heap, Policy};
//!
//! static HEAP: Heap = Heap::new();
//!
//! fn main() {
//!     HEAP.set_policy(Policy::BestFit);
//!
//!     unsafe {
//!         let ptr = HEAP.allocate(64);
//!         assert!(!ptr.is_null());
//!
//!         ptr.write(42);
//!         assert_eq!(ptr.read(), 42);
//!
//!         let bigger = HEAP.reallocate(ptr, 128);
//!         HEAP.deallocate(bigger);
//!     }
//! }
//! ```
//!
//! The heap also implements [`core::alloc::GlobalAlloc`], so it can stand
//! in for the process allocator:
//!
//! ```rust,ignore
//! #[global_allocator]
//! static HEAP: segalloc::Heap = segalloc::Heap::new();
//! ```
//!
//! In that configuration no `tracing` subscriber may be installed:
//! subscribers allocate while handling events, and the entry points must
//! never re-enter the allocator they implement. Without a subscriber the
//! events are disabled stubs and cost nothing.
//!
//! ## Thread Safety
//!
//! All four operations serialise on one internal spin mutex, so a single
//! `Heap` (or a `static` of it) is safe to share across threads. The lock
//! is a spin lock precisely because it never allocates.
//!
//! ## Safety
//!
//! The crate deals in raw process memory and follows the classic heap
//! contract: passing an address the heap never returned, releasing twice,
//! or touching released payload is undefined behaviour and is not
//! detected.

pub mod align;
mod directory;
mod grow;
mod heap;
mod policy;
mod raw;
mod segment;

pub use align::{ALIGNMENT, PAGE_SIZE};
pub use grow::{BrkGrower, BufferGrower, GrowError, Grower};
pub use heap::Heap;
pub use policy::Policy;
