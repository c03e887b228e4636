use std::io::Read;

use libc::sbrk;
use segalloc::{Heap, Policy};

static HEAP: Heap = Heap::new();

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`,
/// `htop`, `gdb`, or just visually track how the program break moves.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn main() {
  unsafe {
    print_program_break("start");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 1) First allocation: creates the directory and claims one page.
    // --------------------------------------------------------------------
    let first = HEAP.allocate(64);
    println!("\n[1] Allocate 64 bytes at {first:?}");
    print_program_break("after first allocation");

    first.cast::<u64>().write(0xDEADBEEF);
    println!("[1] Value written = 0x{:X}", first.cast::<u64>().read());

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Two more blocks; watch the addresses pack tightly.
    // --------------------------------------------------------------------
    let second = HEAP.allocate(200);
    let third = HEAP.allocate(16);
    println!("\n[2] Allocate 200 bytes at {second:?}");
    println!("[2] Allocate  16 bytes at {third:?}");
    println!(
      "[2] Every address is 16-byte aligned: {} {} {}",
      first as usize % 16,
      second as usize % 16,
      third as usize % 16,
    );

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Release the middle block and reuse its gap.
    // --------------------------------------------------------------------
    HEAP.deallocate(second);
    println!("\n[3] Released the 200-byte block");

    let reused = HEAP.allocate(100);
    println!(
      "[3] Allocate 100 bytes at {reused:?} — {}",
      if reused == second {
        "the freed gap was reused"
      } else {
        "placed elsewhere"
      }
    );

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Switch to next-fit and watch placements move past the cursor.
    // --------------------------------------------------------------------
    HEAP.set_policy(Policy::NextFit);
    let after_cursor = HEAP.allocate(32);
    println!("\n[4] Under next-fit the new block lands at {after_cursor:?}");

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Grow a block in place, then force it to move.
    // --------------------------------------------------------------------
    let grown = HEAP.reallocate(after_cursor, 64);
    println!(
      "\n[5] Resize 32 → 64: {}",
      if grown == after_cursor {
        "expanded in place"
      } else {
        "moved to a new block"
      }
    );

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 6) Release everything; the break falls back to the directory.
    // --------------------------------------------------------------------
    print_program_break("before releasing everything");

    HEAP.deallocate(first);
    HEAP.deallocate(third);
    HEAP.deallocate(reused);
    HEAP.deallocate(grown);

    print_program_break("after releasing everything");
    println!("\n[6] End of demo. The OS reclaims the rest on exit.");
  }
}
