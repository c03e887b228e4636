use std::mem;

/// The largest alignment any scalar type requires on the target.
///
/// Every address handed out to a caller, and the size of every on-heap
/// record, is a multiple of this value. Hardcoded for 64-bit targets where
/// `max_align_t` is 16 bytes; 32-bit targets require smaller alignments
/// anyway, so this stays correct there too.
pub const ALIGNMENT: usize = 16;

/// Granularity of program-break movement. The arena only grows and shrinks
/// in whole multiples of this value to keep the syscall count down.
pub const PAGE_SIZE: usize = 4096;

static_assertions::const_assert!(ALIGNMENT >= mem::align_of::<u128>());
static_assertions::const_assert_eq!(PAGE_SIZE % ALIGNMENT, 0);

/// Rounds `$value` up to the next multiple of `$multiple`.
///
/// # Examples
///
/// ```rust
/// use segalloc::round_up;
///
/// assert_eq!(round_up!(13, 16), 16);
/// assert_eq!(round_up!(16, 16), 16);
/// assert_eq!(round_up!(17, 16), 32);
/// ```
#[macro_export]
macro_rules! round_up {
  ($value:expr, $multiple:expr) => {{
    let value: usize = $value;
    let multiple: usize = $multiple;
    match value % multiple {
      0 => value,
      remainder => value + multiple - remainder,
    }
  }};
}

/// Rounds `$value` down to the previous multiple of `$multiple`.
///
/// ```rust
/// use segalloc::round_down;
///
/// assert_eq!(round_down!(13, 16), 0);
/// assert_eq!(round_down!(8200, 4096), 8192);
/// ```
#[macro_export]
macro_rules! round_down {
  ($value:expr, $multiple:expr) => {{
    let value: usize = $value;
    let multiple: usize = $multiple;
    value - value % multiple
  }};
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_round_up() {
    let mut ranges = Vec::new();

    for i in 0..10 {
      let sizes = (ALIGNMENT * i + 1)..=(ALIGNMENT * (i + 1));

      let expected = ALIGNMENT * (i + 1);

      ranges.push((sizes, expected));
    }

    for (sizes, expected) in ranges {
      for size in sizes {
        assert_eq!(expected, round_up!(size, ALIGNMENT));
      }
    }

    assert_eq!(round_up!(0, ALIGNMENT), 0);
    assert_eq!(round_up!(1, PAGE_SIZE), PAGE_SIZE);
    assert_eq!(round_up!(PAGE_SIZE + 1, PAGE_SIZE), 2 * PAGE_SIZE);
  }

  #[test]
  fn test_round_down() {
    for i in 0..10 {
      for size in (ALIGNMENT * i)..(ALIGNMENT * (i + 1)) {
        assert_eq!(ALIGNMENT * i, round_down!(size, ALIGNMENT));
      }
    }

    assert_eq!(round_down!(0, PAGE_SIZE), 0);
    assert_eq!(round_down!(2 * PAGE_SIZE - 1, PAGE_SIZE), PAGE_SIZE);
  }

  #[test]
  fn round_up_and_down_agree_on_multiples() {
    for i in 0..64 {
      let value = i * ALIGNMENT;
      assert_eq!(round_up!(value, ALIGNMENT), round_down!(value, ALIGNMENT));
    }
  }
}
