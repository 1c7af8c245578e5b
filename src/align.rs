/// Size in bytes of one machine word.
///
/// Every boundary tag is one word wide and every block size is a multiple of
/// it, which leaves the low bits of a tag free for flags.
pub const WORD: usize = ::core::mem::size_of::<usize>();

/// Rounds a byte count up to the next multiple of [`WORD`]. Block sizes and
/// payload offsets are always produced through it.
///
/// ```rust
/// use babyalloc::{align, align::WORD};
///
/// assert_eq!(align!(1), WORD);
/// assert_eq!(align!(WORD + 1), 2 * WORD);
/// assert_eq!(align!(3 * WORD), 3 * WORD);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + ::core::mem::size_of::<usize>() - 1) & !(::core::mem::size_of::<usize>() - 1)
  };
}

#[cfg(test)]
mod tests {
  use super::WORD;

  #[test]
  fn test_align_rounds_up_to_nearest_word() {
    for n in 0..=16 * WORD {
      let aligned = align!(n);

      assert_eq!(aligned % WORD, 0, "align!({}) = {}", n, aligned);
      assert!(aligned >= n && aligned - n < WORD, "align!({}) = {}", n, aligned);
    }
  }

  #[test]
  fn test_align_is_idempotent() {
    assert_eq!(align!(0), 0);
    for n in [1, WORD - 1, WORD + 1, 100, 4093] {
      assert_eq!(align!(align!(n)), align!(n));
    }
  }
}
