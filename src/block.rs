//! Boundary-tag encoding and the block accessor.
//!
//! ```text
//!   offset          offset + WORD                 offset + WORD + size
//!   │               │                             │
//!   ▼               ▼                             ▼
//!   ┌───────────────┬─────────────────────────────┬───────────────┐
//!   │ header (Tag)  │        payload (size)       │ footer (Tag)  │
//!   └───────────────┴─────────────────────────────┴───────────────┘
//!                                                                  ▲
//!                                   next block: offset + size + 2 * WORD
//! ```

use std::fmt;

use crate::align::WORD;

/// One boundary-tag word: the payload size in the high bits and the used
/// flag in the least-significant bit.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Tag(usize);

impl Tag {
  const USED: usize = 0x1;

  /// The all-zero word that ends a block scan.
  pub const TERMINATOR: Tag = Tag(0);

  pub const fn new(
    size: usize,
    used: bool,
  ) -> Self {
    debug_assert!(size % WORD == 0, "block size must be word aligned");
    Tag(size | if used { Self::USED } else { 0 })
  }

  pub const fn from_raw(raw: usize) -> Self {
    Tag(raw)
  }

  pub const fn into_raw(self) -> usize {
    self.0
  }

  pub const fn size(self) -> usize {
    self.0 & !(WORD - 1)
  }

  pub const fn is_used(self) -> bool {
    self.0 & Self::USED != 0
  }

  pub const fn is_terminator(self) -> bool {
    self.0 == 0
  }

  pub const fn used(self) -> Self {
    Tag(self.0 | Self::USED)
  }

  pub const fn free(self) -> Self {
    Tag(self.0 & !Self::USED)
  }
}

impl fmt::Debug for Tag {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Tag")
      .field("size", &self.size())
      .field("used", &self.is_used())
      .finish()
  }
}

/// A block, identified by the byte offset of its header from the start of
/// the heap. Carries no size of its own; sizes are always read back from the
/// tags so a `Block` can never disagree with memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Block {
  offset: usize,
}

impl Block {
  pub const FIRST: Block = Block { offset: 0 };

  pub const fn at(offset: usize) -> Self {
    Self { offset }
  }

  pub const fn offset(self) -> usize {
    self.offset
  }

  pub const fn is_first(self) -> bool {
    self.offset == 0
  }

  pub const fn payload(self) -> usize {
    self.offset + WORD
  }

  pub const fn footer(
    self,
    size: usize,
  ) -> usize {
    self.offset + WORD + size
  }

  /// Block whose header follows this block's footer.
  pub const fn next(
    self,
    size: usize,
  ) -> Block {
    Block::at(self.offset + size + 2 * WORD)
  }

  /// Offset of the word just before the header, which is the predecessor's
  /// footer. `None` for the first block.
  pub const fn prev_footer(self) -> Option<usize> {
    if self.is_first() {
      None
    } else {
      Some(self.offset - WORD)
    }
  }

  /// Predecessor block given the size read from its footer.
  pub const fn prev(
    self,
    prev_size: usize,
  ) -> Block {
    Block::at(self.offset - prev_size - 2 * WORD)
  }

  /// Recovers a block from the offset of its payload.
  pub const fn from_payload(payload: usize) -> Self {
    Block::at(payload - WORD)
  }
}

#[cfg(test)]
mod tests {
  use static_assertions::const_assert;

  use super::*;

  // Bit 0 carries the used flag, so sizes must leave it clear.
  const_assert!(WORD >= 2);
  const_assert!(WORD.is_power_of_two());

  #[test]
  fn test_tag_encoding() {
    let free = Tag::new(4 * WORD, false);
    assert_eq!(free.size(), 4 * WORD);
    assert!(!free.is_used());
    assert_eq!(free.into_raw(), 4 * WORD);

    let used = free.used();
    assert_eq!(used.size(), 4 * WORD);
    assert!(used.is_used());
    assert_eq!(used.into_raw(), 4 * WORD + 1);

    assert_eq!(used.free(), free);
    assert_eq!(Tag::from_raw(used.into_raw()), used);
  }

  #[test]
  fn test_terminator() {
    assert!(Tag::TERMINATOR.is_terminator());
    assert!(!Tag::new(WORD, false).is_terminator());
    // A used block never reads as zero, even with the smallest size.
    assert!(!Tag::new(WORD, true).is_terminator());
  }

  #[test]
  fn test_block_offsets() {
    let block = Block::at(3 * WORD);
    let size = 2 * WORD;

    assert_eq!(block.payload(), 4 * WORD);
    assert_eq!(block.footer(size), 6 * WORD);
    assert_eq!(block.next(size), Block::at(7 * WORD));
    assert_eq!(block.prev_footer(), Some(2 * WORD));
    assert_eq!(block.prev(WORD), Block::at(0));
    assert_eq!(Block::from_payload(block.payload()), block);
  }

  #[test]
  fn test_first_block_has_no_predecessor() {
    assert!(Block::FIRST.is_first());
    assert_eq!(Block::FIRST.prev_footer(), None);
  }
}
