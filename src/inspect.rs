//! Read-only views of a heap: block iteration, dumps and a consistency walk.

use std::fmt;

use crate::{
  align::WORD,
  block::{Block, Tag},
  error::HeapError,
  grower::HeapGrower,
  heap::Heap,
};

/// One line of a heap dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  /// Header address.
  pub address: *const u8,
  pub header_size: usize,
  pub footer_size: usize,
  pub used: bool,
}

impl fmt::Display for BlockInfo {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(
      f,
      "Block at {:p}: size {} {}, {}",
      self.address,
      self.header_size,
      self.footer_size,
      if self.used { "used" } else { "free" }
    )
  }
}

/// Textual listing of every block, one per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapDump(pub Vec<BlockInfo>);

impl fmt::Display for HeapDump {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    for info in &self.0 {
      writeln!(f, "{}", info)?;
    }
    Ok(())
  }
}

/// Walks blocks in address order until the terminator word.
pub struct Blocks<'h, G: HeapGrower> {
  heap: &'h Heap<G>,
  cursor: Option<Block>,
}

impl<G: HeapGrower> Iterator for Blocks<'_, G> {
  type Item = Block;

  fn next(&mut self) -> Option<Block> {
    let block = self.cursor?;

    // The end check only matters for a corrupted heap; a sound one always
    // stops on the terminator first.
    if block.offset() >= self.heap.end_offset() || self.heap.header(block).is_terminator() {
      self.cursor = None;
      return None;
    }

    self.cursor = Some(block.next(self.heap.header(block).size()));
    Some(block)
  }
}

impl<G: HeapGrower> Heap<G> {
  pub fn blocks(&self) -> Blocks<'_, G> {
    Blocks {
      heap: self,
      cursor: self.is_initialized().then_some(Block::FIRST),
    }
  }

  pub fn block_info(
    &self,
    block: Block,
  ) -> BlockInfo {
    let header = self.header(block);

    BlockInfo {
      address: self.address_of(block.offset()) as *const u8,
      header_size: header.size(),
      footer_size: self.footer(block).size(),
      used: header.is_used(),
    }
  }

  /// Every block from the start of the heap to the terminator.
  pub fn dump(&self) -> Vec<BlockInfo> {
    self
      .blocks()
      .map(|block| self.block_info(block))
      .collect()
  }

  pub fn listing(&self) -> HeapDump {
    HeapDump(self.dump())
  }

  /// Verifies the block structure without trusting it: matching tags, no two
  /// neighbouring free blocks, blocks tiling the heap exactly and a zero
  /// terminator at the end.
  pub fn check(&self) -> Result<(), HeapError> {
    if !self.is_initialized() {
      return Ok(());
    }

    let end = self.end_offset();
    let mut block = Block::FIRST;
    let mut prev_free = false;

    while block.offset() < end {
      let corrupted = move |reason| HeapError::Corrupted {
        offset: block.offset(),
        reason,
      };

      let header = self.header(block);
      if header.is_terminator() {
        return Err(corrupted("terminator before heap end"));
      }
      if header.size() == 0 {
        return Err(corrupted("empty block"));
      }

      let footer = block.footer(header.size());
      if footer.checked_add(WORD).is_none_or(|past| past > end) {
        return Err(corrupted("block runs past heap end"));
      }
      if self.read_tag(footer) != header {
        return Err(corrupted("header and footer disagree"));
      }

      if !header.is_used() && prev_free {
        return Err(corrupted("adjacent free blocks"));
      }

      prev_free = !header.is_used();
      block = block.next(header.size());
    }

    if self.read_tag(end) != Tag::TERMINATOR {
      return Err(HeapError::Corrupted {
        offset: end,
        reason: "missing terminator",
      });
    }

    Ok(())
  }
}

impl<G: HeapGrower> fmt::Debug for Heap<G> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Heap")
      .field("start", &self.start())
      .field("extent", &self.extent())
      .field("blocks", &self.blocks().count())
      .finish()
  }
}

/// Prints every block of `heap` to stdout.
pub fn print_heap<G: HeapGrower>(heap: &Heap<G>) {
  print!("{}", heap.listing());
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{config::HeapConfig, grower::ArenaGrower};

  fn arena_heap() -> Heap<ArenaGrower> {
    Heap::with_grower(
      ArenaGrower::with_capacity(1024).unwrap(),
      HeapConfig::default(),
    )
  }

  #[test]
  fn test_dump_lists_every_block() {
    let mut heap = arena_heap();

    let a = heap.allocate(16).unwrap();
    let _b = heap.allocate(32).unwrap();
    unsafe { heap.release(a) };

    let start = heap.start().unwrap().as_ptr() as *const u8;
    assert_eq!(
      heap.dump(),
      vec![
        BlockInfo {
          address: start,
          header_size: 16,
          footer_size: 16,
          used: false,
        },
        BlockInfo {
          address: start.wrapping_add(16 + 2 * WORD),
          header_size: 32,
          footer_size: 32,
          used: true,
        },
      ]
    );
  }

  #[test]
  fn test_dump_does_not_mutate() {
    let mut heap = arena_heap();
    heap.allocate(8).unwrap();
    heap.allocate(24).unwrap();

    let first = heap.dump();
    let extent = heap.extent();

    assert_eq!(heap.dump(), first);
    assert_eq!(heap.extent(), extent);
  }

  #[test]
  fn test_empty_heap() {
    let heap = arena_heap();

    assert!(heap.dump().is_empty());
    assert_eq!(heap.listing().to_string(), "");
    assert_eq!(heap.check(), Ok(()));
  }

  #[test]
  fn test_listing_format() {
    let mut heap = arena_heap();
    heap.allocate(8).unwrap();
    heap.allocate(16).unwrap();

    let listing = heap.listing().to_string();
    let lines: Vec<&str> = listing.lines().collect();

    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Block at 0x"));
    assert!(lines[0].ends_with(": size 8 8, used"));
    assert!(lines[1].ends_with(": size 16 16, used"));
  }

  #[test]
  fn test_check_detects_mismatched_footer() {
    let mut heap = arena_heap();
    heap.allocate(8).unwrap();
    let _b = heap.allocate(16).unwrap();
    heap.check().unwrap();

    let second = Block::FIRST.next(8);
    heap.write_tag(second.footer(16), Tag::new(8, true));

    assert_eq!(
      heap.check(),
      Err(HeapError::Corrupted {
        offset: second.offset(),
        reason: "header and footer disagree",
      })
    );
    assert_eq!(heap.dump()[1].footer_size, 8);
  }

  #[test]
  fn test_check_detects_adjacent_free_blocks() {
    let mut heap = arena_heap();
    heap.allocate(8).unwrap();
    heap.allocate(8).unwrap();

    // Relabel both blocks free behind the coalescer's back.
    let second = Block::FIRST.next(8);
    heap.write_tag(Block::FIRST.offset(), Tag::new(8, false));
    heap.write_tag(Block::FIRST.footer(8), Tag::new(8, false));
    heap.write_tag(second.offset(), Tag::new(8, false));
    heap.write_tag(second.footer(8), Tag::new(8, false));

    assert_eq!(
      heap.check(),
      Err(HeapError::Corrupted {
        offset: second.offset(),
        reason: "adjacent free blocks",
      })
    );
  }

  #[test]
  fn test_check_detects_missing_terminator() {
    let mut heap = arena_heap();
    heap.allocate(8).unwrap();

    let end = heap.end_offset();
    heap.write_tag(end, Tag::new(8, false));

    assert_eq!(
      heap.check(),
      Err(HeapError::Corrupted {
        offset: end,
        reason: "missing terminator",
      })
    );
  }

  #[test]
  fn test_debug_summary() {
    let mut heap = arena_heap();
    heap.allocate(8).unwrap();

    let debug = format!("{:?}", heap);
    assert!(debug.contains(&format!("extent: {}", 8 + 2 * WORD)));
    assert!(debug.contains("blocks: 1"));
  }
}
