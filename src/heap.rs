use std::{alloc::Layout, ptr, ptr::NonNull};

use log::{debug, trace};

use crate::{
  align,
  align::WORD,
  block::{Block, Tag},
  config::HeapConfig,
  error::HeapError,
  grower::{HeapGrower, SbrkGrower},
};

/// Bytes a block occupies besides its payload.
const OVERHEAD: usize = 2 * WORD;

/// A boundary-tag heap over one contiguous range.
///
/// `start` is the header of the first block, `end` is the offset just past
/// the last footer. The word at `end` is always an explicit zero terminator,
/// so the range obtained from the grower is `end + WORD` bytes long.
///
/// `stranded` records a region the grower returned out of place and could
/// not take back; once set the heap stops growing.
pub struct Heap<G: HeapGrower = SbrkGrower> {
  grower: G,
  config: HeapConfig,
  start: *mut u8,
  end: usize,
  stranded: Option<usize>,
}

impl Heap<SbrkGrower> {
  /// Creates a heap backed by the program break.
  pub fn new() -> Self {
    Self::with_config(HeapConfig::default())
  }

  pub fn with_config(config: HeapConfig) -> Self {
    Self::with_grower(SbrkGrower::new(), config)
  }
}

impl Default for Heap<SbrkGrower> {
  fn default() -> Self {
    Self::new()
  }
}

impl<G: HeapGrower> Heap<G> {
  /// Creates an empty heap. Nothing is requested from `grower` until the
  /// first allocation.
  pub fn with_grower(
    grower: G,
    config: HeapConfig,
  ) -> Self {
    Self {
      grower,
      config,
      start: ptr::null_mut(),
      end: 0,
      stranded: None,
    }
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub fn grower(&self) -> &G {
    &self.grower
  }

  pub fn is_initialized(&self) -> bool {
    !self.start.is_null()
  }

  /// Header address of the first block.
  pub fn start(&self) -> Option<NonNull<u8>> {
    NonNull::new(self.start)
  }

  /// Address just past the last footer, where the terminator word sits.
  pub fn end(&self) -> Option<NonNull<u8>> {
    self.start().map(|start| unsafe { start.add(self.end) })
  }

  /// Bytes covered by blocks, headers and footers included.
  pub fn extent(&self) -> usize {
    self.end
  }

  pub(crate) fn end_offset(&self) -> usize {
    self.end
  }

  pub(crate) fn read_tag(
    &self,
    offset: usize,
  ) -> Tag {
    debug_assert!(self.is_initialized(), "read from an empty heap");
    debug_assert!(
      offset % WORD == 0 && offset <= self.end,
      "tag offset {} outside heap of {} bytes",
      offset,
      self.end
    );

    unsafe { Tag::from_raw(self.start.add(offset).cast::<usize>().read()) }
  }

  pub(crate) fn write_tag(
    &mut self,
    offset: usize,
    tag: Tag,
  ) {
    debug_assert!(self.is_initialized(), "write to an empty heap");
    debug_assert!(
      offset % WORD == 0 && offset <= self.end,
      "tag offset {} outside heap of {} bytes",
      offset,
      self.end
    );

    unsafe { self.start.add(offset).cast::<usize>().write(tag.into_raw()) }
  }

  pub(crate) fn header(
    &self,
    block: Block,
  ) -> Tag {
    self.read_tag(block.offset())
  }

  pub(crate) fn footer(
    &self,
    block: Block,
  ) -> Tag {
    self.read_tag(block.footer(self.header(block).size()))
  }

  /// Writes the same tag into the header and footer of `block`.
  fn set_tags(
    &mut self,
    block: Block,
    tag: Tag,
  ) {
    self.write_tag(block.offset(), tag);
    self.write_tag(block.footer(tag.size()), tag);
  }

  pub(crate) fn address_of(
    &self,
    offset: usize,
  ) -> usize {
    self.start as usize + offset
  }

  fn payload_ptr(
    &self,
    block: Block,
  ) -> NonNull<u8> {
    unsafe { NonNull::new_unchecked(self.start.add(block.payload())) }
  }

  /// Rounds a request up to a block size: at least one word, so no block
  /// header can ever read as the terminator.
  fn block_size(
    &self,
    requested: usize,
  ) -> Result<usize, HeapError> {
    if requested > usize::MAX - 4 * WORD {
      return Err(HeapError::OutOfMemory {
        requested,
        limit: self.config.limit,
      });
    }

    Ok(align!(requested.max(1)))
  }

  /// Obtains room for a free block of `size` payload bytes at the high end
  /// of the heap and moves the terminator past it.
  ///
  /// The first extension also pays for the terminator word. Later ones reuse
  /// the old terminator word as the new block's header. Nothing is written
  /// unless the grower succeeds and its memory continues the heap.
  fn extend(
    &mut self,
    size: usize,
  ) -> Result<Block, HeapError> {
    let first = !self.is_initialized();
    let requested = if first {
      size + OVERHEAD + WORD
    } else {
      size + OVERHEAD
    };
    let obtained = if first { 0 } else { self.end + WORD };

    if let Some(found) = self.stranded {
      return Err(HeapError::Discontiguous {
        expected: self.address_of(obtained),
        found,
      });
    }

    if let Some(limit) = self.config.limit {
      if obtained.saturating_add(requested) > limit {
        debug!(
          "extension of {} bytes refused, {} of {} bytes in use",
          requested, obtained, limit
        );
        return Err(HeapError::OutOfMemory {
          requested,
          limit: Some(limit),
        });
      }
    }

    let region = self
      .grower
      .grow(requested)
      .ok_or(HeapError::OutOfMemory {
        requested,
        limit: self.config.limit,
      })?;

    let block = if first {
      self.start = region.as_ptr();
      Block::FIRST
    } else {
      let expected = self.address_of(self.end + WORD);
      let found = region.as_ptr() as usize;
      if found != expected {
        if self.grower.give_back(region, requested) {
          debug!(
            "grower returned {:#x}, heap continues at {:#x}; region given back",
            found, expected
          );
        } else {
          debug!(
            "grower returned {:#x}, heap continues at {:#x}; heap can no longer grow",
            found, expected
          );
          self.stranded = Some(found);
        }
        return Err(HeapError::Discontiguous { expected, found });
      }
      Block::at(self.end)
    };

    self.end = block.next(size).offset();
    self.set_tags(block, Tag::new(size, false));
    self.write_tag(self.end, Tag::TERMINATOR);

    debug!(
      "heap extended by {} bytes, block at offset {} with {} payload bytes",
      requested,
      block.offset(),
      size
    );

    Ok(block)
  }

  /// First free block, in address order, with at least `size` payload bytes.
  fn find_fit(
    &self,
    size: usize,
  ) -> Option<Block> {
    self.blocks().find(|&block| {
      let tag = self.header(block);
      trace!(
        "scan offset {}: size {}, used {}",
        block.offset(),
        tag.size(),
        tag.is_used()
      );
      !tag.is_used() && tag.size() >= size
    })
  }

  /// Allocates at least `size` bytes and returns the payload address.
  ///
  /// The first fitting free block is handed out whole; blocks are never
  /// split. On a miss the heap grows by exactly one block.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, HeapError> {
    let size = self.block_size(size)?;

    if !self.is_initialized() {
      self.extend(size)?;
    }

    let block = match self.find_fit(size) {
      Some(block) => {
        debug!(
          "allocate {}: reusing block at offset {}",
          size,
          block.offset()
        );
        block
      }
      None => {
        debug!("allocate {}: no fit, growing heap", size);
        self.extend(size)?
      }
    };

    let tag = self.header(block).used();
    self.set_tags(block, tag);

    Ok(self.payload_ptr(block))
  }

  /// Allocates for a `Layout`. Payloads are word aligned, so stricter
  /// alignments are rejected.
  pub fn allocate_layout(
    &mut self,
    layout: Layout,
  ) -> Result<NonNull<u8>, HeapError> {
    if layout.align() > WORD {
      return Err(HeapError::UnsupportedAlignment {
        align: layout.align(),
      });
    }

    self.allocate(layout.size())
  }

  /// Returns a block to the heap, zeroes its payload and merges it with free
  /// neighbours.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by `allocate` on this heap and not been
  /// released since. With `validate_releases` set a violation panics instead
  /// of corrupting the heap.
  pub unsafe fn release(
    &mut self,
    ptr: NonNull<u8>,
  ) {
    let block = if self.config.validate_releases {
      match self.validate(ptr) {
        Ok(block) => block,
        Err(err) => panic!("release of {:p}: {}", ptr, err),
      }
    } else {
      Block::from_payload(ptr.as_ptr() as usize - self.start as usize)
    };

    self.free_block(block);
  }

  /// Checked release: looks `ptr` up among the blocks first and leaves the
  /// heap untouched if it is not a live allocation.
  pub fn try_release(
    &mut self,
    ptr: NonNull<u8>,
  ) -> Result<(), HeapError> {
    let block = self.validate(ptr)?;
    self.free_block(block);
    Ok(())
  }

  fn validate(
    &self,
    ptr: NonNull<u8>,
  ) -> Result<Block, HeapError> {
    let address = ptr.as_ptr() as usize;

    let block = self
      .blocks()
      .find(|block| self.address_of(block.payload()) == address)
      .ok_or(HeapError::InvalidPointer { address })?;

    if !self.header(block).is_used() {
      return Err(HeapError::DoubleFree { address });
    }

    Ok(block)
  }

  fn free_block(
    &mut self,
    block: Block,
  ) {
    let tag = self.header(block).free();
    self.set_tags(block, tag);

    unsafe { ptr::write_bytes(self.start.add(block.payload()), 0, tag.size()) };

    debug!(
      "released block at offset {} ({} bytes)",
      block.offset(),
      tag.size()
    );

    self.coalesce(block);
  }

  /// Merges a freshly freed block with its free neighbours and returns the
  /// resulting block. Stale tags left inside the merged payload are zeroed
  /// so a free payload reads as zero throughout.
  fn coalesce(
    &mut self,
    block: Block,
  ) -> Block {
    let size = self.header(block).size();

    let prev = block.prev_footer().and_then(|footer| {
      let prev = block.prev(self.read_tag(footer).size());
      (!self.header(prev).is_used()).then_some(prev)
    });

    let next = block.next(size);
    let next = (next.offset() < self.end && !self.header(next).is_used()).then_some(next);

    let (merged, merged_size, seams) = match (prev, next) {
      (Some(prev), Some(next)) => (
        prev,
        self.header(prev).size() + size + self.header(next).size() + 2 * OVERHEAD,
        [Some(block), Some(next)],
      ),
      (Some(prev), None) => (
        prev,
        self.header(prev).size() + size + OVERHEAD,
        [Some(block), None],
      ),
      (None, Some(next)) => (
        block,
        size + self.header(next).size() + OVERHEAD,
        [Some(next), None],
      ),
      (None, None) => return block,
    };

    // Each absorbed block leaves its header and the footer before it behind.
    for seam in seams.into_iter().flatten() {
      self.write_tag(seam.offset() - WORD, Tag::TERMINATOR);
      self.write_tag(seam.offset(), Tag::TERMINATOR);
    }

    self.set_tags(merged, Tag::new(merged_size, false));

    if merged.is_first() {
      debug_assert_eq!(self.header(Block::FIRST).size(), merged_size);
      debug!("merge reached the first block, now {} bytes", merged_size);
    } else {
      debug!(
        "merged free block at offset {}, now {} bytes",
        merged.offset(),
        merged_size
      );
    }

    merged
  }
}
