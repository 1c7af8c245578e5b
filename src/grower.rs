//! Sources of raw heap memory.
//!
//! The heap needs exactly one primitive from the outside world: "give me N
//! more bytes right after the ones you gave me last time". [`SbrkGrower`]
//! answers it by moving the program break, [`ArenaGrower`] by carving a
//! privately owned region, which keeps tests independent of the process
//! break and gives a hard cap on growth.

use std::{
  alloc::{self, Layout},
  ptr::NonNull,
};

use libc::{c_void, intptr_t, sbrk};
use log::debug;

use crate::{align, align::WORD, error::HeapError};

/// Something that can extend a contiguous memory range.
///
/// # Safety
///
/// Implementors must return either `None` or a pointer to `bytes` writable
/// bytes aligned to [`WORD`] that stay valid for as long as the grower
/// lives, and must not hand the same bytes out twice.
pub unsafe trait HeapGrower {
  /// Obtains `bytes` more bytes and returns the start of the new range.
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>>;

  /// Undoes a `grow` that returned `start`, if that range is still the last
  /// one handed out. Returns `false` when the memory cannot be taken back.
  fn give_back(
    &mut self,
    _start: NonNull<u8>,
    _bytes: usize,
  ) -> bool {
    false
  }
}

/// Returns the current program break.
pub fn program_break() -> *const u8 {
  unsafe { sbrk(0) as *const u8 }
}

fn sbrk_failed(address: *mut c_void) -> bool {
  address == usize::MAX as *mut c_void
}

/// Grows the heap by moving the program break with `sbrk(2)`.
///
/// The first call pads the break up to a word boundary so every block
/// header lands on an aligned address.
#[derive(Debug, Default)]
pub struct SbrkGrower {
  aligned: bool,
}

impl SbrkGrower {
  pub const fn new() -> Self {
    Self { aligned: false }
  }
}

unsafe impl HeapGrower for SbrkGrower {
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    let increment = intptr_t::try_from(bytes).ok()?;

    unsafe {
      if !self.aligned {
        let current = sbrk(0);
        if sbrk_failed(current) {
          return None;
        }

        let padding = align!(current as usize) - current as usize;
        if padding != 0 && sbrk_failed(sbrk(padding as intptr_t)) {
          return None;
        }
        self.aligned = true;
      }

      let address = sbrk(increment);

      if sbrk_failed(address) {
        debug!("sbrk refused {} bytes", bytes);
        return None;
      }

      NonNull::new(address as *mut u8)
    }
  }

  fn give_back(
    &mut self,
    start: NonNull<u8>,
    bytes: usize,
  ) -> bool {
    let Ok(decrement) = intptr_t::try_from(bytes) else {
      return false;
    };

    unsafe {
      // Only the topmost range can be returned; someone may have moved the
      // break past it since.
      if sbrk(0) as usize != start.as_ptr() as usize + bytes {
        return false;
      }

      !sbrk_failed(sbrk(-decrement))
    }
  }
}

/// Hands out consecutive slices of one zeroed region allocated up front.
#[derive(Debug)]
pub struct ArenaGrower {
  base: NonNull<u8>,
  layout: Layout,
  used: usize,
}

impl ArenaGrower {
  /// Reserves an arena of at least `capacity` bytes, rounded up to a word.
  pub fn with_capacity(capacity: usize) -> Result<Self, HeapError> {
    let out_of_memory = HeapError::OutOfMemory {
      requested: capacity,
      limit: None,
    };

    let size = capacity
      .max(WORD)
      .checked_next_multiple_of(WORD)
      .ok_or(out_of_memory.clone())?;
    let layout = Layout::from_size_align(size, WORD).map_err(|_| out_of_memory.clone())?;

    let base = NonNull::new(unsafe { alloc::alloc_zeroed(layout) }).ok_or(out_of_memory)?;

    Ok(Self {
      base,
      layout,
      used: 0,
    })
  }

  pub fn capacity(&self) -> usize {
    self.layout.size()
  }

  pub fn remaining(&self) -> usize {
    self.capacity() - self.used
  }
}

unsafe impl HeapGrower for ArenaGrower {
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    if bytes > self.remaining() {
      debug!(
        "arena exhausted: {} bytes requested, {} left",
        bytes,
        self.remaining()
      );
      return None;
    }

    let start = unsafe { self.base.add(self.used) };
    self.used += bytes;
    Some(start)
  }

  fn give_back(
    &mut self,
    start: NonNull<u8>,
    bytes: usize,
  ) -> bool {
    let offset = (start.as_ptr() as usize).wrapping_sub(self.base.as_ptr() as usize);
    if bytes > self.used || offset != self.used - bytes {
      return false;
    }

    self.used -= bytes;
    true
  }
}

impl Drop for ArenaGrower {
  fn drop(&mut self) {
    unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) }
  }
}
