//! Errors reported by the heap.
//!
//! Only [`HeapError::OutOfMemory`], [`HeapError::Discontiguous`] and
//! [`HeapError::UnsupportedAlignment`] come out of allocation. The remaining
//! variants are produced by the checked release path and the consistency
//! walk; the unchecked release path never reports anything.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
  /// The grower refused the extension, or it would exceed the configured limit
  OutOfMemory {
    requested: usize,
    limit: Option<usize>,
  },

  /// The grower returned memory that does not continue the heap
  Discontiguous { expected: usize, found: usize },

  /// Requested alignment is stricter than one word
  UnsupportedAlignment { align: usize },

  /// Address is not the payload of any block in this heap
  InvalidPointer { address: usize },

  /// Address belongs to a block that is already free
  DoubleFree { address: usize },

  /// Consistency walk found a malformed block
  Corrupted { offset: usize, reason: &'static str },
}

impl fmt::Display for HeapError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      HeapError::OutOfMemory {
        requested,
        limit: Some(limit),
      } => write!(
        f,
        "Out of memory: extension of {} bytes exceeds heap limit of {} bytes",
        requested, limit
      ),
      HeapError::OutOfMemory {
        requested,
        limit: None,
      } => write!(f, "Out of memory: could not obtain {} bytes", requested),
      HeapError::Discontiguous { expected, found } => write!(
        f,
        "Heap extension at {:#x} does not continue the heap ending at {:#x}",
        found, expected
      ),
      HeapError::UnsupportedAlignment { align } => {
        write!(f, "Alignment of {} bytes is not supported", align)
      }
      HeapError::InvalidPointer { address } => {
        write!(f, "Address {:#x} was not returned by this heap", address)
      }
      HeapError::DoubleFree { address } => {
        write!(f, "Double free of address {:#x}", address)
      }
      HeapError::Corrupted { offset, reason } => {
        write!(f, "Heap corrupted at offset {}: {}", offset, reason)
      }
    }
  }
}

impl std::error::Error for HeapError {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_display() {
    let err = HeapError::OutOfMemory {
      requested: 48,
      limit: Some(32),
    };
    assert_eq!(
      err.to_string(),
      "Out of memory: extension of 48 bytes exceeds heap limit of 32 bytes"
    );

    let err = HeapError::DoubleFree { address: 0x10 };
    assert_eq!(err.to_string(), "Double free of address 0x10");
  }
}
