//! # babyalloc - A Boundary-Tag Heap Allocator
//!
//! This crate provides a small **first-fit allocator** with boundary tags and
//! immediate coalescing, managing one contiguous range that grows through
//! `sbrk(2)` or any other [`HeapGrower`].
//!
//! ## Overview
//!
//! Every block carries its size and a used flag twice, once before and once
//! after the payload, so the heap can be walked in both directions:
//!
//! ```text
//!   Heap Layout:
//!
//!   start                                                           end
//!   ▼                                                                ▼
//!   ┌───┬──────────┬───┬───┬──────────────────┬───┬───┬──────┬───┬───┐
//!   │ H │  used    │ F │ H │      free        │ F │ H │ used │ F │ 0 │
//!   └───┴──────────┴───┴───┴──────────────────┴───┴───┴──────┴───┴───┘
//!         ▲                                                      ▲
//!         └── pointer returned to user               terminator ─┘
//!
//!   H / F: one word each, size | used bit. Identical for a block.
//! ```
//!
//! - **Allocation** rounds the request up to a word, scans blocks from the
//!   start and hands out the first free one that is big enough, whole. On a
//!   miss the heap grows by one block.
//! - **Release** clears the used bit, zeroes the payload and merges the block
//!   with a free predecessor and/or successor, so no two free blocks are ever
//!   neighbours.
//!
//! ```text
//!   Coalescing on release of B:
//!
//!   ┌────────┬────────┬────────┐        ┌──────────────────────────┐
//!   │ A free │ B used │ C free │  ───►  │      A + B + C free      │
//!   └────────┴────────┴────────┘        └──────────────────────────┘
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   babyalloc
//!   ├── align      - WORD and the align! macro
//!   ├── block      - Tag encoding and the Block accessor
//!   ├── config     - HeapConfig
//!   ├── error      - HeapError
//!   ├── grower     - HeapGrower, SbrkGrower, ArenaGrower
//!   ├── heap       - Heap: extend, allocate, release, coalesce
//!   └── inspect    - dump, listing, consistency check
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use babyalloc::{ArenaGrower, Heap, HeapConfig};
//!
//! let grower = ArenaGrower::with_capacity(4096).unwrap();
//! let mut heap = Heap::with_grower(grower, HeapConfig::default());
//!
//! let first = heap.allocate(16).unwrap();
//! let _second = heap.allocate(32).unwrap();
//!
//! heap.try_release(first).unwrap();
//!
//! // First fit finds the block just released.
//! assert_eq!(heap.allocate(8).unwrap(), first);
//! print!("{}", heap.listing());
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: a `Heap` is not `Send` or `Sync`
//! - **No splitting**: a fitting block is handed out whole
//! - **Never shrinks**: memory is not returned to the OS
//! - **Unix-only**: [`SbrkGrower`] requires `libc` and `sbrk`
//!
//! ## Safety
//!
//! Allocation is safe. [`Heap::release`] is `unsafe` because it trusts the
//! pointer it is given; [`Heap::try_release`] looks the pointer up first.

pub mod align;
pub mod block;
mod config;
mod error;
mod grower;
mod heap;
mod inspect;

pub use block::{Block, Tag};
pub use config::HeapConfig;
pub use error::HeapError;
pub use grower::{ArenaGrower, HeapGrower, SbrkGrower, program_break};
pub use heap::Heap;
pub use inspect::{BlockInfo, Blocks, HeapDump, print_heap};
