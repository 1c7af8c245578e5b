//! Runs against the real program break. Kept as the only test in its own
//! binary so nothing else moves the break while it runs.

use std::ptr;

use babyalloc::{Heap, HeapConfig, align::WORD, program_break};

#[test]
fn test_sbrk_heap() {
  let mut heap = Heap::with_config(HeapConfig::new().with_validation(true));

  let before = program_break() as usize;
  let first = heap.allocate(16).unwrap();
  let after = program_break() as usize;

  assert!(after >= before + 16 + 3 * WORD);
  assert_eq!(first.as_ptr() as usize % WORD, 0);
  assert_eq!(heap.end().unwrap().as_ptr() as usize + WORD, after);

  unsafe {
    first.cast::<u64>().write(0xDEADBEEF);
    assert_eq!(first.cast::<u64>().read(), 0xDEADBEEF);

    ptr::write_bytes(first.as_ptr(), 0xAB, 16);
    heap.release(first);
    assert_eq!(*first.as_ptr(), 0);
    assert_eq!(*first.as_ptr().add(15), 0);
  }

  // Reuse does not touch the break.
  assert_eq!(heap.allocate(8).unwrap(), first);
  assert_eq!(program_break() as usize, after);

  heap.check().unwrap();
  assert_eq!(heap.dump().len(), 1);
}
