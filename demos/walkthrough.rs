use std::{io::Read, ptr};

use babyalloc::{Heap, print_heap, program_break};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Writes every log record to stderr so the allocator's decisions show up
/// between the steps.
struct StderrLogger;

impl Log for StderrLogger {
  fn enabled(
    &self,
    _metadata: &Metadata,
  ) -> bool {
    true
  }

  fn log(
    &self,
    record: &Record,
  ) {
    eprintln!("  [{}] {}", record.level(), record.args());
  }

  fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn install_logger() -> Result<(), SetLoggerError> {
  log::set_logger(&LOGGER)?;
  log::set_max_level(LevelFilter::Debug);
  Ok(())
}

/// Waits until the user presses ENTER when started with `--step`.
/// Useful when you want to inspect memory state with tools like `pmap` or
/// `gdb` between allocations.
fn block_until_enter_pressed(step: bool) {
  if step {
    println!("\n>>> Press ENTER to continue...");
    let _ = std::io::stdin().bytes().next();
  }
}

/// Prints the current program break.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break = {:?}",
    label,
    std::process::id(),
    program_break(),
  );
}

fn print_state(heap: &Heap) {
  println!("extent = {} bytes", heap.extent());
  print_heap(heap);
}

fn main() {
  let step = std::env::args().any(|arg| arg == "--step");
  if let Err(err) = install_logger() {
    eprintln!("logger not installed: {}", err);
  }

  let mut heap = Heap::new();

  print_program_break("start");
  block_until_enter_pressed(step);

  // --------------------------------------------------------------------
  // 1) Allocate 16 bytes. The first call creates the heap.
  // --------------------------------------------------------------------
  println!("\n[1] allocate(16)");
  let first = match heap.allocate(16) {
    Ok(ptr) => ptr,
    Err(err) => {
      eprintln!("{}", err);
      return;
    }
  };
  unsafe { first.cast::<u64>().write(0xDEADBEEF) };
  print_program_break("after first allocation");
  print_state(&heap);
  block_until_enter_pressed(step);

  // --------------------------------------------------------------------
  // 2) Allocate 32 bytes. No free block fits, so the heap grows.
  // --------------------------------------------------------------------
  println!("\n[2] allocate(32)");
  let second = match heap.allocate(32) {
    Ok(ptr) => ptr,
    Err(err) => {
      eprintln!("{}", err);
      return;
    }
  };
  unsafe { ptr::write_bytes(second.as_ptr(), 0xAB, 32) };
  print_state(&heap);
  block_until_enter_pressed(step);

  // --------------------------------------------------------------------
  // 3) Release the first block. Its payload is zeroed; its neighbour is
  //    used, so nothing merges.
  // --------------------------------------------------------------------
  println!("\n[3] release(first)");
  if let Err(err) = heap.try_release(first) {
    eprintln!("{}", err);
    return;
  }
  print_state(&heap);
  block_until_enter_pressed(step);

  // --------------------------------------------------------------------
  // 4) Allocate 8 bytes. First fit hands out the whole 16 byte block
  //    instead of growing the heap.
  // --------------------------------------------------------------------
  println!("\n[4] allocate(8)");
  let third = match heap.allocate(8) {
    Ok(ptr) => ptr,
    Err(err) => {
      eprintln!("{}", err);
      return;
    }
  };
  println!(
    "third == first? {}",
    if third == first {
      "Yes, it reused the freed block"
    } else {
      "No, it allocated somewhere else"
    }
  );
  print_state(&heap);
  block_until_enter_pressed(step);

  // --------------------------------------------------------------------
  // 5) Release everything. The two blocks merge into one.
  // --------------------------------------------------------------------
  println!("\n[5] release(second), release(third)");
  for ptr in [second, third] {
    if let Err(err) = heap.try_release(ptr) {
      eprintln!("{}", err);
      return;
    }
  }
  print_state(&heap);

  match heap.check() {
    Ok(()) => println!("heap is consistent"),
    Err(err) => println!("{}", err),
  }

  print_program_break("end");
  println!("\nEnd of example. The heap is never shrunk; the OS reclaims it at exit.");
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_second_logger_install_is_reported() {
    let _ = install_logger();

    assert!(install_logger().is_err());
  }
}
