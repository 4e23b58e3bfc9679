use std::io::Read;

use allocore::allocator::Heap;
use allocore::index::rbtree::Linked;

/// Waits until the user presses ENTER. Useful when you want to inspect the
/// segment with a debugger between steps.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn report(heap: &Heap<Linked>, label: &str) {
  println!("[{label}] capacity() = {} free bytes, validate() = {}", heap.capacity(), heap.validate());
}

fn main() {
  env_logger::init();

  // A fixed 4 KiB segment, RB-tree "linked" variant (parent pointer + a
  // per-size duplicate ring). No OS growth happens past this point — the
  // whole point of this family is that the segment is acquired once.
  let mut heap = Heap::<Linked>::init(4096).expect("segment big enough for one block");
  report(&heap, "start");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Three same-sized allocations: this also exercises the duplicate
  //    ring once freed, since all three share a payload size.
  // --------------------------------------------------------------------
  println!("\n[1] Allocate three 64-byte blocks");
  let a = heap.malloc(64).expect("a");
  let b = heap.malloc(64).expect("b");
  let c = heap.malloc(64).expect("c");
  unsafe {
    a.write(0xAA);
    b.write(0xBB);
    c.write(0xCC);
  }
  report(&heap, "after 3x malloc(64)");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Free the middle block, then the first: the two adjacent frees at
  //    the segment's start coalesce into one larger free block.
  // --------------------------------------------------------------------
  println!("\n[2] Free b, then a (left-coalesce)");
  heap.free(b);
  report(&heap, "after free(b)");
  heap.free(a);
  report(&heap, "after free(a) — a and b's space is now one free block");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Grow c in place: its left neighbor is free and large enough, so
  //    realloc moves the payload left via memmove instead of mallocing
  //    fresh and copying through a temporary.
  // --------------------------------------------------------------------
  println!("\n[3] realloc(c, 256) — absorbs the coalesced free space to its left");
  assert_eq!(unsafe { *c }, 0xCC);
  let c = heap.realloc(c, 256).expect("room to grow left");
  println!("[3] c now lives at {c:?}, first byte preserved = 0x{:X}", unsafe { *c });
  report(&heap, "after realloc(c, 256)");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Exhaust the segment, observe malloc returning null, then free
  //    everything and confirm the whole segment is one free block again.
  // --------------------------------------------------------------------
  println!("\n[4] Exhaust the segment");
  let mut oversized = Vec::new();
  while let Some(p) = heap.malloc(512) {
    oversized.push(p);
  }
  println!("[4] segment exhausted after {} more 512-byte blocks", oversized.len());
  report(&heap, "exhausted");

  heap.free(c);
  for p in oversized {
    heap.free(p);
  }
  report(&heap, "fully freed");
}
