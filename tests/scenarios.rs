//! Concrete scenarios from spec §8, replayed against every `FreeIndex`
//! variant. Byte counts are computed from this crate's own overhead model
//! (`Heap::align`, `block::OVERHEAD`) rather than copied literally from the
//! scenario prose, since that arithmetic was written against a generic
//! header/footer size — the shape of each scenario (which blocks coalesce,
//! which pointer survives, what stays OK) is what's under test.

use allocore::allocator::Heap;
use allocore::diff::{BlockDescriptor, ErrorKind};
use allocore::index::rbtree::{Canonical, Linked, Stack as RbStack, Topdown as RbTopdown, Unified};
use allocore::index::splay::{SplayStack, SplayTopdown};
use allocore::index::{list::SegregatedList, FreeIndex};

fn assert_ok(slots: &[BlockDescriptor]) {
  for (i, s) in slots.iter().enumerate() {
    assert_eq!(s.error, ErrorKind::Ok, "slot {i}: {s:?}");
  }
}

/// Scenario 1: a single allocation leaves the rest of the segment as one
/// free block, and `validate()` holds.
fn scenario_1_single_malloc<I: FreeIndex>() {
  let mut heap = Heap::<I>::init(2048).unwrap();
  let p = heap.malloc(32).unwrap();
  assert!(heap.validate());

  let want = heap.align(32);
  let expected = [BlockDescriptor::alloc(p, want), BlockDescriptor::free_any()];
  let mut actual = [BlockDescriptor::free_any(); 2];
  heap.diff(&expected, &mut actual);
  assert_ok(&actual);
}

/// Scenario 2: freeing a middle block leaves it isolated; freeing its left
/// neighbor next coalesces the two into one free block at the segment's
/// start.
fn scenario_2_left_coalesce<I: FreeIndex>() {
  let mut heap = Heap::<I>::init(2048).unwrap();
  let a = heap.malloc(64).unwrap();
  let b = heap.malloc(64).unwrap();
  let c = heap.malloc(64).unwrap();
  let unit = heap.align(64);

  heap.free(b);
  assert!(heap.validate());
  let expected = [
    BlockDescriptor::alloc(a, unit),
    BlockDescriptor::free(unit),
    BlockDescriptor::alloc(c, unit),
    BlockDescriptor::free_any(),
  ];
  let mut actual = [BlockDescriptor::free_any(); 4];
  heap.diff(&expected, &mut actual);
  assert_ok(&actual);

  heap.free(a);
  assert!(heap.validate());
  let expected = [BlockDescriptor::free(2 * unit + allocore::block::OVERHEAD), BlockDescriptor::alloc(c, unit), BlockDescriptor::free_any()];
  let mut actual = [BlockDescriptor::free_any(); 3];
  heap.diff(&expected, &mut actual);
  assert_ok(&actual);
}

/// Scenario 3 (adapted sizing): freeing both neighbors of a live block, then
/// growing that block past what either neighbor alone (or the right one
/// combined with the original) can satisfy, forces a left-coalescing move —
/// the returned pointer lands where the left neighbor used to start, and the
/// block's previously written bytes survive the move.
fn scenario_3_realloc_grows_left<I: FreeIndex>() {
  let mut heap = Heap::<I>::init(4096).unwrap();
  let a = heap.malloc(64).unwrap();
  let b = heap.malloc(64).unwrap();
  let c = heap.malloc(64).unwrap();
  let d = heap.malloc(64).unwrap();
  let unit = heap.align(64);

  unsafe {
    std::ptr::write_bytes(b, 0x5A, unit);
  }

  heap.free(a);
  heap.free(c);
  assert!(heap.validate());

  // old(64) + right-neighbor c's footprint alone is not enough; only
  // absorbing both free neighbors reaches 3*unit.
  let grown = heap.realloc(b, 3 * unit).expect("left+right coalesce satisfies the grow");
  assert_eq!(grown, a, "growth must have moved into the left-coalesced region");
  assert!(heap.validate());
  unsafe {
    assert_eq!(std::slice::from_raw_parts(grown, unit), &[0x5Au8; 64][..unit.min(64)]);
  }

  let expected = [BlockDescriptor::alloc_any(grown), BlockDescriptor::alloc(d, unit), BlockDescriptor::free_any()];
  let mut actual = [BlockDescriptor::free_any(); 3];
  heap.diff(&expected, &mut actual);
  assert_ok(&actual);
}

/// Scenario 4: a realloc that cannot possibly be satisfied (larger than the
/// whole segment) fails cleanly and leaves the original block untouched.
fn scenario_4_realloc_too_big_is_noop<I: FreeIndex>() {
  let segment_size = 2048;
  let mut heap = Heap::<I>::init(segment_size).unwrap();
  let a = heap.malloc(64).unwrap();
  let b = heap.malloc(64).unwrap();
  let c = heap.malloc(64).unwrap();
  unsafe {
    std::ptr::write_bytes(b, 0x7B, heap.align(64));
  }

  heap.free(a);
  heap.free(c);
  assert!(heap.validate());

  let result = heap.realloc(b, segment_size * 2);
  assert!(result.is_none());
  assert!(heap.validate());
  unsafe {
    assert_eq!(*b, 0x7B);
  }
}

/// Scenario 5: fill the segment, free every other block, then allocate the
/// same sizes back — every reallocation succeeds and `validate()` holds
/// throughout.
fn scenario_5_fill_free_refill<I: FreeIndex>() {
  let unit_request = 48;
  let mut heap = Heap::<I>::init(1 << 16).unwrap();

  let mut blocks = Vec::new();
  while let Some(p) = heap.malloc(unit_request) {
    blocks.push(p);
    assert!(heap.validate());
  }
  assert!(blocks.len() > 4, "segment should hold several blocks of this size");

  let mut freed = Vec::new();
  for (i, &p) in blocks.iter().enumerate() {
    if i % 2 == 0 {
      heap.free(p);
      freed.push(p);
    }
  }
  assert!(heap.validate());

  for _ in 0..freed.len() {
    let p = heap.malloc(unit_request).expect("freed capacity must be reusable");
    assert!(heap.validate());
    let _ = p;
  }
}

/// Scenario 6: N distinct sizes plus N duplicates of one of them stay
/// `validate()`-clean, and the duplicates are consumed by `remove_best_fit`
/// before the tree/bucket loses that size class entirely. Each duplicate is
/// separated by an allocated spacer block so freeing them doesn't eagerly
/// coalesce them back into one larger block (which would defeat the point
/// of the test — they must remain distinct same-size free blocks).
fn scenario_6_duplicate_ring<I: FreeIndex>() {
  let mut heap = Heap::<I>::init(1 << 16).unwrap();

  let distinct_sizes = [32usize, 160, 224, 288];
  let distinct_ptrs: Vec<_> = distinct_sizes.iter().map(|&s| heap.malloc(s).unwrap()).collect();

  let dup_size = 96;
  let spacer_size = 40;
  let dup_count = 5;
  let mut dup_ptrs = Vec::new();
  for _ in 0..dup_count {
    dup_ptrs.push(heap.malloc(dup_size).unwrap());
    heap.malloc(spacer_size).unwrap(); // kept allocated, never freed below
  }

  for &p in &dup_ptrs {
    heap.free(p);
  }
  for &p in &distinct_ptrs {
    heap.free(p);
  }
  assert!(heap.validate());

  // Best-fit for dup_size should be satisfiable dup_count times purely
  // from the ring, without disturbing the other size classes.
  let mut reacquired = Vec::new();
  for _ in 0..dup_count {
    reacquired.push(heap.malloc(dup_size).expect("ring member available"));
    assert!(heap.validate());
  }

  for p in reacquired {
    heap.free(p);
  }
  assert!(heap.validate());
}

macro_rules! variant_tests {
  ($module:ident, $ty:ty) => {
    mod $module {
      use super::*;

      #[test]
      fn scenario_1_single_malloc() {
        super::scenario_1_single_malloc::<$ty>();
      }

      #[test]
      fn scenario_2_left_coalesce() {
        super::scenario_2_left_coalesce::<$ty>();
      }

      #[test]
      fn scenario_3_realloc_grows_left() {
        super::scenario_3_realloc_grows_left::<$ty>();
      }

      #[test]
      fn scenario_4_realloc_too_big_is_noop() {
        super::scenario_4_realloc_too_big_is_noop::<$ty>();
      }

      #[test]
      fn scenario_5_fill_free_refill() {
        super::scenario_5_fill_free_refill::<$ty>();
      }

      #[test]
      fn scenario_6_duplicate_ring() {
        super::scenario_6_duplicate_ring::<$ty>();
      }
    }
  };
}

variant_tests!(list, SegregatedList);
variant_tests!(rb_canonical, Canonical);
variant_tests!(rb_unified, Unified);
variant_tests!(rb_linked, Linked);
variant_tests!(rb_stack, RbStack);
variant_tests!(rb_topdown, RbTopdown);
variant_tests!(splay_stack, SplayStack);
variant_tests!(splay_topdown, SplayTopdown);

/// Open question from spec §9: when `remove_best_fit`'s top-down pass lands
/// on a duplicate (a node whose ring is non-empty) that is still too small,
/// the remembered-best-fit re-search must still find a correct answer, and
/// that answer must still correctly peel from its own ring rather than
/// deleting a tree node prematurely. Exercised for both topdown variants
/// across several interleavings of distinct sizes and ring depths.
mod topdown_remembered_best_fit {
  use super::*;

  fn run<I: FreeIndex>() {
    let mut heap = Heap::<I>::init(1 << 16).unwrap();

    // A spread of distinct sizes below and above a duplicated size, so a
    // topdown descent searching for something bigger than the duplicated
    // size must pass through (and remember) the duplicate's landing node
    // before continuing toward the true best fit.
    let small_sizes = [16usize, 48, 80];
    let dup_size = 112;
    let large_sizes = [176usize, 240, 304];

    let mut small_ptrs: Vec<_> = small_sizes.iter().map(|&s| heap.malloc(s).unwrap()).collect();
    let mut dup_ptrs = Vec::new();
    for _ in 0..4 {
      dup_ptrs.push(heap.malloc(dup_size).unwrap());
      heap.malloc(24).unwrap(); // spacer, kept allocated so the ring stays non-adjacent
    }
    let mut large_ptrs: Vec<_> = large_sizes.iter().map(|&s| heap.malloc(s).unwrap()).collect();

    for &p in &small_ptrs {
      heap.free(p);
    }
    for &p in &dup_ptrs {
      heap.free(p);
    }
    // Leave one large block allocated so the true best fit for a request
    // just above dup_size must skip the duplicate ring entirely.
    heap.free(large_ptrs[0]);
    assert!(heap.validate());

    let target = heap.align(dup_size) + 1;
    let got = heap.malloc(target).expect("a larger free block exists past the duplicate ring");
    assert!(got != std::ptr::null_mut());
    assert!(heap.validate());

    // The duplicate ring itself must remain fully intact and usable.
    for _ in 0..4 {
      let p = heap.malloc(dup_size).expect("duplicate ring must still satisfy its own size");
      assert!(heap.validate());
      heap.free(p);
    }

    heap.free(got);
    small_ptrs.clear();
    dup_ptrs.clear();
    large_ptrs.drain(1..).for_each(|p| heap.free(p));
    assert!(heap.validate());
  }

  #[test]
  fn rb_topdown() {
    run::<RbTopdown>();
  }

  #[test]
  fn splay_topdown() {
    run::<SplayTopdown>();
  }
}

/// Both parentless RB-tree variants (`stack`, `topdown`) rebuild a deleted
/// node's fixup path from a cloned descent rather than following parent
/// pointers. When the node being deleted has two children and its in-order
/// successor is reached by descending two or more steps down
/// `child(z, 1)`'s left spine, that reconstruction has to splice in every
/// intermediate ancestor — getting it wrong drives `delete_fixup`'s
/// rotations off the wrong nodes and corrupts the tree's structure (not
/// just its coloring). A dozen distinct sizes, deleted in an order that
/// keeps regrowing a left-leaning subtree under whichever node is removed
/// next, pushes several deletions into that two-or-more-levels-deep case;
/// `validate()` after every single step catches a corrupted rotation
/// immediately rather than only after the whole sequence.
mod deep_successor_delete {
  use super::*;

  fn run<I: FreeIndex>() {
    let mut heap = Heap::<I>::init(1 << 16).unwrap();

    let sizes: Vec<usize> = (0..12).map(|i| 32 + i * 48).collect();
    let ptrs: Vec<_> = sizes.iter().map(|&s| heap.malloc(s).unwrap()).collect();
    assert!(heap.validate());

    // Alternate smallest/largest remaining size: each deletion's node
    // tends to have both children still present, and the repeatedly
    // untouched middle sizes accumulate a multi-level subtree under them.
    let mut order = Vec::new();
    let (mut lo, mut hi) = (0usize, sizes.len() - 1);
    while lo <= hi {
      order.push(lo);
      if lo != hi {
        order.push(hi);
      }
      if hi == 0 {
        break;
      }
      lo += 1;
      hi -= 1;
    }

    for idx in order {
      heap.free(ptrs[idx]);
      assert!(heap.validate(), "validate() failed after freeing size {}", sizes[idx]);
    }

    // A second round, this time deleting in a different order (ascending)
    // over a freshly rebuilt tree of the same sizes, to cover additional
    // successor-descent shapes.
    let ptrs: Vec<_> = sizes.iter().map(|&s| heap.malloc(s).unwrap()).collect();
    assert!(heap.validate());
    for &p in &ptrs {
      heap.free(p);
      assert!(heap.validate());
    }
  }

  #[test]
  fn rb_stack() {
    run::<RbStack>();
  }

  #[test]
  fn rb_topdown() {
    run::<RbTopdown>();
  }
}
