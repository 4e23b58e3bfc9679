//! Allocator surface (spec §4.6, §4.7): `Heap<I>` composes the block
//! protocol and a [`FreeIndex`] variant into the full `init`/`malloc`/
//! `free`/`realloc`/`validate` contract. One `Heap` is an explicit value
//! owned by its caller — no process-wide singleton (DESIGN.md, "global
//! mutable allocator state").

use std::ptr;

use crate::align;
use crate::block::{self, BlockRef, MIN_BLOCK, OVERHEAD};
use crate::diff::{self, BlockDescriptor};
use crate::error::HeapError;
use crate::index::FreeIndex;
use crate::segment::Segment;

pub struct Heap<I: FreeIndex> {
  segment: Segment,
  index: I,
}

impl<I: FreeIndex> Heap<I> {
  /// One-shot: acquires a fresh `size`-byte segment and formats it as a
  /// single giant free block. Calling `init` again on a live `Heap` simply
  /// replaces it — there is no partial-reset path.
  pub fn init(size: usize) -> Result<Self, HeapError> {
    if size < MIN_BLOCK {
      return Err(HeapError::SegmentTooSmall { have: size, need: MIN_BLOCK });
    }
    let segment = Segment::init(size);
    let mut index = I::default();
    let block = unsafe { block::format_free(segment.start(), size - OVERHEAD) };
    block.set_left_alloc(true);
    index.insert(block);
    log::debug!("heap initialized: {size} bytes ({} payload)", block.payload_size());
    Ok(Self { segment, index })
  }

  pub fn capacity(&self) -> usize {
    self.index.capacity()
  }

  pub fn align(&self, n: usize) -> usize {
    align::align(n)
  }

  pub fn diff(&self, expected: &[BlockDescriptor], actual: &mut [BlockDescriptor]) {
    diff::diff(&self.segment, expected, actual)
  }

  pub fn validate(&self) -> bool {
    if !self.validate_segment() {
      log::error!("heap validation failed: segment walk");
      return false;
    }
    if !self.index.validate() {
      log::error!("heap validation failed: free-index structural check");
      return false;
    }
    true
  }

  /// Invariants 1-4 (spec §3, §8): full coverage, no two adjacent free
  /// blocks, footer/left-alloc coherence.
  fn validate_segment(&self) -> bool {
    let end = self.segment.end();
    let mut cur = self.segment.start();
    let mut prev_free = false;
    while cur != end {
      let block = unsafe { BlockRef::new(cur) };
      let next = block.end_ptr();
      if next as usize > end as usize {
        return false;
      }
      if !block.is_alloc() {
        if prev_free {
          return false;
        }
        let footer = unsafe { *(block.payload_ptr().add(block.payload_size()) as *const usize) };
        let header = unsafe { *(cur as *const usize) };
        if footer != header {
          return false;
        }
      }
      if let Some(right) = block.right_neighbor(end) {
        if right.left_alloc() != block.is_alloc() {
          return false;
        }
      }
      prev_free = !block.is_alloc();
      cur = next;
    }
    true
  }

  pub fn malloc(&mut self, n: usize) -> Option<*mut u8> {
    if n == 0 {
      return None;
    }
    let want = block::round_up(n);
    let block = self.index.remove_best_fit(want)?;
    let block = self.finish_alloc(block, want);
    log::trace!("malloc({n}) -> {} payload bytes", block.payload_size());
    Some(block.payload_ptr())
  }

  pub fn free(&mut self, ptr: *mut u8) {
    if ptr.is_null() {
      return;
    }
    let mut block = unsafe { BlockRef::from_payload(ptr) };
    block.set_alloc(false);
    block.write_footer();

    if !block.left_alloc() {
      if let Some(left) = block.left_neighbor(self.segment.start()) {
        self.index.remove_known(left);
        block = Self::merge(left, block);
        block.set_alloc(false);
        block.write_footer();
      }
    }
    if let Some(right) = block.right_neighbor(self.segment.end()) {
      if !right.is_alloc() {
        self.index.remove_known(right);
        block = Self::merge(block, right);
        block.set_alloc(false);
        block.write_footer();
      }
    }
    self.sync_right_flag(block);
    self.index.insert(block);
    log::trace!("free: {} payload bytes reclaimed", block.payload_size());
  }

  pub fn realloc(&mut self, ptr: *mut u8, n: usize) -> Option<*mut u8> {
    if ptr.is_null() {
      return self.malloc(n);
    }
    if n == 0 {
      self.free(ptr);
      return None;
    }

    let block = unsafe { BlockRef::from_payload(ptr) };
    let want = block::round_up(n);
    let old_payload = block.payload_size();

    if want <= old_payload {
      self.shrink_in_place(block, want);
      return Some(ptr);
    }

    // Probe both neighbors before committing any mutation (spec §9:
    // "probe-both-then-commit" realloc order).
    let right = block.right_neighbor(self.segment.end()).filter(|r| !r.is_alloc());
    let right_gain = right.map_or(0, |r| r.footprint());
    if old_payload + right_gain >= want {
      let mut merged = block;
      if let Some(r) = right {
        self.index.remove_known(r);
        merged = Self::merge(merged, r);
        merged.set_alloc(true);
      }
      let merged = self.finish_alloc(merged, want);
      log::trace!("realloc grew in place (right) to {} payload bytes", merged.payload_size());
      return Some(ptr);
    }

    let left = block.left_neighbor(self.segment.start()).filter(|l| !l.is_alloc());
    let left_gain = left.map_or(0, |l| l.footprint());
    if old_payload + right_gain + left_gain >= want {
      let mut merged = block;
      if let Some(r) = right {
        self.index.remove_known(r);
        merged = Self::merge(merged, r);
        merged.set_alloc(true);
      }
      let l = left.expect("left_gain > 0 implies left present");
      self.index.remove_known(l);
      merged = Self::merge(l, merged);
      merged.set_alloc(true);
      unsafe {
        ptr::copy(ptr, merged.payload_ptr(), old_payload.min(want));
      }
      let merged = self.finish_alloc(merged, want);
      log::trace!("realloc grew in place (left) to {} payload bytes", merged.payload_size());
      return Some(merged.payload_ptr());
    }

    // Neither neighbor (even combined) suffices: fall back to a fresh
    // allocation. Nothing above mutated state, so failure here leaves the
    // original block fully valid.
    let new_ptr = self.malloc(n)?;
    unsafe {
      ptr::copy_nonoverlapping(ptr, new_ptr, old_payload.min(want));
    }
    self.free(ptr);
    Some(new_ptr)
  }

  /// Splits off and reinserts an excess tail if `block` (already marked
  /// allocated, payload >= `want`) is oversized enough, then fixes up the
  /// right neighbor's left-alloc bit either way. Shared by `malloc` and
  /// `realloc`'s grow paths.
  fn finish_alloc(&mut self, block: BlockRef, want: usize) -> BlockRef {
    if block.payload_size() >= want + MIN_BLOCK {
      let tail = unsafe { block::split(block, want) };
      self.sync_right_flag(tail);
      self.index.insert(tail);
    } else {
      block.set_alloc(true);
      self.sync_right_flag(block);
    }
    block
  }

  /// Carves `block` (currently allocated with payload > `want`) down to
  /// `want`, reinserting the freed tail — coalescing it with its own right
  /// neighbor if that happens to already be free (possible here, unlike
  /// `finish_alloc`'s tail, since `block` was an independently allocated
  /// block with its own pre-existing right neighbor).
  fn shrink_in_place(&mut self, block: BlockRef, want: usize) {
    if block.payload_size() < want + MIN_BLOCK {
      return;
    }
    let mut tail = unsafe { block::split(block, want) };
    self.sync_right_flag(tail);
    if let Some(right) = tail.right_neighbor(self.segment.end()) {
      if !right.is_alloc() {
        self.index.remove_known(right);
        tail = Self::merge(tail, right);
        tail.set_alloc(false);
        tail.write_footer();
        self.sync_right_flag(tail);
      }
    }
    self.index.insert(tail);
  }

  /// Merges `right`'s footprint into `left`'s, returning a block at
  /// `left`'s address whose payload spans both. Preserves `left`'s own
  /// flags (alloc, left-alloc, color) untouched — callers that need the
  /// result free or allocated set that explicitly afterward.
  fn merge(left: BlockRef, right: BlockRef) -> BlockRef {
    let merged_payload = left.footprint() + right.footprint() - OVERHEAD;
    let merged = unsafe { BlockRef::new(left.as_ptr()) };
    merged.set_payload_size(merged_payload);
    merged
  }

  /// Sets `block`'s right neighbor's left-alloc bit to match `block`'s own
  /// current allocation state, if a right neighbor exists.
  fn sync_right_flag(&self, block: BlockRef) {
    if let Some(right) = block.right_neighbor(self.segment.end()) {
      right.set_left_alloc(block.is_alloc());
    }
  }
}
