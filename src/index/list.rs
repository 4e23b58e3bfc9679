//! Segregated free-list variant (spec §4.3).
//!
//! Free blocks are bucketed by payload size into a fixed array of
//! doubly-linked, nil-terminated lists: a run of exact size classes for
//! small requests, then power-of-two-ish ranges for the rest, plus a
//! catch-all last bucket. Insertion is front-of-bucket, O(1). Best fit
//! scans the target bucket linearly; if nothing there fits, the front of
//! the next non-empty bucket is taken instead (guaranteed to fit, since
//! every bucket above the target holds strictly larger payloads) — except
//! in the catch-all bucket, which is scanned like the target bucket since
//! it has no such guarantee.

use crate::align::A;
use crate::block::BlockRef;
use crate::index::sentinel::Sentinel;
use crate::index::FreeIndex;

const EXACT_BUCKETS: usize = 8;
const BUCKET_COUNT: usize = 24;

#[repr(C)]
struct Links {
  prev: BlockRef,
  next: BlockRef,
}

fn links(b: BlockRef) -> *mut Links {
  unsafe { b.overlay::<Links>() }
}

fn prev(b: BlockRef) -> BlockRef {
  unsafe { (*links(b)).prev }
}
fn set_prev(b: BlockRef, v: BlockRef) {
  unsafe { (*links(b)).prev = v };
}
fn next(b: BlockRef) -> BlockRef {
  unsafe { (*links(b)).next }
}
fn set_next(b: BlockRef, v: BlockRef) {
  unsafe { (*links(b)).next = v };
}

fn bucket_for(payload: usize) -> usize {
  let units = payload / A;
  if units <= EXACT_BUCKETS {
    return units.saturating_sub(1);
  }
  let rel = (units - EXACT_BUCKETS) as u32;
  let class = (usize::BITS - rel.leading_zeros()) as usize;
  (EXACT_BUCKETS + class - 1).min(BUCKET_COUNT - 1)
}

pub struct SegregatedList {
  nil: Sentinel,
  heads: [BlockRef; BUCKET_COUNT],
  capacity: usize,
}

impl Default for SegregatedList {
  fn default() -> Self {
    let nil = Sentinel::new();
    let heads = [nil.block(); BUCKET_COUNT];
    Self { nil, heads, capacity: 0 }
  }
}

impl SegregatedList {
  fn push_front(&mut self, bucket: usize, block: BlockRef) {
    let nil = self.nil.block();
    let old_head = self.heads[bucket];
    set_prev(block, nil);
    set_next(block, old_head);
    if old_head != nil {
      set_prev(old_head, block);
    }
    self.heads[bucket] = block;
  }

  fn unlink(&mut self, bucket: usize, block: BlockRef) {
    let nil = self.nil.block();
    let p = prev(block);
    let n = next(block);
    if p == nil {
      self.heads[bucket] = n;
    } else {
      set_next(p, n);
    }
    if n != nil {
      set_prev(n, p);
    }
  }
}

impl FreeIndex for SegregatedList {
  fn insert(&mut self, block: BlockRef) {
    let bucket = bucket_for(block.payload_size());
    self.capacity += block.payload_size();
    self.push_front(bucket, block);
  }

  fn remove_best_fit(&mut self, size: usize) -> Option<BlockRef> {
    let nil = self.nil.block();
    let start = bucket_for(size);

    let mut cur = self.heads[start];
    while cur != nil {
      if cur.payload_size() >= size {
        self.unlink(start, cur);
        self.capacity -= cur.payload_size();
        return Some(cur);
      }
      cur = next(cur);
    }

    for bucket in (start + 1)..BUCKET_COUNT {
      let head = self.heads[bucket];
      if head == nil {
        continue;
      }
      if bucket == BUCKET_COUNT - 1 {
        let mut cur = head;
        while cur != nil {
          if cur.payload_size() >= size {
            self.unlink(bucket, cur);
            self.capacity -= cur.payload_size();
            return Some(cur);
          }
          cur = next(cur);
        }
        continue;
      }
      self.unlink(bucket, head);
      self.capacity -= head.payload_size();
      return Some(head);
    }
    None
  }

  fn remove_known(&mut self, block: BlockRef) {
    let bucket = bucket_for(block.payload_size());
    self.capacity -= block.payload_size();
    self.unlink(bucket, block);
  }

  fn capacity(&self) -> usize {
    self.capacity
  }

  fn validate(&self) -> bool {
    let nil = self.nil.block();
    let mut total = 0usize;
    for (bucket, &head) in self.heads.iter().enumerate() {
      let mut cur = head;
      let mut last = nil;
      while cur != nil {
        if bucket_for(cur.payload_size()) != bucket {
          return false;
        }
        if cur.is_alloc() {
          return false;
        }
        if prev(cur) != last {
          return false;
        }
        total += cur.payload_size();
        last = cur;
        cur = next(cur);
      }
    }
    total == self.capacity
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::block;

  fn alloc_region(bytes: usize) -> *mut u8 {
    let layout = std::alloc::Layout::from_size_align(bytes, A).unwrap();
    unsafe { std::alloc::alloc_zeroed(layout) }
  }

  #[test]
  fn best_fit_prefers_smallest_sufficient_block() {
    let region = alloc_region(1024);
    let mut idx = SegregatedList::default();
    let small = unsafe { block::format_free(region, block::round_up(32)) };
    let big = unsafe { block::format_free(region.add(small.footprint()), block::round_up(256)) };
    idx.insert(big);
    idx.insert(small);

    let got = idx.remove_best_fit(32).unwrap();
    assert_eq!(got, small);
    assert!(idx.validate());
    unsafe { std::alloc::dealloc(region, std::alloc::Layout::from_size_align(1024, A).unwrap()) };
  }

  #[test]
  fn remove_known_detaches_from_bucket() {
    let region = alloc_region(512);
    let mut idx = SegregatedList::default();
    let b = unsafe { block::format_free(region, block::round_up(64)) };
    idx.insert(b);
    idx.remove_known(b);
    assert_eq!(idx.capacity(), 0);
    assert!(idx.remove_best_fit(64).is_none());
    unsafe { std::alloc::dealloc(region, std::alloc::Layout::from_size_align(512, A).unwrap()) };
  }
}
