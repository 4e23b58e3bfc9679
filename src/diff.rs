//! Heap-block descriptor and `Heap::diff` (spec §6).
//!
//! `diff` is the test surface: it walks the segment in address order and
//! reports, slot by slot, whether the live layout matches an expected
//! sketch. The correctness driver (`src/bin/heapcheck.rs`) doesn't use this
//! directly — it relies on `validate()` and content stamps — but the
//! integration tests under `tests/` use it to assert exact post-operation
//! layouts (spec §8's "concrete scenarios").

use crate::block::BlockRef;
use crate::segment::Segment;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
  Ok,
  Mismatch,
  OutOfBounds,
  ContinuesPastEnd,
}

/// One segment slot's expected or observed shape. `address == None` means
/// "a free block" on input, or "this block is currently free" on output.
/// `payload_bytes == None` means "don't care" (spec's `NA` sentinel).
#[derive(Clone, Copy, Debug)]
pub struct BlockDescriptor {
  pub address: Option<*mut u8>,
  pub payload_bytes: Option<usize>,
  pub error: ErrorKind,
}

impl BlockDescriptor {
  pub const fn free(payload_bytes: usize) -> Self {
    Self { address: None, payload_bytes: Some(payload_bytes), error: ErrorKind::Ok }
  }

  pub const fn free_any() -> Self {
    Self { address: None, payload_bytes: None, error: ErrorKind::Ok }
  }

  pub fn alloc(address: *mut u8, payload_bytes: usize) -> Self {
    Self { address: Some(address), payload_bytes: Some(payload_bytes), error: ErrorKind::Ok }
  }

  pub fn alloc_any(address: *mut u8) -> Self {
    Self { address: Some(address), payload_bytes: None, error: ErrorKind::Ok }
  }

  fn observed(block: BlockRef) -> Self {
    Self {
      address: if block.is_alloc() { Some(block.payload_ptr()) } else { None },
      payload_bytes: Some(block.payload_size()),
      error: ErrorKind::Ok,
    }
  }

  fn classify_against(mut self, expected: &BlockDescriptor) -> Self {
    let address_matches = match expected.address {
      None => self.address.is_none(),
      Some(p) => self.address == Some(p),
    };
    let size_matches = match expected.payload_bytes {
      None => true,
      Some(want) => self.payload_bytes == Some(want),
    };
    self.error = if address_matches && size_matches { ErrorKind::Ok } else { ErrorKind::Mismatch };
    self
  }
}

/// Walks `segment` in address order, filling `actual[i]` from the i-th
/// block and scoring it against `expected[i]` (when present). Slots beyond
/// the last block found are left `OutOfBounds`; a block whose footprint
/// would cross the segment end is reported `ContinuesPastEnd` and the walk
/// stops there.
pub fn diff(segment: &Segment, expected: &[BlockDescriptor], actual: &mut [BlockDescriptor]) {
  for slot in actual.iter_mut() {
    *slot = BlockDescriptor { address: None, payload_bytes: None, error: ErrorKind::OutOfBounds };
  }

  let end = segment.end();
  let mut cur = segment.start();
  for (i, slot) in actual.iter_mut().enumerate() {
    if cur == end {
      break;
    }
    let block = unsafe { BlockRef::new(cur) };
    let footprint = block.footprint();
    let next = unsafe { cur.add(footprint) };
    if next as usize > end as usize {
      let mut observed = BlockDescriptor::observed(block);
      observed.error = ErrorKind::ContinuesPastEnd;
      *slot = observed;
      break;
    }
    let observed = BlockDescriptor::observed(block);
    *slot = match expected.get(i) {
      Some(want) => observed.classify_against(want),
      None => observed,
    };
    cur = next;
  }
}
