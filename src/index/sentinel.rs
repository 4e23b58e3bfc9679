//! The shared `nil` object (spec §3 "Sentinels").
//!
//! Every tree-shaped index variant owns one `Sentinel`: a small boxed
//! region formatted as a permanently-allocated, zero-payload, black block.
//! It never appears on the segment and is never coalesced — it exists only
//! to serve as leaf terminator, empty-ring tail, and empty-bucket marker,
//! so algorithms never have to special-case a null child or an empty ring
//! with an `Option`.

use crate::block::{self, BlockRef, Color, MIN_BLOCK};

pub struct Sentinel {
  buf: Box<[u8]>,
}

impl Sentinel {
  pub fn new() -> Self {
    let mut buf = vec![0u8; MIN_BLOCK].into_boxed_slice();
    let block = unsafe { block::format_free(buf.as_mut_ptr(), MIN_BLOCK - block::OVERHEAD) };
    block.set_alloc(true);
    block.set_color(Color::Black);
    Self { buf }
  }

  #[inline]
  pub fn block(&self) -> BlockRef {
    unsafe { BlockRef::new(self.buf.as_ptr() as *mut u8) }
  }
}

impl Default for Sentinel {
  fn default() -> Self {
    Self::new()
  }
}
