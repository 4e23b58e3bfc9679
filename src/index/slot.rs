//! Free-index node overlay (spec §3 "Free-index node").
//!
//! A free block's payload, while the block is free, is reinterpreted as a
//! `NodeSlot` — four pointer-sized link words. Every variant uses the same
//! four words for two different roles, exactly as DESIGN.md's "tagged node
//! kinds" resolution calls for: a *tree* role (`left`/`right`/`parent`/
//! `list_start`) and a *duplicate-ring* role (`ring_prev`/`ring_next`/
//! `owner`, the fourth word unused). Because both roles share the same
//! first three words, promoting a ring member into the tree role (or vice
//! versa) never requires a re-layout, only re-tagging which accessors the
//! algorithm calls.
//!
//! All four variants (segregated list doesn't use this at all — it has its
//! own two-word `Links`) read this through the one `unsafe` seam in
//! [`crate::block::BlockRef::overlay`].

use crate::block::BlockRef;

#[repr(C)]
pub struct NodeSlot {
  pub link0: BlockRef,
  pub link1: BlockRef,
  pub link2: BlockRef,
  pub link3: BlockRef,
}

#[inline]
unsafe fn slot(b: BlockRef) -> *mut NodeSlot {
  unsafe { b.overlay::<NodeSlot>() }
}

/// Accessors for the tree role: `link0`/`link1` are the two children
/// (indexed by `dir`, 0 = left/this, 1 = right/other), `link2` is the
/// parent (unused by the parent-free variants), `link3` is the head of
/// this size's duplicate ring.
pub mod tree {
  use super::*;

  #[inline]
  pub fn child(b: BlockRef, dir: usize) -> BlockRef {
    unsafe { if dir == 0 { (*slot(b)).link0 } else { (*slot(b)).link1 } }
  }

  #[inline]
  pub fn set_child(b: BlockRef, dir: usize, v: BlockRef) {
    unsafe {
      if dir == 0 { (*slot(b)).link0 = v } else { (*slot(b)).link1 = v }
    }
  }

  #[inline]
  pub fn parent(b: BlockRef) -> BlockRef {
    unsafe { (*slot(b)).link2 }
  }

  #[inline]
  pub fn set_parent(b: BlockRef, v: BlockRef) {
    unsafe { (*slot(b)).link2 = v };
  }

  #[inline]
  pub fn list_start(b: BlockRef) -> BlockRef {
    unsafe { (*slot(b)).link3 }
  }

  #[inline]
  pub fn set_list_start(b: BlockRef, v: BlockRef) {
    unsafe { (*slot(b)).link3 = v };
  }
}

/// Accessors for the duplicate-ring role: `link0`/`link1` are the ring's
/// prev/next, `link2` is the back-pointer to the owning tree node (valid
/// only on the current ring head — see [`crate::index::ring`]).
pub mod dup {
  use super::*;

  #[inline]
  pub fn prev(b: BlockRef) -> BlockRef {
    unsafe { (*slot(b)).link0 }
  }

  #[inline]
  pub fn set_prev(b: BlockRef, v: BlockRef) {
    unsafe { (*slot(b)).link0 = v };
  }

  #[inline]
  pub fn next(b: BlockRef) -> BlockRef {
    unsafe { (*slot(b)).link1 }
  }

  #[inline]
  pub fn set_next(b: BlockRef, v: BlockRef) {
    unsafe { (*slot(b)).link1 = v };
  }

  #[inline]
  pub fn owner(b: BlockRef) -> BlockRef {
    unsafe { (*slot(b)).link2 }
  }

  #[inline]
  pub fn set_owner(b: BlockRef, v: BlockRef) {
    unsafe { (*slot(b)).link2 = v };
  }
}
