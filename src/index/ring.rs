//! Per-size duplicate ring (spec §3 invariant 6, §4.4).
//!
//! Used by the three ring-based RB-tree variants (`linked`, `stack`,
//! `topdown`) and both splay variants. The tree carries one node per
//! distinct payload size; every further same-size free block threads onto
//! that node's `list_start` as a doubly linked ring terminated at both ends
//! by the index's `nil` sentinel, so removing or adding a duplicate never
//! touches the tree's shape.
//!
//! The back-pointer to the owning tree node (`dup::owner`) lives only in
//! the current ring head — the slot is otherwise free to be read as
//! whatever the block's other role needs, so we don't bother clearing it
//! on non-head members beyond what `classify` relies on.

use crate::index::slot::{dup, tree};
use crate::block::BlockRef;

/// Threads `newb` onto `owner`'s duplicate ring. O(1), no tree mutation.
pub fn insert(owner: BlockRef, newb: BlockRef, nil: BlockRef) {
  let old_head = tree::list_start(owner);
  dup::set_prev(newb, nil);
  if old_head == nil {
    dup::set_next(newb, nil);
  } else {
    dup::set_next(newb, old_head);
    dup::set_prev(old_head, newb);
    dup::set_owner(old_head, nil);
  }
  dup::set_owner(newb, owner);
  tree::set_list_start(owner, newb);
}

/// What role `block` plays relative to the tree node `owner` of its size.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Role {
  /// `block` is the tree node itself.
  TreeNode,
  /// `block` is the current ring head (`owner.list_start`).
  RingHead,
  /// `block` is some other member of the ring.
  RingInterior,
}

pub fn classify(owner: BlockRef, block: BlockRef) -> Role {
  if block == owner {
    Role::TreeNode
  } else if tree::list_start(owner) == block {
    Role::RingHead
  } else {
    Role::RingInterior
  }
}

/// Splices a non-head ring member out. O(1).
pub fn remove_interior(block: BlockRef) {
  let p = dup::prev(block);
  let n = dup::next(block);
  dup::set_next(p, n);
  dup::set_prev(n, p);
}

/// Removes the current ring head of `owner`'s duplicate ring, promoting the
/// next member (if any) to head. Returns the removed block, which is
/// `== owner`'s former `list_start`.
pub fn remove_head(owner: BlockRef, nil: BlockRef) -> BlockRef {
  let head = tree::list_start(owner);
  debug_assert_ne!(head, nil);
  let next = dup::next(head);
  if next == nil {
    tree::set_list_start(owner, nil);
  } else {
    dup::set_prev(next, nil);
    dup::set_owner(next, owner);
    tree::set_list_start(owner, next);
  }
  head
}

/// Detaches `old_owner`'s ring head and re-threads the remainder of the
/// ring under the promoted block itself, returning it. Used when deleting
/// a tree node that still has duplicates: the promoted block takes over
/// the tree position (caller copies `old_owner`'s structural links onto
/// it), so the ring must point at its *new* owner rather than at the
/// about-to-be-freed `old_owner`.
pub fn promote(old_owner: BlockRef, nil: BlockRef) -> BlockRef {
  let promoted = tree::list_start(old_owner);
  debug_assert_ne!(promoted, nil);
  let rest = dup::next(promoted);
  if rest == nil {
    tree::set_list_start(promoted, nil);
  } else {
    dup::set_prev(rest, nil);
    dup::set_owner(rest, promoted);
    tree::set_list_start(promoted, rest);
  }
  promoted
}
