//! Splay tree, top-down variant (spec §4.5): the Sleator-Tarjan top-down
//! splay — a single descent that builds two spines ("smaller than key" and
//! "larger than key") out of the nodes it passes over, then reassembles
//! them around the last node reached. No parent pointers, no path stack.
//!
//! `remove_best_fit` runs the splay once for `size`; if the resulting root
//! undershoots, the best fit is the minimum of its right subtree, reached
//! by a second splay restricted to that subtree (spec's "two-pass"
//! best-fit, mirrored from [`crate::index::rbtree::topdown`]).

use crate::block::BlockRef;
use crate::index::ring;
use crate::index::sentinel::Sentinel;
use crate::index::slot::tree;
use crate::index::FreeIndex;

pub struct SplayTopdown {
  nil: Sentinel,
  /// Scratch anchor for the "smaller than key" spine during a splay. Only
  /// its child(1) slot is ever read or written, and only mid-splay.
  lhead: Sentinel,
  /// Scratch anchor for the "larger than key" spine during a splay. Only
  /// its child(0) slot is ever read or written, and only mid-splay.
  rhead: Sentinel,
  root: BlockRef,
  capacity: usize,
}

impl Default for SplayTopdown {
  fn default() -> Self {
    let nil = Sentinel::new();
    let root = nil.block();
    Self { nil, lhead: Sentinel::new(), rhead: Sentinel::new(), root, capacity: 0 }
  }
}

impl SplayTopdown {
  /// Splays `root` for `size`, returning the new subtree top: the node
  /// carrying `size` if present, otherwise the tightest predecessor or
  /// successor reached by the descent.
  fn splay(&mut self, size: usize, root: BlockRef) -> BlockRef {
    let nil = self.nil.block();
    if root == nil {
      return nil;
    }
    let lh = self.lhead.block();
    let rh = self.rhead.block();
    let mut l = lh;
    let mut r = rh;
    let mut t = root;
    loop {
      if size < t.payload_size() {
        if tree::child(t, 0) == nil {
          break;
        }
        if size < tree::child(t, 0).payload_size() {
          let y = tree::child(t, 0);
          tree::set_child(t, 0, tree::child(y, 1));
          tree::set_child(y, 1, t);
          t = y;
          if tree::child(t, 0) == nil {
            break;
          }
        }
        tree::set_child(r, 0, t);
        r = t;
        t = tree::child(t, 0);
      } else if size > t.payload_size() {
        if tree::child(t, 1) == nil {
          break;
        }
        if size > tree::child(t, 1).payload_size() {
          let y = tree::child(t, 1);
          tree::set_child(t, 1, tree::child(y, 0));
          tree::set_child(y, 0, t);
          t = y;
          if tree::child(t, 1) == nil {
            break;
          }
        }
        tree::set_child(l, 1, t);
        l = t;
        t = tree::child(t, 1);
      } else {
        break;
      }
    }
    tree::set_child(l, 1, tree::child(t, 0));
    tree::set_child(r, 0, tree::child(t, 1));
    tree::set_child(t, 0, tree::child(lh, 1));
    tree::set_child(t, 1, tree::child(rh, 0));
    t
  }

  fn check_bst(&self, x: BlockRef, nil: BlockRef, lo: Option<usize>, hi: Option<usize>) -> bool {
    if x == nil {
      return true;
    }
    let s = x.payload_size();
    if lo.is_some_and(|lo| s <= lo) || hi.is_some_and(|hi| s >= hi) {
      return false;
    }
    if x.is_alloc() {
      return false;
    }
    self.check_ring(x, nil)
      && self.check_bst(tree::child(x, 0), nil, lo, Some(s))
      && self.check_bst(tree::child(x, 1), nil, Some(s), hi)
  }

  fn check_ring(&self, owner: BlockRef, nil: BlockRef) -> bool {
    let mut cur = tree::list_start(owner);
    let mut last = nil;
    while cur != nil {
      if cur.payload_size() != owner.payload_size() || cur.is_alloc() {
        return false;
      }
      if crate::index::slot::dup::prev(cur) != last {
        return false;
      }
      last = cur;
      cur = crate::index::slot::dup::next(cur);
    }
    true
  }
}

impl FreeIndex for SplayTopdown {
  fn insert(&mut self, block: BlockRef) {
    let nil = self.nil.block();
    self.capacity += block.payload_size();
    let size = block.payload_size();

    if self.root == nil {
      tree::set_child(block, 0, nil);
      tree::set_child(block, 1, nil);
      tree::set_list_start(block, nil);
      self.root = block;
      return;
    }

    self.root = self.splay(size, self.root);
    if self.root.payload_size() == size {
      ring::insert(self.root, block, nil);
      return;
    }
    tree::set_list_start(block, nil);
    if size < self.root.payload_size() {
      tree::set_child(block, 0, tree::child(self.root, 0));
      tree::set_child(block, 1, self.root);
      tree::set_child(self.root, 0, nil);
    } else {
      tree::set_child(block, 1, tree::child(self.root, 1));
      tree::set_child(block, 0, self.root);
      tree::set_child(self.root, 1, nil);
    }
    self.root = block;
  }

  fn remove_best_fit(&mut self, size: usize) -> Option<BlockRef> {
    let nil = self.nil.block();
    if self.root == nil {
      return None;
    }
    self.root = self.splay(size, self.root);
    if self.root.payload_size() < size {
      let right = tree::child(self.root, 1);
      if right == nil {
        return None;
      }
      let new_top = self.splay(0, right);
      let old_root = self.root;
      tree::set_child(new_top, 0, old_root);
      self.root = new_top;
    }

    let best = self.root;
    self.capacity -= best.payload_size();
    if tree::list_start(best) != nil {
      return Some(ring::remove_head(best, nil));
    }
    let l = tree::child(best, 0);
    let r = tree::child(best, 1);
    self.root = if l == nil {
      r
    } else {
      let new_root = self.splay(usize::MAX, l);
      tree::set_child(new_root, 1, r);
      new_root
    };
    Some(best)
  }

  fn remove_known(&mut self, block: BlockRef) {
    let nil = self.nil.block();
    let size = block.payload_size();
    self.root = self.splay(size, self.root);
    let owner = self.root;
    self.capacity -= size;
    match ring::classify(owner, block) {
      ring::Role::RingInterior => ring::remove_interior(block),
      ring::Role::RingHead => {
        ring::remove_head(owner, nil);
      }
      ring::Role::TreeNode => {
        let l = tree::child(owner, 0);
        let r = tree::child(owner, 1);
        if tree::list_start(owner) != nil {
          let promoted = ring::promote(owner, nil);
          tree::set_child(promoted, 0, l);
          tree::set_child(promoted, 1, r);
          self.root = promoted;
        } else {
          self.root = if l == nil {
            r
          } else {
            let new_root = self.splay(usize::MAX, l);
            tree::set_child(new_root, 1, r);
            new_root
          };
        }
      }
    }
  }

  fn capacity(&self) -> usize {
    self.capacity
  }

  fn validate(&self) -> bool {
    let nil = self.nil.block();
    self.check_bst(self.root, nil, None, None)
  }
}
