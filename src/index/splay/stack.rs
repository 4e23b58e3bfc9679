//! Splay tree, stack variant (spec §4.5): classic bottom-up splaying
//! (zig / zig-zig / zig-zag), performed without a parent pointer by
//! rebuilding the root-to-node path as a `Vec` during the initial descent
//! and walking it back up, exactly as [`crate::index::rbtree::stack`]
//! does for its RB-tree. Duplicate sizes thread onto a ring, same as the
//! RB-tree variants — see [`crate::index::ring`].

use crate::block::BlockRef;
use crate::index::rbtree::common::other;
use crate::index::ring;
use crate::index::sentinel::Sentinel;
use crate::index::slot::tree;
use crate::index::FreeIndex;

pub struct SplayStack {
  nil: Sentinel,
  root: BlockRef,
  capacity: usize,
}

impl Default for SplayStack {
  fn default() -> Self {
    let nil = Sentinel::new();
    let root = nil.block();
    Self { nil, root, capacity: 0 }
  }
}

impl SplayStack {
  fn rotate_here(&mut self, parent: Option<BlockRef>, x: BlockRef, dir: usize) -> BlockRef {
    let od = other(dir);
    let y = tree::child(x, od);
    tree::set_child(x, od, tree::child(y, dir));
    tree::set_child(y, dir, x);
    if let Some(p) = parent {
      if tree::child(p, 0) == x {
        tree::set_child(p, 0, y);
      } else {
        tree::set_child(p, 1, y);
      }
    }
    y
  }

  /// Splays `path`'s last element to the top of `path` via repeated
  /// zig/zig-zig/zig-zag rotations, leaving `path` a single element (the
  /// new local root). Does not touch `self.root` — callers decide whether
  /// the result is the whole tree's root or a detached subtree's.
  fn splay_to_top(&mut self, path: &mut Vec<BlockRef>) {
    while path.len() > 1 {
      let n = path.len();
      let x = path[n - 1];
      let p = path[n - 2];
      if n == 2 {
        let dir = if tree::child(p, 0) == x { 0 } else { 1 };
        self.rotate_here(None, p, other(dir));
        path.truncate(0);
        path.push(x);
        continue;
      }
      let g = path[n - 3];
      let gg = if n >= 4 { Some(path[n - 4]) } else { None };
      let dir_p = if tree::child(g, 0) == p { 0 } else { 1 };
      let dir_x = if tree::child(p, 0) == x { 0 } else { 1 };
      if dir_p == dir_x {
        self.rotate_here(gg, g, other(dir_p));
        self.rotate_here(gg, p, other(dir_x));
      } else {
        self.rotate_here(Some(g), p, other(dir_x));
        self.rotate_here(gg, g, other(dir_p));
      }
      path.truncate(n - 3);
      path.push(x);
    }
  }

  fn splay_root(&mut self, mut path: Vec<BlockRef>) -> BlockRef {
    self.splay_to_top(&mut path);
    self.root = path[0];
    path[0]
  }

  fn splay_local(&mut self, mut path: Vec<BlockRef>) -> BlockRef {
    self.splay_to_top(&mut path);
    path[0]
  }

  /// Joins a detached left subtree `l` (all sizes less than `r`'s) and a
  /// detached right subtree `r` into one, by splaying `l`'s maximum to
  /// its top and hanging `r` off its right.
  fn join(&mut self, l: BlockRef, r: BlockRef) -> BlockRef {
    let nil = self.nil.block();
    if l == nil {
      return r;
    }
    let mut path = vec![l];
    while tree::child(*path.last().unwrap(), 1) != nil {
      let next = tree::child(*path.last().unwrap(), 1);
      path.push(next);
    }
    let top = self.splay_local(path);
    tree::set_child(top, 1, r);
    top
  }

  fn find_owner_path(&self, size: usize) -> Vec<BlockRef> {
    let nil = self.nil.block();
    let mut path = Vec::new();
    let mut x = self.root;
    while x.payload_size() != size {
      debug_assert_ne!(x, nil, "size not present in index");
      path.push(x);
      x = if size < x.payload_size() { tree::child(x, 0) } else { tree::child(x, 1) };
    }
    path.push(x);
    path
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

impl FreeIndex for SplayStack {
  fn insert(&mut self, block: BlockRef) {
    let nil = self.nil.block();
    self.capacity += block.payload_size();
    tree::set_child(block, 0, nil);
    tree::set_child(block, 1, nil);
    tree::set_list_start(block, nil);

    if self.root == nil {
      self.root = block;
      return;
    }

    let size = block.payload_size();
    let mut path = Vec::new();
    let mut x = self.root;
    loop {
      if size == x.payload_size() {
        ring::insert(x, block, nil);
        return;
      }
      path.push(x);
      x = if size < x.payload_size() { tree::child(x, 0) } else { tree::child(x, 1) };
      if x == nil {
        break;
      }
    }
    let parent = *path.last().unwrap();
    if size < parent.payload_size() {
      tree::set_child(parent, 0, block);
    } else {
      tree::set_child(parent, 1, block);
    }
    path.push(block);
    self.splay_root(path);
  }

  fn remove_best_fit(&mut self, size: usize) -> Option<BlockRef> {
    let nil = self.nil.block();
    let mut path = Vec::new();
    let mut x = self.root;
    let mut best_path: Option<Vec<BlockRef>> = None;
    while x != nil {
      path.push(x);
      if x.payload_size() >= size {
        best_path = Some(path.clone());
        x = tree::child(x, 0);
      } else {
        x = tree::child(x, 1);
      }
    }
    let best_path = best_path?;
    let best = *best_path.last().unwrap();
    self.splay_root(best_path);
    self.capacity -= best.payload_size();
    if tree::list_start(best) != nil {
      return Some(ring::remove_head(best, nil));
    }
    let l = tree::child(best, 0);
    let r = tree::child(best, 1);
    self.root = self.join(l, r);
    Some(best)
  }

  fn remove_known(&mut self, block: BlockRef) {
    let nil = self.nil.block();
    let size = block.payload_size();
    let path = self.find_owner_path(size);
    let owner = *path.last().unwrap();
    self.splay_root(path);
    self.capacity -= size;
    match ring::classify(owner, block) {
      ring::Role::RingInterior => ring::remove_interior(block),
      ring::Role::RingHead => {
        ring::remove_head(owner, nil);
      }
      ring::Role::TreeNode => {
        if tree::list_start(owner) != nil {
          let promoted = ring::promote(owner, nil);
          tree::set_child(promoted, 0, tree::child(owner, 0));
          tree::set_child(promoted, 1, tree::child(owner, 1));
          self.root = promoted;
        } else {
          let l = tree::child(owner, 0);
          let r = tree::child(owner, 1);
          self.root = self.join(l, r);
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
