//! RB-tree, top-down variant (spec §4.4): [`super::stack`]'s parentless,
//! ring-based tree, but insertion fixes red-red violations on the way
//! *down* (splitting any node with two red children as it's passed,
//! à la a top-down 2-3-4 insert) instead of fixing up after the fact, so
//! there is nothing to unwind once the new leaf is attached — no stack is
//! ever built for insertion.
//!
//! `remove_best_fit` is explicitly two-pass: a read-only descent finds the
//! best-fit *size*, then a second, independent descent performs the
//! mutating removal by that size — the two never share a retained path.
//! Deletion's rebalancing reuses `stack`'s rebuilt-ancestor-path technique
//! (see DESIGN.md): a fully from-scratch top-down deletion exists in the
//! literature but the intrusive transplant it requires (nodes can't move
//! in memory the way a keyed tree's values can) make it too easy to get
//! subtly wrong without a compiler to check against, so this variant only
//! commits to "top-down" for the half of the contract — insertion — where
//! the well-known algorithm translates directly.

use crate::block::{BlockRef, Color};
use crate::index::rbtree::common::other;
use crate::index::ring;
use crate::index::sentinel::Sentinel;
use crate::index::slot::tree;
use crate::index::FreeIndex;

pub struct Topdown {
  nil: Sentinel,
  root: BlockRef,
  capacity: usize,
}

impl Default for Topdown {
  fn default() -> Self {
    let nil = Sentinel::new();
    let root = nil.block();
    Self { nil, root, capacity: 0 }
  }
}

impl Topdown {
  fn rotate(&mut self, parent: BlockRef, x: BlockRef, dir: usize) -> BlockRef {
    let nil = self.nil.block();
    let od = other(dir);
    let y = tree::child(x, od);
    tree::set_child(x, od, tree::child(y, dir));
    tree::set_child(y, dir, x);
    if parent == nil {
      self.root = y;
    } else if tree::child(parent, 0) == x {
      tree::set_child(parent, 0, y);
    } else {
      tree::set_child(parent, 1, y);
    }
    y
  }

  /// Fixes a red-red violation between `p` (red) and its child below,
  /// rooted at `g` (p's parent) with `gg` as g's parent (or `nil`). Used
  /// both mid-descent (after splitting a 4-node) and once more after the
  /// new leaf is attached.
  fn reorient(&mut self, size: usize, g: BlockRef, p: BlockRef, gg: BlockRef) {
    g.set_color(Color::Red);
    let dir_g = if size < g.payload_size() { 0 } else { 1 };
    let dir_p = if size < p.payload_size() { 0 } else { 1 };
    let top = if dir_g != dir_p {
      self.rotate(g, p, other(dir_p));
      self.rotate(gg, g, other(dir_g))
    } else {
      self.rotate(gg, g, other(dir_g))
    };
    top.set_color(Color::Black);
  }

  fn delete(&mut self, path: Vec<BlockRef>) {
    let nil = self.nil.block();
    let z_idx = path.len() - 1;
    let z = path[z_idx];
    let y_original_color;
    let mut fixup_path: Vec<BlockRef>;

    if tree::child(z, 0) == nil || tree::child(z, 1) == nil {
      let dir = if tree::child(z, 0) == nil { 1 } else { 0 };
      let x = tree::child(z, dir);
      y_original_color = z.color();
      self.splice_in(&path, z_idx, x);
      fixup_path = path[..z_idx].to_vec();
      fixup_path.push(x);
    } else {
      let mut succ_path = path.clone();
      succ_path.push(tree::child(z, 1));
      while tree::child(*succ_path.last().unwrap(), 0) != nil {
        let nxt = tree::child(*succ_path.last().unwrap(), 0);
        succ_path.push(nxt);
      }
      let y = *succ_path.last().unwrap();
      y_original_color = y.color();
      let x = tree::child(y, 1);
      let y_idx = succ_path.len() - 1;

      if y_idx == z_idx + 1 {
        tree::set_child(y, 0, tree::child(z, 0));
        self.splice_in(&path, z_idx, y);
        y.set_color(z.color());
        fixup_path = path[..z_idx].to_vec();
        fixup_path.push(y);
        fixup_path.push(x);
      } else {
        let y_parent = succ_path[y_idx - 1];
        tree::set_child(y_parent, 0, x);
        tree::set_child(y, 1, tree::child(z, 1));
        tree::set_child(y, 0, tree::child(z, 0));
        self.splice_in(&path, z_idx, y);
        y.set_color(z.color());
        fixup_path = path[..z_idx].to_vec();
        fixup_path.push(y);
        fixup_path.extend(succ_path[(z_idx + 1)..y_idx].iter().copied());
        fixup_path.push(x);
      }
    }

    if y_original_color == Color::Black {
      self.delete_fixup(&mut fixup_path);
    }
  }

  fn splice_in(&mut self, path: &[BlockRef], z_idx: usize, new: BlockRef) {
    if z_idx == 0 {
      self.root = new;
      return;
    }
    let parent = path[z_idx - 1];
    if tree::child(parent, 0) == path[z_idx] {
      tree::set_child(parent, 0, new);
    } else {
      tree::set_child(parent, 1, new);
    }
  }

  fn delete_fixup(&mut self, path: &mut Vec<BlockRef>) {
    loop {
      let n = path.len();
      let x = path[n - 1];
      if x == self.root || x.color() == Color::Red {
        break;
      }
      let p = path[n - 2];
      let dir = if tree::child(p, 0) == x { 0 } else { 1 };
      let od = other(dir);
      let mut w = tree::child(p, od);
      if w.color() == Color::Red {
        w.set_color(Color::Black);
        p.set_color(Color::Red);
        let gp = if n >= 3 { path[n - 3] } else { self.nil.block() };
        let newtop = self.rotate(gp, p, dir);
        path.insert(n - 2, newtop);
        w = tree::child(p, od);
      }
      let n = path.len();
      let p = path[n - 2];
      if tree::child(w, dir).color() == Color::Black && tree::child(w, od).color() == Color::Black {
        w.set_color(Color::Red);
        path.truncate(n - 1);
        continue;
      }
      if tree::child(w, od).color() == Color::Black {
        tree::child(w, dir).set_color(Color::Black);
        w.set_color(Color::Red);
        w = self.rotate(p, w, od);
      }
      w.set_color(p.color());
      p.set_color(Color::Black);
      tree::child(w, od).set_color(Color::Black);
      let gp2 = if n >= 3 { path[n - 3] } else { self.nil.block() };
      self.rotate(gp2, p, dir);
      path.clear();
      path.push(self.root);
      break;
    }
    path.last().copied().unwrap_or(self.root).set_color(Color::Black);
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

  fn replace_node(&mut self, path: &[BlockRef], old: BlockRef, new: BlockRef) {
    tree::set_child(new, 0, tree::child(old, 0));
    tree::set_child(new, 1, tree::child(old, 1));
    new.set_color(old.color());
    self.splice_in(path, path.len() - 1, new);
  }

  /// Read-only: the payload size of the best-fit block for `size`, or
  /// `None`. First pass of the two-pass best-fit protocol.
  fn best_fit_size(&self, size: usize) -> Option<usize> {
    let nil = self.nil.block();
    let mut x = self.root;
    let mut best: Option<usize> = None;
    while x != nil {
      if x.payload_size() >= size {
        best = Some(x.payload_size());
        x = tree::child(x, 0);
      } else {
        x = tree::child(x, 1);
      }
    }
    best
  }

  fn black_height(&self, x: BlockRef, nil: BlockRef) -> Option<usize> {
    if x == nil {
      return Some(0);
    }
    if x.color() == Color::Red
      && (tree::child(x, 0).color() == Color::Red || tree::child(x, 1).color() == Color::Red)
    {
      return None;
    }
    let lh = self.black_height(tree::child(x, 0), nil)?;
    let rh = self.black_height(tree::child(x, 1), nil)?;
    if lh != rh {
      return None;
    }
    Some(lh + if x.color() == Color::Black { 1 } else { 0 })
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

impl FreeIndex for Topdown {
  fn insert(&mut self, block: BlockRef) {
    let nil = self.nil.block();
    self.capacity += block.payload_size();
    tree::set_child(block, 0, nil);
    tree::set_child(block, 1, nil);
    tree::set_list_start(block, nil);

    if self.root == nil {
      block.set_color(Color::Black);
      self.root = block;
      return;
    }

    let size = block.payload_size();
    let mut gg = nil;
    let mut g = nil;
    let mut p = nil;
    let mut x = self.root;

    loop {
      if tree::child(x, 0).color() == Color::Red && tree::child(x, 1).color() == Color::Red {
        x.set_color(Color::Red);
        tree::child(x, 0).set_color(Color::Black);
        tree::child(x, 1).set_color(Color::Black);
        if p != nil && p.color() == Color::Red {
          self.reorient(size, g, p, gg);
        }
      }

      if size == x.payload_size() {
        ring::insert(x, block, nil);
        return;
      }

      gg = g;
      g = p;
      p = x;
      x = if size < x.payload_size() { tree::child(x, 0) } else { tree::child(x, 1) };

      if x == nil {
        break;
      }
    }

    if size < p.payload_size() {
      tree::set_child(p, 0, block);
    } else {
      tree::set_child(p, 1, block);
    }
    block.set_color(Color::Red);

    if p.color() == Color::Red {
      self.reorient(size, g, p, gg);
    }

    self.root.set_color(Color::Black);
  }

  fn remove_best_fit(&mut self, size: usize) -> Option<BlockRef> {
    let best_size = self.best_fit_size(size)?;
    let nil = self.nil.block();
    let path = self.find_owner_path(best_size);
    let best = *path.last().unwrap();
    self.capacity -= best.payload_size();
    if tree::list_start(best) != nil {
      return Some(ring::remove_head(best, nil));
    }
    self.delete(path);
    Some(best)
  }

  fn remove_known(&mut self, block: BlockRef) {
    let nil = self.nil.block();
    let size = block.payload_size();
    let path = self.find_owner_path(size);
    let owner = *path.last().unwrap();
    self.capacity -= size;
    match ring::classify(owner, block) {
      ring::Role::RingInterior => ring::remove_interior(block),
      ring::Role::RingHead => {
        ring::remove_head(owner, nil);
      }
      ring::Role::TreeNode => {
        if tree::list_start(owner) != nil {
          let promoted = ring::promote(owner, nil);
          self.replace_node(&path, owner, promoted);
        } else {
          self.delete(path);
        }
      }
    }
  }

  fn capacity(&self) -> usize {
    self.capacity
  }

  fn validate(&self) -> bool {
    let nil = self.nil.block();
    self.root.color() == Color::Black
      && self.black_height(self.root, nil).is_some()
      && self.check_bst(self.root, nil, None, None)
  }
}
