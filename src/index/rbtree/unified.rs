//! RB-tree, unified variant (spec §4.4): identical tree to [`super::canonical`]
//! but the left/right case split is collapsed into a single direction-
//! indexed rotation and fixup, the way a second pass over the same
//! algorithm usually gets refactored once the symmetry is noticed. Still a
//! parent-pointer tree, still distinct nodes for duplicate sizes.

use crate::block::{BlockRef, Color};
use crate::index::rbtree::common::other;
use crate::index::sentinel::Sentinel;
use crate::index::slot::tree;
use crate::index::FreeIndex;

pub struct Unified {
  nil: Sentinel,
  root: BlockRef,
  capacity: usize,
}

impl Default for Unified {
  fn default() -> Self {
    let nil = Sentinel::new();
    let root = nil.block();
    Self { nil, root, capacity: 0 }
  }
}

impl Unified {
  /// Rotates `x` so that `x`'s `other(dir)` child takes its place. `dir =
  /// 0` is a left rotation, `dir = 1` a right rotation.
  fn rotate(&mut self, x: BlockRef, dir: usize) {
    let nil = self.nil.block();
    let od = other(dir);
    let y = tree::child(x, od);
    tree::set_child(x, od, tree::child(y, dir));
    if tree::child(y, dir) != nil {
      tree::set_parent(tree::child(y, dir), x);
    }
    tree::set_parent(y, tree::parent(x));
    let p = tree::parent(x);
    if p == nil {
      self.root = y;
    } else if x == tree::child(p, dir) {
      tree::set_child(p, dir, y);
    } else {
      tree::set_child(p, od, y);
    }
    tree::set_child(y, dir, x);
    tree::set_parent(x, y);
  }

  fn insert_fixup(&mut self, mut z: BlockRef) {
    while tree::parent(z).color() == Color::Red {
      let p = tree::parent(z);
      let g = tree::parent(p);
      let dir = if p == tree::child(g, 0) { 0 } else { 1 };
      let od = other(dir);
      let uncle = tree::child(g, od);
      if uncle.color() == Color::Red {
        p.set_color(Color::Black);
        uncle.set_color(Color::Black);
        g.set_color(Color::Red);
        z = g;
      } else {
        if z == tree::child(p, od) {
          z = p;
          self.rotate(z, dir);
        }
        let p = tree::parent(z);
        let g = tree::parent(p);
        p.set_color(Color::Black);
        g.set_color(Color::Red);
        self.rotate(g, od);
      }
      if z == self.root {
        break;
      }
    }
    self.root.set_color(Color::Black);
  }

  fn transplant(&mut self, u: BlockRef, v: BlockRef) {
    let nil = self.nil.block();
    let p = tree::parent(u);
    if p == nil {
      self.root = v;
    } else if u == tree::child(p, 0) {
      tree::set_child(p, 0, v);
    } else {
      tree::set_child(p, 1, v);
    }
    tree::set_parent(v, p);
  }

  fn minimum(&self, mut x: BlockRef) -> BlockRef {
    let nil = self.nil.block();
    while tree::child(x, 0) != nil {
      x = tree::child(x, 0);
    }
    x
  }

  fn delete(&mut self, z: BlockRef) {
    let nil = self.nil.block();
    let mut y = z;
    let mut y_original_color = y.color();
    let x;
    if tree::child(z, 0) == nil {
      x = tree::child(z, 1);
      self.transplant(z, tree::child(z, 1));
    } else if tree::child(z, 1) == nil {
      x = tree::child(z, 0);
      self.transplant(z, tree::child(z, 0));
    } else {
      y = self.minimum(tree::child(z, 1));
      y_original_color = y.color();
      x = tree::child(y, 1);
      if tree::parent(y) == z {
        tree::set_parent(x, y);
      } else {
        self.transplant(y, tree::child(y, 1));
        tree::set_child(y, 1, tree::child(z, 1));
        tree::set_parent(tree::child(y, 1), y);
      }
      self.transplant(z, y);
      tree::set_child(y, 0, tree::child(z, 0));
      tree::set_parent(tree::child(y, 0), y);
      y.set_color(z.color());
    }
    if y_original_color == Color::Black {
      self.delete_fixup(x);
    }
  }

  fn delete_fixup(&mut self, mut x: BlockRef) {
    while x != self.root && x.color() == Color::Black {
      let p = tree::parent(x);
      let dir = if x == tree::child(p, 0) { 0 } else { 1 };
      let od = other(dir);
      let mut w = tree::child(p, od);
      if w.color() == Color::Red {
        w.set_color(Color::Black);
        p.set_color(Color::Red);
        self.rotate(p, dir);
        w = tree::child(p, od);
      }
      if tree::child(w, dir).color() == Color::Black && tree::child(w, od).color() == Color::Black {
        w.set_color(Color::Red);
        x = p;
      } else {
        if tree::child(w, od).color() == Color::Black {
          tree::child(w, dir).set_color(Color::Black);
          w.set_color(Color::Red);
          self.rotate(w, od);
          w = tree::child(p, od);
        }
        w.set_color(p.color());
        p.set_color(Color::Black);
        tree::child(w, od).set_color(Color::Black);
        self.rotate(p, dir);
        x = self.root;
      }
    }
    x.set_color(Color::Black);
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
    if lo.is_some_and(|lo| s < lo) || hi.is_some_and(|hi| s > hi) {
      return false;
    }
    if x.is_alloc() {
      return false;
    }
    self.check_bst(tree::child(x, 0), nil, lo, Some(s)) && self.check_bst(tree::child(x, 1), nil, Some(s), hi)
  }
}

impl FreeIndex for Unified {
  fn insert(&mut self, block: BlockRef) {
    let nil = self.nil.block();
    self.capacity += block.payload_size();
    tree::set_child(block, 0, nil);
    tree::set_child(block, 1, nil);
    let mut y = nil;
    let mut x = self.root;
    while x != nil {
      y = x;
      x = if block.payload_size() < x.payload_size() { tree::child(x, 0) } else { tree::child(x, 1) };
    }
    tree::set_parent(block, y);
    if y == nil {
      self.root = block;
    } else if block.payload_size() < y.payload_size() {
      tree::set_child(y, 0, block);
    } else {
      tree::set_child(y, 1, block);
    }
    block.set_color(Color::Red);
    self.insert_fixup(block);
  }

  fn remove_best_fit(&mut self, size: usize) -> Option<BlockRef> {
    let nil = self.nil.block();
    let mut x = self.root;
    let mut best = nil;
    while x != nil {
      if x.payload_size() >= size {
        best = x;
        x = tree::child(x, 0);
      } else {
        x = tree::child(x, 1);
      }
    }
    if best == nil {
      return None;
    }
    self.capacity -= best.payload_size();
    self.delete(best);
    Some(best)
  }

  fn remove_known(&mut self, block: BlockRef) {
    self.capacity -= block.payload_size();
    self.delete(block);
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
