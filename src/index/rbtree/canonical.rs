//! RB-tree, canonical variant (spec §4.4): classic CLRS left-leaning
//! insert/delete with an explicit parent pointer, written out literally
//! (separate left and right code paths, no direction array). Duplicate
//! sizes are **not** collapsed into a ring here — an equal-size insert
//! simply becomes another distinct tree node, tie-broken to the right, so
//! the whole tree (including a run of equal keys) stays one ordinary RB
//! tree under CLRS's proofs.

use crate::block::{BlockRef, Color};
use crate::index::slot::tree;
use crate::index::sentinel::Sentinel;
use crate::index::FreeIndex;

fn left(b: BlockRef) -> BlockRef {
  tree::child(b, 0)
}
fn set_left(b: BlockRef, v: BlockRef) {
  tree::set_child(b, 0, v);
}
fn right(b: BlockRef) -> BlockRef {
  tree::child(b, 1)
}
fn set_right(b: BlockRef, v: BlockRef) {
  tree::set_child(b, 1, v);
}
fn parent(b: BlockRef) -> BlockRef {
  tree::parent(b)
}
fn set_parent(b: BlockRef, v: BlockRef) {
  tree::set_parent(b, v);
}

pub struct Canonical {
  nil: Sentinel,
  root: BlockRef,
  capacity: usize,
}

impl Default for Canonical {
  fn default() -> Self {
    let nil = Sentinel::new();
    let root = nil.block();
    Self { nil, root, capacity: 0 }
  }
}

impl Canonical {
  fn left_rotate(&mut self, x: BlockRef) {
    let nil = self.nil.block();
    let y = right(x);
    set_right(x, left(y));
    if left(y) != nil {
      set_parent(left(y), x);
    }
    set_parent(y, parent(x));
    if parent(x) == nil {
      self.root = y;
    } else if x == left(parent(x)) {
      set_left(parent(x), y);
    } else {
      set_right(parent(x), y);
    }
    set_left(y, x);
    set_parent(x, y);
  }

  fn right_rotate(&mut self, x: BlockRef) {
    let nil = self.nil.block();
    let y = left(x);
    set_left(x, right(y));
    if right(y) != nil {
      set_parent(right(y), x);
    }
    set_parent(y, parent(x));
    if parent(x) == nil {
      self.root = y;
    } else if x == right(parent(x)) {
      set_right(parent(x), y);
    } else {
      set_left(parent(x), y);
    }
    set_right(y, x);
    set_parent(x, y);
  }

  fn insert_fixup(&mut self, mut z: BlockRef) {
    let nil = self.nil.block();
    while parent(z).color() == Color::Red {
      let p = parent(z);
      let g = parent(p);
      if p == left(g) {
        let uncle = right(g);
        if uncle.color() == Color::Red {
          p.set_color(Color::Black);
          uncle.set_color(Color::Black);
          g.set_color(Color::Red);
          z = g;
        } else {
          if z == right(p) {
            z = p;
            self.left_rotate(z);
          }
          let p = parent(z);
          let g = parent(p);
          p.set_color(Color::Black);
          g.set_color(Color::Red);
          self.right_rotate(g);
        }
      } else {
        let uncle = left(g);
        if uncle.color() == Color::Red {
          p.set_color(Color::Black);
          uncle.set_color(Color::Black);
          g.set_color(Color::Red);
          z = g;
        } else {
          if z == left(p) {
            z = p;
            self.right_rotate(z);
          }
          let p = parent(z);
          let g = parent(p);
          p.set_color(Color::Black);
          g.set_color(Color::Red);
          self.left_rotate(g);
        }
      }
      if z == self.root {
        break;
      }
    }
    self.root.set_color(Color::Black);
    let _ = nil;
  }

  fn transplant(&mut self, u: BlockRef, v: BlockRef) {
    let nil = self.nil.block();
    if parent(u) == nil {
      self.root = v;
    } else if u == left(parent(u)) {
      set_left(parent(u), v);
    } else {
      set_right(parent(u), v);
    }
    set_parent(v, parent(u));
  }

  fn minimum(&self, mut x: BlockRef) -> BlockRef {
    let nil = self.nil.block();
    while left(x) != nil {
      x = left(x);
    }
    x
  }

  fn delete(&mut self, z: BlockRef) {
    let nil = self.nil.block();
    let mut y = z;
    let mut y_original_color = y.color();
    let x;
    if left(z) == nil {
      x = right(z);
      self.transplant(z, right(z));
    } else if right(z) == nil {
      x = left(z);
      self.transplant(z, left(z));
    } else {
      y = self.minimum(right(z));
      y_original_color = y.color();
      x = right(y);
      if parent(y) == z {
        set_parent(x, y);
      } else {
        self.transplant(y, right(y));
        set_right(y, right(z));
        set_parent(right(y), y);
      }
      self.transplant(z, y);
      set_left(y, left(z));
      set_parent(left(y), y);
      y.set_color(z.color());
    }
    if y_original_color == Color::Black {
      self.delete_fixup(x);
    }
  }

  fn delete_fixup(&mut self, mut x: BlockRef) {
    let nil = self.nil.block();
    while x != self.root && x.color() == Color::Black {
      let p = parent(x);
      if x == left(p) {
        let mut w = right(p);
        if w.color() == Color::Red {
          w.set_color(Color::Black);
          p.set_color(Color::Red);
          self.left_rotate(p);
          w = right(p);
        }
        if left(w).color() == Color::Black && right(w).color() == Color::Black {
          w.set_color(Color::Red);
          x = p;
        } else {
          if right(w).color() == Color::Black {
            left(w).set_color(Color::Black);
            w.set_color(Color::Red);
            self.right_rotate(w);
            w = right(p);
          }
          w.set_color(p.color());
          p.set_color(Color::Black);
          right(w).set_color(Color::Black);
          self.left_rotate(p);
          x = self.root;
        }
      } else {
        let mut w = left(p);
        if w.color() == Color::Red {
          w.set_color(Color::Black);
          p.set_color(Color::Red);
          self.right_rotate(p);
          w = left(p);
        }
        if right(w).color() == Color::Black && left(w).color() == Color::Black {
          w.set_color(Color::Red);
          x = p;
        } else {
          if left(w).color() == Color::Black {
            right(w).set_color(Color::Black);
            w.set_color(Color::Red);
            self.left_rotate(w);
            w = left(p);
          }
          w.set_color(p.color());
          p.set_color(Color::Black);
          left(w).set_color(Color::Black);
          self.right_rotate(p);
          x = self.root;
        }
      }
    }
    x.set_color(Color::Black);
    let _ = nil;
  }

  fn black_height(&self, x: BlockRef, nil: BlockRef) -> Option<usize> {
    if x == nil {
      return Some(0);
    }
    if x.color() == Color::Red && (left(x).color() == Color::Red || right(x).color() == Color::Red) {
      return None;
    }
    let lh = self.black_height(left(x), nil)?;
    let rh = self.black_height(right(x), nil)?;
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
    if let Some(lo) = lo {
      if s < lo {
        return false;
      }
    }
    if let Some(hi) = hi {
      if s > hi {
        return false;
      }
    }
    if x.is_alloc() {
      return false;
    }
    self.check_bst(left(x), nil, lo, Some(s)) && self.check_bst(right(x), nil, Some(s), hi)
  }
}

impl FreeIndex for Canonical {
  fn insert(&mut self, block: BlockRef) {
    let nil = self.nil.block();
    self.capacity += block.payload_size();
    set_left(block, nil);
    set_right(block, nil);
    let mut y = nil;
    let mut x = self.root;
    while x != nil {
      y = x;
      x = if block.payload_size() < x.payload_size() { left(x) } else { right(x) };
    }
    set_parent(block, y);
    if y == nil {
      self.root = block;
    } else if block.payload_size() < y.payload_size() {
      set_left(y, block);
    } else {
      set_right(y, block);
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
        x = left(x);
      } else {
        x = right(x);
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
    if self.root.color() != Color::Black {
      return false;
    }
    self.black_height(self.root, nil).is_some() && self.check_bst(self.root, nil, None, None)
  }
}
