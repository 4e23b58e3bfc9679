//! RB-tree, stack variant (spec §4.4): [`super::linked`]'s duplicate ring,
//! but the tree itself carries **no parent pointer**. Every operation
//! instead descends from the root once, building an explicit `Vec` of
//! ancestors as it goes, and fixups walk that stack bottom-up. A block
//! entering `remove_known` without a known path (the coalescing case)
//! gets one rebuilt by descending on its payload size — valid because a
//! free block's size always identifies its tree position exactly, ring
//! members aside.

use crate::block::{BlockRef, Color};
use crate::index::rbtree::common::other;
use crate::index::ring;
use crate::index::sentinel::Sentinel;
use crate::index::slot::tree;
use crate::index::FreeIndex;

pub struct Stack {
  nil: Sentinel,
  root: BlockRef,
  capacity: usize,
}

impl Default for Stack {
  fn default() -> Self {
    let nil = Sentinel::new();
    let root = nil.block();
    Self { nil, root, capacity: 0 }
  }
}

impl Stack {
  /// Rotates `x` (whose parent is `parent`, or `nil` if `x` is currently
  /// the root) so that `x`'s `other(dir)` child takes its place. Returns
  /// the new subtree top. Never reads or writes a parent field.
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

  fn insert_fixup(&mut self, path: &mut Vec<BlockRef>) {
    loop {
      let n = path.len();
      if n < 2 {
        break;
      }
      let p = path[n - 2];
      if p.color() == Color::Black {
        break;
      }
      let g = path[n - 3];
      let dir = if tree::child(g, 0) == p { 0 } else { 1 };
      let od = other(dir);
      let uncle = tree::child(g, od);
      if uncle.color() == Color::Red {
        p.set_color(Color::Black);
        uncle.set_color(Color::Black);
        g.set_color(Color::Red);
        path.truncate(n - 2);
        continue;
      }
      let z = path[n - 1];
      let mut p2 = p;
      if z == tree::child(p2, od) {
        let newtop = self.rotate(g, p2, dir);
        p2 = newtop;
      }
      p2.set_color(Color::Black);
      g.set_color(Color::Red);
      let ggp = if n >= 4 { path[n - 4] } else { self.nil.block() };
      self.rotate(ggp, g, od);
      break;
    }
    self.root.set_color(Color::Black);
  }

  /// Standard two-pointer-free structural delete, given the full ancestor
  /// path from root to the node being removed.
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

impl FreeIndex for Stack {
  fn insert(&mut self, block: BlockRef) {
    let nil = self.nil.block();
    self.capacity += block.payload_size();
    let mut path = Vec::new();
    let mut x = self.root;
    while x != nil {
      if block.payload_size() == x.payload_size() {
        ring::insert(x, block, nil);
        return;
      }
      path.push(x);
      x = if block.payload_size() < x.payload_size() { tree::child(x, 0) } else { tree::child(x, 1) };
    }
    tree::set_child(block, 0, nil);
    tree::set_child(block, 1, nil);
    tree::set_list_start(block, nil);
    if let Some(&p) = path.last() {
      if block.payload_size() < p.payload_size() {
        tree::set_child(p, 0, block);
      } else {
        tree::set_child(p, 1, block);
      }
    } else {
      self.root = block;
    }
    block.set_color(Color::Red);
    path.push(block);
    self.insert_fixup(&mut path);
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
    self.capacity -= best.payload_size();
    if tree::list_start(best) != nil {
      return Some(ring::remove_head(best, nil));
    }
    self.delete(best_path);
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
