//! Block protocol (spec §3, §4.1).
//!
//! Every byte of the segment belongs to exactly one block: a header word,
//! a payload, and — for free blocks — a footer word mirroring the header.
//! `BlockRef` is the single narrow `unsafe` boundary the rest of the crate
//! is built on (see DESIGN.md, "pointer-into-payload overlays"): everything
//! above this module reads and writes typed values, never raw bytes.
//!
//! ## Layout decision
//!
//! `spec.md` §3 places the footer "when the block is free" at
//! `payload_end - sizeof(word)`, which — taken together with the split
//! formula in §4.1 (`payload(F) - sizeof(word) - want - sizeof(word)`) —
//! only balances byte-for-byte if every block, allocated or not, reserves a
//! fixed `A = 2 * WORD` bytes of header+footer overhead (the footer slot
//! simply isn't *written* for allocated blocks). This crate adopts that
//! reading: a block's on-segment footprint is always `payload + A` bytes,
//! which keeps §4.1's split arithmetic exact and every payload size a clean
//! multiple of `A`. See DESIGN.md for the full derivation.

use std::mem;
use std::ptr::NonNull;

use crate::align::{self, A};

/// Machine word size.
pub const WORD: usize = mem::size_of::<usize>();

/// Fixed per-block overhead: one header word + one (possibly unwritten)
/// footer word. Always equal to [`A`].
pub const OVERHEAD: usize = A;

const ALLOC_BIT: usize = 1;
const LEFT_ALLOC_BIT: usize = 2;
const COLOR_BIT: usize = 4;
const FLAG_MASK: usize = ALLOC_BIT | LEFT_ALLOC_BIT | COLOR_BIT;

/// Red-black color, also reused by the splay variants as "don't care"
/// storage (splay trees have no color invariant, but sharing the header
/// layout means every variant can share `BlockRef`).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Color {
  Red,
  Black,
}

/// Largest free-index overlay any variant needs to store in a free block's
/// payload: two children + a parent slot + a duplicate-ring head slot, each
/// one word. Shared across variants so blocks are interchangeable in tests.
pub const MIN_PAYLOAD: usize = 4 * WORD;

/// Minimum total on-segment footprint of any block.
pub const MIN_BLOCK: usize = MIN_PAYLOAD + OVERHEAD;

/// A typed handle to a block's header, the sole `unsafe`-constructing type
/// in the crate. Two `BlockRef`s are equal iff they name the same header.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct BlockRef(NonNull<u8>);

impl BlockRef {
  /// # Safety
  /// `header_ptr` must point at a valid, currently-live block header inside
  /// some segment.
  #[inline]
  pub unsafe fn new(header_ptr: *mut u8) -> Self {
    Self(NonNull::new(header_ptr).expect("null block pointer"))
  }

  /// Constructs a `BlockRef` from a user-facing payload pointer (as handed
  /// back by `malloc`/`realloc`).
  ///
  /// # Safety
  /// `payload_ptr` must have been returned by this allocator's `malloc` or
  /// `realloc` and not yet freed.
  #[inline]
  pub unsafe fn from_payload(payload_ptr: *mut u8) -> Self {
    unsafe { Self::new(payload_ptr.sub(WORD)) }
  }

  #[inline]
  pub fn as_ptr(self) -> *mut u8 {
    self.0.as_ptr()
  }

  #[inline]
  fn header(self) -> *mut usize {
    self.0.as_ptr().cast()
  }

  #[inline]
  fn raw(self) -> usize {
    unsafe { *self.header() }
  }

  #[inline]
  fn set_raw(self, raw: usize) {
    unsafe { *self.header() = raw };
  }

  /// Payload size in bytes (always a multiple of [`A`]).
  #[inline]
  pub fn payload_size(self) -> usize {
    self.raw() & !FLAG_MASK
  }

  #[inline]
  pub fn set_payload_size(self, size: usize) {
    debug_assert_eq!(size % A, 0, "payload size must be a multiple of A");
    let flags = self.raw() & FLAG_MASK;
    self.set_raw(size | flags);
  }

  /// Total on-segment footprint of this block, header through footer slot.
  #[inline]
  pub fn footprint(self) -> usize {
    self.payload_size() + OVERHEAD
  }

  #[inline]
  pub fn is_alloc(self) -> bool {
    self.raw() & ALLOC_BIT != 0
  }

  #[inline]
  pub fn set_alloc(self, alloc: bool) {
    let raw = self.raw();
    self.set_raw(if alloc { raw | ALLOC_BIT } else { raw & !ALLOC_BIT });
  }

  #[inline]
  pub fn left_alloc(self) -> bool {
    self.raw() & LEFT_ALLOC_BIT != 0
  }

  #[inline]
  pub fn set_left_alloc(self, alloc: bool) {
    let raw = self.raw();
    self.set_raw(if alloc { raw | LEFT_ALLOC_BIT } else { raw & !LEFT_ALLOC_BIT });
  }

  #[inline]
  pub fn color(self) -> Color {
    if self.raw() & COLOR_BIT != 0 { Color::Red } else { Color::Black }
  }

  #[inline]
  pub fn set_color(self, color: Color) {
    let raw = self.raw();
    self.set_raw(match color {
      Color::Red => raw | COLOR_BIT,
      Color::Black => raw & !COLOR_BIT,
    });
  }

  /// Pointer to the first payload byte, also the pointer handed to users.
  #[inline]
  pub fn payload_ptr(self) -> *mut u8 {
    unsafe { self.0.as_ptr().add(WORD) }
  }

  #[inline]
  fn footer(self) -> *mut usize {
    unsafe { self.payload_ptr().add(self.payload_size()).cast() }
  }

  /// Writes the footer word, mirroring the header. Only meaningful (and
  /// only ever read back) while the block is free.
  #[inline]
  pub fn write_footer(self) {
    unsafe { *self.footer() = self.raw() };
  }

  /// One-past-the-end address of this block's footprint.
  #[inline]
  pub fn end_ptr(self) -> *mut u8 {
    unsafe { self.0.as_ptr().add(self.footprint()) }
  }

  /// The block's right neighbor, or `None` if this is the last block in
  /// the segment (arithmetic only, per spec §4.1).
  #[inline]
  pub fn right_neighbor(self, segment_end: *mut u8) -> Option<BlockRef> {
    let next = self.end_ptr();
    if next == segment_end { None } else { Some(unsafe { BlockRef::new(next) }) }
  }

  /// The block's left neighbor, or `None` if this is the first block in
  /// the segment *or* the left neighbor is allocated (in which case the
  /// caller must not dereference backwards — there is no footer to read).
  #[inline]
  pub fn left_neighbor(self, segment_start: *mut u8) -> Option<BlockRef> {
    if self.left_alloc() || self.as_ptr() == segment_start {
      return None;
    }
    let left_footer = unsafe { (self.header() as *mut usize).sub(1) };
    let left_raw = unsafe { *left_footer };
    let left_payload = left_raw & !FLAG_MASK;
    let left_header = unsafe { self.as_ptr().sub(left_payload + OVERHEAD) };
    Some(unsafe { BlockRef::new(left_header) })
  }

  /// Reinterprets this block's payload as the typed free-index overlay
  /// `T`. The overlay is only ever valid while the block is free; callers
  /// must not read it through a `BlockRef` that may have been allocated.
  ///
  /// # Safety
  /// The block must currently be free and its payload must be at least
  /// `size_of::<T>()` bytes.
  #[inline]
  pub unsafe fn overlay<T>(self) -> *mut T {
    debug_assert!(self.payload_size() >= mem::size_of::<T>());
    self.payload_ptr().cast()
  }
}

/// Smallest payload that satisfies `n` bytes of user request and the
/// free-index overlay requirement, rounded up to `A`.
#[inline]
pub fn round_up(n: usize) -> usize {
  align::round_up_to_a(n.max(MIN_PAYLOAD))
}

/// Formats a free block spanning `[header_ptr, header_ptr + footprint)` in
/// place and returns a `BlockRef` to it. Does not touch neighbor flags —
/// callers are responsible for the left-neighbor's `left_alloc` bit and any
/// reinsertion into a free index.
///
/// # Safety
/// `header_ptr .. header_ptr + payload + OVERHEAD` must be valid, unaliased
/// segment memory.
pub unsafe fn format_free(header_ptr: *mut u8, payload: usize) -> BlockRef {
  let block = unsafe { BlockRef::new(header_ptr) };
  block.set_payload_size(payload);
  block.set_alloc(false);
  block.write_footer();
  block
}

/// Splits a free block `free` (whose payload is at least `want + MIN_BLOCK`)
/// into an allocated head of `want` payload bytes and a free tail block,
/// per spec §4.1. Returns the tail block to be reinserted into the index.
///
/// # Safety
/// `free` must currently be a free, unindexed block with
/// `free.payload_size() >= want + MIN_BLOCK`.
pub unsafe fn split(free: BlockRef, want: usize) -> BlockRef {
  debug_assert!(free.payload_size() >= want + MIN_BLOCK);
  let tail_payload = free.payload_size() - want - OVERHEAD;
  free.set_payload_size(want);
  free.set_alloc(true);
  let tail_header = unsafe { free.payload_ptr().add(want) };
  let tail = unsafe { format_free(tail_header, tail_payload) };
  tail.set_left_alloc(true);
  tail
}

#[cfg(test)]
mod tests {
  use super::*;

  fn alloc_region(bytes: usize) -> *mut u8 {
    let layout = std::alloc::Layout::from_size_align(bytes, A).unwrap();
    unsafe { std::alloc::alloc_zeroed(layout) }
  }

  #[test]
  fn header_round_trip_preserves_flags() {
    let region = alloc_region(256);
    let block = unsafe { format_free(region, 64) };
    block.set_left_alloc(true);
    block.set_color(Color::Red);
    assert_eq!(block.payload_size(), 64);
    assert!(!block.is_alloc());
    assert!(block.left_alloc());
    assert_eq!(block.color(), Color::Red);

    block.set_payload_size(128);
    assert_eq!(block.payload_size(), 128);
    assert!(block.left_alloc());
    assert_eq!(block.color(), Color::Red);
    unsafe { std::alloc::dealloc(region, std::alloc::Layout::from_size_align(256, A).unwrap()) };
  }

  #[test]
  fn split_produces_byte_exact_tail() {
    let region = alloc_region(512);
    let block = unsafe { format_free(region, 400) };
    let want = round_up(32);
    let tail = unsafe { split(block, want) };
    assert_eq!(block.payload_size(), want);
    assert!(block.is_alloc());
    assert_eq!(tail.payload_size(), 400 - want - OVERHEAD);
    assert!(!tail.is_alloc());
    assert!(tail.left_alloc());
    assert_eq!(block.end_ptr(), tail.as_ptr());
    assert_eq!(tail.end_ptr(), unsafe { region.add(block.footprint() + tail.footprint()) });
    unsafe { std::alloc::dealloc(region, std::alloc::Layout::from_size_align(512, A).unwrap()) };
  }

  #[test]
  fn neighbor_arithmetic_round_trips() {
    let region = alloc_region(512);
    let a = unsafe { format_free(region, 96) };
    a.set_left_alloc(true);
    let b_header = unsafe { region.add(a.footprint()) };
    let b = unsafe { format_free(b_header, 128) };
    b.set_left_alloc(false);

    assert_eq!(a.right_neighbor(unsafe { region.add(1024) }), Some(b));
    assert_eq!(b.left_neighbor(region), Some(a));
    assert_eq!(a.left_neighbor(region), None);
    unsafe { std::alloc::dealloc(region, std::alloc::Layout::from_size_align(512, A).unwrap()) };
  }
}
