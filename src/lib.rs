//! # allocore - single-threaded general-purpose heap allocators
//!
//! `allocore` manages a fixed contiguous memory segment handed to it once at
//! initialization and exposes the canonical allocate/reallocate/free triplet
//! plus an introspection and validation surface. It never asks the OS for
//! more memory once a `Heap` is initialized — growth, threading, and ABI
//! compatibility with any host allocator are explicitly out of scope.
//!
//! ## Crate structure
//!
//! ```text
//!   allocore
//!   ├── align      - platform alignment helpers
//!   ├── segment    - the owned backing byte range
//!   ├── block      - header/footer protocol, boundary-tag coalescing
//!   ├── index      - seven interchangeable free-index variants
//!   ├── allocator  - Heap<I>, the public malloc/free/realloc surface
//!   ├── diff       - heap-block descriptor used by tests
//!   └── script     - the replay-script grammar used by the correctness driver
//! ```
//!
//! ## Quick start
//!
//! ```
//! use allocore::allocator::Heap;
//! use allocore::index::list::SegregatedList;
//!
//! let mut heap = Heap::<SegregatedList>::init(4096).unwrap();
//! let p = heap.malloc(64).unwrap();
//! assert!(heap.validate());
//! heap.free(p);
//! assert_eq!(heap.capacity(), heap.align(4096 - allocore::block::OVERHEAD));
//! ```
//!
//! Every variant under [`index`] implements the same [`index::FreeIndex`]
//! trait, so `Heap<I>` is generic over which one backs a given session — the
//! block protocol and coalescing discipline are identical across all seven.

pub mod align;
pub mod allocator;
pub mod block;
pub mod diff;
pub mod error;
pub mod index;
pub mod script;
pub mod segment;

pub use allocator::Heap;
pub use error::HeapError;
