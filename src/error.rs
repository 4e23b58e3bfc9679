//! Ambient error type.
//!
//! `spec.md` §7 keeps the hot path (`malloc`/`free`/`realloc`/`validate`)
//! encoding failure purely in the return value — those signatures are kept
//! exactly as specified (`Option`/`bool`). `HeapError` exists for the layer
//! the spec is silent on: reporting *why* `init` or a script run failed to
//! a caller or log, following the `thiserror` convention the pack's CLI and
//! service crates use for exactly this purpose.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeapError {
  #[error("segment of {have} bytes is too small to hold a single block (need at least {need})")]
  SegmentTooSmall { have: usize, need: usize },

  #[error("line {line}: {text}")]
  ScriptParse { line: usize, text: String },

  #[error("script references id {0} before it was allocated")]
  UnknownId(u64),

  #[error("heap failed structural validation")]
  Corrupt,
}
