//! Script grammar (spec §6): the test harness's replay format.
//!
//! ```text
//! # comment lines begin with '#'
//! a <id> <size>      # allocate, remember pointer under <id>
//! r <id> <size>      # reallocate the block previously stored under <id>
//! f <id>             # free the block stored under <id>
//! ```
//!
//! Parsing only — running a parsed script against a `Heap` is the
//! correctness driver's job (`src/bin/heapcheck.rs`), since that's where
//! the id-to-pointer table and content stamping live.

use crate::error::HeapError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
  Alloc { id: u64, size: usize },
  Realloc { id: u64, size: usize },
  Free { id: u64 },
}

/// Parses a complete script. Blank lines and `#`-prefixed comments are
/// ignored; any other malformed line is a `HeapError::ScriptParse` naming
/// the 1-indexed source line.
pub fn parse(source: &str) -> Result<Vec<Op>, HeapError> {
  let mut ops = Vec::new();
  for (idx, raw_line) in source.lines().enumerate() {
    let line = idx + 1;
    let trimmed = raw_line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
      continue;
    }
    ops.push(parse_line(line, trimmed)?);
  }
  Ok(ops)
}

fn parse_line(line: usize, text: &str) -> Result<Op, HeapError> {
  let mut fields = text.split_whitespace();
  let err = |text: &str| HeapError::ScriptParse { line, text: text.to_string() };

  let op = fields.next().ok_or_else(|| err("empty op"))?;
  match op {
    "a" | "r" => {
      let id: u64 = fields.next().ok_or_else(|| err("missing id"))?.parse().map_err(|_| err("bad id"))?;
      let size: usize =
        fields.next().ok_or_else(|| err("missing size"))?.parse().map_err(|_| err("bad size"))?;
      if fields.next().is_some() {
        return Err(err("trailing tokens"));
      }
      Ok(if op == "a" { Op::Alloc { id, size } } else { Op::Realloc { id, size } })
    }
    "f" => {
      let id: u64 = fields.next().ok_or_else(|| err("missing id"))?.parse().map_err(|_| err("bad id"))?;
      if fields.next().is_some() {
        return Err(err("trailing tokens"));
      }
      Ok(Op::Free { id })
    }
    other => Err(err(&format!("unknown op '{other}'"))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_all_three_ops_and_skips_comments() {
    let src = "# header\na 0 64\n\nr 0 128\nf 0\n";
    let ops = parse(src).unwrap();
    assert_eq!(ops, vec![Op::Alloc { id: 0, size: 64 }, Op::Realloc { id: 0, size: 128 }, Op::Free { id: 0 }]);
  }

  #[test]
  fn rejects_unknown_op() {
    let err = parse("x 0 0\n").unwrap_err();
    assert!(matches!(err, HeapError::ScriptParse { line: 1, .. }));
  }

  #[test]
  fn rejects_missing_fields() {
    let err = parse("a 0\n").unwrap_err();
    assert!(matches!(err, HeapError::ScriptParse { line: 1, .. }));
  }
}
