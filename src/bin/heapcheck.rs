//! Correctness driver (spec §6): `heapcheck --variant <v> [script…]`.
//!
//! For each script: runs every op through a freshly `init`'d `Heap`,
//! stamping each live block's first payload byte with `id & 0xFF` on
//! allocate and re-checking it before every read (realloc's copy, free),
//! calls `validate()` after every op, prints one status character per
//! script (`.` on success, `X` on first failure), and exits non-zero if any
//! script failed. The stats driver and ltrace-to-script parser are
//! collaborators outside the core's scope (spec §1) and aren't built here.

use std::collections::HashMap;
use std::fs;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use allocore::allocator::Heap;
use allocore::index::rbtree::{Canonical, Linked, Stack as RbStack, Topdown as RbTopdown, Unified};
use allocore::index::splay::{SplayStack, SplayTopdown};
use allocore::index::{list::SegregatedList, FreeIndex};
use allocore::script::{self, Op};

const SEGMENT_SIZE: usize = 1 << 20;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Variant {
  List,
  RbCanonical,
  RbUnified,
  RbLinked,
  RbStack,
  RbTopdown,
  SplayStack,
  SplayTopdown,
}

#[derive(Parser, Debug)]
#[command(about = "Replay allocator scripts and check heap correctness after every op")]
struct Args {
  #[arg(long, value_enum, default_value_t = Variant::RbLinked)]
  variant: Variant,

  scripts: Vec<String>,
}

fn main() -> ExitCode {
  env_logger::init();
  let args = Args::parse();

  let mut any_failed = false;
  for path in &args.scripts {
    let source = match fs::read_to_string(path) {
      Ok(s) => s,
      Err(e) => {
        log::error!("{path}: {e}");
        print!("X");
        any_failed = true;
        continue;
      }
    };
    let ok = run_script(args.variant, &source, path);
    print!("{}", if ok { "." } else { "X" });
    any_failed |= !ok;
  }
  println!();
  if any_failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn run_script(variant: Variant, source: &str, path: &str) -> bool {
  let ops = match script::parse(source) {
    Ok(ops) => ops,
    Err(e) => {
      log::error!("{path}: {e}");
      return false;
    }
  };
  match variant {
    Variant::List => replay::<SegregatedList>(&ops, path),
    Variant::RbCanonical => replay::<Canonical>(&ops, path),
    Variant::RbUnified => replay::<Unified>(&ops, path),
    Variant::RbLinked => replay::<Linked>(&ops, path),
    Variant::RbStack => replay::<RbStack>(&ops, path),
    Variant::RbTopdown => replay::<RbTopdown>(&ops, path),
    Variant::SplayStack => replay::<SplayStack>(&ops, path),
    Variant::SplayTopdown => replay::<SplayTopdown>(&ops, path),
  }
}

fn replay<I: FreeIndex>(ops: &[Op], path: &str) -> bool {
  let Ok(mut heap) = Heap::<I>::init(SEGMENT_SIZE) else {
    log::error!("{path}: segment too small");
    return false;
  };
  let mut ids: HashMap<u64, (*mut u8, usize)> = HashMap::new();

  for (i, op) in ops.iter().enumerate() {
    let stamp = |ptr: *mut u8, id: u64| unsafe { *ptr = (id & 0xFF) as u8 };
    let check = |ptr: *mut u8, id: u64| unsafe { *ptr == (id & 0xFF) as u8 };

    let step_ok = match *op {
      Op::Alloc { id, size } => match heap.malloc(size) {
        Some(ptr) => {
          stamp(ptr, id);
          ids.insert(id, (ptr, size));
          true
        }
        None => false,
      },
      Op::Realloc { id, size } => match ids.get(&id).copied() {
        Some((old_ptr, _)) if check(old_ptr, id) => match heap.realloc(old_ptr, size) {
          Some(new_ptr) => {
            stamp(new_ptr, id);
            ids.insert(id, (new_ptr, size));
            true
          }
          None => {
            ids.remove(&id);
            true
          }
        },
        Some(_) => false,
        None => {
          log::error!("{path}: op {i}: realloc of unknown id {id}");
          false
        }
      },
      Op::Free { id } => match ids.remove(&id) {
        Some((ptr, _)) if check(ptr, id) => {
          heap.free(ptr);
          true
        }
        Some(_) => false,
        None => {
          log::error!("{path}: op {i}: free of unknown id {id}");
          false
        }
      },
    };

    if !step_ok || !heap.validate() {
      log::error!("{path}: op {i} ({op:?}) failed");
      return false;
    }
  }
  true
}
