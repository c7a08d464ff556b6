//! Skiff Runtime: a small lexically-scoped Lisp interpreter
//!
//! The runtime turns the tagged words of `skiff-core` into a working
//! language: value kinds with constructors and structural equivalence, a
//! property-list environment model, a character stream abstraction, the
//! reader and printer, and a recursive evaluator with special forms and a
//! native operator set.
//!
//! Key design principles:
//! - One [`machine::Machine`] per interpreter: every distinguished value
//!   and dispatch table is per-heap context, never a process global
//! - Environments are themselves values: property lists of per-symbol
//!   attribute plists, chained through a reserved parent entry
//! - Recoverable failures yield `NIL`; nonlocal control (`GO`,
//!   `RETURN-FROM`) rides the evaluator's error channel; the truly fatal
//!   (heap exhaustion, malformed `#` syntax) terminates the process
//!
//! # Modules
//!
//! - `machine`: per-heap context, well-known symbols, equivalence
//! - `cell`, `atom`, `text`, `vector`, `native`: the value kinds
//! - `plist`: ordered key/value pair lists
//! - `env`: environment frames and the root bootstrap
//! - `stream`, `io`: the character stream contract and its backends
//! - `reader`, `printer`: textual syntax in and out
//! - `eval`, `forms`, `builtins`: the evaluator, special forms, subrs
//!
//! # A complete session
//!
//! ```
//! use skiff_runtime::io::MemoryStreamBackend;
//! use skiff_runtime::machine::{Machine, MachineConfig};
//! use skiff_runtime::{env, eval, printer, reader, stream};
//!
//! let mut machine = Machine::new(MachineConfig::new());
//! let environment = env::create_root(&mut machine);
//!
//! let backend = MemoryStreamBackend::with_input("(+ 1 2)");
//! let output = backend.output_handle();
//! let channel = stream::create(&machine, Box::new(backend));
//! stream::open(&machine, channel, machine.t(), machine.t());
//!
//! let form = reader::read(&machine, environment, channel);
//! let value = eval::eval(&machine, environment, form).unwrap();
//! printer::print(&machine, environment, channel, value);
//!
//! assert_eq!(skiff_runtime::io::output_text(&output), "3");
//! ```

pub mod atom;
pub mod builtins;
pub mod cell;
pub mod env;
pub mod eval;
pub mod forms;
pub mod io;
pub mod machine;
pub mod native;
pub mod plist;
pub mod printer;
pub mod reader;
pub mod stream;
pub mod text;
pub mod vector;

pub use machine::{Machine, MachineConfig, WellKnown};
pub use skiff_core::{DEFAULT_HEAP_CAPACITY, Heap, Tag, Value};

pub use eval::{Flow, SpecialFormFn, SubrFn, Transfer, apply, eval};
pub use printer::{print, print_plain, print_structural};
pub use reader::read;
pub use stream::StreamBackend;
