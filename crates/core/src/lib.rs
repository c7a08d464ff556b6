//! Skiff Core: tagged value words and the heap they point into
//!
//! Every Lisp value in Skiff is a single pointer-sized word. The low four
//! bits carry a type tag; the bits above are either an inline payload
//! (fixnums, characters) or a sixteen-byte-aligned pointer into the heap
//! (everything else).
//!
//! Key design principles:
//! - `Value`: one machine word, `Copy`, compared bitwise for identity
//! - `Tag`: a closed sum over the ten value kinds; every dispatch matches
//!   on it exhaustively
//! - `Heap`: a bump arena that hands out aligned records together with the
//!   tagged word that names them
//!
//! # Modules
//!
//! - `value`: word layout, tag extraction, inline fixnum/char payloads
//! - `heap`: record allocation and usage accounting

pub mod heap;
pub mod value;

pub use heap::{DEFAULT_HEAP_CAPACITY, HEAP_ALIGN, Heap};
pub use value::{CHAR_CODEPOINT_MAX, FIXNUM_MAX, FIXNUM_MIN, TAG_MASK, Tag, Value};
