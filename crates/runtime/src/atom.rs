//! Atoms
//!
//! An atom is a named token. Names are upper-cased at creation and stored
//! as a length-prefixed byte buffer directly in the heap record. Two atoms
//! with the same name are equivalent but not necessarily identical;
//! identity is only guaranteed for atoms that went through the reader's
//! find-or-intern step (see `crate::reader`), which is what makes `eq` a
//! usable symbol test for read programs.

use skiff_core::{Heap, Tag, Value};

use crate::machine::Machine;
use crate::text;

/// Allocate an atom record directly off a heap.
///
/// This is the bootstrap path: the machine's well-known atoms are created
/// before the machine itself exists. ASCII letters in the name are
/// upper-cased.
pub(crate) fn alloc(heap: &Heap, name: &str) -> Value {
    let upper = name.to_ascii_uppercase();
    let bytes = upper.as_bytes();

    let (value, raw) = heap.allocate(Tag::Atom, size_of::<usize>() + bytes.len());
    unsafe {
        raw.cast::<usize>().write(bytes.len());
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), raw.add(size_of::<usize>()), bytes.len());
    }
    value
}

/// Create an atom from a Rust string.
pub fn create(machine: &Machine, name: &str) -> Value {
    alloc(machine.heap(), name)
}

/// Create an atom from a Lisp string value.
pub fn create_from_string(machine: &Machine, string: Value) -> Value {
    alloc(machine.heap(), &text::to_rust_string(machine, string))
}

/// The atom's name. The returned slice borrows the machine's heap.
pub fn name(machine: &Machine, atom: Value) -> &str {
    debug_assert!(atom.is_atom(), "name of a non-atom");
    let _ = machine;
    let raw = atom.record_ptr();
    unsafe {
        let length = raw.cast::<usize>().read();
        let bytes = std::slice::from_raw_parts(raw.add(size_of::<usize>()), length);
        // The buffer was copied from a &str at creation.
        std::str::from_utf8_unchecked(bytes)
    }
}

/// Two atoms are equivalent when their names match.
pub fn equal(machine: &Machine, a: Value, b: Value) -> bool {
    name(machine, a) == name(machine, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MachineConfig;

    #[test]
    fn test_names_are_upper_cased() {
        let machine = Machine::new(MachineConfig::new());
        let atom = create(&machine, "square");
        assert_eq!(name(&machine, atom), "SQUARE");
    }

    #[test]
    fn test_mixed_names_keep_non_letters() {
        let machine = Machine::new(MachineConfig::new());
        let atom = create(&machine, "*list-2*");
        assert_eq!(name(&machine, atom), "*LIST-2*");
    }

    #[test]
    fn test_same_name_is_equal_but_not_identical() {
        let machine = Machine::new(MachineConfig::new());
        let a = create(&machine, "FOO");
        let b = create(&machine, "foo");

        assert_ne!(a, b);
        assert!(equal(&machine, a, b));
        assert!(machine.equal(a, b));
    }

    #[test]
    fn test_different_names_differ() {
        let machine = Machine::new(MachineConfig::new());
        let a = create(&machine, "FOO");
        let b = create(&machine, "BAR");
        assert!(!machine.equal(a, b));
    }

    #[test]
    fn test_create_from_lisp_string() {
        let machine = Machine::new(MachineConfig::new());
        let string = text::string_from_str(&machine, "lambda");
        let atom = create_from_string(&machine, string);
        assert_eq!(name(&machine, atom), "LAMBDA");
    }
}
