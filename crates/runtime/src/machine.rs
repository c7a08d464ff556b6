//! The Machine: per-heap interpreter context
//!
//! Everything the interpreter would otherwise keep in process globals
//! (the `T`/`NIL` pair, the keyword atoms used as property-list keys, the
//! stream designator symbols, the special-form dispatch table) is bundled
//! here and threaded explicitly through every operation. Two machines in
//! one process are fully independent.
//!
//! The well-known atoms are allocated straight off the heap during
//! bootstrap, before any environment exists; `crate::env::create_root`
//! then builds the root environment around them.

use skiff_core::{DEFAULT_HEAP_CAPACITY, Heap, Tag, Value};

use crate::eval::SpecialFormFn;
use crate::{atom, cell, native, text, vector};

/// Construction-time settings for a [`Machine`].
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Heap capacity in bytes.
    pub heap_capacity: usize,
}

impl MachineConfig {
    pub fn new() -> MachineConfig {
        MachineConfig {
            heap_capacity: DEFAULT_HEAP_CAPACITY,
        }
    }

    /// Set the heap capacity in bytes.
    pub fn with_heap_capacity(mut self, bytes: usize) -> MachineConfig {
        self.heap_capacity = bytes;
        self
    }
}

impl Default for MachineConfig {
    fn default() -> MachineConfig {
        MachineConfig::new()
    }
}

/// The atoms every machine carries from birth.
///
/// `T` and `NIL` are the Boolean truth pair. `PNAME`, `APVAL`, `EXPR`, and
/// `SUBR` are the attribute keys of symbol property lists; they are
/// self-describing in the root environment, which is why they must exist
/// before it does. The rest are the special-form names, the stream
/// designator symbols, and the reserved keys of the TAGBODY machinery.
pub struct WellKnown {
    pub nil: Value,
    pub t: Value,

    pub pname: Value,
    pub apval: Value,
    pub expr: Value,
    pub subr: Value,
    pub parent_environment: Value,

    pub terminal_io: Value,
    pub standard_input: Value,
    pub standard_output: Value,

    pub and: Value,
    pub cond: Value,
    pub define: Value,
    pub defun: Value,
    pub if_: Value,
    pub lambda: Value,
    pub or: Value,
    pub quote: Value,
    pub set: Value,
    pub setq: Value,
    pub block: Value,
    pub return_: Value,
    pub return_from: Value,
    pub tagbody: Value,
    pub go: Value,

    pub tagbody_stack: Value,
    pub tagbody_current: Value,
    pub tagbody_sequence: Value,
    pub tagbody_mapping: Value,
    pub tagbody_next: Value,
    pub tagbody_start: Value,
    pub tagbody_end: Value,
}

impl WellKnown {
    fn bootstrap(heap: &Heap) -> WellKnown {
        WellKnown {
            nil: atom::alloc(heap, "NIL"),
            t: atom::alloc(heap, "T"),

            pname: atom::alloc(heap, "PNAME"),
            apval: atom::alloc(heap, "APVAL"),
            expr: atom::alloc(heap, "EXPR"),
            subr: atom::alloc(heap, "SUBR"),
            parent_environment: atom::alloc(heap, "%SI:PARENT-ENVIRONMENT"),

            terminal_io: atom::alloc(heap, "*TERMINAL-IO*"),
            standard_input: atom::alloc(heap, "*STANDARD-INPUT*"),
            standard_output: atom::alloc(heap, "*STANDARD-OUTPUT*"),

            and: atom::alloc(heap, "AND"),
            cond: atom::alloc(heap, "COND"),
            define: atom::alloc(heap, "DEFINE"),
            defun: atom::alloc(heap, "DEFUN"),
            if_: atom::alloc(heap, "IF"),
            lambda: atom::alloc(heap, "LAMBDA"),
            or: atom::alloc(heap, "OR"),
            quote: atom::alloc(heap, "QUOTE"),
            set: atom::alloc(heap, "SET"),
            setq: atom::alloc(heap, "SETQ"),
            block: atom::alloc(heap, "BLOCK"),
            return_: atom::alloc(heap, "RETURN"),
            return_from: atom::alloc(heap, "RETURN-FROM"),
            tagbody: atom::alloc(heap, "TAGBODY"),
            go: atom::alloc(heap, "GO"),

            tagbody_stack: atom::alloc(heap, "%SI:*TAGBODY-STACK*"),
            tagbody_current: atom::alloc(heap, "%SI:*TAGBODY-CURRENT*"),
            tagbody_sequence: atom::alloc(heap, "%SI:TAGBODY-SEQUENCE"),
            tagbody_mapping: atom::alloc(heap, "%SI:TAGBODY-MAPPING"),
            tagbody_next: atom::alloc(heap, "%SI:TAGBODY-NEXT"),
            tagbody_start: atom::alloc(heap, "%SI:TAGBODY-START"),
            tagbody_end: atom::alloc(heap, "%SI:TAGBODY-END"),
        }
    }
}

/// A complete interpreter instance: one heap plus the context that names
/// its distinguished values.
pub struct Machine {
    heap: Heap,
    symbols: WellKnown,
    special_forms: Vec<(Value, SpecialFormFn)>,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Machine {
        let heap = Heap::new(config.heap_capacity);
        let symbols = WellKnown::bootstrap(&heap);
        Machine {
            heap,
            symbols,
            special_forms: Vec::new(),
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn symbols(&self) -> &WellKnown {
        &self.symbols
    }

    /// The distinguished falsehood.
    #[inline]
    pub fn nil(&self) -> Value {
        self.symbols.nil
    }

    /// The distinguished truth.
    #[inline]
    pub fn t(&self) -> Value {
        self.symbols.t
    }

    /// Map a Rust boolean onto the `T`/`NIL` pair.
    #[inline]
    pub fn truth(&self, condition: bool) -> Value {
        if condition { self.symbols.t } else { self.symbols.nil }
    }

    /// `NIL` is the sole falsehood; everything else is truth.
    #[inline]
    pub fn is_truthy(&self, value: Value) -> bool {
        value != self.symbols.nil
    }

    /// Register a special form under its symbol. Dispatch is by symbol
    /// identity, so the same symbol must be the one the reader interns.
    pub fn register_special_form(&mut self, symbol: Value, form: SpecialFormFn) {
        self.special_forms.push((symbol, form));
    }

    /// Look up a special form by symbol identity.
    pub fn special_form_for(&self, symbol: Value) -> Option<SpecialFormFn> {
        self.special_forms
            .iter()
            .find(|(registered, _)| *registered == symbol)
            .map(|(_, form)| *form)
    }

    /// Structural equivalence.
    ///
    /// Identity implies equivalence; otherwise values of different kinds
    /// are never equivalent, and same-kind values compare structurally
    /// per kind. Fixnums and chars have canonical representations, so
    /// reaching their arm means the words differ. Streams and interiors
    /// are opaque and compare by identity only, and a struct is defined
    /// equal only to itself.
    pub fn equal(&self, a: Value, b: Value) -> bool {
        if a == b {
            return true;
        }
        if a.tag() != b.tag() {
            return false;
        }
        match a.tag() {
            Tag::Cell => cell::equal(self, a, b),
            Tag::Atom => atom::equal(self, a, b),
            Tag::Fixnum | Tag::Char => false,
            Tag::String => text::string_equal(self, a, b),
            Tag::Vector => vector::equal(self, a, b),
            Tag::Subr => native::subr_equal(self, a, b),
            Tag::Stream | Tag::Interior | Tag::Struct => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truth_pair() {
        let machine = Machine::new(MachineConfig::new());
        assert_ne!(machine.nil(), machine.t());
        assert_eq!(machine.truth(true), machine.t());
        assert_eq!(machine.truth(false), machine.nil());
        assert!(machine.is_truthy(machine.t()));
        assert!(!machine.is_truthy(machine.nil()));
        assert!(machine.is_truthy(Value::fixnum(0)));
    }

    #[test]
    fn test_well_known_atoms_are_distinct() {
        let machine = Machine::new(MachineConfig::new());
        let symbols = machine.symbols();
        let all = [
            symbols.nil,
            symbols.t,
            symbols.pname,
            symbols.apval,
            symbols.expr,
            symbols.subr,
            symbols.parent_environment,
        ];
        for (i, a) in all.iter().enumerate() {
            for (j, b) in all.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b);
                }
            }
        }
    }

    #[test]
    fn test_equal_falls_back_to_identity() {
        let machine = Machine::new(MachineConfig::new());
        assert!(machine.equal(machine.t(), machine.t()));
        assert!(!machine.equal(machine.t(), machine.nil()));
        assert!(machine.equal(Value::fixnum(3), Value::fixnum(3)));
        assert!(!machine.equal(Value::fixnum(3), Value::char(3)));
    }
}
