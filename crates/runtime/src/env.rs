//! Environments
//!
//! An environment is a property list whose keys are atoms and whose values
//! are per-symbol attribute plists. The recognized attribute keys are
//! `PNAME` (print name), `APVAL` (variable binding), `EXPR` (interpreted
//! function), and `SUBR` (primitive function). Every non-root environment
//! carries a `%SI:PARENT-ENVIRONMENT` entry whose `APVAL` is the parent
//! frame; the root's parent entry has an `APVAL` of `NIL`.
//!
//! Lookup is linear within a frame and linear up the parent chain.
//! Shadowing falls out of non-recursive sets always touching the given
//! frame.
//!
//! The root bootstrap is circular by nature: `T`, `NIL`, `PNAME`, `APVAL`,
//! `EXPR`, and `SUBR` appear both as environment keys and inside the
//! attribute plists that describe them, so the root plist is assembled by
//! hand before any of the ordinary operations can run.

use skiff_core::Value;
use tracing::debug;

use crate::machine::Machine;
use crate::{builtins, cell, forms, io, plist, text};

/// Create an environment descending from `parent`.
///
/// The frame starts with only the parent entry:
/// `((%SI:PARENT-ENVIRONMENT . ((APVAL . parent))))`. The parent entry
/// needs no `PNAME`; the symbol is already described in the root.
pub fn create(machine: &Machine, parent: Value) -> Value {
    let symbols = machine.symbols();
    let parent_apval = cell::cons(machine, symbols.apval, parent);
    let parent_plist = plist::create(machine, &[parent_apval]);
    let parent_entry = cell::cons(machine, symbols.parent_environment, parent_plist);
    plist::create(machine, &[parent_entry])
}

/// The parent frame, or `NIL` for a root.
///
/// Goes to the frame plist directly rather than through symbol lookup,
/// because symbol lookup uses it to ascend.
pub fn parent(machine: &Machine, environment: Value) -> Value {
    let parent_plist = plist::get(machine, environment, machine.symbols().parent_environment);
    if parent_plist == machine.nil() {
        machine.nil()
    } else {
        plist::get(machine, parent_plist, machine.symbols().apval)
    }
}

/// Find a symbol's whole `(atom . attribute-plist)` entry.
///
/// Returns `NIL` when the symbol has no entry, which is also what an
/// entry bound to nothing looks like; the two cases cannot be told apart
/// from the return value alone.
pub fn find_symbol(machine: &Machine, environment: Value, symbol: Value, recursive: bool) -> Value {
    match plist::find_entry(machine, environment, symbol) {
        plist::EntrySearch::Found(entry) => entry,
        plist::EntrySearch::Missing(_) => {
            if !recursive {
                return machine.nil();
            }
            let parent_environment = parent(machine, environment);
            if parent_environment == machine.nil() {
                machine.nil()
            } else {
                find_symbol(machine, parent_environment, symbol, recursive)
            }
        }
    }
}

/// The requested attribute of a symbol, or `NIL`.
pub fn get(
    machine: &Machine,
    environment: Value,
    symbol: Value,
    attribute: Value,
    recursive: bool,
) -> Value {
    let entry = find_symbol(machine, environment, symbol, recursive);
    if entry == machine.nil() {
        machine.nil()
    } else {
        plist::get(machine, cell::cdr(machine, entry), attribute)
    }
}

/// Set an attribute of a symbol, returning the value.
///
/// With `recursive` the defining frame is located first and updated in
/// place; without it (or when no frame defines the symbol) the attribute
/// plist is created or updated in the given frame, which is what makes
/// shadowing work.
pub fn set(
    machine: &Machine,
    environment: Value,
    symbol: Value,
    attribute: Value,
    value: Value,
    recursive: bool,
) -> Value {
    let entry = find_symbol(machine, environment, symbol, recursive);
    let attributes = cell::cdr(machine, entry);
    if attributes == machine.nil() {
        let attribute_pair = cell::cons(machine, attribute, value);
        let attributes = plist::create(machine, &[attribute_pair]);
        plist::set(machine, environment, symbol, attributes);
    } else {
        plist::set(machine, attributes, attribute, value);
    }
    value
}

/// Ensure the atom has an entry in this frame, with `APVAL` of `NIL`.
/// Interned does not mean bound. Returns the atom.
pub fn intern(machine: &Machine, environment: Value, atom: Value) -> Value {
    set(
        machine,
        environment,
        atom,
        machine.symbols().apval,
        machine.nil(),
        false,
    );
    atom
}

/// Build the root environment and return a fresh mutable child of it.
///
/// The root plist is assembled by hand so the self-describing symbols can
/// appear as their own keys:
///
/// ```text
/// ((T     . ((PNAME . "T")     (APVAL . T)))
///  (NIL   . ((PNAME . "NIL")   (APVAL . NIL)))
///  (PNAME . ((PNAME . "PNAME") (APVAL . PNAME)))
///  ...
///  (%SI:PARENT-ENVIRONMENT . ((PNAME . "...") (APVAL . NIL))))
/// ```
///
/// Special forms and built-in subrs are then registered into the root, and
/// the standard streams are bound in the returned child so the root stays
/// unmodified from the caller's point of view.
pub fn create_root(machine: &mut Machine) -> Value {
    let symbols = machine.symbols();
    let nil = symbols.nil;

    let self_valued = [
        symbols.t,
        symbols.nil,
        symbols.pname,
        symbols.apval,
        symbols.expr,
        symbols.subr,
    ];

    let mut entries = Vec::with_capacity(self_valued.len() + 1);
    for symbol in self_valued {
        let name = text::string_from_str(machine, crate::atom::name(machine, symbol));
        let attributes = plist::create(
            machine,
            &[
                cell::cons(machine, symbols.pname, name),
                cell::cons(machine, symbols.apval, symbol),
            ],
        );
        entries.push(cell::cons(machine, symbol, attributes));
    }

    let parent_name = text::string_from_str(
        machine,
        crate::atom::name(machine, symbols.parent_environment),
    );
    let parent_attributes = plist::create(
        machine,
        &[
            cell::cons(machine, symbols.pname, parent_name),
            cell::cons(machine, symbols.apval, nil),
        ],
    );
    entries.push(cell::cons(machine, symbols.parent_environment, parent_attributes));

    let root = plist::create(machine, &entries);

    forms::install(machine, root);
    builtins::install(machine, root);

    let mutable_environment = create(machine, root);
    io::install_standard_streams(machine, mutable_environment);

    debug!(
        heap_bytes = machine.heap().allocated_bytes(),
        "root environment ready"
    );

    mutable_environment
}
