//! Property Lists
//!
//! A property list is an ordered list of `(key . value)` pair cells. Keys
//! are compared with structural equivalence, so atoms work as keys whether
//! or not they are interned. Lookup is linear; insertion appends, so the
//! first entry for a key always wins and entry order is stable.
//!
//! Environments are property lists of property lists (see `crate::env`),
//! which is why these operations are kept free of any symbol semantics.

use skiff_core::Value;

use crate::cell;
use crate::machine::Machine;

/// Outcome of scanning a plist for a key.
pub enum EntrySearch {
    /// The `(key . value)` pair cell holding the key.
    Found(Value),
    /// The key is absent; carries the final cell of the plist, the place
    /// a new entry would be appended after.
    Missing(Value),
}

/// Build a property list from `(key . value)` pair cells.
pub fn create(machine: &Machine, entries: &[Value]) -> Value {
    cell::list(machine, entries)
}

/// Scan for the entry whose key is equivalent to `key`.
pub fn find_entry(machine: &Machine, plist: Value, key: Value) -> EntrySearch {
    let mut current = plist;
    loop {
        if !current.is_cell() {
            return EntrySearch::Missing(current);
        }

        let entry = cell::car(machine, current);
        let entry_key = cell::car(machine, entry);
        if machine.equal(key, entry_key) {
            return EntrySearch::Found(entry);
        }

        let next = cell::cdr(machine, current);
        if next == machine.nil() {
            return EntrySearch::Missing(current);
        }
        current = next;
    }
}

/// The value stored under `key`, or `NIL` when absent. Absent and
/// stored-as-`NIL` are indistinguishable here by design.
pub fn get(machine: &Machine, plist: Value, key: Value) -> Value {
    match find_entry(machine, plist, key) {
        EntrySearch::Found(entry) => cell::cdr(machine, entry),
        EntrySearch::Missing(_) => machine.nil(),
    }
}

/// Replace the value under `key`, appending a fresh entry when absent.
/// Returns the value.
pub fn set(machine: &Machine, plist: Value, key: Value, value: Value) -> Value {
    match find_entry(machine, plist, key) {
        EntrySearch::Found(entry) => {
            cell::rplacd(machine, entry, value);
        }
        EntrySearch::Missing(tail) => {
            let pair = cell::cons(machine, key, value);
            let entry = cell::cons(machine, pair, machine.nil());
            cell::rplacd(machine, tail, entry);
        }
    }
    value
}

/// Remove a property.
///
/// Removal is implemented as storing `NIL`, which leaves the entry cell
/// in place. Lookups cannot tell the difference, but the entry still
/// occupies the list.
pub fn remove(machine: &Machine, plist: Value, key: Value) -> Value {
    set(machine, plist, key, machine.nil());
    machine.nil()
}
