//! Cells
//!
//! A cell is an ordered pair of values, the sole structural building block:
//! lists are chains of cells whose `cdr` points at the next cell and whose
//! final `cdr` is `NIL`. Property lists, environments, and source forms are
//! all made of them.
//!
//! `car`/`cdr` of anything that is not a cell (including `NIL`) is `NIL`,
//! which is the recoverable-error convention used throughout.

use skiff_core::{Tag, Value};

use crate::machine::Machine;

/// Heap record of a cell.
#[repr(C)]
pub struct CellRecord {
    pub car: Value,
    pub cdr: Value,
}

#[inline]
fn record(cell: Value) -> *mut CellRecord {
    cell.record_ptr().cast()
}

/// Construct a cell with the given `car` and `cdr`.
pub fn cons(machine: &Machine, car: Value, cdr: Value) -> Value {
    let (value, raw) = machine.heap().allocate(Tag::Cell, size_of::<CellRecord>());
    let record = raw.cast::<CellRecord>();
    unsafe {
        (*record).car = car;
        (*record).cdr = cdr;
    }
    value
}

/// The first half of a cell; `NIL` for non-cells.
#[inline]
pub fn car(machine: &Machine, cell: Value) -> Value {
    if !cell.is_cell() {
        return machine.nil();
    }
    unsafe { (*record(cell)).car }
}

/// The second half of a cell; `NIL` for non-cells.
#[inline]
pub fn cdr(machine: &Machine, cell: Value) -> Value {
    if !cell.is_cell() {
        return machine.nil();
    }
    unsafe { (*record(cell)).cdr }
}

/// `car(cdr(cell))`.
#[inline]
pub fn cadr(machine: &Machine, cell: Value) -> Value {
    car(machine, cdr(machine, cell))
}

/// `cdr(cdr(cell))`.
#[inline]
pub fn cddr(machine: &Machine, cell: Value) -> Value {
    cdr(machine, cdr(machine, cell))
}

/// Replace the `car` of a cell in place, returning the cell.
pub fn rplaca(machine: &Machine, cell: Value, new_car: Value) -> Value {
    if !cell.is_cell() {
        return machine.nil();
    }
    unsafe {
        (*record(cell)).car = new_car;
    }
    cell
}

/// Replace the `cdr` of a cell in place, returning the cell.
pub fn rplacd(machine: &Machine, cell: Value, new_cdr: Value) -> Value {
    if !cell.is_cell() {
        return machine.nil();
    }
    unsafe {
        (*record(cell)).cdr = new_cdr;
    }
    cell
}

/// Build a `NIL`-terminated list of the given items.
pub fn list(machine: &Machine, items: &[Value]) -> Value {
    let mut builder = ListBuilder::new(machine);
    for item in items {
        builder.push(machine, *item);
    }
    builder.finish()
}

/// Two cells are equivalent when their `car`s and `cdr`s are, recursively.
pub fn equal(machine: &Machine, a: Value, b: Value) -> bool {
    machine.equal(car(machine, a), car(machine, b))
        && machine.equal(cdr(machine, a), cdr(machine, b))
}

/// Accumulates a list front to back by keeping hold of the tail cell.
///
/// The reader, the argument evaluator, and the TAGBODY segmenter all
/// append to growing lists; this captures the head/tail bookkeeping once.
pub struct ListBuilder {
    head: Value,
    tail: Value,
}

impl ListBuilder {
    pub fn new(machine: &Machine) -> ListBuilder {
        ListBuilder {
            head: machine.nil(),
            tail: machine.nil(),
        }
    }

    /// Append one item.
    pub fn push(&mut self, machine: &Machine, item: Value) {
        let cell = cons(machine, item, machine.nil());
        if self.tail == machine.nil() {
            self.head = cell;
        } else {
            rplacd(machine, self.tail, cell);
        }
        self.tail = cell;
    }

    pub fn is_empty(&self) -> bool {
        !self.head.is_cell()
    }

    /// The accumulated list; `NIL` if nothing was pushed.
    pub fn finish(self) -> Value {
        self.head
    }
}
