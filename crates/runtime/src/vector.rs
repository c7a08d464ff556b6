//! Vectors
//!
//! A vector is a heterogeneous sequence of values behind an interior
//! buffer. Unlike string contents, vector elements are full values and
//! participate in liveness.

use skiff_core::{Tag, Value};

use crate::machine::Machine;
use crate::native;

/// Heap record of a vector.
#[repr(C)]
pub struct VectorRecord {
    /// Interior buffer of element words.
    pub values: Value,
    /// Elements the buffer can hold.
    pub capacity: usize,
    /// Elements currently present.
    pub count: usize,
}

#[inline]
fn record(vector: Value) -> *mut VectorRecord {
    vector.record_ptr().cast()
}

#[inline]
fn buffer(vector: Value) -> *mut Value {
    unsafe { (*record(vector)).values.record_ptr().cast() }
}

/// Create a vector holding the given elements.
pub fn create(machine: &Machine, elements: &[Value]) -> Value {
    let (values, raw_buffer) =
        native::interior_create(machine, elements.len() * size_of::<Value>());
    let elements_ptr = raw_buffer.cast::<Value>();
    for (i, element) in elements.iter().enumerate() {
        unsafe {
            elements_ptr.add(i).write(*element);
        }
    }

    let (value, raw) = machine
        .heap()
        .allocate(Tag::Vector, size_of::<VectorRecord>());
    let record = raw.cast::<VectorRecord>();
    unsafe {
        (*record).values = values;
        (*record).capacity = elements.len();
        (*record).count = elements.len();
    }
    value
}

/// Number of elements.
pub fn count(machine: &Machine, vector: Value) -> usize {
    if !vector.is_vector() {
        return 0;
    }
    let _ = machine;
    unsafe { (*record(vector)).count }
}

/// The element at `index`, or `NIL` out of bounds.
pub fn element(machine: &Machine, vector: Value, index: usize) -> Value {
    if !vector.is_vector() || index >= count(machine, vector) {
        return machine.nil();
    }
    unsafe { buffer(vector).add(index).read() }
}

/// Two vectors are equivalent when their counts match and their elements
/// are pairwise equivalent; capacity never participates.
pub fn equal(machine: &Machine, a: Value, b: Value) -> bool {
    let n = count(machine, a);
    if n != count(machine, b) {
        return false;
    }
    for i in 0..n {
        if !machine.equal(element(machine, a, i), element(machine, b, i)) {
            return false;
        }
    }
    true
}
