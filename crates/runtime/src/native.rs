//! Host-facing value kinds: interiors, subrs, structs
//!
//! An *interior* is an opaque raw buffer owned by some other object. Its
//! bytes are never traced and never examined by the language; it exists to
//! park native-side state (stream backends, string character buffers) on
//! the heap so the owning record can reach it through an ordinary value.
//!
//! A *subr* is a primitive operator: a native function pointer plus a name
//! string for printing.
//!
//! A *struct* carries embedded host data with enough layout information to
//! participate in a future collector. It is defined but not required by
//! anything in the core.

use skiff_core::{Tag, Value};

use crate::eval::{Flow, SubrFn};
use crate::machine::Machine;

/// Allocate an opaque buffer of `size` bytes, returning the interior value
/// and the raw buffer pointer.
pub fn interior_create(machine: &Machine, size: usize) -> (Value, *mut u8) {
    machine.heap().allocate(Tag::Interior, size)
}

/// Allocate an interior just large enough for `payload` and move the
/// payload into it. The payload is never dropped; interiors live until the
/// heap does.
pub fn interior_store<T>(machine: &Machine, payload: T) -> Value {
    let (value, raw) = interior_create(machine, size_of::<T>());
    unsafe {
        raw.cast::<T>().write(payload);
    }
    value
}

/// View an interior's bytes as a `T`.
///
/// # Safety
/// The interior must have been created over a `T` (or a buffer of at
/// least `size_of::<T>()` bytes laid out as one).
pub unsafe fn interior_ref<T>(interior: Value) -> *mut T {
    debug_assert!(interior.is_interior(), "interior_ref of a non-interior");
    interior.record_ptr().cast()
}

/// Heap record of a subr.
#[repr(C)]
pub struct SubrRecord {
    pub function: SubrFn,
    /// Name string, used by the printer's `#'NAME` notation.
    pub name: Value,
}

#[inline]
fn subr_record(subr: Value) -> *mut SubrRecord {
    subr.record_ptr().cast()
}

/// Create a subr from a native function and its name string.
pub fn subr_create(machine: &Machine, function: SubrFn, name: Value) -> Value {
    let (value, raw) = machine.heap().allocate(Tag::Subr, size_of::<SubrRecord>());
    let record = raw.cast::<SubrRecord>();
    unsafe {
        (*record).function = function;
        (*record).name = name;
    }
    value
}

/// The subr's name string.
pub fn subr_name(machine: &Machine, subr: Value) -> Value {
    if !subr.is_subr() {
        return machine.nil();
    }
    unsafe { (*subr_record(subr)).name }
}

/// Invoke the subr's native function on an already-evaluated argument list.
pub fn subr_call(machine: &Machine, subr: Value, environment: Value, arguments: Value) -> Flow {
    debug_assert!(subr.is_subr(), "subr_call of a non-subr");
    let function = unsafe { (*subr_record(subr)).function };
    function(machine, environment, arguments)
}

/// Two subrs are equivalent when they share a function pointer and have
/// equivalent names.
pub fn subr_equal(machine: &Machine, a: Value, b: Value) -> bool {
    let (fa, na) = unsafe { ((*subr_record(a)).function, (*subr_record(a)).name) };
    let (fb, nb) = unsafe { ((*subr_record(b)).function, (*subr_record(b)).name) };
    std::ptr::fn_addr_eq(fa, fb) && machine.equal(na, nb)
}

/// Heap record of a struct.
#[repr(C)]
pub struct StructRecord {
    pub pointer: *mut u8,
    pub size: usize,
    pub type_id: usize,
}

/// Create a struct over embedded host data.
pub fn struct_create(machine: &Machine, pointer: *mut u8, size: usize, type_id: usize) -> Value {
    let (value, raw) = machine
        .heap()
        .allocate(Tag::Struct, size_of::<StructRecord>());
    let record = raw.cast::<StructRecord>();
    unsafe {
        (*record).pointer = pointer;
        (*record).size = size;
        (*record).type_id = type_id;
    }
    value
}
