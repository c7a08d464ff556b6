//! Characters and Strings
//!
//! A character is a 28-bit codepoint stored inline in its value word (see
//! `skiff_core::value`), so strings never trace their contents: a string
//! record points at an interior buffer of character words plus a capacity
//! and length. Appending past the capacity reallocates the buffer in
//! multiples of sixteen; the record keeps its identity, only the interior
//! handle is replaced.

use skiff_core::{Tag, Value};

use crate::machine::Machine;
use crate::native;

/// Growth quantum for string buffers, in characters.
const STRING_GROW: usize = 16;

/// Heap record of a string.
#[repr(C)]
pub struct StringRecord {
    /// Interior buffer of character words.
    pub chars: Value,
    /// Characters the buffer can hold before reallocation.
    pub capacity: usize,
    /// Characters currently in the string.
    pub length: usize,
}

#[inline]
fn record(string: Value) -> *mut StringRecord {
    string.record_ptr().cast()
}

#[inline]
fn buffer(string: Value) -> *mut Value {
    unsafe { (*record(string)).chars.record_ptr().cast() }
}

fn round_up(length: usize) -> usize {
    length.div_ceil(STRING_GROW) * STRING_GROW
}

/// Allocate a string record over a fresh interior buffer.
fn create(machine: &Machine, capacity: usize, length: usize) -> Value {
    let (chars, _) = native::interior_create(machine, capacity * size_of::<Value>());
    let (value, raw) = machine
        .heap()
        .allocate(Tag::String, size_of::<StringRecord>());
    let record = raw.cast::<StringRecord>();
    unsafe {
        (*record).chars = chars;
        (*record).capacity = capacity;
        (*record).length = length;
    }
    value
}

/// Create an empty string with room to grow.
pub fn string_create_empty(machine: &Machine) -> Value {
    create(machine, STRING_GROW, 0)
}

/// Create a string holding the characters of a Rust string.
pub fn string_from_str(machine: &Machine, source: &str) -> Value {
    let codepoints: Vec<u32> = source.chars().map(|c| c as u32).collect();
    let string = create(machine, round_up(codepoints.len()), codepoints.len());
    let chars = buffer(string);
    for (i, codepoint) in codepoints.iter().enumerate() {
        unsafe {
            chars.add(i).write(Value::char(*codepoint));
        }
    }
    string
}

/// Number of characters in the string.
pub fn length(machine: &Machine, string: Value) -> usize {
    if !string.is_string() {
        return 0;
    }
    let _ = machine;
    unsafe { (*record(string)).length }
}

/// The character at `index`, or `NIL` out of bounds.
pub fn char_at(machine: &Machine, string: Value, index: usize) -> Value {
    if !string.is_string() || index >= length(machine, string) {
        return machine.nil();
    }
    unsafe { buffer(string).add(index).read() }
}

/// Append one character value in place, growing the buffer as needed.
///
/// The string record is modified, not copied; the return is the same
/// string for convenience.
pub fn append_char(machine: &Machine, string: Value, ch: Value) -> Value {
    if !string.is_string() || !ch.is_char() {
        return machine.nil();
    }

    let record = record(string);
    unsafe {
        if (*record).length == (*record).capacity {
            reallocate(machine, record);
        }
        buffer(string).add((*record).length).write(ch);
        (*record).length += 1;
    }
    string
}

/// Replace the interior buffer with one sixteen characters larger,
/// preserving content. Length and identity are untouched.
unsafe fn reallocate(machine: &Machine, record: *mut StringRecord) {
    unsafe {
        let old_capacity = (*record).capacity;
        let old_buffer: *mut Value = (*record).chars.record_ptr().cast();

        let new_capacity = old_capacity + STRING_GROW;
        let (new_chars, new_raw) =
            native::interior_create(machine, new_capacity * size_of::<Value>());
        std::ptr::copy_nonoverlapping(old_buffer, new_raw.cast::<Value>(), old_capacity);

        (*record).chars = new_chars;
        (*record).capacity = new_capacity;
    }
}

/// Collect the string's codepoints into a Rust `String`. Codepoints that
/// are not Unicode scalar values are replaced.
pub fn to_rust_string(machine: &Machine, string: Value) -> String {
    let mut collected = String::new();
    for i in 0..length(machine, string) {
        let codepoint = char_at(machine, string, i).as_char();
        collected.push(char::from_u32(codepoint).unwrap_or(char::REPLACEMENT_CHARACTER));
    }
    collected
}

/// Two strings are equivalent when their lengths and codepoints match;
/// capacity never participates.
pub fn string_equal(machine: &Machine, a: Value, b: Value) -> bool {
    let len = length(machine, a);
    if len != length(machine, b) {
        return false;
    }
    for i in 0..len {
        if char_at(machine, a, i) != char_at(machine, b, i) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MachineConfig;

    #[test]
    fn test_from_str_round_trip() {
        let machine = Machine::new(MachineConfig::new());
        let string = string_from_str(&machine, "HELLO");
        assert!(string.is_string());
        assert_eq!(length(&machine, string), 5);
        assert_eq!(to_rust_string(&machine, string), "HELLO");
    }

    #[test]
    fn test_empty_string() {
        let machine = Machine::new(MachineConfig::new());
        let string = string_create_empty(&machine);
        assert_eq!(length(&machine, string), 0);
        assert_eq!(to_rust_string(&machine, string), "");
    }

    #[test]
    fn test_char_at() {
        let machine = Machine::new(MachineConfig::new());
        let string = string_from_str(&machine, "AB");
        assert_eq!(char_at(&machine, string, 0), Value::char(b'A' as u32));
        assert_eq!(char_at(&machine, string, 1), Value::char(b'B' as u32));
        assert_eq!(char_at(&machine, string, 2), machine.nil());
    }

    #[test]
    fn test_append_grows_past_capacity() {
        let machine = Machine::new(MachineConfig::new());
        let string = string_create_empty(&machine);
        let original_buffer = unsafe { (*record(string)).chars };

        // Push well past the initial sixteen-character buffer; the handle
        // is replaced but length and content survive.
        for _ in 0..40 {
            assert_eq!(append_char(&machine, string, Value::char(b'X' as u32)), string);
        }
        assert_ne!(unsafe { (*record(string)).chars }, original_buffer);
        assert_eq!(length(&machine, string), 40);
        assert_eq!(to_rust_string(&machine, string), "X".repeat(40));
    }

    #[test]
    fn test_equality_is_content_based() {
        let machine = Machine::new(MachineConfig::new());
        let a = string_from_str(&machine, "SAME");
        let b = string_from_str(&machine, "SAME");
        let c = string_from_str(&machine, "SOME");
        let shorter = string_from_str(&machine, "SAM");

        assert_ne!(a, b);
        assert!(machine.equal(a, b));
        assert!(!machine.equal(a, c));
        assert!(!machine.equal(a, shorter));
    }
}
