//! Streams
//!
//! A stream couples a backend (six character-oriented callables) with a
//! flag byte tracking open-for-read, open-for-write, and sticky
//! end-of-input. The backend lives behind a trait object parked in an
//! interior record, so a stream value is an ordinary heap value and the
//! backend state travels with it.
//!
//! The operations here interpose flag bookkeeping around the backend:
//! reads and writes fail (with `NIL`) on a stream not open in that
//! direction, end-of-input is cached once observed and stays set until
//! the stream is closed or reopened, and `open` refuses a stream that is
//! already open.
//!
//! Stream *designators* (`T` for the terminal, `NIL` for standard input
//! or output) are not interpreted here; the I/O primitives resolve them
//! against the environment (see `crate::io`).

use skiff_core::{Tag, Value};

use crate::machine::Machine;
use crate::native;
use crate::text;

/// The six callables a stream backend provides.
///
/// Characters cross this boundary as raw codepoints. A backend must
/// support at least one character of pushback between any two reads, and
/// once it reports end-of-input it must keep doing so until reopened.
pub trait StreamBackend {
    /// Prepare the backend for reading and/or writing. Returns false on
    /// refusal.
    fn open(&mut self, readable: bool, writable: bool) -> bool;

    /// Release the backend's resources. Idempotence is permitted.
    fn close(&mut self) -> bool;

    /// The next character, or `None` at end of input.
    fn read_char(&mut self) -> Option<u32>;

    /// Push one character back. Returns `None` when the pushback slot is
    /// occupied.
    fn unread_char(&mut self, ch: u32) -> Option<u32>;

    /// Write one character. Returns false on failure.
    fn write_char(&mut self, ch: u32) -> bool;

    /// Whether the backend is at end of input.
    fn at_eof(&mut self) -> bool;
}

/// End of input has been observed.
pub const FLAG_AT_EOF: u32 = 0x1;
/// Open for reading.
pub const FLAG_READABLE: u32 = 0x2;
/// Open for writing.
pub const FLAG_WRITABLE: u32 = 0x4;

/// Heap record of a stream.
#[repr(C)]
pub struct StreamRecord {
    /// Interior holding the boxed backend.
    pub functions: Value,
    pub flags: u32,
}

#[inline]
fn record(stream: Value) -> *mut StreamRecord {
    stream.record_ptr().cast()
}

/// The backend behind a stream.
///
/// # Safety
/// `stream` must be a stream value created by [`create`]; the returned
/// borrow must not outlive the machine's heap.
#[allow(clippy::mut_from_ref)]
unsafe fn backend<'a>(stream: Value) -> &'a mut Box<dyn StreamBackend> {
    unsafe {
        let functions = (*record(stream)).functions;
        &mut *native::interior_ref::<Box<dyn StreamBackend>>(functions)
    }
}

#[inline]
fn flags(stream: Value) -> u32 {
    unsafe { (*record(stream)).flags }
}

#[inline]
fn set_flags(stream: Value, new_flags: u32) {
    unsafe {
        (*record(stream)).flags = new_flags;
    }
}

/// Create a stream over a backend. All flags start unset; the stream must
/// be opened before use.
pub fn create(machine: &Machine, stream_backend: Box<dyn StreamBackend>) -> Value {
    let functions = native::interior_store(machine, stream_backend);
    let (value, raw) = machine
        .heap()
        .allocate(Tag::Stream, size_of::<StreamRecord>());
    let record = raw.cast::<StreamRecord>();
    unsafe {
        (*record).functions = functions;
        (*record).flags = 0;
    }
    value
}

/// Open the stream for reading and/or writing (each a `T`/`NIL` flag).
/// An already-open stream is refused. Returns the stream, or `NIL`.
pub fn open(machine: &Machine, stream: Value, readable: Value, writable: Value) -> Value {
    if !stream.is_stream() {
        return machine.nil();
    }
    if flags(stream) & (FLAG_READABLE | FLAG_WRITABLE) != 0 {
        return machine.nil();
    }

    let for_read = machine.is_truthy(readable);
    let for_write = machine.is_truthy(writable);
    if !unsafe { backend(stream) }.open(for_read, for_write) {
        return machine.nil();
    }

    let mut new_flags = 0;
    if for_read {
        new_flags |= FLAG_READABLE;
    }
    if for_write {
        new_flags |= FLAG_WRITABLE;
    }
    set_flags(stream, new_flags);
    stream
}

/// Close the stream, clearing every flag including the cached end-of-input.
pub fn close(machine: &Machine, stream: Value) -> Value {
    if !stream.is_stream() {
        return machine.nil();
    }
    unsafe { backend(stream) }.close();
    set_flags(stream, 0);
    stream
}

/// Read one character; `NIL` at end of input or on a stream not open for
/// reading. Observing the end caches it.
pub fn read_char(machine: &Machine, stream: Value) -> Value {
    if !stream.is_stream() || flags(stream) & FLAG_READABLE == 0 {
        return machine.nil();
    }
    if flags(stream) & FLAG_AT_EOF != 0 {
        return machine.nil();
    }

    match unsafe { backend(stream) }.read_char() {
        Some(ch) => Value::char(ch),
        None => {
            set_flags(stream, flags(stream) | FLAG_AT_EOF);
            machine.nil()
        }
    }
}

/// Push one character back onto the stream. Returns the character, or
/// `NIL` when the pushback slot is occupied or the stream unreadable.
pub fn unread_char(machine: &Machine, stream: Value, ch: Value) -> Value {
    if !stream.is_stream() || !ch.is_char() || flags(stream) & FLAG_READABLE == 0 {
        return machine.nil();
    }
    match unsafe { backend(stream) }.unread_char(ch.as_char()) {
        Some(ch) => Value::char(ch),
        None => machine.nil(),
    }
}

/// The next character without consuming it: read then unread.
pub fn peek_char(machine: &Machine, stream: Value) -> Value {
    let ch = read_char(machine, stream);
    if ch == machine.nil() {
        return machine.nil();
    }
    unread_char(machine, stream, ch);
    ch
}

/// Write one character. Returns the stream, or `NIL` on a stream not open
/// for writing or a backend failure.
pub fn write_char(machine: &Machine, stream: Value, ch: Value) -> Value {
    if !stream.is_stream() || !ch.is_char() || flags(stream) & FLAG_WRITABLE == 0 {
        return machine.nil();
    }
    if unsafe { backend(stream) }.write_char(ch.as_char()) {
        stream
    } else {
        machine.nil()
    }
}

/// Write every character of a string value. Returns the stream.
pub fn write_string(machine: &Machine, stream: Value, string: Value) -> Value {
    for i in 0..text::length(machine, string) {
        write_char(machine, stream, text::char_at(machine, string, i));
    }
    stream
}

/// Write a Rust string, character by character.
pub fn write_str(machine: &Machine, stream: Value, source: &str) -> Value {
    for ch in source.chars() {
        write_char(machine, stream, Value::char(ch as u32));
    }
    stream
}

/// Whether the stream is at end of input. Once `T`, stays `T` until the
/// stream is closed or reopened.
pub fn at_eof(machine: &Machine, stream: Value) -> Value {
    if !stream.is_stream() {
        return machine.nil();
    }
    if flags(stream) & FLAG_AT_EOF != 0 {
        return machine.t();
    }
    if unsafe { backend(stream) }.at_eof() {
        set_flags(stream, flags(stream) | FLAG_AT_EOF);
        machine.t()
    } else {
        machine.nil()
    }
}

/// Whether the stream is open in either direction.
pub fn is_open(machine: &Machine, stream: Value) -> Value {
    if !stream.is_stream() {
        return machine.nil();
    }
    machine.truth(flags(stream) & (FLAG_READABLE | FLAG_WRITABLE) != 0)
}
