//! The Reader
//!
//! Turns textual syntax from an input stream into values, one object per
//! call. The grammar:
//!
//! ```text
//! object    := atom | fixnum | quote | list | string | vector | character
//! fixnum    := ('+'|'-')? digit+
//! quote     := '\'' object
//! list      := '(' object* ')'
//! string    := '"' (non-quote | '\\' any)* '"'
//! vector    := '#' '(' object* ')'
//! character := '#' '\\' any
//! atom      := atom-start atom-cont*
//! ```
//!
//! Whitespace and `;`-to-end-of-line comments may appear between tokens,
//! never inside one. Atom names are upper-cased, and an assembled atom is
//! looked up in the environment first: if an equivalent symbol already
//! exists, that symbol is returned, otherwise the new atom is interned.
//! That find-or-intern step is what promotes name equality to identity,
//! so reading `(A A)` yields two identical cars.
//!
//! List termination threads a freshly made, uninterned sentinel atom
//! through the recursive calls: the inner reader returns the sentinel when
//! it consumes the closing parenthesis, which no real object can ever be
//! identical to.
//!
//! Running out of input inside a list, string, quote, or character literal
//! discards the partial result and returns `NIL`; the stream is left
//! positioned after the last consumed character.

use skiff_core::Value;
use tracing::trace;

use crate::machine::Machine;
use crate::{atom, cell, env, io, stream, vector};

const TAB: u32 = 0x09;
const NEWLINE: u32 = 0x0A;
const SPACE: u32 = 0x20;
const DOUBLE_QUOTE: u32 = 0x22;
const OCTOTHORPE: u32 = 0x23;
const SINGLE_QUOTE: u32 = 0x27;
const PAREN_OPEN: u32 = 0x28;
const PAREN_CLOSE: u32 = 0x29;
const PLUS: u32 = 0x2B;
const MINUS: u32 = 0x2D;
const SEMICOLON: u32 = 0x3B;
const BACKSLASH: u32 = 0x5C;
const DIGIT_0: u32 = 0x30;
const DIGIT_9: u32 = 0x39;

/// Longest digit sequence worth keeping: the widest representable fixnum
/// in decimal, plus a sign.
const FIXNUM_BUFFER_MAX: usize = if usize::BITS == 64 { 18 + 1 } else { 9 + 1 };

#[inline]
fn is_digit(ch: u32) -> bool {
    (DIGIT_0..=DIGIT_9).contains(&ch)
}

/// Read one object from the designated input stream.
///
/// The designator is resolved against the environment (`T` terminal,
/// `NIL` standard input, or a stream value). Returns `NIL` at end of
/// input or when the designator resolves to nothing.
pub fn read(machine: &Machine, environment: Value, designator: Value) -> Value {
    let input = io::input_stream(machine, environment, designator);
    if !input.is_stream() {
        return machine.nil();
    }
    let object = read_object(machine, environment, input, machine.nil());
    trace!(tag = ?object.tag(), "read object");
    object
}

/// Read one object, returning `list_end` when the next token is a closing
/// parenthesis. At the top level `list_end` is `NIL`, making a stray `)`
/// indistinguishable from end of input.
fn read_object(machine: &Machine, environment: Value, input: Value, list_end: Value) -> Value {
    skip_whitespace_and_comments(machine, input);

    let ch = stream::read_char(machine, input);
    if ch == machine.nil() {
        return machine.nil();
    }

    match ch.as_char() {
        code if is_digit(code) => read_fixnum(machine, input, code),

        code @ (PLUS | MINUS) => {
            // A sign introduces a fixnum only when a digit follows;
            // otherwise it starts an atom like `+` or `-FOO`.
            let next = stream::read_char(machine, input);
            if next == machine.nil() {
                return read_atom(machine, environment, input, code);
            }
            stream::unread_char(machine, input, next);
            if is_digit(next.as_char()) {
                read_fixnum(machine, input, code)
            } else {
                read_atom(machine, environment, input, code)
            }
        }

        SINGLE_QUOTE => read_quote(machine, environment, input, list_end),

        PAREN_OPEN => read_list(machine, environment, input),

        PAREN_CLOSE => list_end,

        DOUBLE_QUOTE => read_string(machine, input),

        OCTOTHORPE => {
            let ch2 = stream::read_char(machine, input);
            if ch2 == machine.nil() {
                return machine.nil();
            }
            match ch2.as_char() {
                PAREN_OPEN => read_vector(machine, environment, input),
                BACKSLASH => stream::read_char(machine, input),
                code => panic!("reader: unexpected {code:#x} after '#'"),
            }
        }

        code => read_atom(machine, environment, input, code),
    }
}

/// Accumulate an atom name starting with the already-consumed `first`
/// character, then find-or-intern it against the environment.
fn read_atom(machine: &Machine, environment: Value, input: Value, first: u32) -> Value {
    let mut name = String::new();
    push_codepoint(&mut name, first);

    loop {
        let ch = stream::read_char(machine, input);
        if ch == machine.nil() {
            break;
        }
        match ch.as_char() {
            SPACE | NEWLINE | TAB | SEMICOLON | PAREN_OPEN | PAREN_CLOSE | OCTOTHORPE => {
                // Terminators belong to the next token.
                stream::unread_char(machine, input, ch);
                break;
            }
            code => push_codepoint(&mut name, code),
        }
    }

    let read_atom = atom::create(machine, &name);
    let existing = env::find_symbol(machine, environment, read_atom, true);
    if existing != machine.nil() {
        cell::car(machine, existing)
    } else {
        env::intern(machine, environment, read_atom)
    }
}

/// Accumulate and decode a base-10 fixnum starting with the
/// already-consumed `first` character (a sign or digit).
fn read_fixnum(machine: &Machine, input: Value, first: u32) -> Value {
    let mut digits = String::with_capacity(FIXNUM_BUFFER_MAX + 1);
    push_codepoint(&mut digits, first);

    loop {
        let ch = stream::read_char(machine, input);
        if ch == machine.nil() {
            break;
        }
        match ch.as_char() {
            PLUS | MINUS => {
                // A sign is valid only as the first character, which was
                // consumed before this loop began.
                return machine.nil();
            }
            code if is_digit(code) => {
                if digits.len() == FIXNUM_BUFFER_MAX {
                    return machine.nil();
                }
                push_codepoint(&mut digits, code);
            }
            _ => {
                stream::unread_char(machine, input, ch);
                break;
            }
        }
    }

    Value::fixnum(digits.parse::<i64>().unwrap_or(0))
}

/// Read list elements up to the matching close parenthesis. The opening
/// parenthesis has already been consumed.
fn read_list(machine: &Machine, environment: Value, input: Value) -> Value {
    // Fresh and uninterned: identical to nothing the inner reads return.
    let sentinel = atom::create(machine, "%SI:END-OF-LIST");

    let mut builder = cell::ListBuilder::new(machine);
    loop {
        let object = read_object(machine, environment, input, sentinel);
        if object == sentinel {
            return builder.finish();
        }
        if object == machine.nil() && machine.is_truthy(stream::at_eof(machine, input)) {
            // Truncated list: discard what was collected.
            return machine.nil();
        }
        builder.push(machine, object);
    }
}

/// Read string characters up to the closing double quote. A backslash
/// escapes the following character verbatim.
fn read_string(machine: &Machine, input: Value) -> Value {
    let string = crate::text::string_create_empty(machine);

    loop {
        let ch = stream::read_char(machine, input);
        if ch == machine.nil() {
            // Truncated string.
            return machine.nil();
        }
        match ch.as_char() {
            DOUBLE_QUOTE => return string,
            BACKSLASH => {
                let escaped = stream::read_char(machine, input);
                if escaped == machine.nil() {
                    return machine.nil();
                }
                crate::text::append_char(machine, string, escaped);
            }
            _ => {
                crate::text::append_char(machine, string, ch);
            }
        }
    }
}

/// Read vector elements up to the matching close parenthesis. Both
/// introducer characters have already been consumed.
fn read_vector(machine: &Machine, environment: Value, input: Value) -> Value {
    let sentinel = atom::create(machine, "%SI:END-OF-VECTOR");

    let mut elements = Vec::new();
    loop {
        let object = read_object(machine, environment, input, sentinel);
        if object == sentinel {
            return vector::create(machine, &elements);
        }
        if object == machine.nil() && machine.is_truthy(stream::at_eof(machine, input)) {
            return machine.nil();
        }
        elements.push(object);
    }
}

/// Read the object after an apostrophe and wrap it as `(QUOTE object)`.
/// The wrapping happens at read time so the surface syntax stays terse.
fn read_quote(machine: &Machine, environment: Value, input: Value, list_end: Value) -> Value {
    let object = read_object(machine, environment, input, list_end);
    if object == machine.nil() && machine.is_truthy(stream::at_eof(machine, input)) {
        // An apostrophe with nothing after it.
        return machine.nil();
    }
    cell::list(machine, &[machine.symbols().quote, object])
}

/// Advance past whitespace and `;`-to-end-of-line comments, leaving the
/// first significant character unread.
fn skip_whitespace_and_comments(machine: &Machine, input: Value) {
    loop {
        let ch = stream::read_char(machine, input);
        if ch == machine.nil() {
            return;
        }
        match ch.as_char() {
            SPACE | NEWLINE | TAB => {}
            SEMICOLON => skip_comment(machine, input),
            _ => {
                stream::unread_char(machine, input, ch);
                return;
            }
        }
    }
}

/// Consume characters through the end of the current line.
fn skip_comment(machine: &Machine, input: Value) {
    loop {
        let ch = stream::read_char(machine, input);
        if ch == machine.nil() || ch.as_char() == NEWLINE {
            return;
        }
    }
}

fn push_codepoint(buffer: &mut String, code: u32) {
    buffer.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStreamBackend;
    use crate::machine::MachineConfig;
    use crate::{plist, text};

    fn machine_with_env() -> (Machine, Value) {
        let mut machine = Machine::new(MachineConfig::new());
        let environment = env::create_root(&mut machine);
        (machine, environment)
    }

    fn open_input(machine: &Machine, input: &str) -> Value {
        let stream_value =
            stream::create(machine, Box::new(MemoryStreamBackend::with_input(input)));
        stream::open(machine, stream_value, machine.t(), machine.nil());
        stream_value
    }

    fn read_text(machine: &Machine, environment: Value, input: &str) -> Value {
        let stream_value = open_input(machine, input);
        read(machine, environment, stream_value)
    }

    #[test]
    fn test_read_fixnums() {
        let (machine, environment) = machine_with_env();
        assert_eq!(read_text(&machine, environment, "42"), Value::fixnum(42));
        assert_eq!(read_text(&machine, environment, "+7"), Value::fixnum(7));
        assert_eq!(read_text(&machine, environment, "-13"), Value::fixnum(-13));
        assert_eq!(read_text(&machine, environment, "0"), Value::fixnum(0));
    }

    #[test]
    fn test_read_atom_upper_cases() {
        let (machine, environment) = machine_with_env();
        let value = read_text(&machine, environment, "hello");
        assert!(value.is_atom());
        assert_eq!(atom::name(&machine, value), "HELLO");
    }

    #[test]
    fn test_sign_without_digit_is_an_atom() {
        let (machine, environment) = machine_with_env();
        let minus = read_text(&machine, environment, "- ");
        assert!(minus.is_atom());
        assert_eq!(atom::name(&machine, minus), "-");

        let plus_atom = read_text(&machine, environment, "+foo");
        assert_eq!(atom::name(&machine, plus_atom), "+FOO");
    }

    #[test]
    fn test_repeated_atoms_are_identical() {
        let (machine, environment) = machine_with_env();
        let pair = read_text(&machine, environment, "(A A)");

        let first = cell::car(&machine, pair);
        let second = cell::cadr(&machine, pair);
        assert!(first.is_atom());
        assert_eq!(first, second);
    }

    #[test]
    fn test_reading_a_well_known_name_finds_the_symbol() {
        let (machine, environment) = machine_with_env();
        let value = read_text(&machine, environment, "nil");
        assert_eq!(value, machine.nil());

        let value = read_text(&machine, environment, "T");
        assert_eq!(value, machine.t());
    }

    #[test]
    fn test_read_list() {
        let (machine, environment) = machine_with_env();
        let value = read_text(&machine, environment, "(1 2 3)");

        assert_eq!(cell::car(&machine, value), Value::fixnum(1));
        assert_eq!(cell::cadr(&machine, value), Value::fixnum(2));
        assert_eq!(
            cell::car(&machine, cell::cddr(&machine, value)),
            Value::fixnum(3)
        );
        assert_eq!(cell::cdr(&machine, cell::cddr(&machine, value)), machine.nil());
    }

    #[test]
    fn test_read_nested_list() {
        let (machine, environment) = machine_with_env();
        let value = read_text(&machine, environment, "(A (B C) D)");

        let inner = cell::cadr(&machine, value);
        assert!(inner.is_cell());
        assert_eq!(atom::name(&machine, cell::car(&machine, inner)), "B");
    }

    #[test]
    fn test_empty_list_is_nil() {
        let (machine, environment) = machine_with_env();
        assert_eq!(read_text(&machine, environment, "()"), machine.nil());
    }

    #[test]
    fn test_quote_expands() {
        let (machine, environment) = machine_with_env();
        let value = read_text(&machine, environment, "'X");

        let expected = cell::list(
            &machine,
            &[
                machine.symbols().quote,
                atom::create(&machine, "X"),
            ],
        );
        assert!(machine.equal(value, expected));
        assert_eq!(cell::car(&machine, value), machine.symbols().quote);
    }

    #[test]
    fn test_read_string_with_escape() {
        let (machine, environment) = machine_with_env();
        let value = read_text(&machine, environment, r#""say \"hi\"""#);
        assert!(value.is_string());
        assert_eq!(text::to_rust_string(&machine, value), "say \"hi\"");
    }

    #[test]
    fn test_read_character_literal() {
        let (machine, environment) = machine_with_env();
        let value = read_text(&machine, environment, r"#\Q");
        assert_eq!(value, Value::char(b'Q' as u32));
    }

    #[test]
    fn test_read_vector() {
        let (machine, environment) = machine_with_env();
        let value = read_text(&machine, environment, "#(1 2 3)");

        assert!(value.is_vector());
        assert_eq!(vector::count(&machine, value), 3);
        assert_eq!(vector::element(&machine, value, 1), Value::fixnum(2));
    }

    #[test]
    fn test_comments_and_whitespace_are_skipped() {
        let (machine, environment) = machine_with_env();
        let value = read_text(&machine, environment, "; leading comment\n   42");
        assert_eq!(value, Value::fixnum(42));
    }

    #[test]
    fn test_comment_inside_list() {
        let (machine, environment) = machine_with_env();
        let value = read_text(&machine, environment, "(1 ; two was here\n 3)");
        assert_eq!(cell::car(&machine, value), Value::fixnum(1));
        assert_eq!(cell::cadr(&machine, value), Value::fixnum(3));
    }

    #[test]
    fn test_atom_terminators_stay_unread() {
        let (machine, environment) = machine_with_env();
        let input = open_input(&machine, "AB(");

        let first = read(&machine, environment, input);
        assert_eq!(atom::name(&machine, first), "AB");
        // The parenthesis is still there for the next read.
        assert_eq!(
            stream::peek_char(&machine, input),
            Value::char(b'(' as u32)
        );
    }

    #[test]
    fn test_truncated_forms_return_nil() {
        let (machine, environment) = machine_with_env();
        assert_eq!(read_text(&machine, environment, "(1 2"), machine.nil());
        assert_eq!(read_text(&machine, environment, "\"abc"), machine.nil());
        assert_eq!(read_text(&machine, environment, "'"), machine.nil());
        assert_eq!(read_text(&machine, environment, "#\\"), machine.nil());
        assert_eq!(read_text(&machine, environment, "#(1"), machine.nil());
    }

    #[test]
    fn test_empty_input_returns_nil() {
        let (machine, environment) = machine_with_env();
        assert_eq!(read_text(&machine, environment, ""), machine.nil());
        assert_eq!(read_text(&machine, environment, "   "), machine.nil());
    }

    #[test]
    fn test_consecutive_reads_from_one_stream() {
        let (machine, environment) = machine_with_env();
        let input = open_input(&machine, "1 FOO (2)");

        assert_eq!(read(&machine, environment, input), Value::fixnum(1));
        let second = read(&machine, environment, input);
        assert_eq!(atom::name(&machine, second), "FOO");
        let third = read(&machine, environment, input);
        assert_eq!(cell::car(&machine, third), Value::fixnum(2));
    }

    #[test]
    fn test_interned_atom_is_bound_unbound() {
        let (machine, environment) = machine_with_env();
        let value = read_text(&machine, environment, "NEWONE");

        let entry = env::find_symbol(&machine, environment, value, true);
        assert_ne!(entry, machine.nil());
        let attributes = cell::cdr(&machine, entry);
        assert_eq!(
            plist::get(&machine, attributes, machine.symbols().apval),
            machine.nil()
        );
    }
}
