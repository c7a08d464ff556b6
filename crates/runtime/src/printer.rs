//! The Printer
//!
//! Turns values back into textual syntax on an output stream. Two cell
//! modes exist: *readable* (the default), which compresses proper lists
//! into `(a b c)` and falls back to a dotted tail only when the final
//! `cdr` is neither `NIL` nor a cell; and *structural*, which prints every
//! cell as an explicit `(car . cdr)` pair and therefore does not
//! round-trip through the reader; that asymmetry is intentional.
//!
//! Readable quoting controls whether standalone characters get a `#\`
//! prefix and strings get surrounding double quotes; inside cells both are
//! always quoted so lists round-trip. String contents are emitted without
//! internal escaping.
//!
//! Streams, interiors, and structs have no readable syntax; they print as
//! `#<KIND 0xADDRESS>`. Subrs print as `#'NAME`.
//!
//! Cells can be made cyclic with `RPLACA`/`RPLACD`, so traversal carries a
//! budget of cells; when it runs out the printer emits `...` and stops
//! rather than looping forever. Printing only fails by failing to write,
//! and such failures are ignored here.

use skiff_core::{Tag, Value};

use crate::machine::Machine;
use crate::{atom, cell, io, native, stream, vector};

/// Cells visited per print call before traversal gives up.
const CELL_BUDGET: usize = 4096;

/// Print with readable quoting (the `PRIN1` convention).
pub fn print(machine: &Machine, environment: Value, designator: Value, value: Value) -> Value {
    print_with(machine, environment, designator, value, true, true)
}

/// Print with readable quoting off (the `PRINC` convention).
pub fn print_plain(
    machine: &Machine,
    environment: Value,
    designator: Value,
    value: Value,
) -> Value {
    print_with(machine, environment, designator, value, false, true)
}

/// Print every cell as an explicit dotted pair.
pub fn print_structural(
    machine: &Machine,
    environment: Value,
    designator: Value,
    value: Value,
) -> Value {
    print_with(machine, environment, designator, value, true, false)
}

fn print_with(
    machine: &Machine,
    environment: Value,
    designator: Value,
    value: Value,
    quoting: bool,
    compress: bool,
) -> Value {
    let output = io::output_stream(machine, environment, designator);
    if !output.is_stream() {
        return machine.nil();
    }
    let mut budget = CELL_BUDGET;
    print_object(machine, output, value, quoting, compress, &mut budget);
    machine.t()
}

/// Print one value. `quoting` applies readable quoting to characters and
/// strings at this position; `compress` selects the readable cell mode.
fn print_object(
    machine: &Machine,
    output: Value,
    value: Value,
    quoting: bool,
    compress: bool,
    budget: &mut usize,
) {
    match value.tag() {
        Tag::Fixnum => {
            stream::write_str(machine, output, &value.as_fixnum().to_string());
        }

        Tag::Atom => {
            stream::write_str(machine, output, atom::name(machine, value));
        }

        Tag::Cell => {
            if compress {
                print_cell_readable(machine, output, value, budget);
            } else {
                print_cell_structural(machine, output, value, budget);
            }
        }

        Tag::Char => {
            if quoting {
                stream::write_str(machine, output, "#\\");
            }
            stream::write_char(machine, output, value);
        }

        Tag::String => {
            if quoting {
                stream::write_str(machine, output, "\"");
            }
            stream::write_string(machine, output, value);
            if quoting {
                stream::write_str(machine, output, "\"");
            }
        }

        Tag::Vector => {
            stream::write_str(machine, output, "#(");
            for i in 0..vector::count(machine, value) {
                if i != 0 {
                    stream::write_str(machine, output, " ");
                }
                let element = vector::element(machine, value, i);
                print_object(machine, output, element, true, compress, budget);
            }
            stream::write_str(machine, output, ")");
        }

        Tag::Subr => {
            stream::write_str(machine, output, "#'");
            stream::write_string(machine, output, native::subr_name(machine, value));
        }

        Tag::Stream => print_unreadable(machine, output, "STREAM", value),
        Tag::Interior => print_unreadable(machine, output, "INTERIOR", value),
        Tag::Struct => print_unreadable(machine, output, "STRUCT", value),
    }
}

/// `#<KIND 0xADDRESS>` for kinds with no readable syntax.
fn print_unreadable(machine: &Machine, output: Value, kind: &str, value: Value) {
    stream::write_str(machine, output, &format!("#<{} 0x{:X}>", kind, value.payload()));
}

/// Print elements inside a cell: nested cells keep the current mode, and
/// characters and strings are always quoted so the result reads back.
fn print_in_cell(
    machine: &Machine,
    output: Value,
    value: Value,
    compress: bool,
    budget: &mut usize,
) {
    print_object(machine, output, value, true, compress, budget);
}

/// Readable mode: `(` car, then the cdr chain with spaces, a ` . tail`
/// for an improper final cdr, `)`.
fn print_cell_readable(machine: &Machine, output: Value, value: Value, budget: &mut usize) {
    if *budget == 0 {
        stream::write_str(machine, output, "...");
        return;
    }
    *budget -= 1;

    stream::write_str(machine, output, "(");
    print_in_cell(machine, output, cell::car(machine, value), true, budget);

    let mut rest = cell::cdr(machine, value);
    while rest != machine.nil() {
        if *budget == 0 {
            stream::write_str(machine, output, " ...");
            break;
        }
        *budget -= 1;

        if rest.is_cell() {
            stream::write_str(machine, output, " ");
            print_in_cell(machine, output, cell::car(machine, rest), true, budget);
            rest = cell::cdr(machine, rest);
        } else {
            stream::write_str(machine, output, " . ");
            print_in_cell(machine, output, rest, true, budget);
            break;
        }
    }

    stream::write_str(machine, output, ")");
}

/// Structural mode: every cell as `(car . cdr)`, recursively.
fn print_cell_structural(machine: &Machine, output: Value, value: Value, budget: &mut usize) {
    if *budget == 0 {
        stream::write_str(machine, output, "...");
        return;
    }
    *budget -= 1;

    stream::write_str(machine, output, "(");
    print_in_cell(machine, output, cell::car(machine, value), false, budget);
    stream::write_str(machine, output, " . ");
    print_in_cell(machine, output, cell::cdr(machine, value), false, budget);
    stream::write_str(machine, output, ")");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env;
    use crate::io::{MemoryOutput, MemoryStreamBackend, output_text};
    use crate::machine::MachineConfig;
    use crate::text;

    fn machine_with_env() -> (Machine, Value) {
        let mut machine = Machine::new(MachineConfig::new());
        let environment = env::create_root(&mut machine);
        (machine, environment)
    }

    fn sink(machine: &Machine) -> (Value, MemoryOutput) {
        let backend = MemoryStreamBackend::with_input("");
        let output = backend.output_handle();
        let stream_value = stream::create(machine, Box::new(backend));
        stream::open(machine, stream_value, machine.nil(), machine.t());
        (stream_value, output)
    }

    fn printed(machine: &Machine, environment: Value, value: Value) -> String {
        let (stream_value, output) = sink(machine);
        print(machine, environment, stream_value, value);
        output_text(&output)
    }

    #[test]
    fn test_print_fixnums() {
        let (machine, environment) = machine_with_env();
        assert_eq!(printed(&machine, environment, Value::fixnum(42)), "42");
        assert_eq!(printed(&machine, environment, Value::fixnum(-7)), "-7");
        assert_eq!(printed(&machine, environment, Value::fixnum(0)), "0");
    }

    #[test]
    fn test_print_atoms() {
        let (machine, environment) = machine_with_env();
        let value = atom::create(&machine, "foo");
        assert_eq!(printed(&machine, environment, value), "FOO");
        assert_eq!(printed(&machine, environment, machine.nil()), "NIL");
    }

    #[test]
    fn test_print_list() {
        let (machine, environment) = machine_with_env();
        let value = cell::list(
            &machine,
            &[Value::fixnum(1), Value::fixnum(2), Value::fixnum(3)],
        );
        assert_eq!(printed(&machine, environment, value), "(1 2 3)");
    }

    #[test]
    fn test_print_dotted_pair() {
        let (machine, environment) = machine_with_env();
        let value = cell::cons(&machine, Value::fixnum(1), Value::fixnum(2));
        assert_eq!(printed(&machine, environment, value), "(1 . 2)");
    }

    #[test]
    fn test_print_nested_list() {
        let (machine, environment) = machine_with_env();
        let inner = cell::list(&machine, &[Value::fixnum(2), Value::fixnum(3)]);
        let value = cell::list(&machine, &[Value::fixnum(1), inner]);
        assert_eq!(printed(&machine, environment, value), "(1 (2 3))");
    }

    #[test]
    fn test_print_structural_mode() {
        let (machine, environment) = machine_with_env();
        let value = cell::list(&machine, &[Value::fixnum(1), Value::fixnum(2)]);

        let (stream_value, output) = sink(&machine);
        print_structural(&machine, environment, stream_value, value);
        assert_eq!(output_text(&output), "(1 . (2 . NIL))");
    }

    #[test]
    fn test_print_char_quoting() {
        let (machine, environment) = machine_with_env();
        let value = Value::char(b'Q' as u32);
        assert_eq!(printed(&machine, environment, value), "#\\Q");

        let (stream_value, output) = sink(&machine);
        print_plain(&machine, environment, stream_value, value);
        assert_eq!(output_text(&output), "Q");
    }

    #[test]
    fn test_print_string_quoting() {
        let (machine, environment) = machine_with_env();
        let value = text::string_from_str(&machine, "HI");
        assert_eq!(printed(&machine, environment, value), "\"HI\"");

        let (stream_value, output) = sink(&machine);
        print_plain(&machine, environment, stream_value, value);
        assert_eq!(output_text(&output), "HI");
    }

    #[test]
    fn test_strings_inside_cells_are_quoted() {
        let (machine, environment) = machine_with_env();
        let value = cell::list(
            &machine,
            &[
                text::string_from_str(&machine, "S"),
                Value::char(b'C' as u32),
            ],
        );

        let (stream_value, output) = sink(&machine);
        print_plain(&machine, environment, stream_value, value);
        assert_eq!(output_text(&output), "(\"S\" #\\C)");
    }

    #[test]
    fn test_print_vector() {
        let (machine, environment) = machine_with_env();
        let value = vector::create(
            &machine,
            &[Value::fixnum(1), Value::fixnum(2), Value::fixnum(3)],
        );
        assert_eq!(printed(&machine, environment, value), "#(1 2 3)");
    }

    #[test]
    fn test_print_subr() {
        let (machine, environment) = machine_with_env();
        let car_atom = atom::create(&machine, "CAR");
        let subr = env::get(
            &machine,
            environment,
            car_atom,
            machine.symbols().subr,
            true,
        );
        assert!(subr.is_subr());
        assert_eq!(printed(&machine, environment, subr), "#'CAR");
    }

    #[test]
    fn test_print_stream_sentinel() {
        let (machine, environment) = machine_with_env();
        let (stream_value, _) = sink(&machine);
        let rendered = printed(&machine, environment, stream_value);
        assert!(rendered.starts_with("#<STREAM 0x"), "got {rendered}");
        assert!(rendered.ends_with('>'));
    }

    #[test]
    fn test_cyclic_list_terminates() {
        let (machine, environment) = machine_with_env();
        let value = cell::list(&machine, &[Value::fixnum(1), Value::fixnum(2)]);
        // Tie the tail back to the head.
        let tail = cell::cdr(&machine, value);
        cell::rplacd(&machine, tail, value);

        let rendered = printed(&machine, environment, value);
        assert!(rendered.contains("..."), "got {} chars", rendered.len());
    }
}
