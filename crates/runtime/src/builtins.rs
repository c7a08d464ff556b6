//! Built-in Operators
//!
//! The subr set: list manipulation, predicates, fixnum arithmetic and
//! ordering, I/O, and the `EVAL`/`APPLY` pair. Every operator receives the
//! environment and an argument list the applier has already evaluated.
//!
//! Conventions, applied uniformly: signatures are positional, missing
//! arguments read as `NIL` (taking `car` of an exhausted list), extra
//! arguments are ignored, and a mis-typed argument makes the operator
//! yield `NIL` rather than signal. Arithmetic wraps on overflow, and a
//! zero divisor yields `NIL`.
//!
//! One oddity is load-bearing: the empty product `(*)` is `0`, not the
//! customary `1`. Programs rely on it.

use skiff_core::Value;

use crate::eval::{self, Flow, SubrFn};
use crate::machine::Machine;
use crate::{atom, cell, env, io, native, printer, reader, stream, text};

/// Create and register every built-in subr in the environment, under both
/// its `SUBR` and its `PNAME`.
pub fn install(machine: &Machine, environment: Value) {
    let table: &[(&str, SubrFn)] = &[
        ("CAR", subr_car),
        ("CDR", subr_cdr),
        ("CONS", subr_cons),
        ("ATOM", subr_atom),
        ("EQ", subr_eq),
        ("EQUAL", subr_equal),
        ("LIST", subr_list),
        ("NULL", subr_null),
        ("MEMBER", subr_member),
        ("LENGTH", subr_length),
        ("RPLACA", subr_rplaca),
        ("RPLACD", subr_rplacd),
        ("NOT", subr_not),
        ("NUMBERP", subr_numberp),
        ("ZEROP", subr_zerop),
        ("MINUSP", subr_minusp),
        ("STRINGP", subr_stringp),
        ("STREAMP", subr_streamp),
        ("<", subr_less_than),
        ("<=", subr_less_than_or_equal),
        (">", subr_greater_than),
        (">=", subr_greater_than_or_equal),
        ("=", subr_numeric_equal),
        ("+", subr_add),
        ("-", subr_subtract),
        ("*", subr_multiply),
        ("/", subr_divide),
        ("%", subr_remainder),
        ("READ", subr_read),
        ("PRIN1", subr_prin1),
        ("PRINC", subr_princ),
        ("PRINT", subr_print),
        ("TERPRI", subr_terpri),
        ("EVAL", subr_eval),
        ("APPLY", subr_apply),
    ];

    let symbols = machine.symbols();
    for (name, function) in table {
        let symbol = atom::create(machine, name);
        let print_name = text::string_from_str(machine, name);
        let subr = native::subr_create(machine, *function, print_name);
        env::set(machine, environment, symbol, symbols.subr, subr, false);
        env::set(machine, environment, symbol, symbols.pname, print_name, false);
    }
}

#[inline]
fn first(machine: &Machine, arguments: Value) -> Value {
    cell::car(machine, arguments)
}

#[inline]
fn second(machine: &Machine, arguments: Value) -> Value {
    cell::cadr(machine, arguments)
}

/// Decode a fixnum argument, `None` for anything else.
#[inline]
fn fixnum_argument(value: Value) -> Option<i64> {
    value.is_fixnum().then(|| value.as_fixnum())
}

// List operators

fn subr_car(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    Ok(cell::car(machine, first(machine, arguments)))
}

fn subr_cdr(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    Ok(cell::cdr(machine, first(machine, arguments)))
}

fn subr_cons(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    Ok(cell::cons(
        machine,
        first(machine, arguments),
        second(machine, arguments),
    ))
}

/// `LIST` is the identity on its already-evaluated argument list.
fn subr_list(_machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    Ok(arguments)
}

fn subr_rplaca(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    Ok(cell::rplaca(
        machine,
        first(machine, arguments),
        second(machine, arguments),
    ))
}

fn subr_rplacd(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    Ok(cell::rplacd(
        machine,
        first(machine, arguments),
        second(machine, arguments),
    ))
}

fn subr_length(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    let mut length: i64 = 0;
    let mut rest = first(machine, arguments);
    while rest != machine.nil() {
        length += 1;
        rest = cell::cdr(machine, rest);
    }
    Ok(Value::fixnum(length))
}

/// Membership by structural equivalence; yields `T` or `NIL`, never the
/// tail.
fn subr_member(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    let needle = first(machine, arguments);
    let mut rest = second(machine, arguments);
    while rest != machine.nil() {
        if machine.equal(needle, cell::car(machine, rest)) {
            return Ok(machine.t());
        }
        rest = cell::cdr(machine, rest);
    }
    Ok(machine.nil())
}

// Predicates

fn subr_atom(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    Ok(machine.truth(first(machine, arguments).is_atom()))
}

fn subr_null(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    Ok(machine.truth(first(machine, arguments) == machine.nil()))
}

/// `NOT` and `NULL` coincide: `NIL` is the sole falsehood.
fn subr_not(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    subr_null(machine, _environment, arguments)
}

fn subr_numberp(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    Ok(machine.truth(first(machine, arguments).is_fixnum()))
}

fn subr_zerop(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    match fixnum_argument(first(machine, arguments)) {
        Some(n) => Ok(machine.truth(n == 0)),
        None => Ok(machine.nil()),
    }
}

fn subr_minusp(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    match fixnum_argument(first(machine, arguments)) {
        Some(n) => Ok(machine.truth(n < 0)),
        None => Ok(machine.nil()),
    }
}

fn subr_stringp(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    Ok(machine.truth(first(machine, arguments).is_string()))
}

fn subr_streamp(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    Ok(machine.truth(first(machine, arguments).is_stream()))
}

fn subr_eq(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    Ok(machine.truth(first(machine, arguments) == second(machine, arguments)))
}

fn subr_equal(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    Ok(machine.truth(machine.equal(
        first(machine, arguments),
        second(machine, arguments),
    )))
}

// Fixnum arithmetic

/// `+`: variadic with identity 0.
fn subr_add(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    let mut sum: i64 = 0;
    let mut rest = arguments;
    while rest != machine.nil() {
        let Some(n) = fixnum_argument(cell::car(machine, rest)) else {
            return Ok(machine.nil());
        };
        sum = sum.wrapping_add(n);
        rest = cell::cdr(machine, rest);
    }
    Ok(Value::fixnum(sum))
}

/// `-`: unary negation, or left-folded subtraction.
fn subr_subtract(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    let Some(head) = fixnum_argument(first(machine, arguments)) else {
        return Ok(machine.nil());
    };

    let mut rest = cell::cdr(machine, arguments);
    if rest == machine.nil() {
        return Ok(Value::fixnum(head.wrapping_neg()));
    }

    let mut accumulator = head;
    while rest != machine.nil() {
        let Some(n) = fixnum_argument(cell::car(machine, rest)) else {
            return Ok(machine.nil());
        };
        accumulator = accumulator.wrapping_sub(n);
        rest = cell::cdr(machine, rest);
    }
    Ok(Value::fixnum(accumulator))
}

/// `*`: variadic, folded from the first argument, except that the empty
/// product is `0` rather than the customary `1`.
fn subr_multiply(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    if arguments == machine.nil() {
        return Ok(Value::fixnum(0));
    }

    let Some(head) = fixnum_argument(first(machine, arguments)) else {
        return Ok(machine.nil());
    };

    let mut product = head;
    let mut rest = cell::cdr(machine, arguments);
    while rest != machine.nil() {
        let Some(n) = fixnum_argument(cell::car(machine, rest)) else {
            return Ok(machine.nil());
        };
        product = product.wrapping_mul(n);
        rest = cell::cdr(machine, rest);
    }
    Ok(Value::fixnum(product))
}

/// `/`: binary integer division; `NIL` on a zero divisor.
fn subr_divide(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    let (Some(x), Some(y)) = (
        fixnum_argument(first(machine, arguments)),
        fixnum_argument(second(machine, arguments)),
    ) else {
        return Ok(machine.nil());
    };
    if y == 0 {
        return Ok(machine.nil());
    }
    Ok(Value::fixnum(x.wrapping_div(y)))
}

/// `%`: binary remainder; `NIL` on a zero divisor.
fn subr_remainder(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    let (Some(x), Some(y)) = (
        fixnum_argument(first(machine, arguments)),
        fixnum_argument(second(machine, arguments)),
    ) else {
        return Ok(machine.nil());
    };
    if y == 0 {
        return Ok(machine.nil());
    }
    Ok(Value::fixnum(x.wrapping_rem(y)))
}

// Fixnum ordering

fn compare(machine: &Machine, arguments: Value, satisfied: fn(i64, i64) -> bool) -> Flow {
    let (Some(x), Some(y)) = (
        fixnum_argument(first(machine, arguments)),
        fixnum_argument(second(machine, arguments)),
    ) else {
        return Ok(machine.nil());
    };
    Ok(machine.truth(satisfied(x, y)))
}

fn subr_less_than(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    compare(machine, arguments, |x, y| x < y)
}

fn subr_less_than_or_equal(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    compare(machine, arguments, |x, y| x <= y)
}

fn subr_greater_than(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    compare(machine, arguments, |x, y| x > y)
}

fn subr_greater_than_or_equal(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    compare(machine, arguments, |x, y| x >= y)
}

fn subr_numeric_equal(machine: &Machine, _environment: Value, arguments: Value) -> Flow {
    compare(machine, arguments, |x, y| x == y)
}

// I/O

/// `(READ [stream])`: one object from the designated input.
fn subr_read(machine: &Machine, environment: Value, arguments: Value) -> Flow {
    Ok(reader::read(machine, environment, first(machine, arguments)))
}

/// `(PRIN1 obj [stream])`: print with readable quoting; yields the object.
fn subr_prin1(machine: &Machine, environment: Value, arguments: Value) -> Flow {
    let object = first(machine, arguments);
    printer::print(machine, environment, second(machine, arguments), object);
    Ok(object)
}

/// `(PRINC obj [stream])`: print with readable quoting off.
fn subr_princ(machine: &Machine, environment: Value, arguments: Value) -> Flow {
    let object = first(machine, arguments);
    printer::print_plain(machine, environment, second(machine, arguments), object);
    Ok(object)
}

/// `(PRINT obj [stream])`: a newline, the object, a trailing space.
fn subr_print(machine: &Machine, environment: Value, arguments: Value) -> Flow {
    let object = first(machine, arguments);
    let designator = second(machine, arguments);

    let output = io::output_stream(machine, environment, designator);
    stream::write_str(machine, output, "\n");
    printer::print(machine, environment, designator, object);
    stream::write_str(machine, output, " ");
    Ok(object)
}

/// `(TERPRI [stream])`: a newline.
fn subr_terpri(machine: &Machine, environment: Value, arguments: Value) -> Flow {
    let output = io::output_stream(machine, environment, first(machine, arguments));
    stream::write_str(machine, output, "\n");
    Ok(machine.nil())
}

// Meta

fn subr_eval(machine: &Machine, environment: Value, arguments: Value) -> Flow {
    let form = first(machine, arguments);
    if form == machine.nil() {
        return Ok(machine.nil());
    }
    eval::eval(machine, environment, form)
}

/// `(APPLY fn args)`: the function must be a subr or a lambda cell.
fn subr_apply(machine: &Machine, environment: Value, arguments: Value) -> Flow {
    let function = first(machine, arguments);
    if !function.is_subr() && !function.is_cell() {
        return Ok(machine.nil());
    }
    eval::apply(machine, environment, function, second(machine, arguments))
}
