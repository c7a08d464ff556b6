//! The Evaluator and Applier
//!
//! `eval` dispatches on the tag of the form: atoms are symbol lookups,
//! cells are operator applications (or special forms), and everything else
//! evaluates to itself.
//!
//! An atom resolves to, in order, its `SUBR`, its `EXPR`, or its `APVAL`;
//! an atom with none of these evaluates to `NIL`.
//!
//! A cell whose head names a registered special form is handed over
//! unevaluated. Otherwise the head resolves to a callable, the rest of the
//! cell is evaluated left to right into a fresh argument list, and the
//! callable is applied: a lambda cell binds its parameters positionally in
//! a child environment and evaluates its body; a subr receives the
//! environment and the evaluated arguments directly.
//!
//! # Control transfer
//!
//! `GO` and `RETURN-FROM` are not errors; they are transfers that unwind
//! the evaluator until a matching `TAGBODY` or `BLOCK` frame catches them.
//! They ride the error channel of [`Flow`], so ordinary `?` propagation
//! releases every intermediate argument list and child environment on the
//! way out, and an unmatched transfer surfaces to the driver, where it is
//! fatal.

use skiff_core::{Tag, Value};

use crate::machine::Machine;
use crate::{cell, env, native, plist};

/// A nonlocal control transfer in flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transfer {
    /// `(GO tag)`: heading for the named tag of an active TAGBODY.
    Go(Value),
    /// `(RETURN-FROM tag value)`: heading for the BLOCK with this tag.
    /// A `NIL` tag matches the nearest block.
    ReturnFrom { tag: Value, value: Value },
}

impl std::fmt::Display for Transfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transfer::Go(_) => write!(f, "GO transfer escaped every active TAGBODY"),
            Transfer::ReturnFrom { .. } => {
                write!(f, "RETURN-FROM transfer escaped every enclosing BLOCK")
            }
        }
    }
}

impl std::error::Error for Transfer {}

/// Evaluation either produces a value or is interrupted by a transfer.
pub type Flow = Result<Value, Transfer>;

/// A primitive operator: environment plus already-evaluated arguments.
pub type SubrFn = fn(&Machine, Value, Value) -> Flow;

/// A special form handler: environment plus the whole unevaluated cell,
/// operator included.
pub type SpecialFormFn = fn(&Machine, Value, Value) -> Flow;

/// Evaluate a form in an environment.
pub fn eval(machine: &Machine, environment: Value, form: Value) -> Flow {
    match form.tag() {
        Tag::Atom => Ok(eval_atom(machine, environment, form)),
        Tag::Cell => eval_cell(machine, environment, form),
        _ => Ok(form),
    }
}

/// Resolve an atom as a symbol: `SUBR`, then `EXPR`, then `APVAL`, each
/// checked against `NIL`; an absent or empty symbol is `NIL`.
fn eval_atom(machine: &Machine, environment: Value, atom: Value) -> Value {
    let entry = env::find_symbol(machine, environment, atom, true);
    let attributes = cell::cdr(machine, entry);
    if entry == machine.nil() || attributes == machine.nil() {
        return machine.nil();
    }

    let symbols = machine.symbols();
    let subr = plist::get(machine, attributes, symbols.subr);
    if subr != machine.nil() {
        return subr;
    }
    let expr = plist::get(machine, attributes, symbols.expr);
    if expr != machine.nil() {
        return expr;
    }
    let apval = plist::get(machine, attributes, symbols.apval);
    if apval != machine.nil() {
        return apval;
    }
    machine.nil()
}

/// Evaluate a cell: special form, atom-headed application, cell-headed
/// application, or `NIL` for anything else.
fn eval_cell(machine: &Machine, environment: Value, form: Value) -> Flow {
    let head = cell::car(machine, form);

    if head.is_atom() {
        if let Some(special_form) = machine.special_form_for(head) {
            return special_form(machine, environment, form);
        }
        let function = eval_atom(machine, environment, head);
        if function == machine.nil() {
            return Ok(machine.nil());
        }
        let arguments = eval_argument_list(machine, environment, cell::cdr(machine, form))?;
        apply(machine, environment, function, arguments)
    } else if head.is_cell() {
        let function = eval_cell(machine, environment, head)?;
        let arguments = eval_argument_list(machine, environment, cell::cdr(machine, form))?;
        apply(machine, environment, function, arguments)
    } else {
        Ok(machine.nil())
    }
}

/// Evaluate each element of a list left to right into a fresh list.
fn eval_argument_list(machine: &Machine, environment: Value, list: Value) -> Flow {
    if !list.is_cell() {
        return Ok(machine.nil());
    }

    let mut arguments = cell::ListBuilder::new(machine);
    let mut rest = list;
    while rest != machine.nil() {
        let argument = eval(machine, environment, cell::car(machine, rest))?;
        arguments.push(machine, argument);
        rest = cell::cdr(machine, rest);
    }
    Ok(arguments.finish())
}

/// Apply a callable to an already-evaluated argument list.
pub fn apply(machine: &Machine, environment: Value, function: Value, arguments: Value) -> Flow {
    if function.is_cell() {
        apply_lambda(machine, environment, function, arguments)
    } else if function.is_subr() {
        native::subr_call(machine, function, environment, arguments)
    } else {
        Ok(machine.nil())
    }
}

/// Apply a `(LAMBDA lambda-list body…)` cell: bind parameters in a child
/// environment, then evaluate the body forms, returning the last.
fn apply_lambda(machine: &Machine, environment: Value, function: Value, arguments: Value) -> Flow {
    let application_environment = env::create(machine, environment);

    let rest = cell::cdr(machine, function);
    let variables = cell::car(machine, rest);
    if !bind_variables(machine, application_environment, variables, arguments) {
        return Ok(machine.nil());
    }

    let mut result = machine.nil();
    let mut body = cell::cdr(machine, rest);
    while body != machine.nil() {
        result = eval(machine, application_environment, cell::car(machine, body))?;
        body = cell::cdr(machine, body);
    }
    Ok(result)
}

/// Bind lambda-list names to values pairwise in the given frame, shadowing
/// any outer bindings. False when the lists have different lengths.
pub(crate) fn bind_variables(
    machine: &Machine,
    environment: Value,
    variables: Value,
    values: Value,
) -> bool {
    let apval = machine.symbols().apval;

    let mut variables_rest = variables;
    let mut values_rest = values;
    while variables_rest != machine.nil() && values_rest != machine.nil() {
        let variable = cell::car(machine, variables_rest);
        let value = cell::car(machine, values_rest);
        env::set(machine, environment, variable, apval, value, false);

        variables_rest = cell::cdr(machine, variables_rest);
        values_rest = cell::cdr(machine, values_rest);
    }

    // Arity mismatch leaves one list with cells remaining.
    variables_rest == values_rest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MachineConfig;
    use crate::{atom, text};

    fn machine_with_env() -> (Machine, Value) {
        let mut machine = Machine::new(MachineConfig::new());
        let environment = env::create_root(&mut machine);
        (machine, environment)
    }

    #[test]
    fn test_self_evaluating_values() {
        let (machine, environment) = machine_with_env();

        let fixnum = Value::fixnum(7);
        assert_eq!(eval(&machine, environment, fixnum).unwrap(), fixnum);

        let ch = Value::char(b'A' as u32);
        assert_eq!(eval(&machine, environment, ch).unwrap(), ch);

        let string = text::string_from_str(&machine, "S");
        assert_eq!(eval(&machine, environment, string).unwrap(), string);
    }

    #[test]
    fn test_unknown_atom_evaluates_to_nil() {
        let (machine, environment) = machine_with_env();
        let unknown = atom::create(&machine, "UNKNOWN");
        assert_eq!(eval(&machine, environment, unknown).unwrap(), machine.nil());
    }

    #[test]
    fn test_known_atom_evaluates_to_its_apval() {
        let (machine, environment) = machine_with_env();
        let t = atom::create(&machine, "T");
        assert_eq!(eval(&machine, environment, t).unwrap(), machine.t());
    }

    #[test]
    fn test_subr_wins_over_apval() {
        let (machine, environment) = machine_with_env();
        let symbols = machine.symbols();
        let name = atom::create(&machine, "X");

        fn stub(machine: &Machine, _environment: Value, _arguments: Value) -> Flow {
            Ok(machine.nil())
        }
        let subr = native::subr_create(&machine, stub, text::string_from_str(&machine, "X"));
        env::set(&machine, environment, name, symbols.apval, machine.t(), false);
        env::set(&machine, environment, name, symbols.subr, subr, false);

        assert_eq!(eval(&machine, environment, name).unwrap(), subr);
    }

    #[test]
    fn test_head_with_no_binding_yields_nil() {
        let (machine, environment) = machine_with_env();
        let missing = atom::create(&machine, "NO-SUCH-FN");
        let form = cell::list(&machine, &[missing, Value::fixnum(1)]);
        assert_eq!(eval(&machine, environment, form).unwrap(), machine.nil());
    }

    #[test]
    fn test_lambda_application() {
        let (machine, environment) = machine_with_env();
        let symbols = machine.symbols();

        // ((LAMBDA (V) V) 9)
        let v = atom::create(&machine, "V");
        let lambda = cell::list(
            &machine,
            &[symbols.lambda, cell::list(&machine, &[v]), v],
        );
        let form = cell::list(&machine, &[lambda, Value::fixnum(9)]);

        assert_eq!(eval(&machine, environment, form).unwrap(), Value::fixnum(9));
    }

    #[test]
    fn test_lambda_arity_mismatch_yields_nil() {
        let (machine, environment) = machine_with_env();
        let symbols = machine.symbols();

        let v = atom::create(&machine, "V");
        let lambda = cell::list(
            &machine,
            &[symbols.lambda, cell::list(&machine, &[v]), v],
        );
        let form = cell::list(&machine, &[lambda, Value::fixnum(1), Value::fixnum(2)]);

        assert_eq!(eval(&machine, environment, form).unwrap(), machine.nil());
    }

    #[test]
    fn test_lambda_binding_shadows_and_unwinds() {
        let (machine, environment) = machine_with_env();
        let symbols = machine.symbols();

        let v = atom::create(&machine, "V");
        env::set(&machine, environment, v, symbols.apval, Value::fixnum(1), false);

        let lambda = cell::list(
            &machine,
            &[symbols.lambda, cell::list(&machine, &[v]), v],
        );
        let form = cell::list(&machine, &[lambda, Value::fixnum(2)]);
        assert_eq!(eval(&machine, environment, form).unwrap(), Value::fixnum(2));

        // The outer binding is untouched once the application returns.
        assert_eq!(eval(&machine, environment, v).unwrap(), Value::fixnum(1));
    }

    #[test]
    fn test_arguments_evaluate_left_to_right() {
        let (machine, environment) = machine_with_env();

        // In (LIST (SETQ X 1) X) the second argument sees the first's
        // side effect.
        let x = atom::create(&machine, "X");
        let setq_form = cell::list(&machine, &[machine.symbols().setq, x, Value::fixnum(1)]);
        let list_atom = atom::create(&machine, "LIST");
        let form = cell::list(&machine, &[list_atom, setq_form, x]);

        let result = eval(&machine, environment, form).unwrap();
        assert_eq!(cell::car(&machine, result), Value::fixnum(1));
        assert_eq!(cell::cadr(&machine, result), Value::fixnum(1));
    }

    #[test]
    fn test_cell_headed_application() {
        let (machine, environment) = machine_with_env();
        let symbols = machine.symbols();

        // ((LAMBDA (F) (F 4)) ...) is exercised elsewhere; here the head
        // itself is a lambda cell.
        let v = atom::create(&machine, "V");
        let lambda = cell::list(
            &machine,
            &[symbols.lambda, cell::list(&machine, &[v]), v],
        );
        let form = cell::list(&machine, &[lambda, Value::fixnum(3)]);
        assert_eq!(eval(&machine, environment, form).unwrap(), Value::fixnum(3));
    }

    #[test]
    fn test_apply_non_callable_yields_nil() {
        let (machine, environment) = machine_with_env();
        let result = apply(
            &machine,
            environment,
            Value::fixnum(5),
            machine.nil(),
        );
        assert_eq!(result.unwrap(), machine.nil());
    }
}
