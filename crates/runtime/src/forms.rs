//! Special Forms
//!
//! Operators whose arguments are not pre-evaluated by the applier. Each
//! handler receives the environment and the whole unevaluated cell,
//! operator included; dispatch happens in the evaluator by symbol
//! identity against the machine's registered table.
//!
//! # TAGBODY as a state machine
//!
//! A `TAGBODY` body alternates atoms (tags) and cells (statements). On
//! entry the body is split into segments keyed by their leading tag, with
//! implicit start and end tags bracketing the whole body, and packaged as
//! a property list:
//!
//! - `%SI:TAGBODY-SEQUENCE`: the tags in declaration order;
//! - `%SI:TAGBODY-MAPPING`: tag to statement-list;
//! - `%SI:TAGBODY-NEXT`: the tag to run next.
//!
//! The invocation is pushed on `%SI:*TAGBODY-STACK*` (and noted in
//! `%SI:*TAGBODY-CURRENT*`) in the environment, then segments execute in
//! order. A `(GO tag)` raises a transfer: the innermost invocation whose
//! mapping declares the tag rewrites its own next pointer and keeps
//! running; an invocation that does not declare it pops itself off the
//! stack and lets the transfer keep rising. `TAGBODY` always yields `NIL`.
//!
//! `BLOCK` catches `RETURN-FROM` transfers whose tag is identical to its
//! own; a `NIL` tag (the `RETURN` shorthand) is caught by the nearest
//! block. A transfer no frame catches is fatal at the top level.

use skiff_core::Value;

use crate::eval::{Flow, SpecialFormFn, Transfer, eval};
use crate::machine::Machine;
use crate::{cell, env, plist};

/// Intern the special form symbols into the environment and register
/// their handlers with the machine.
pub fn install(machine: &mut Machine, environment: Value) {
    let symbols = machine.symbols();
    let table: Vec<(Value, SpecialFormFn)> = vec![
        (symbols.and, eval_and),
        (symbols.cond, eval_cond),
        (symbols.define, eval_define),
        (symbols.defun, eval_defun),
        (symbols.if_, eval_if),
        (symbols.lambda, eval_lambda),
        (symbols.or, eval_or),
        (symbols.quote, eval_quote),
        (symbols.block, eval_block),
        (symbols.return_from, eval_return_from),
        (symbols.return_, eval_return),
        (symbols.set, eval_set),
        (symbols.setq, eval_setq),
        (symbols.tagbody, eval_tagbody),
        (symbols.go, eval_go),
    ];
    let tagbody_keys = [
        symbols.tagbody_stack,
        symbols.tagbody_current,
        symbols.tagbody_sequence,
        symbols.tagbody_mapping,
        symbols.tagbody_next,
        symbols.tagbody_start,
        symbols.tagbody_end,
    ];

    for (symbol, handler) in table {
        env::intern(machine, environment, symbol);
        machine.register_special_form(symbol, handler);
    }

    // The stack and current-pointer symbols double as global variables;
    // interning gives them their initial NIL binding. The rest only ever
    // serve as plist keys but live in the environment all the same.
    for key in tagbody_keys {
        env::intern(machine, environment, key);
    }
}

/// `(QUOTE x)`: x, untouched.
fn eval_quote(machine: &Machine, _environment: Value, form: Value) -> Flow {
    Ok(cell::cadr(machine, form))
}

/// `(IF test then [else])`.
fn eval_if(machine: &Machine, environment: Value, form: Value) -> Flow {
    let rest = cell::cdr(machine, form);
    let test = cell::car(machine, rest);
    let tested = eval(machine, environment, test)?;

    if machine.is_truthy(tested) {
        eval(machine, environment, cell::cadr(machine, rest))
    } else {
        let else_rest = cell::cddr(machine, rest);
        if else_rest == machine.nil() {
            Ok(machine.nil())
        } else {
            eval(machine, environment, cell::car(machine, else_rest))
        }
    }
}

/// `(COND (test body…)…)`: first truthy test wins; with an empty body the
/// test's own value is the result.
fn eval_cond(machine: &Machine, environment: Value, form: Value) -> Flow {
    let mut clauses = cell::cdr(machine, form);
    while clauses != machine.nil() {
        let clause = cell::car(machine, clauses);
        let tested = eval(machine, environment, cell::car(machine, clause))?;

        if machine.is_truthy(tested) {
            let mut body = cell::cdr(machine, clause);
            if body == machine.nil() {
                return Ok(tested);
            }
            let mut result = tested;
            while body != machine.nil() {
                result = eval(machine, environment, cell::car(machine, body))?;
                body = cell::cdr(machine, body);
            }
            return Ok(result);
        }

        clauses = cell::cdr(machine, clauses);
    }
    Ok(machine.nil())
}

/// `(AND form…)`: `T` with no forms; otherwise the first `NIL` or the
/// last value.
fn eval_and(machine: &Machine, environment: Value, form: Value) -> Flow {
    let mut rest = cell::cdr(machine, form);
    if rest == machine.nil() {
        return Ok(machine.t());
    }

    let mut result = machine.nil();
    while rest != machine.nil() {
        result = eval(machine, environment, cell::car(machine, rest))?;
        if result == machine.nil() {
            return Ok(machine.nil());
        }
        rest = cell::cdr(machine, rest);
    }
    Ok(result)
}

/// `(OR form…)`: `NIL` with no forms; otherwise the first non-`NIL` or
/// `NIL`.
fn eval_or(machine: &Machine, environment: Value, form: Value) -> Flow {
    let mut rest = cell::cdr(machine, form);
    while rest != machine.nil() {
        let result = eval(machine, environment, cell::car(machine, rest))?;
        if result != machine.nil() {
            return Ok(result);
        }
        rest = cell::cdr(machine, rest);
    }
    Ok(machine.nil())
}

/// `(LAMBDA args body…)`: the form itself; only `apply` consumes it.
fn eval_lambda(_machine: &Machine, _environment: Value, form: Value) -> Flow {
    Ok(form)
}

/// `(SET name-expr value-expr)`: both evaluated; binds the atom's `APVAL`
/// in the current frame. A `NIL` name silently yields `NIL`.
fn eval_set(machine: &Machine, environment: Value, form: Value) -> Flow {
    let rest = cell::cdr(machine, form);
    let name = eval(machine, environment, cell::car(machine, rest))?;
    if name == machine.nil() {
        return Ok(machine.nil());
    }

    let value = eval(machine, environment, cell::cadr(machine, rest))?;
    env::set(
        machine,
        environment,
        name,
        machine.symbols().apval,
        value,
        false,
    );
    Ok(value)
}

/// `(SETQ name value-expr)`: like `SET` with the name taken literally.
fn eval_setq(machine: &Machine, environment: Value, form: Value) -> Flow {
    let rest = cell::cdr(machine, form);
    let name = cell::car(machine, rest);
    let value = eval(machine, environment, cell::cadr(machine, rest))?;
    env::set(
        machine,
        environment,
        name,
        machine.symbols().apval,
        value,
        false,
    );
    Ok(value)
}

/// `(DEFINE name lambda-form)`: the lambda form is stored unevaluated as
/// the symbol's `EXPR`; yields the name.
fn eval_define(machine: &Machine, environment: Value, form: Value) -> Flow {
    let rest = cell::cdr(machine, form);
    let name = cell::car(machine, rest);
    if name == machine.nil() {
        return Ok(machine.nil());
    }

    let function = cell::cadr(machine, rest);
    env::set(
        machine,
        environment,
        name,
        machine.symbols().expr,
        function,
        false,
    );
    Ok(name)
}

/// `(DEFUN name (args…) body…)`: rewritten to
/// `(DEFINE name (LAMBDA (args…) (BLOCK name body…)))` and evaluated.
fn eval_defun(machine: &Machine, environment: Value, form: Value) -> Flow {
    let symbols = machine.symbols();
    let rest = cell::cdr(machine, form);
    let name = cell::car(machine, rest);
    let arguments = cell::cadr(machine, rest);
    let body = cell::cddr(machine, rest);

    let block_form = cell::cons(machine, symbols.block, cell::cons(machine, name, body));
    let lambda_form = cell::list(machine, &[symbols.lambda, arguments, block_form]);
    let define_form = cell::list(machine, &[symbols.define, name, lambda_form]);

    eval(machine, environment, define_form)
}

/// `(BLOCK tag body…)`: body forms in order, yielding the last; catches a
/// `RETURN-FROM` whose tag is identical to its own, or any `RETURN`.
fn eval_block(machine: &Machine, environment: Value, form: Value) -> Flow {
    let rest = cell::cdr(machine, form);
    let block_tag = cell::car(machine, rest);

    let mut result = machine.nil();
    let mut body = cell::cdr(machine, rest);
    while body != machine.nil() {
        match eval(machine, environment, cell::car(machine, body)) {
            Ok(value) => result = value,
            Err(Transfer::ReturnFrom { tag, value })
                if tag == machine.nil() || tag == block_tag =>
            {
                return Ok(value);
            }
            Err(transfer) => return Err(transfer),
        }
        body = cell::cdr(machine, body);
    }
    Ok(result)
}

/// `(RETURN-FROM tag [value])`: the tag is literal, the value form is
/// evaluated; raises a transfer for the matching block.
fn eval_return_from(machine: &Machine, environment: Value, form: Value) -> Flow {
    let rest = cell::cdr(machine, form);
    let tag = cell::car(machine, rest);
    let value = if cell::cdr(machine, rest) == machine.nil() {
        machine.nil()
    } else {
        eval(machine, environment, cell::cadr(machine, rest))?
    };
    Err(Transfer::ReturnFrom { tag, value })
}

/// `(RETURN [value])`: `RETURN-FROM` with a `NIL` tag.
fn eval_return(machine: &Machine, environment: Value, form: Value) -> Flow {
    let rest = cell::cdr(machine, form);
    let value = if rest == machine.nil() {
        machine.nil()
    } else {
        eval(machine, environment, cell::car(machine, rest))?
    };
    Err(Transfer::ReturnFrom {
        tag: machine.nil(),
        value,
    })
}

/// `(GO tag)`: raise a transfer toward the named tag of an active TAGBODY.
fn eval_go(machine: &Machine, _environment: Value, form: Value) -> Flow {
    Err(Transfer::Go(cell::cadr(machine, form)))
}

/// `(TAGBODY form…)`: build the state machine, push it on the active
/// stack, run it. Always `NIL`.
fn eval_tagbody(machine: &Machine, environment: Value, form: Value) -> Flow {
    let state = tagbody_segments(machine, form);
    if state == machine.nil() {
        return Ok(machine.nil());
    }

    tagbody_push(machine, environment, state);
    tagbody_execute(machine, environment, state)?;
    Ok(machine.nil())
}

/// Split a TAGBODY body into the sequence/mapping/next property list.
/// `NIL` when the body contains something that is neither tag nor
/// statement.
fn tagbody_segments(machine: &Machine, form: Value) -> Value {
    let symbols = machine.symbols();

    let mapping = plist::create(
        machine,
        &[cell::cons(machine, symbols.tagbody_start, machine.nil())],
    );
    let mut sequence = cell::ListBuilder::new(machine);
    let mut current_tag = symbols.tagbody_start;
    let mut statements = cell::ListBuilder::new(machine);

    let mut rest = cell::cdr(machine, form);
    while rest != machine.nil() {
        let item = cell::car(machine, rest);
        if item.is_atom() {
            // Close the running segment and start one under this tag.
            let finished = std::mem::replace(&mut statements, cell::ListBuilder::new(machine));
            plist::set(machine, mapping, current_tag, finished.finish());
            sequence.push(machine, current_tag);
            current_tag = item;
        } else if item.is_cell() {
            statements.push(machine, item);
        } else {
            return machine.nil();
        }
        rest = cell::cdr(machine, rest);
    }

    plist::set(machine, mapping, current_tag, statements.finish());
    sequence.push(machine, current_tag);
    plist::set(machine, mapping, symbols.tagbody_end, machine.nil());
    sequence.push(machine, symbols.tagbody_end);

    plist::create(
        machine,
        &[
            cell::cons(machine, symbols.tagbody_mapping, mapping),
            cell::cons(machine, symbols.tagbody_sequence, sequence.finish()),
            cell::cons(machine, symbols.tagbody_next, symbols.tagbody_start),
        ],
    )
}

/// Push an invocation on `%SI:*TAGBODY-STACK*` and point
/// `%SI:*TAGBODY-CURRENT*` at it.
fn tagbody_push(machine: &Machine, environment: Value, state: Value) {
    let symbols = machine.symbols();
    let stack = env::get(
        machine,
        environment,
        symbols.tagbody_stack,
        symbols.apval,
        true,
    );
    let stack = cell::cons(machine, state, stack);
    env::set(
        machine,
        environment,
        symbols.tagbody_stack,
        symbols.apval,
        stack,
        true,
    );
    env::set(
        machine,
        environment,
        symbols.tagbody_current,
        symbols.apval,
        state,
        true,
    );
}

/// Pop an invocation (and anything still stacked above it), leaving the
/// current pointer on the new top.
fn tagbody_pop(machine: &Machine, environment: Value, state: Value) {
    let symbols = machine.symbols();
    let mut rest = env::get(
        machine,
        environment,
        symbols.tagbody_stack,
        symbols.apval,
        true,
    );
    while rest != machine.nil() {
        let top = cell::car(machine, rest);
        rest = cell::cdr(machine, rest);
        if top == state {
            break;
        }
    }
    env::set(
        machine,
        environment,
        symbols.tagbody_stack,
        symbols.apval,
        rest,
        true,
    );
    env::set(
        machine,
        environment,
        symbols.tagbody_current,
        symbols.apval,
        cell::car(machine, rest),
        true,
    );
}

/// Whether this invocation's mapping declares `tag`. Distinguishes a
/// declared tag with no statements from an undeclared tag, which a plain
/// lookup cannot.
fn tagbody_declares(machine: &Machine, mapping: Value, tag: Value) -> bool {
    matches!(
        plist::find_entry(machine, mapping, tag),
        plist::EntrySearch::Found(_)
    )
}

/// The tag following `tag` in declaration order.
fn tagbody_successor(machine: &Machine, sequence: Value, tag: Value) -> Value {
    let mut rest = sequence;
    while rest != machine.nil() {
        if cell::car(machine, rest) == tag {
            return cell::cadr(machine, rest);
        }
        rest = cell::cdr(machine, rest);
    }
    machine.symbols().tagbody_end
}

/// Drive the state machine until it reaches the end tag or a transfer it
/// cannot handle escapes. Either way the invocation leaves the stack.
fn tagbody_execute(machine: &Machine, environment: Value, state: Value) -> Flow {
    let symbols = machine.symbols();
    let sequence = plist::get(machine, state, symbols.tagbody_sequence);
    let mapping = plist::get(machine, state, symbols.tagbody_mapping);

    'segment: loop {
        let current = plist::get(machine, state, symbols.tagbody_next);
        if current == symbols.tagbody_end {
            tagbody_pop(machine, environment, state);
            return Ok(machine.nil());
        }

        let mut statements = plist::get(machine, mapping, current);
        while statements != machine.nil() {
            match eval(machine, environment, cell::car(machine, statements)) {
                Ok(_) => {}
                Err(Transfer::Go(tag)) if tagbody_declares(machine, mapping, tag) => {
                    plist::set(machine, state, symbols.tagbody_next, tag);
                    continue 'segment;
                }
                Err(transfer) => {
                    // Not ours: withdraw from the active stack and let the
                    // transfer keep rising.
                    tagbody_pop(machine, environment, state);
                    return Err(transfer);
                }
            }
            statements = cell::cdr(machine, statements);
        }

        let successor = tagbody_successor(machine, sequence, current);
        plist::set(machine, state, symbols.tagbody_next, successor);
    }
}
