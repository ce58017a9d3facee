//! Native builtin functions
//!
//! The builtins dictionary is the last stop of the evaluator's name
//! resolution. Everything here is a plain function pointer with the
//! [`NativeFn`](crate::object::NativeFn) signature; all of them are foreign
//! callables from the evaluator's point of view.

use crate::object::Obj;
use crate::value::Value;
use crate::{RtResult, Runtime, RuntimeError};
use std::cmp::Ordering;

/// Populate the runtime's builtins dictionary.
pub(crate) fn install(rt: &mut Runtime) {
    let builtins = rt.builtins_handle();
    let entries: &[(&'static str, crate::object::NativeFn)] = &[
        ("len", builtin_len),
        ("range", builtin_range),
        ("abs", builtin_abs),
        ("min", builtin_min),
        ("max", builtin_max),
    ];
    for &(name, func) in entries {
        let v = rt.new_native(name, func);
        rt.dict_set_str(builtins, name, v)
            .expect("builtins dictionary rejected an entry");
        rt.decref(v);
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> RtResult<()> {
    if args.len() < min || args.len() > max {
        return Err(RuntimeError::Type(format!(
            "{name}() takes {min} to {max} arguments ({} given)",
            args.len()
        )));
    }
    Ok(())
}

fn builtin_len(rt: &mut Runtime, args: &[Value]) -> RtResult<Value> {
    arity("len", args, 1, 1)?;
    let n = match rt.heap().get(args[0]) {
        Obj::Str(s) => s.chars().count(),
        Obj::Tuple(items) | Obj::List(items) => items.len(),
        Obj::Dict(map) => map.len(),
        other => {
            return Err(RuntimeError::Type(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    Ok(rt.new_int(n as i64))
}

/// Eager range: produces a list of machine integers, which is also what the
/// iteration fast path wants to walk.
fn builtin_range(rt: &mut Runtime, args: &[Value]) -> RtResult<Value> {
    arity("range", args, 1, 3)?;
    let index = |rt: &Runtime, v: Value| {
        rt.as_index(v).ok_or_else(|| {
            RuntimeError::Type(format!(
                "range() integer argument expected, got {}",
                rt.type_name(v)
            ))
        })
    };
    let (start, stop, step) = match args.len() {
        1 => (0, index(rt, args[0])?, 1),
        2 => (index(rt, args[0])?, index(rt, args[1])?, 1),
        _ => (
            index(rt, args[0])?,
            index(rt, args[1])?,
            index(rt, args[2])?,
        ),
    };
    if step == 0 {
        return Err(RuntimeError::Value("range() step argument must not be zero".into()));
    }

    let mut items = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        items.push(rt.new_int(i));
        i += step;
    }
    Ok(rt.new_list(items))
}

fn builtin_abs(rt: &mut Runtime, args: &[Value]) -> RtResult<Value> {
    arity("abs", args, 1, 1)?;
    let v = args[0];
    match rt.heap().get(v) {
        Obj::Int(n) => {
            let n = *n;
            match n.checked_abs() {
                Some(r) => Ok(rt.new_int(r)),
                None => Ok(rt.new_long(-num_bigint::BigInt::from(n))),
            }
        }
        Obj::Long(n) => {
            let n = num_traits::Signed::abs(n);
            Ok(rt.new_long(n))
        }
        Obj::Float(f) => {
            let f = *f;
            Ok(rt.new_float(f.abs()))
        }
        Obj::Bool(b) => {
            let b = *b;
            Ok(rt.new_int(b as i64))
        }
        other => Err(RuntimeError::Type(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))),
    }
}

fn extremum(rt: &mut Runtime, name: &str, args: &[Value], keep: Ordering) -> RtResult<Value> {
    if args.is_empty() {
        return Err(RuntimeError::Type(format!(
            "{name}() expected at least 1 argument"
        )));
    }
    // A single sequence argument means "over its elements".
    let candidates: Vec<Value> = if args.len() == 1 {
        match rt.heap().get(args[0]) {
            Obj::List(items) | Obj::Tuple(items) => {
                if items.is_empty() {
                    return Err(RuntimeError::Value(format!("{name}() arg is an empty sequence")));
                }
                items.clone()
            }
            _ => args.to_vec(),
        }
    } else {
        args.to_vec()
    };

    let mut best = candidates[0];
    for &v in &candidates[1..] {
        if rt.value_ordering(v, best)? == keep {
            best = v;
        }
    }
    rt.incref(best);
    Ok(best)
}

fn builtin_min(rt: &mut Runtime, args: &[Value]) -> RtResult<Value> {
    extremum(rt, "min", args, Ordering::Less)
}

fn builtin_max(rt: &mut Runtime, args: &[Value]) -> RtResult<Value> {
    extremum(rt, "max", args, Ordering::Greater)
}

/// `list.append` bound-method target; receiver is the first argument.
pub(crate) fn list_append_method(rt: &mut Runtime, args: &[Value]) -> RtResult<Value> {
    arity("append", args, 2, 2)?;
    rt.list_append(args[0], args[1])?;
    Ok(rt.none_value())
}

/// `file.write` bound-method target; receiver is the first argument.
pub(crate) fn file_write_method(rt: &mut Runtime, args: &[Value]) -> RtResult<Value> {
    arity("write", args, 2, 2)?;
    let text = rt.str_of(args[1]);
    rt.file_write_str(args[0], &text)?;
    Ok(rt.none_value())
}
