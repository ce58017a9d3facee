//! End-to-end evaluator scenarios
//!
//! Each test hand-assembles the register form of a small function and runs
//! it through the public entry point.

mod common;

use common::{call, FnBuilder};
use peregrine_bytecode::Opcode;
use peregrine_engine::{EvalError, Vm};

/// `add(a, b): return a + b`
fn declare_add(vm: &mut Vm) -> peregrine_runtime::Value {
    let globals = vm.runtime_mut().new_dict();
    let mut f = FnBuilder::new(2, 3);
    let a = f.arg_reg(0);
    let b = f.arg_reg(1);
    let out = f.temp_base();
    f.w.emit_reg(Opcode::BinaryAdd, 0, a, b, out, 0);
    f.w.emit_reg(Opcode::ReturnValue, 0, out, 0, 0, 0);
    f.declare(vm, "add", globals, peregrine_runtime::Value::NULL)
}

#[test]
fn test_arithmetic_call() {
    let mut vm = Vm::new();
    let add = declare_add(&mut vm);

    let a = vm.runtime_mut().new_int(2);
    let b = vm.runtime_mut().new_int(3);
    let r = call(&mut vm, add, vec![a, b]).unwrap();
    assert_eq!(vm.runtime().as_int(r), Some(5));
}

#[test]
fn test_arithmetic_overflow_returns_long() {
    let mut vm = Vm::new();
    let add = declare_add(&mut vm);

    let a = vm.runtime_mut().new_int(i64::MAX);
    let b = vm.runtime_mut().new_int(1);
    let r = call(&mut vm, add, vec![a, b]).unwrap();
    // The fast path refuses; the generic path promotes.
    assert!(vm.runtime().as_int(r).is_none());
    match vm.runtime().repr_of(r).as_str() {
        "9223372036854775808L" => {}
        other => panic!("unexpected overflow result: {other}"),
    }
}

#[test]
fn test_branch_abs() {
    // abs(x): return x if x >= 0 else -x
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();
    let zero = vm.runtime_mut().new_int(0);

    let mut f = FnBuilder::new(1, 4);
    let c0 = f.const_value(zero);
    let x = f.arg_reg(0);
    let cond = f.temp_base();
    let neg = cond + 1;
    // cond = x >= 0
    f.w.emit_reg(Opcode::CompareOp, 5, x, c0, cond, 0);
    let else_branch = f.w.emit_branch_forward(Opcode::PopJumpIfFalse, cond, 0);
    f.w.emit_reg(Opcode::ReturnValue, 0, x, 0, 0, 0);
    f.w.bind(else_branch);
    f.w.emit_reg(Opcode::UnaryNegative, 0, x, neg, 0, 0);
    f.w.emit_reg(Opcode::ReturnValue, 0, neg, 0, 0, 0);
    let abs = f.declare(&mut vm, "abs_", globals, peregrine_runtime::Value::NULL);

    let neg7 = vm.runtime_mut().new_int(-7);
    let r = call(&mut vm, abs, vec![neg7]).unwrap();
    assert_eq!(vm.runtime().as_int(r), Some(7));

    let zero_arg = vm.runtime_mut().new_int(0);
    let r = call(&mut vm, abs, vec![zero_arg]).unwrap();
    assert_eq!(vm.runtime().as_int(r), Some(0));
}

#[test]
fn test_loop_sum_over_range() {
    // sum_to(n): s = 0; for i in range(n): s += i; return s
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();
    let zero = vm.runtime_mut().new_int(0);

    let mut f = FnBuilder::new(1, 10);
    let c0 = f.const_value(zero);
    let range_name = f.name(&mut vm, "range");
    let n = f.arg_reg(0);
    let s = f.temp_base();
    let range_fn = s + 1;
    let n_copy = s + 2;
    let seq = s + 3;
    let it = s + 4;
    let i = s + 5;

    f.w.emit_reg(Opcode::LoadFast, 0, c0, s, 0, 0);
    f.w.emit_reg(Opcode::LoadGlobal, range_name, range_fn, 0, 0, 0);
    f.w.emit_reg(Opcode::LoadFast, 0, n, n_copy, 0, 0);
    f.w.emit_var(Opcode::CallFunction, 1, &[n_copy, range_fn, seq]);
    f.w.emit_reg(Opcode::GetIter, 0, seq, it, 0, 0);
    let loop_head = f.w.position();
    let done = f.w.emit_branch_forward(Opcode::ForIter, it, i);
    f.w.emit_reg(Opcode::InplaceAdd, 0, s, i, s, 0);
    f.w.emit_branch(Opcode::JumpAbsolute, 0, 0, loop_head);
    f.w.bind(done);
    f.w.emit_reg(Opcode::ReturnValue, 0, s, 0, 0, 0);
    let sum_to = f.declare(&mut vm, "sum_to", globals, peregrine_runtime::Value::NULL);

    let ten = vm.runtime_mut().new_int(10);
    let r = call(&mut vm, sum_to, vec![ten]).unwrap();
    assert_eq!(vm.runtime().as_int(r), Some(45));
}

#[test]
fn test_foreign_call_len() {
    // f(xs): return len(xs)
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();

    let mut f = FnBuilder::new(1, 4);
    let len_name = f.name(&mut vm, "len");
    let xs = f.arg_reg(0);
    let len_fn = f.temp_base();
    let xs_copy = len_fn + 1;
    let out = len_fn + 2;
    f.w.emit_reg(Opcode::LoadGlobal, len_name, len_fn, 0, 0, 0);
    f.w.emit_reg(Opcode::LoadFast, 0, xs, xs_copy, 0, 0);
    f.w.emit_var(Opcode::CallFunction, 1, &[xs_copy, len_fn, out]);
    f.w.emit_reg(Opcode::ReturnValue, 0, out, 0, 0, 0);
    let func = f.declare(&mut vm, "f", globals, peregrine_runtime::Value::NULL);

    let a = vm.runtime_mut().new_int(1);
    let b = vm.runtime_mut().new_int(2);
    let c = vm.runtime_mut().new_int(3);
    let xs = vm.runtime_mut().new_list(vec![a, b, c]);
    let r = call(&mut vm, func, vec![xs]).unwrap();
    assert_eq!(vm.runtime().as_int(r), Some(3));
}

#[test]
fn test_nested_in_language_call() {
    // f(x): return x * 2
    // g(x): return f(x) + 1
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();

    let two = vm.runtime_mut().new_int(2);
    let mut f = FnBuilder::new(1, 3);
    let c2 = f.const_value(two);
    let x = f.arg_reg(0);
    let out = f.temp_base();
    f.w.emit_reg(Opcode::BinaryMultiply, 0, x, c2, out, 0);
    f.w.emit_reg(Opcode::ReturnValue, 0, out, 0, 0, 0);
    let inner = f.declare(&mut vm, "f", globals, peregrine_runtime::Value::NULL);
    vm.runtime_mut().dict_set_str(globals, "f", inner).unwrap();

    let one = vm.runtime_mut().new_int(1);
    let mut g = FnBuilder::new(1, 6);
    let c1 = g.const_value(one);
    let f_name = g.name(&mut vm, "f");
    let x = g.arg_reg(0);
    let f_reg = g.temp_base();
    let x_copy = f_reg + 1;
    let inner_out = f_reg + 2;
    let out = f_reg + 3;
    g.w.emit_reg(Opcode::LoadGlobal, f_name, f_reg, 0, 0, 0);
    g.w.emit_reg(Opcode::LoadFast, 0, x, x_copy, 0, 0);
    g.w.emit_var(Opcode::CallFunction, 1, &[x_copy, f_reg, inner_out]);
    g.w.emit_reg(Opcode::BinaryAdd, 0, inner_out, c1, out, 0);
    g.w.emit_reg(Opcode::ReturnValue, 0, out, 0, 0, 0);
    let outer = g.declare(&mut vm, "g", globals, peregrine_runtime::Value::NULL);

    let three = vm.runtime_mut().new_int(3);
    let r = call(&mut vm, outer, vec![three]).unwrap();
    assert_eq!(vm.runtime().as_int(r), Some(7));
}

#[test]
fn test_global_resolution_and_name_error() {
    // h(): return G
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();
    let ten = vm.runtime_mut().new_int(10);
    vm.runtime_mut().dict_set_str(globals, "G", ten).unwrap();

    let mut h = FnBuilder::new(0, 1);
    let g_name = h.name(&mut vm, "G");
    h.w.emit_reg(Opcode::LoadGlobal, g_name, 0, 0, 0, 0);
    h.w.emit_reg(Opcode::ReturnValue, 0, 0, 0, 0, 0);
    let func = h.declare(&mut vm, "h", globals, peregrine_runtime::Value::NULL);

    let r = call(&mut vm, func, vec![]).unwrap();
    assert_eq!(vm.runtime().as_int(r), Some(10));

    // Same code against empty globals: NameError
    let empty_globals = vm.runtime_mut().new_dict();
    let mut h2 = FnBuilder::new(0, 1);
    let g_name = h2.name(&mut vm, "G");
    h2.w.emit_reg(Opcode::LoadGlobal, g_name, 0, 0, 0, 0);
    h2.w.emit_reg(Opcode::ReturnValue, 0, 0, 0, 0, 0);
    let func2 = h2.declare(&mut vm, "h2", empty_globals, peregrine_runtime::Value::NULL);

    match call(&mut vm, func2, vec![]) {
        Err(EvalError::Name(name)) => assert_eq!(name, "G"),
        other => panic!("expected NameError, got {other:?}"),
    }
}

#[test]
fn test_global_falls_back_to_builtins() {
    // The builtins chain resolves `len` even though globals is empty.
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();

    let mut f = FnBuilder::new(0, 1);
    let len_name = f.name(&mut vm, "len");
    f.w.emit_reg(Opcode::LoadGlobal, len_name, 0, 0, 0, 0);
    f.w.emit_reg(Opcode::ReturnValue, 0, 0, 0, 0, 0);
    let func = f.declare(&mut vm, "f", globals, peregrine_runtime::Value::NULL);

    let r = call(&mut vm, func, vec![]).unwrap();
    assert!(vm.runtime().is_foreign_callable(r));
}

#[test]
fn test_comparison_fast_paths() {
    // lt(a, b): return a < b — exercised with ints and floats
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();
    let mut f = FnBuilder::new(2, 3);
    let a = f.arg_reg(0);
    let b = f.arg_reg(1);
    let out = f.temp_base();
    f.w.emit_reg(Opcode::CompareOp, 0, a, b, out, 0);
    f.w.emit_reg(Opcode::ReturnValue, 0, out, 0, 0, 0);
    let lt = f.declare(&mut vm, "lt", globals, peregrine_runtime::Value::NULL);

    let x = vm.runtime_mut().new_int(1);
    let y = vm.runtime_mut().new_int(2);
    let r = call(&mut vm, lt, vec![x, y]).unwrap();
    assert!(vm.runtime().is_true_singleton(r));

    let x = vm.runtime_mut().new_float(2.5);
    let y = vm.runtime_mut().new_float(1.5);
    let r = call(&mut vm, lt, vec![x, y]).unwrap();
    assert!(vm.runtime().is_false_singleton(r));
}

#[test]
fn test_build_tuple_and_list() {
    // pair(a, b): return (a, [b])
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();
    let mut f = FnBuilder::new(2, 7);
    let a = f.arg_reg(0);
    let b = f.arg_reg(1);
    let t = f.temp_base();
    let a_copy = t;
    let b_copy = t + 1;
    let list = t + 2;
    let out = t + 3;
    f.w.emit_reg(Opcode::LoadFast, 0, a, a_copy, 0, 0);
    f.w.emit_reg(Opcode::LoadFast, 0, b, b_copy, 0, 0);
    f.w.emit_var(Opcode::BuildList, 1, &[b_copy, list]);
    f.w.emit_var(Opcode::BuildTuple, 2, &[a_copy, list, out]);
    f.w.emit_reg(Opcode::ReturnValue, 0, out, 0, 0, 0);
    let pair = f.declare(&mut vm, "pair", globals, peregrine_runtime::Value::NULL);

    let x = vm.runtime_mut().new_int(1);
    let y = vm.runtime_mut().new_int(2);
    let r = call(&mut vm, pair, vec![x, y]).unwrap();
    assert_eq!(vm.runtime().tuple_len(r), Some(2));
    assert_eq!(vm.runtime().repr_of(r), "(1, [2])");
}
