//! Reference-count discipline observed from outside the evaluator
//!
//! These tests pin the frame invariants: registers are released on every
//! exit path, moves transfer rather than duplicate references, and the
//! returned value carries exactly one evaluator-contributed reference.

mod common;

use common::{call, FnBuilder};
use peregrine_bytecode::Opcode;
use peregrine_engine::{EvalError, EvalOptions, Vm};
use peregrine_runtime::Value;

/// `id(x): return x` via a LOAD_FAST + STORE_FAST shuffle
fn declare_id(vm: &mut Vm, globals: Value) -> Value {
    let mut f = FnBuilder::new(1, 3);
    let x = f.arg_reg(0);
    let t1 = f.temp_base();
    let t2 = t1 + 1;
    f.w.emit_reg(Opcode::LoadFast, 0, x, t1, 0, 0);
    f.w.emit_reg(Opcode::StoreFast, 0, t1, t2, 0, 0);
    f.w.emit_reg(Opcode::ReturnValue, 0, t2, 0, 0, 0);
    f.declare(vm, "id", globals, Value::NULL)
}

#[test]
fn test_move_shuffle_is_refcount_neutral() {
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();
    let id = declare_id(&mut vm, globals);

    let x = vm.runtime_mut().new_int(99);
    vm.runtime_mut().incref(x); // keep a handle across the call
    let tuple = vm.runtime_mut().new_tuple(vec![x]);
    let before = vm.runtime().refcount(x);

    let r = vm.eval(id, tuple).unwrap();
    assert_eq!(r, x);

    // One extra reference: the returned value itself.
    assert_eq!(vm.runtime().refcount(x), before + 1);
    vm.runtime_mut().decref(r);
    assert_eq!(vm.runtime().refcount(x), before);
    vm.runtime_mut().decref(tuple);
}

#[test]
fn test_normal_return_releases_all_registers() {
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();
    let id = declare_id(&mut vm, globals);

    let x = vm.runtime_mut().new_int(5);
    let tuple = vm.runtime_mut().new_tuple(vec![x]);
    let baseline = vm.runtime().live_objects();

    let r = vm.eval(id, tuple).unwrap();
    vm.runtime_mut().decref(r);
    // Everything the frame touched is gone again.
    assert_eq!(vm.runtime().live_objects(), baseline);
}

#[test]
fn test_error_return_releases_all_registers() {
    // boom(a): t = [a]; return a + "x"  — fails after allocating
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();
    let bad = vm.runtime_mut().new_str("x");

    let mut f = FnBuilder::new(1, 5);
    let c_bad = f.const_value(bad);
    let a = f.arg_reg(0);
    let t = f.temp_base();
    let a_copy = t;
    let list = t + 1;
    let out = t + 2;
    f.w.emit_reg(Opcode::LoadFast, 0, a, a_copy, 0, 0);
    f.w.emit_var(Opcode::BuildList, 1, &[a_copy, list]);
    f.w.emit_reg(Opcode::BinaryAdd, 0, a, c_bad, out, 0);
    f.w.emit_reg(Opcode::ReturnValue, 0, out, 0, 0, 0);
    let boom = f.declare(&mut vm, "boom", globals, Value::NULL);

    let x = vm.runtime_mut().new_int(1);
    let tuple = vm.runtime_mut().new_tuple(vec![x]);
    let baseline = vm.runtime().live_objects();

    match vm.eval(boom, tuple) {
        Err(EvalError::Host(_)) => {}
        other => panic!("expected host error, got {other:?}"),
    }
    // The list temporary and the copies died with the frame.
    assert_eq!(vm.runtime().live_objects(), baseline);
}

#[test]
fn test_build_list_moves_element_references() {
    // wrap(a): return [a, a]
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();

    let mut f = FnBuilder::new(1, 4);
    let a = f.arg_reg(0);
    let t = f.temp_base();
    let c1 = t;
    let c2 = t + 1;
    let out = t + 2;
    f.w.emit_reg(Opcode::LoadFast, 0, a, c1, 0, 0);
    f.w.emit_reg(Opcode::LoadFast, 0, a, c2, 0, 0);
    f.w.emit_var(Opcode::BuildList, 2, &[c1, c2, out]);
    f.w.emit_reg(Opcode::ReturnValue, 0, out, 0, 0, 0);
    let wrap = f.declare(&mut vm, "wrap", globals, Value::NULL);

    let x = vm.runtime_mut().new_int(7);
    vm.runtime_mut().incref(x);
    let tuple = vm.runtime_mut().new_tuple(vec![x]);
    let before = vm.runtime().refcount(x);

    let r = vm.eval(wrap, tuple).unwrap();
    // Two list slots, each holding its own reference
    assert_eq!(vm.runtime().refcount(x), before + 2);

    vm.runtime_mut().decref(r);
    assert_eq!(vm.runtime().refcount(x), before);
    vm.runtime_mut().decref(tuple);
}

#[test]
fn test_incref_decref_pair_is_neutral() {
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();

    let mut f = FnBuilder::new(1, 1);
    let x = f.arg_reg(0);
    f.w.emit_reg(Opcode::Incref, 0, x, 0, 0, 0);
    f.w.emit_reg(Opcode::Decref, 0, x, 0, 0, 0);
    f.w.emit_reg(Opcode::ReturnValue, 0, x, 0, 0, 0);
    let func = f.declare(&mut vm, "balanced", globals, Value::NULL);

    let x = vm.runtime_mut().new_int(3);
    vm.runtime_mut().incref(x);
    let tuple = vm.runtime_mut().new_tuple(vec![x]);
    let before = vm.runtime().refcount(x);

    let r = vm.eval(func, tuple).unwrap();
    vm.runtime_mut().decref(r);
    assert_eq!(vm.runtime().refcount(x), before);
    vm.runtime_mut().decref(tuple);
}

#[test]
fn test_unsupported_opcode_is_named() {
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();

    let mut f = FnBuilder::new(0, 1);
    f.w.emit_reg(Opcode::YieldValue, 0, 0, 0, 0, 0);
    let func = f.declare(&mut vm, "gen", globals, Value::NULL);

    match call(&mut vm, func, vec![]) {
        Err(EvalError::Unsupported(msg)) => assert!(msg.contains("YIELD_VALUE")),
        other => panic!("expected unsupported-feature error, got {other:?}"),
    }
}

#[test]
fn test_instruction_limit_guard() {
    let mut vm = Vm::with_options(EvalOptions {
        instruction_limit: 1_000,
    });
    let globals = vm.runtime_mut().new_dict();

    let mut f = FnBuilder::new(0, 1);
    let head = f.w.position();
    f.w.emit_branch(Opcode::JumpAbsolute, 0, 0, head);
    let spin = f.declare(&mut vm, "spin", globals, Value::NULL);

    assert!(matches!(
        call(&mut vm, spin, vec![]),
        Err(EvalError::LimitExceeded)
    ));
}

#[test]
fn test_branch_outside_buffer_is_fatal() {
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();

    let mut f = FnBuilder::new(0, 1);
    f.w.emit_branch(Opcode::JumpAbsolute, 0, 0, 0xFFFF);
    let func = f.declare(&mut vm, "wild", globals, Value::NULL);

    assert!(matches!(
        call(&mut vm, func, vec![]),
        Err(EvalError::Invariant(_))
    ));
}

#[test]
fn test_idempotent_evaluation() {
    // Running the same compiled function twice with equal inputs produces
    // equal outputs.
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();
    let id = declare_id(&mut vm, globals);

    let x = vm.runtime_mut().new_str("payload");
    let r1 = call(&mut vm, id, vec![x]).unwrap();
    let y = vm.runtime_mut().new_str("payload");
    let r2 = call(&mut vm, id, vec![y]).unwrap();
    assert_eq!(vm.runtime().str_of(r1), vm.runtime().str_of(r2));
}
