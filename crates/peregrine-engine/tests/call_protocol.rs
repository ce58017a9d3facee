//! Call-protocol behaviour: defaults, arity, bound methods, keyword calls
//! and the lazy translation path

mod common;

use common::{call, FnBuilder};
use peregrine_bytecode::{CodeWriter, Opcode};
use peregrine_engine::{EvalError, RegisterCode, Vm};
use peregrine_runtime::{RuntimeError, Value};

/// `f(a, b): return a + b`
fn declare_add2(vm: &mut Vm, globals: Value, defaults: Value) -> Value {
    let mut f = FnBuilder::new(2, 3);
    let a = f.arg_reg(0);
    let b = f.arg_reg(1);
    let out = f.temp_base();
    f.w.emit_reg(Opcode::BinaryAdd, 0, a, b, out, 0);
    f.w.emit_reg(Opcode::ReturnValue, 0, out, 0, 0, 0);
    f.declare(vm, "f", globals, defaults)
}

#[test]
fn test_defaults_bind_missing_trailing_args() {
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();
    let five = vm.runtime_mut().new_int(5);
    let defaults = vm.runtime_mut().new_tuple(vec![five]);
    let f = declare_add2(&mut vm, globals, defaults);

    let one = vm.runtime_mut().new_int(1);
    let r = call(&mut vm, f, vec![one]).unwrap();
    assert_eq!(vm.runtime().as_int(r), Some(6));

    let one = vm.runtime_mut().new_int(1);
    let two = vm.runtime_mut().new_int(2);
    let r = call(&mut vm, f, vec![one, two]).unwrap();
    assert_eq!(vm.runtime().as_int(r), Some(3));
}

#[test]
fn test_all_defaults_allows_zero_args() {
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();
    let x = vm.runtime_mut().new_int(3);
    let y = vm.runtime_mut().new_int(4);
    let defaults = vm.runtime_mut().new_tuple(vec![x, y]);
    let f = declare_add2(&mut vm, globals, defaults);

    let r = call(&mut vm, f, vec![]).unwrap();
    assert_eq!(vm.runtime().as_int(r), Some(7));
}

#[test]
fn test_insufficient_args_is_arity_error() {
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();
    let f = declare_add2(&mut vm, globals, Value::NULL);

    match call(&mut vm, f, vec![]) {
        Err(EvalError::Arity(msg)) => assert!(msg.contains("f()")),
        other => panic!("expected arity error, got {other:?}"),
    }

    let a = vm.runtime_mut().new_int(1);
    let b = vm.runtime_mut().new_int(2);
    let c = vm.runtime_mut().new_int(3);
    assert!(matches!(
        call(&mut vm, f, vec![a, b, c]),
        Err(EvalError::Arity(_))
    ));
}

#[test]
fn test_bound_method_receives_self() {
    // method(self, x): return self + x, bound to 10
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();
    let f = declare_add2(&mut vm, globals, Value::NULL);

    let receiver = vm.runtime_mut().new_int(10);
    let method = vm.runtime_mut().bind_method(f, receiver);

    let five = vm.runtime_mut().new_int(5);
    let r = call(&mut vm, method, vec![five]).unwrap();
    assert_eq!(vm.runtime().as_int(r), Some(15));
}

#[test]
fn test_keyword_call_to_interpreted_function_falls_back() {
    // CALL_FUNCTION with nk=1 targeting an in-language function: the
    // re-entry path is bypassed and host invocation rejects it.
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();
    let callee = declare_add2(&mut vm, globals, Value::NULL);
    vm.runtime_mut().dict_set_str(globals, "f", callee).unwrap();

    let kw_name = vm.runtime_mut().new_str("b");
    let mut g = FnBuilder::new(0, 6);
    let c_name = g.const_value(kw_name);
    let one = vm.runtime_mut().new_int(1);
    let c_one = g.const_value(one);
    let f_name = g.name(&mut vm, "f");
    let t = g.temp_base();
    let f_reg = t;
    let pos = t + 1;
    let kw_val = t + 2;
    let out = t + 3;
    g.w.emit_reg(Opcode::LoadGlobal, f_name, f_reg, 0, 0, 0);
    g.w.emit_reg(Opcode::LoadFast, 0, c_one, pos, 0, 0);
    g.w.emit_reg(Opcode::LoadFast, 0, c_one, kw_val, 0, 0);
    // na=1, nk=1: [positional, kw-name, kw-value, callee, dest]
    g.w.emit_var(Opcode::CallFunction, 1 | (1 << 8), &[pos, c_name, kw_val, f_reg, out]);
    g.w.emit_reg(Opcode::ReturnValue, 0, out, 0, 0, 0);
    let outer = g.declare(&mut vm, "g", globals, Value::NULL);

    match call(&mut vm, outer, vec![]) {
        Err(EvalError::Host(RuntimeError::Type(_))) => {}
        other => panic!("expected host type error, got {other:?}"),
    }
}

#[test]
fn test_translator_compiles_on_first_call() {
    // A function declared with an unknown code id is translated lazily.
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();

    vm.set_translator(Box::new(|_rt, _function| {
        // identity(x): return x
        let mut w = CodeWriter::new();
        w.emit_reg(Opcode::ReturnValue, 0, 0, 0, 0, 0);
        Some(RegisterCode::new(w.finish(1, 0), vec![], vec![], 1).unwrap())
    }));

    let f = vm
        .runtime_mut()
        .new_function("lazy", 7777, globals, Value::NULL, 1);
    let x = vm.runtime_mut().new_int(42);
    let r = call(&mut vm, f, vec![x]).unwrap();
    assert_eq!(vm.runtime().as_int(r), Some(42));
}

#[test]
fn test_translation_failure_falls_back_to_host() {
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();
    vm.set_translator(Box::new(|_, _| None));

    let f = vm
        .runtime_mut()
        .new_function("opaque", 8888, globals, Value::NULL, 0);
    // No compiled code and the host cannot run interpreted functions
    assert!(matches!(
        call(&mut vm, f, vec![]),
        Err(EvalError::Unsupported(_))
    ));
}

#[test]
fn test_repeated_calls_reuse_argument_tuple() {
    // g(n): total = f(n) + f(n); exercises call-args reuse inside a frame
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();

    let two = vm.runtime_mut().new_int(2);
    let mut f = FnBuilder::new(1, 3);
    let c2 = f.const_value(two);
    let x = f.arg_reg(0);
    let out = f.temp_base();
    f.w.emit_reg(Opcode::BinaryMultiply, 0, x, c2, out, 0);
    f.w.emit_reg(Opcode::ReturnValue, 0, out, 0, 0, 0);
    let inner = f.declare(&mut vm, "f", globals, Value::NULL);
    vm.runtime_mut().dict_set_str(globals, "f", inner).unwrap();

    let mut g = FnBuilder::new(1, 8);
    let f_name = g.name(&mut vm, "f");
    let n = g.arg_reg(0);
    let t = g.temp_base();
    let f_reg = t;
    let n1 = t + 1;
    let r1 = t + 2;
    let n2 = t + 3;
    let r2 = t + 4;
    let out = t + 5;
    g.w.emit_reg(Opcode::LoadGlobal, f_name, f_reg, 0, 0, 0);
    g.w.emit_reg(Opcode::LoadFast, 0, n, n1, 0, 0);
    g.w.emit_var(Opcode::CallFunction, 1, &[n1, f_reg, r1]);
    g.w.emit_reg(Opcode::LoadFast, 0, n, n2, 0, 0);
    g.w.emit_var(Opcode::CallFunction, 1, &[n2, f_reg, r2]);
    g.w.emit_reg(Opcode::BinaryAdd, 0, r1, r2, out, 0);
    g.w.emit_reg(Opcode::ReturnValue, 0, out, 0, 0, 0);
    let outer = g.declare(&mut vm, "g", globals, Value::NULL);

    let three = vm.runtime_mut().new_int(3);
    let r = call(&mut vm, outer, vec![three]).unwrap();
    assert_eq!(vm.runtime().as_int(r), Some(12));
}

#[test]
fn test_recursive_in_language_function() {
    // fact(n): return 1 if n <= 1 else n * fact(n - 1)
    let mut vm = Vm::new();
    let globals = vm.runtime_mut().new_dict();
    let one = vm.runtime_mut().new_int(1);

    let mut f = FnBuilder::new(1, 10);
    let c1 = f.const_value(one);
    let fact_name = f.name(&mut vm, "fact");
    let n = f.arg_reg(0);
    let t = f.temp_base();
    let cond = t;
    let fact_reg = t + 1;
    let n_minus = t + 2;
    let rec = t + 3;
    let out = t + 4;
    // cond = n <= 1
    f.w.emit_reg(Opcode::CompareOp, 1, n, c1, cond, 0);
    let recurse = f.w.emit_branch_forward(Opcode::PopJumpIfFalse, cond, 0);
    f.w.emit_reg(Opcode::ReturnValue, 0, c1, 0, 0, 0);
    f.w.bind(recurse);
    f.w.emit_reg(Opcode::LoadGlobal, fact_name, fact_reg, 0, 0, 0);
    f.w.emit_reg(Opcode::BinarySubtract, 0, n, c1, n_minus, 0);
    f.w.emit_var(Opcode::CallFunction, 1, &[n_minus, fact_reg, rec]);
    f.w.emit_reg(Opcode::BinaryMultiply, 0, n, rec, out, 0);
    f.w.emit_reg(Opcode::ReturnValue, 0, out, 0, 0, 0);
    let fact = f.declare(&mut vm, "fact", globals, Value::NULL);
    vm.runtime_mut().dict_set_str(globals, "fact", fact).unwrap();

    let six = vm.runtime_mut().new_int(6);
    let r = call(&mut vm, fact, vec![six]).unwrap();
    assert_eq!(vm.runtime().as_int(r), Some(720));
}
