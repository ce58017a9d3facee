//! Dispatch-loop micro-benchmark: a tight counted loop of specialised
//! integer arithmetic.

use criterion::{criterion_group, criterion_main, Criterion};
use peregrine_bytecode::{CodeWriter, Opcode};
use peregrine_engine::{RegisterCode, Vm};
use peregrine_runtime::Value;

/// Assemble `spin(n): s = 0; while n: s += n; n -= 1; return s`
fn declare_spin(vm: &mut Vm) -> Value {
    let globals = vm.runtime_mut().new_dict();
    let zero = vm.runtime_mut().new_int(0);
    let one = vm.runtime_mut().new_int(1);

    let mut w = CodeWriter::new();
    // Registers: r0=0, r1=1 (consts), r2=n (arg), r3=s
    w.emit_reg(Opcode::LoadFast, 0, 0, 3, 0, 0);
    let head = w.position();
    let done = w.emit_branch_forward(Opcode::PopJumpIfFalse, 2, 0);
    w.emit_reg(Opcode::InplaceAdd, 0, 3, 2, 3, 0);
    w.emit_reg(Opcode::InplaceSubtract, 0, 2, 1, 2, 0);
    w.emit_branch(Opcode::JumpAbsolute, 0, 0, head);
    w.bind(done);
    w.emit_reg(Opcode::ReturnValue, 0, 3, 0, 0, 0);

    let code = RegisterCode::new(w.finish(4, 0), vec![zero, one], vec![], 1).unwrap();
    vm.declare_function("spin", code, globals, Value::NULL).unwrap()
}

fn bench_dispatch(c: &mut Criterion) {
    let mut vm = Vm::new();
    let spin = declare_spin(&mut vm);

    c.bench_function("spin_1000", |b| {
        b.iter(|| {
            let n = vm.runtime_mut().new_int(1000);
            let args = vm.runtime_mut().new_tuple(vec![n]);
            let r = vm.eval(spin, args).unwrap();
            vm.runtime_mut().decref(r);
            vm.runtime_mut().decref(args);
        })
    });
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
