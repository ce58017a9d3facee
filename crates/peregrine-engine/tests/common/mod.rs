//! Shared test scaffolding: a tiny assembler for register functions
//!
//! Register layout convention (mirrors frame construction): constants occupy
//! the low registers, arguments follow, temporaries come after.
#![allow(dead_code)]

use peregrine_bytecode::CodeWriter;
use peregrine_engine::{RegisterCode, Vm};
use peregrine_runtime::Value;

pub struct FnBuilder {
    pub w: CodeWriter,
    consts: Vec<Value>,
    names: Vec<Value>,
    arg_count: u16,
    num_registers: u16,
}

impl FnBuilder {
    /// Start a function with `arg_count` parameters and `num_registers`
    /// total register slots.
    pub fn new(arg_count: u16, num_registers: u16) -> Self {
        Self {
            w: CodeWriter::new(),
            consts: Vec::new(),
            names: Vec::new(),
            arg_count,
            num_registers,
        }
    }

    /// Add a constant; returns the register it will be preloaded into.
    pub fn const_value(&mut self, v: Value) -> u8 {
        self.consts.push(v);
        (self.consts.len() - 1) as u8
    }

    /// Add a name-pool entry; returns its index for instruction arguments.
    pub fn name(&mut self, vm: &mut Vm, s: &str) -> u16 {
        let v = vm.runtime_mut().new_str(s);
        self.names.push(v);
        (self.names.len() - 1) as u16
    }

    /// Register index of argument `i` (constants come first).
    pub fn arg_reg(&self, i: u16) -> u8 {
        (self.consts.len() as u16 + i) as u8
    }

    /// First register free for temporaries.
    pub fn temp_base(&self) -> u8 {
        (self.consts.len() as u16 + self.arg_count) as u8
    }

    /// Finish the code object and declare the function.
    pub fn declare(self, vm: &mut Vm, name: &str, globals: Value, defaults: Value) -> Value {
        let buf = self.w.finish(self.num_registers, 0);
        let code = RegisterCode::new(buf, self.consts, self.names, self.arg_count)
            .expect("assembled code must validate");
        vm.declare_function(name, code, globals, defaults)
            .expect("declaration must succeed")
    }
}

/// Evaluate `function(*args)` and return the result.
pub fn call(vm: &mut Vm, function: Value, args: Vec<Value>) -> Result<Value, peregrine_engine::EvalError> {
    let tuple = vm.runtime_mut().new_tuple(args);
    let result = vm.eval(function, tuple);
    vm.runtime_mut().decref(tuple);
    result
}
