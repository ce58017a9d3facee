//! Compiled register-code artifacts

use crate::{EvalError, EvalResult};
use peregrine_bytecode::instr::{Prelude, FLAG_HAS_CELLVARS, PRELUDE_SIZE};
use peregrine_runtime::Value;

/// A compiled function body in register form
///
/// Produced by the translator (or assembled directly in tests), consumed
/// read-only by the evaluator. The instruction buffer is prelude-prefixed;
/// the constant and name pools hold one reference per entry for the
/// lifetime of the artifact. The function back-reference is borrowed — the
/// function object owns its code, not the other way around.
pub struct RegisterCode {
    instructions: Vec<u8>,
    num_registers: u16,
    consts: Vec<Value>,
    names: Vec<Value>,
    arg_count: u16,
    function: Value,
}

impl RegisterCode {
    /// Validate a code buffer and bind it to its pools.
    ///
    /// The caller transfers one reference per `consts`/`names` entry.
    /// Rejects buffers whose prelude declares cell variables: closures are
    /// outside the supported subset.
    pub fn new(
        instructions: Vec<u8>,
        consts: Vec<Value>,
        names: Vec<Value>,
        arg_count: u16,
    ) -> EvalResult<Self> {
        let prelude = Prelude::read(&instructions)
            .map_err(|e| EvalError::Invariant(e.to_string()))?;
        if prelude.flags & FLAG_HAS_CELLVARS != 0 {
            return Err(EvalError::Unsupported("cell variables".into()));
        }
        let needed = consts.len() + arg_count as usize;
        if (prelude.num_registers as usize) < needed {
            return Err(EvalError::Invariant(format!(
                "code declares {} registers but needs at least {} for constants and arguments",
                prelude.num_registers, needed
            )));
        }
        Ok(Self {
            instructions,
            num_registers: prelude.num_registers,
            consts,
            names,
            arg_count,
            function: Value::NULL,
        })
    }

    /// Bind the originating function object (borrowed back-reference).
    pub(crate) fn set_function(&mut self, function: Value) {
        self.function = function;
    }

    #[inline]
    pub fn instructions(&self) -> &[u8] {
        &self.instructions
    }

    /// Byte offset of the first instruction
    #[inline]
    pub fn entry_offset(&self) -> usize {
        PRELUDE_SIZE
    }

    #[inline]
    pub fn num_registers(&self) -> u16 {
        self.num_registers
    }

    #[inline]
    pub fn consts(&self) -> &[Value] {
        &self.consts
    }

    #[inline]
    pub fn num_consts(&self) -> usize {
        self.consts.len()
    }

    #[inline]
    pub fn arg_count(&self) -> u16 {
        self.arg_count
    }

    #[inline]
    pub fn function(&self) -> Value {
        self.function
    }

    /// Name-pool entry for an instruction argument
    pub fn name_at(&self, arg: u16) -> EvalResult<Value> {
        self.names.get(arg as usize).copied().ok_or_else(|| {
            EvalError::Invariant(format!("name index {arg} out of range"))
        })
    }
}
