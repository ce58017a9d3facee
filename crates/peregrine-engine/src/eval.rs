//! The dispatch loop and the public entry point
//!
//! A central loop fetches the opcode byte at the cursor, decodes the
//! instruction in its wire format and hands it to the category handler.
//! Fixed-size handlers advance the cursor before executing; branch handlers
//! set it themselves. The loop leaves a frame in exactly three ways: a
//! return value, a propagated error, or the instruction-limit guard.

use crate::cache::{CodeCache, TranslateFn};
use crate::code::RegisterCode;
use crate::frame::Frame;
use crate::ops::Flow;
use crate::{EvalError, EvalResult};
use peregrine_bytecode::instr::{BranchOp, RegOp, VarRegOp, REG_OP_SIZE};
use peregrine_bytecode::{InstrFormat, Opcode};
use peregrine_runtime::{Gil, Runtime, Value};
use std::sync::Arc;
use tracing::{info, trace};

/// Evaluator tuning knobs
#[derive(Debug, Clone)]
pub struct EvalOptions {
    /// Per-frame instruction budget; exceeding it is treated as a runaway
    /// loop.
    pub instruction_limit: u64,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            instruction_limit: 1_000_000_000,
        }
    }
}

/// The evaluator
///
/// Owns the object runtime, the compiled-code cache and the interpreter
/// lock. One `Vm` is one interpreter; frames re-enter [`Vm::eval_frame`]
/// recursively through the call protocol.
pub struct Vm {
    rt: Runtime,
    cache: CodeCache,
    gil: Gil,
    options: EvalOptions,
    op_counts: Box<[u64; 256]>,
    total_executed: u64,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_options(EvalOptions::default())
    }

    pub fn with_options(options: EvalOptions) -> Self {
        Self {
            rt: Runtime::new(),
            cache: CodeCache::new(),
            gil: Gil::new(),
            options,
            op_counts: Box::new([0; 256]),
            total_executed: 0,
        }
    }

    #[inline]
    pub fn runtime(&self) -> &Runtime {
        &self.rt
    }

    #[inline]
    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut self.rt
    }

    /// Install the stack-to-register translator used for functions first
    /// observed during calls.
    pub fn set_translator(&mut self, translator: TranslateFn) {
        self.cache.set_translator(translator);
    }

    /// Register a function whose register code is already compiled.
    ///
    /// Allocates the function object, binds the code to it and memoises the
    /// code in the cache. Returns the function value (owned reference).
    pub fn declare_function(
        &mut self,
        name: &str,
        code: RegisterCode,
        globals: Value,
        defaults: Value,
    ) -> EvalResult<Value> {
        let code_id = self.cache.next_id();
        let arity = code.arg_count();
        let function = self.rt.new_function(name, code_id, globals, defaults, arity);
        let mut code = code;
        code.set_function(function);
        self.cache.insert(code_id, Arc::new(code));
        Ok(function)
    }

    /// Evaluate `callable(*args)`.
    ///
    /// The interpreter lock is held for the whole evaluation and released
    /// on every exit path. Foreign callables go straight to the host;
    /// in-language callables get a frame and run in the dispatch loop.
    pub fn eval(&mut self, callable: Value, args: Value) -> EvalResult<Value> {
        let gil = self.gil.clone();
        let _guard = gil.lock();

        if self.rt.is_foreign_callable(callable) {
            return Ok(self.rt.call(callable, args, Value::NULL)?);
        }
        match self.build_frame(callable, args)? {
            Some(mut frame) => {
                let locals = self.rt.new_dict();
                frame.bind_locals(locals);
                self.run_frame(frame)
            }
            None => Err(EvalError::Unsupported(format!(
                "callable of type '{}' has no compiled code",
                self.rt.type_name(callable)
            ))),
        }
    }

    /// Resolve a callable to a frame, compiling its code on first use.
    /// `Ok(None)` means the callee cannot be interpreted and the caller
    /// should fall back to host invocation.
    pub(crate) fn build_frame(
        &mut self,
        callable: Value,
        args: Value,
    ) -> EvalResult<Option<Frame>> {
        let (function, receiver) = match self.rt.method_parts(callable) {
            Some((func, receiver)) => (func, Some(receiver)),
            None => (callable, None),
        };
        let Some((code_id, globals, defaults, _arity)) = self.rt.function_parts(function) else {
            return Ok(None);
        };
        let Some(code) = self.cache.resolve(&mut self.rt, code_id, function) else {
            return Ok(None);
        };
        let frame = Frame::for_call(&mut self.rt, code, globals, defaults, receiver, args)?;
        Ok(Some(frame))
    }

    /// Run a frame to completion, releasing its registers on every exit
    /// path.
    pub(crate) fn run_frame(&mut self, mut frame: Frame) -> EvalResult<Value> {
        let result = self.eval_frame(&mut frame);
        frame.release(&mut self.rt);
        result
    }

    /// The dispatch loop proper.
    fn eval_frame(&mut self, frame: &mut Frame) -> EvalResult<Value> {
        let code = frame.code().clone();
        let buf = code.instructions();
        let mut steps: u64 = 0;

        loop {
            steps += 1;
            if steps > self.options.instruction_limit {
                self.dump_status();
                return Err(EvalError::LimitExceeded);
            }

            let pc = frame.pc;
            let byte = *buf.get(pc).ok_or_else(|| {
                EvalError::Invariant(format!("cursor {pc} ran past the code buffer"))
            })?;
            let opcode = Opcode::from_u8(byte).ok_or_else(|| {
                EvalError::Invariant(format!("unmapped opcode byte 0x{byte:02X} at offset {pc}"))
            })?;
            self.op_counts[byte as usize] += 1;
            self.total_executed += 1;

            if !opcode.is_supported() {
                return Err(EvalError::Unsupported(opcode.name().into()));
            }
            trace!(target: "peregrine::eval", pc, op = opcode.name());

            let flow = match opcode.format() {
                InstrFormat::Reg => {
                    let op = RegOp::read(opcode, buf, pc)
                        .map_err(|e| EvalError::Invariant(e.to_string()))?;
                    frame.pc = pc + REG_OP_SIZE;
                    self.exec_reg(frame, &op)?
                }
                InstrFormat::VarReg => {
                    let op = VarRegOp::read(opcode, buf, pc)
                        .map_err(|e| EvalError::Invariant(e.to_string()))?;
                    frame.pc = pc + VarRegOp::size(op.regs.len());
                    self.exec_var(frame, &op)?
                }
                InstrFormat::Branch => {
                    let op = BranchOp::read(opcode, buf, pc)
                        .map_err(|e| EvalError::Invariant(e.to_string()))?;
                    // Branch handlers position the cursor themselves.
                    self.exec_branch(frame, &op)?
                }
            };

            match flow {
                Flow::Continue => {}
                Flow::Return(value) => return Ok(value),
            }
        }
    }

    /// Dispatch a fixed-format instruction to its category handler.
    fn exec_reg(&mut self, frame: &mut Frame, op: &RegOp) -> EvalResult<Flow> {
        use Opcode::*;
        match op.opcode {
            BinaryAdd | BinarySubtract | BinaryMultiply | BinaryDivide | BinaryModulo
            | BinaryFloorDivide | BinaryTrueDivide | BinaryLshift | BinaryRshift | BinaryAnd
            | BinaryOr | BinaryXor | InplaceAdd | InplaceSubtract | InplaceMultiply
            | InplaceDivide | InplaceModulo | InplaceFloorDivide | InplaceTrueDivide
            | InplaceLshift | InplaceRshift | InplaceAnd | InplaceOr | InplaceXor
            | BinaryPower | InplacePower | UnaryNegative | UnaryPositive | UnaryNot
            | UnaryConvert | UnaryInvert => self.exec_arith(frame, op),

            CompareOp => self.exec_compare(frame, op),

            LoadFast | StoreFast | Incref | Decref | LoadLocals => {
                self.exec_register_op(frame, op)
            }

            LoadGlobal | LoadName | StoreName => self.exec_name(frame, op),

            LoadAttr | StoreAttr | BinarySubscr | StoreSubscr | ConstIndex | ListAppend
            | GetIter => self.exec_object(frame, op),

            Slice => self.exec_slice(frame, op),

            PrintItem | PrintNewline | PrintItemTo | PrintNewlineTo => {
                self.exec_print(frame, op)
            }

            ReturnValue => {
                let value = frame.get(op.reg1)?;
                self.rt.incref(value);
                Ok(Flow::Return(value))
            }

            other => Err(EvalError::Invariant(format!(
                "{} routed to the fixed-format dispatcher",
                other.name()
            ))),
        }
    }

    /// Dispatch a variable-arity instruction.
    fn exec_var(&mut self, frame: &mut Frame, op: &VarRegOp) -> EvalResult<Flow> {
        match op.opcode {
            Opcode::BuildTuple | Opcode::BuildList => self.exec_build(frame, op),
            Opcode::CallFunction => self.exec_call(frame, op),
            other => Err(EvalError::Invariant(format!(
                "{} routed to the variable-arity dispatcher",
                other.name()
            ))),
        }
    }

    /// Per-opcode execution counters gathered so far, reported through the
    /// logging layer.
    pub fn dump_status(&self) {
        info!(
            target: "peregrine::eval",
            total = self.total_executed,
            "evaluator status"
        );
        for byte in 0..=255u8 {
            let count = self.op_counts[byte as usize];
            if count == 0 {
                continue;
            }
            let name = Opcode::from_u8(byte).map(|o| o.name()).unwrap_or("<unmapped>");
            info!(target: "peregrine::eval", op = name, count);
        }
    }

    /// Total instructions executed across all frames
    pub fn instructions_executed(&self) -> u64 {
        self.total_executed
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
