//! Register moves, explicit refcount instructions and name resolution
//!
//! Name lookups walk locals → globals → builtins (or globals → builtins
//! for the global form) and fail with a name error naming the identifier.

use crate::frame::Frame;
use crate::ops::Flow;
use crate::{EvalError, EvalResult, Vm};
use peregrine_bytecode::instr::RegOp;
use peregrine_bytecode::Opcode;
use peregrine_runtime::Value;

impl Vm {
    /// LOAD_FAST / STORE_FAST / INCREF / DECREF / LOAD_LOCALS
    pub(crate) fn exec_register_op(&mut self, frame: &mut Frame, op: &RegOp) -> EvalResult<Flow> {
        match op.opcode {
            Opcode::LoadFast => {
                // Copy: both registers own a reference afterwards.
                let v = frame.get(op.reg1)?;
                self.runtime_mut().incref(v);
                frame.set(self.runtime_mut(), op.reg2, v)?;
            }
            Opcode::StoreFast => {
                // Move: the source slot is cleared, the reference travels.
                let v = frame.take(op.reg1)?;
                frame.set(self.runtime_mut(), op.reg2, v)?;
            }
            Opcode::Incref => {
                let v = frame.get(op.reg1)?;
                self.runtime_mut().incref(v);
            }
            Opcode::Decref => {
                let v = frame.get(op.reg1)?;
                self.runtime_mut().decref(v);
            }
            Opcode::LoadLocals => {
                let locals = frame.locals();
                if locals.is_null() {
                    return Err(EvalError::Invariant(
                        "LOAD_LOCALS in a frame without a locals mapping".into(),
                    ));
                }
                self.runtime_mut().incref(locals);
                frame.set(self.runtime_mut(), op.reg1, locals)?;
            }
            other => {
                return Err(EvalError::Invariant(format!(
                    "{} routed to the register-op handler",
                    other.name()
                )))
            }
        }
        Ok(Flow::Continue)
    }

    /// LOAD_GLOBAL / LOAD_NAME / STORE_NAME
    pub(crate) fn exec_name(&mut self, frame: &mut Frame, op: &RegOp) -> EvalResult<Flow> {
        let name = frame.code().name_at(op.arg)?;
        match op.opcode {
            Opcode::LoadGlobal => {
                let v = self.lookup_chain(&[frame.globals(), frame.builtins()], name)?;
                frame.set(self.runtime_mut(), op.reg1, v)?;
            }
            Opcode::LoadName => {
                let locals = frame.locals();
                let v = if locals.is_null() {
                    self.lookup_chain(&[frame.globals(), frame.builtins()], name)?
                } else {
                    self.lookup_chain(&[locals, frame.globals(), frame.builtins()], name)?
                };
                frame.set(self.runtime_mut(), op.reg1, v)?;
            }
            Opcode::StoreName => {
                let locals = frame.locals();
                if locals.is_null() {
                    return Err(EvalError::Invariant(
                        "STORE_NAME in a frame without a locals mapping".into(),
                    ));
                }
                let value = frame.get(op.reg1)?;
                self.runtime_mut().dict_set(locals, name, value)?;
            }
            other => {
                return Err(EvalError::Invariant(format!(
                    "{} routed to the name handler",
                    other.name()
                )))
            }
        }
        Ok(Flow::Continue)
    }

    /// Walk mapping scopes in order; a miss everywhere is a name error.
    fn lookup_chain(&mut self, scopes: &[Value], name: Value) -> EvalResult<Value> {
        for &scope in scopes {
            if let Some(v) = self.runtime_mut().dict_get(scope, name)? {
                return Ok(v);
            }
        }
        let identifier = self
            .runtime()
            .as_str(name)
            .unwrap_or("<non-string name>")
            .to_owned();
        Err(EvalError::Name(identifier))
    }
}
