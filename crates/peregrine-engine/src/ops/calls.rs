//! The call protocol
//!
//! The operand list is `na` positional registers, `nk` keyword
//! (name, value) register pairs, the callee, then the destination; the
//! instruction argument packs `na` in its low byte and `nk` in the high
//! byte.
//!
//! Foreign callables go to the host runtime. In-language callables with no
//! keyword arguments re-enter the evaluator on a fresh frame built from the
//! callee's compiled code; a callee whose code cannot be produced falls
//! back to host invocation, which is also where keyword calls always land.

use crate::frame::Frame;
use crate::ops::Flow;
use crate::{EvalError, EvalResult, Vm};
use peregrine_bytecode::instr::VarRegOp;
use peregrine_runtime::Value;

impl Vm {
    pub(crate) fn exec_call(&mut self, frame: &mut Frame, op: &VarRegOp) -> EvalResult<Flow> {
        let na = (op.arg & 0xFF) as usize;
        let nk = ((op.arg >> 8) & 0xFF) as usize;
        let operands = na + 2 * nk;
        if op.regs.len() != operands + 2 {
            return Err(EvalError::Invariant(format!(
                "CALL_FUNCTION carries {} registers for {} operands",
                op.regs.len(),
                operands
            )));
        }
        let callee = frame.get(op.regs[operands])?;
        let dest = op.regs[operands + 1];

        // Positional actuals move into the reusable argument tuple.
        let mut positional = Vec::with_capacity(na);
        for &r in &op.regs[..na] {
            match frame.take(r) {
                Ok(v) => positional.push(v),
                Err(e) => {
                    for v in positional {
                        self.runtime_mut().decref(v);
                    }
                    return Err(e);
                }
            }
        }
        let args = frame.refill_call_args(self.runtime_mut(), positional)?;

        // Keyword pairs build a fresh mapping; names are borrowed, values
        // move.
        let kwargs = if nk > 0 {
            let dict = self.runtime_mut().new_dict();
            if let Err(e) = self.fill_kwargs(frame, op, na, nk, dict) {
                self.runtime_mut().decref(dict);
                return Err(e);
            }
            dict
        } else {
            Value::NULL
        };

        let result = self.dispatch_call(callee, args, kwargs);
        if !kwargs.is_null() {
            self.runtime_mut().decref(kwargs);
        }
        let result = result?;
        frame.set(self.runtime_mut(), dest, result)?;
        Ok(Flow::Continue)
    }

    fn fill_kwargs(
        &mut self,
        frame: &mut Frame,
        op: &VarRegOp,
        na: usize,
        nk: usize,
        dict: Value,
    ) -> EvalResult<()> {
        for pair in 0..nk {
            let name = frame.get(op.regs[na + 2 * pair])?;
            let value = frame.take(op.regs[na + 2 * pair + 1])?;
            let bound = self.runtime_mut().dict_set(dict, name, value);
            self.runtime_mut().decref(value);
            bound?;
        }
        Ok(())
    }

    /// Route a call to the host or back into the evaluator.
    fn dispatch_call(&mut self, callee: Value, args: Value, kwargs: Value) -> EvalResult<Value> {
        if self.runtime().is_foreign_callable(callee) {
            return Ok(self.runtime_mut().call(callee, args, kwargs)?);
        }
        if kwargs.is_null() {
            if let Some(callee_frame) = self.build_frame(callee, args)? {
                return self.run_frame(callee_frame);
            }
            // No compiled code: fall through to host invocation.
        }
        Ok(self.runtime_mut().call(callee, args, kwargs)?)
    }
}
