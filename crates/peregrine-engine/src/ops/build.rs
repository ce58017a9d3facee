//! Tuple and list construction
//!
//! The operand list carries `arg` source registers followed by the
//! destination. Element references are moved into the container — the
//! source slots are cleared, no extra increments.

use crate::frame::Frame;
use crate::ops::Flow;
use crate::{EvalError, EvalResult, Vm};
use peregrine_bytecode::instr::VarRegOp;
use peregrine_bytecode::Opcode;

impl Vm {
    pub(crate) fn exec_build(&mut self, frame: &mut Frame, op: &VarRegOp) -> EvalResult<Flow> {
        let n = op.arg as usize;
        if op.regs.len() != n + 1 {
            return Err(EvalError::Invariant(format!(
                "{} declares {} elements but carries {} operand registers",
                op.opcode.name(),
                n,
                op.regs.len()
            )));
        }

        let mut items = Vec::with_capacity(n);
        for &r in &op.regs[..n] {
            match frame.take(r) {
                Ok(v) => items.push(v),
                Err(e) => {
                    for v in items {
                        self.runtime_mut().decref(v);
                    }
                    return Err(e);
                }
            }
        }
        let dest = op.regs[n];

        let container = match op.opcode {
            Opcode::BuildTuple => self.runtime_mut().new_tuple(items),
            Opcode::BuildList => self.runtime_mut().new_list(items),
            other => {
                return Err(EvalError::Invariant(format!(
                    "{} routed to the build handler",
                    other.name()
                )))
            }
        };
        frame.set(self.runtime_mut(), dest, container)?;
        Ok(Flow::Continue)
    }
}
