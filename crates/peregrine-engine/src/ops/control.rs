//! Branches and iterator advancement
//!
//! Branch instructions position the cursor themselves: either at the
//! absolute label or just past the instruction on fall-through. Truthiness
//! tests short-circuit on the canonical singletons before consulting the
//! runtime.

use crate::frame::Frame;
use crate::ops::Flow;
use crate::{EvalError, EvalResult, Vm};
use peregrine_bytecode::instr::{BranchOp, BRANCH_OP_SIZE};
use peregrine_bytecode::Opcode;

impl Vm {
    pub(crate) fn exec_branch(&mut self, frame: &mut Frame, op: &BranchOp) -> EvalResult<Flow> {
        match op.opcode {
            Opcode::JumpAbsolute => {
                frame.jump(op.label)?;
            }
            Opcode::JumpIfFalseOrPop | Opcode::PopJumpIfFalse => {
                let v = frame.get(op.reg1)?;
                let falsy =
                    self.runtime().is_false_singleton(v) || !self.runtime().is_truthy(v);
                if falsy {
                    frame.jump(op.label)?;
                } else {
                    frame.pc += BRANCH_OP_SIZE;
                }
            }
            Opcode::JumpIfTrueOrPop | Opcode::PopJumpIfTrue => {
                let v = frame.get(op.reg1)?;
                let truthy =
                    self.runtime().is_true_singleton(v) || self.runtime().is_truthy(v);
                if truthy {
                    frame.jump(op.label)?;
                } else {
                    frame.pc += BRANCH_OP_SIZE;
                }
            }
            Opcode::ForIter => {
                // Advance reg1; yielded value lands in reg2, exhaustion
                // transfers to the label.
                let it = frame.get(op.reg1)?;
                match self.runtime_mut().iter_next(it)? {
                    Some(value) => {
                        frame.set(self.runtime_mut(), op.reg2, value)?;
                        frame.pc += BRANCH_OP_SIZE;
                    }
                    None => {
                        frame.jump(op.label)?;
                    }
                }
            }
            other => {
                return Err(EvalError::Invariant(format!(
                    "{} routed to the branch handler",
                    other.name()
                )))
            }
        }
        Ok(Flow::Continue)
    }
}
