//! Statement printing
//!
//! The `*_TO` forms take an explicit file register; the plain forms write
//! to the runtime's standard output. The soft-space protocol itself lives
//! in the runtime.

use crate::frame::Frame;
use crate::ops::Flow;
use crate::{EvalError, EvalResult, Vm};
use peregrine_bytecode::instr::RegOp;
use peregrine_bytecode::Opcode;

impl Vm {
    pub(crate) fn exec_print(&mut self, frame: &mut Frame, op: &RegOp) -> EvalResult<Flow> {
        match op.opcode {
            Opcode::PrintItem => {
                let item = frame.get(op.reg1)?;
                let file = self.runtime_mut().stdout_value();
                let outcome = self.runtime_mut().print_item(file, item);
                self.runtime_mut().decref(file);
                outcome?;
            }
            Opcode::PrintItemTo => {
                let item = frame.get(op.reg1)?;
                let file = frame.get(op.reg2)?;
                self.runtime_mut().print_item(file, item)?;
            }
            Opcode::PrintNewline => {
                let file = self.runtime_mut().stdout_value();
                let outcome = self.runtime_mut().print_newline(file);
                self.runtime_mut().decref(file);
                outcome?;
            }
            Opcode::PrintNewlineTo => {
                let file = frame.get(op.reg1)?;
                self.runtime_mut().print_newline(file)?;
            }
            other => {
                return Err(EvalError::Invariant(format!(
                    "{} routed to the print handler",
                    other.name()
                )))
            }
        }
        Ok(Flow::Continue)
    }
}
