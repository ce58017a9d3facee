//! Comparison handler
//!
//! The instruction argument selects the operator. Same-type machine
//! integers and floats short-circuit to a direct comparison producing the
//! canonical booleans; identity tests and everything else go through the
//! runtime's rich comparison.

use crate::frame::Frame;
use crate::ops::Flow;
use crate::{EvalError, EvalResult, Vm};
use peregrine_bytecode::instr::RegOp;
use peregrine_runtime::CmpOp;

impl Vm {
    pub(crate) fn exec_compare(&mut self, frame: &mut Frame, op: &RegOp) -> EvalResult<Flow> {
        let cmp = CmpOp::from_arg(op.arg).ok_or_else(|| {
            EvalError::Unsupported(format!("COMPARE_OP selector {}", op.arg))
        })?;
        let a = frame.get(op.reg1)?;
        let b = frame.get(op.reg2)?;

        // Identity never looks at the operand representation.
        let fast = if matches!(cmp, CmpOp::Is | CmpOp::IsNot) {
            None
        } else {
            let rt = self.runtime();
            if let (Some(x), Some(y)) = (rt.as_int(a), rt.as_int(b)) {
                Some(ordered(cmp, x.cmp(&y)))
            } else if let (Some(x), Some(y)) = (rt.as_float(a), rt.as_float(b)) {
                x.partial_cmp(&y).map(|o| ordered(cmp, o))
            } else {
                None
            }
        };

        let result = match fast {
            Some(outcome) => self.runtime_mut().bool_value(outcome),
            None => self.runtime_mut().rich_compare(cmp, a, b)?,
        };
        frame.set(self.runtime_mut(), op.reg3, result)?;
        Ok(Flow::Continue)
    }
}

fn ordered(cmp: CmpOp, o: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match cmp {
        CmpOp::Lt => o == Less,
        CmpOp::Le => o != Greater,
        CmpOp::Eq => o == Equal,
        CmpOp::Ne => o != Equal,
        CmpOp::Gt => o == Greater,
        CmpOp::Ge => o != Less,
        CmpOp::Is | CmpOp::IsNot => unreachable!("identity handled before the fast path"),
    }
}
