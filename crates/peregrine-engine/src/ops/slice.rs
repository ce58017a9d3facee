//! Slicing
//!
//! `reg4 = reg1[reg2:reg3]` where either endpoint register may be the
//! absent-operand sentinel. Index-like endpoints on a sequence receiver use
//! the direct sequence slice (missing low is zero, missing high is the
//! platform maximum); anything else builds a slice object and defers to
//! generic subscription.

use crate::frame::Frame;
use crate::ops::Flow;
use crate::{EvalResult, Vm};
use peregrine_bytecode::instr::RegOp;
use peregrine_bytecode::BAD_REGISTER;
use peregrine_runtime::Value;

impl Vm {
    pub(crate) fn exec_slice(&mut self, frame: &mut Frame, op: &RegOp) -> EvalResult<Flow> {
        let obj = frame.get(op.reg1)?;
        let lo = if op.reg2 == BAD_REGISTER {
            Value::NULL
        } else {
            frame.get(op.reg2)?
        };
        let hi = if op.reg3 == BAD_REGISTER {
            Value::NULL
        } else {
            frame.get(op.reg3)?
        };

        let rt = self.runtime();
        let index_like = |v: Value| v.is_null() || rt.as_index(v).is_some();
        let direct = rt.is_sequence(obj) && index_like(lo) && index_like(hi);

        let result = if direct {
            let lo = self.runtime().slice_bound(lo, 0)?;
            let hi = self.runtime().slice_bound(hi, isize::MAX as i64)?;
            self.runtime_mut().seq_slice(obj, lo, hi)?
        } else {
            let none = self.runtime_mut().none_value();
            let lo = if lo.is_null() { none } else { lo };
            let hi = if hi.is_null() { none } else { hi };
            let slice = self.runtime_mut().new_slice(lo, hi, none);
            self.runtime_mut().decref(none);
            let result = self.runtime_mut().get_item(obj, slice);
            self.runtime_mut().decref(slice);
            result?
        };
        frame.set(self.runtime_mut(), op.reg4, result)?;
        Ok(Flow::Continue)
    }
}
