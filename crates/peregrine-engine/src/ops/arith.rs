//! Arithmetic and unary handlers
//!
//! The binary group carries the machine-integer fast path: when both
//! operands are exact machine integers, the result is computed in word
//! arithmetic and only overflow (or a divide hazard) falls through to the
//! generic runtime entry point, which promotes. The overflow test for
//! addition is the two's-complement sign pattern `(r^a)<0 && (r^b)<0`;
//! subtraction uses the complemented form, multiplication a widening
//! check.

use crate::frame::Frame;
use crate::ops::Flow;
use crate::{EvalError, EvalResult, Vm};
use peregrine_bytecode::instr::RegOp;
use peregrine_bytecode::Opcode;
use peregrine_runtime::{BinOp, UnaryOp, Value};

impl Vm {
    pub(crate) fn exec_arith(&mut self, frame: &mut Frame, op: &RegOp) -> EvalResult<Flow> {
        use Opcode::*;

        // Unary group: reg1 -> reg2
        if let Some(unary) = match op.opcode {
            UnaryNegative => Some(UnaryOp::Neg),
            UnaryPositive => Some(UnaryOp::Pos),
            UnaryInvert => Some(UnaryOp::Invert),
            UnaryNot => Some(UnaryOp::Not),
            UnaryConvert => Some(UnaryOp::Convert),
            _ => None,
        } {
            let v = frame.get(op.reg1)?;
            let result = self.runtime_mut().unary(unary, v)?;
            frame.set(self.runtime_mut(), op.reg2, result)?;
            return Ok(Flow::Continue);
        }

        // Power: ternary runtime entry with no modulus
        if matches!(op.opcode, BinaryPower | InplacePower) {
            let a = frame.get(op.reg1)?;
            let b = frame.get(op.reg2)?;
            let result = self.runtime_mut().power(a, b, Value::NULL)?;
            frame.set(self.runtime_mut(), op.reg3, result)?;
            return Ok(Flow::Continue);
        }

        let (bin, inplace, specialised) = match op.opcode {
            BinaryAdd => (BinOp::Add, false, true),
            BinarySubtract => (BinOp::Sub, false, true),
            BinaryMultiply => (BinOp::Mul, false, true),
            BinaryDivide => (BinOp::Div, false, true),
            BinaryModulo => (BinOp::Mod, false, true),
            InplaceAdd => (BinOp::Add, true, true),
            InplaceSubtract => (BinOp::Sub, true, true),
            InplaceMultiply => (BinOp::Mul, true, true),
            InplaceDivide => (BinOp::Div, true, true),
            InplaceModulo => (BinOp::Mod, true, true),
            BinaryFloorDivide => (BinOp::FloorDiv, false, false),
            BinaryTrueDivide => (BinOp::TrueDiv, false, false),
            InplaceFloorDivide => (BinOp::FloorDiv, true, false),
            InplaceTrueDivide => (BinOp::TrueDiv, true, false),
            BinaryLshift => (BinOp::Lshift, false, false),
            BinaryRshift => (BinOp::Rshift, false, false),
            BinaryAnd => (BinOp::And, false, false),
            BinaryOr => (BinOp::Or, false, false),
            BinaryXor => (BinOp::Xor, false, false),
            InplaceLshift => (BinOp::Lshift, true, false),
            InplaceRshift => (BinOp::Rshift, true, false),
            InplaceAnd => (BinOp::And, true, false),
            InplaceOr => (BinOp::Or, true, false),
            InplaceXor => (BinOp::Xor, true, false),
            other => {
                return Err(EvalError::Invariant(format!(
                    "{} routed to the arithmetic handler",
                    other.name()
                )))
            }
        };

        let a = frame.get(op.reg1)?;
        let b = frame.get(op.reg2)?;

        if specialised {
            let rt = self.runtime();
            // `as_int` only accepts exact machine integers; bools and longs
            // take the generic path.
            if let (Some(x), Some(y)) = (rt.as_int(a), rt.as_int(b)) {
                if let Some(r) = int_fast_path(bin, x, y) {
                    let result = self.runtime_mut().new_int(r);
                    frame.set(self.runtime_mut(), op.reg3, result)?;
                    return Ok(Flow::Continue);
                }
            }
        }

        let result = self.runtime_mut().binary(bin, a, b, inplace)?;
        frame.set(self.runtime_mut(), op.reg3, result)?;
        Ok(Flow::Continue)
    }
}

/// Machine-word arithmetic; `None` falls through to the generic path.
fn int_fast_path(op: BinOp, a: i64, b: i64) -> Option<i64> {
    match op {
        BinOp::Add => {
            let r = a.wrapping_add(b);
            if (r ^ a) < 0 && (r ^ b) < 0 {
                None
            } else {
                Some(r)
            }
        }
        BinOp::Sub => {
            let r = a.wrapping_sub(b);
            if (r ^ a) < 0 && (r ^ !b) < 0 {
                None
            } else {
                Some(r)
            }
        }
        BinOp::Mul => {
            let wide = (a as i128) * (b as i128);
            if wide >= i64::MIN as i128 && wide <= i64::MAX as i128 {
                Some(wide as i64)
            } else {
                None
            }
        }
        BinOp::Div => {
            if b == 0 || (a == i64::MIN && b == -1) {
                return None;
            }
            let q = a / b;
            let r = a % b;
            Some(if r != 0 && (r < 0) != (b < 0) { q - 1 } else { q })
        }
        BinOp::Mod => {
            if b == 0 || (a == i64::MIN && b == -1) {
                return None;
            }
            let r = a % b;
            Some(if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
        }
        _ => None,
    }
}
