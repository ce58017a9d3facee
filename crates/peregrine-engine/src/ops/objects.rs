//! Attribute access, subscription, iteration setup and list mutation

use crate::frame::Frame;
use crate::ops::Flow;
use crate::{EvalError, EvalResult, Vm};
use peregrine_bytecode::instr::RegOp;
use peregrine_bytecode::Opcode;

impl Vm {
    pub(crate) fn exec_object(&mut self, frame: &mut Frame, op: &RegOp) -> EvalResult<Flow> {
        match op.opcode {
            Opcode::LoadAttr => {
                // reg2 = reg1.names[arg]
                let obj = frame.get(op.reg1)?;
                let name = frame.code().name_at(op.arg)?;
                let result = self.runtime_mut().get_attr(obj, name)?;
                frame.set(self.runtime_mut(), op.reg2, result)?;
            }
            Opcode::StoreAttr => {
                // reg1.names[arg] = reg2
                let obj = frame.get(op.reg1)?;
                let value = frame.get(op.reg2)?;
                let name = frame.code().name_at(op.arg)?;
                self.runtime_mut().set_attr(obj, name, value)?;
            }
            Opcode::BinarySubscr => {
                // reg3 = reg1[reg2], with a direct-fetch fast path for
                // machine-integer indexing into lists
                let obj = frame.get(op.reg1)?;
                let key = frame.get(op.reg2)?;
                let rt = self.runtime();
                let fast = match (rt.list_len(obj), rt.as_int(key)) {
                    (Some(len), Some(index)) => {
                        let wrapped = if index < 0 { index + len as i64 } else { index };
                        if (0..len as i64).contains(&wrapped) {
                            Some(wrapped as usize)
                        } else {
                            None
                        }
                    }
                    _ => None,
                };
                let result = match fast {
                    Some(index) => self.runtime_mut().list_get_unchecked(obj, index),
                    None => self.runtime_mut().get_item(obj, key)?,
                };
                frame.set(self.runtime_mut(), op.reg3, result)?;
            }
            Opcode::StoreSubscr => {
                // reg2[reg1] = reg3
                let key = frame.get(op.reg1)?;
                let obj = frame.get(op.reg2)?;
                let value = frame.get(op.reg3)?;
                self.runtime_mut().set_item(obj, key, value)?;
            }
            Opcode::ConstIndex => {
                // reg2 = reg1[arg], index embedded in the instruction
                let obj = frame.get(op.reg1)?;
                let index = op.arg as usize;
                let result = match self.runtime().list_len(obj) {
                    Some(len) if index < len => {
                        self.runtime_mut().list_get_unchecked(obj, index)
                    }
                    _ => {
                        let key = self.runtime_mut().new_int(op.arg as i64);
                        let result = self.runtime_mut().get_item(obj, key);
                        self.runtime_mut().decref(key);
                        result?
                    }
                };
                frame.set(self.runtime_mut(), op.reg2, result)?;
            }
            Opcode::ListAppend => {
                // reg1.append(reg2)
                let list = frame.get(op.reg1)?;
                let item = frame.get(op.reg2)?;
                self.runtime_mut().list_append(list, item)?;
            }
            Opcode::GetIter => {
                // reg2 = iter(reg1)
                let obj = frame.get(op.reg1)?;
                let it = self.runtime_mut().iter(obj)?;
                frame.set(self.runtime_mut(), op.reg2, it)?;
            }
            other => {
                return Err(EvalError::Invariant(format!(
                    "{} routed to the object handler",
                    other.name()
                )))
            }
        }
        Ok(Flow::Continue)
    }
}
