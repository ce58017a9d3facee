//! Per-invocation register frames
//!
//! A frame owns its register array: every non-null slot holds exactly one
//! reference on behalf of the frame. Writes go through [`Frame::set`], which
//! releases the previous occupant before installing the new value; moves go
//! through [`Frame::take`], which clears the source slot so the reference
//! travels with the value. [`Frame::release`] drops everything the frame
//! still owns and runs on every exit path, success or error.

use crate::code::RegisterCode;
use crate::{EvalError, EvalResult};
use peregrine_runtime::{Runtime, Value};
use std::sync::Arc;

/// Register frame for one function invocation
pub struct Frame {
    code: Arc<RegisterCode>,
    /// Instruction cursor: absolute byte offset into the code buffer
    pub(crate) pc: usize,
    registers: Vec<Value>,
    /// Reusable positional-argument tuple for calls made from this frame
    call_args: Value,
    globals: Value,
    builtins: Value,
    /// Locals mapping; null for callee frames. Owned only when the frame
    /// created it (entry frames).
    locals: Value,
    owns_locals: bool,
}

impl Frame {
    /// Build a frame with constants preloaded and all other registers null.
    fn empty(code: Arc<RegisterCode>, rt: &mut Runtime, globals: Value) -> Self {
        let mut registers = vec![Value::NULL; code.num_registers() as usize];
        for (i, &c) in code.consts().iter().enumerate() {
            rt.incref(c);
            registers[i] = c;
        }
        let pc = code.entry_offset();
        Frame {
            code,
            pc,
            registers,
            call_args: Value::NULL,
            globals,
            builtins: rt.builtins_handle(),
            locals: Value::NULL,
            owns_locals: false,
        }
    }

    /// Construct a frame for a call.
    ///
    /// `self_value` is the bound receiver when the callee is a method; it
    /// occupies the first argument slot. Positional actuals fill
    /// left-to-right, trailing unbound parameters take values from the
    /// defaults tuple, and a shortfall that defaults cannot cover is an
    /// arity error.
    pub fn for_call(
        rt: &mut Runtime,
        code: Arc<RegisterCode>,
        globals: Value,
        defaults: Value,
        self_value: Option<Value>,
        args: Value,
    ) -> EvalResult<Self> {
        let needed = code.arg_count() as usize;
        let base = code.num_consts();
        let function = code.function();
        let name = if function.is_null() {
            "<anonymous>".to_owned()
        } else {
            rt.function_name(function).unwrap_or("<anonymous>").to_owned()
        };

        let actuals: Vec<Value> = rt
            .tuple_items(args)
            .ok_or_else(|| EvalError::Invariant("argument pack must be a tuple".into()))?
            .to_vec();
        let bound = self_value.is_some() as usize;
        let supplied = bound + actuals.len();
        let num_defaults = if defaults.is_null() {
            0
        } else {
            rt.tuple_len(defaults).unwrap_or(0)
        };

        if supplied > needed {
            return Err(EvalError::Arity(format!(
                "{name}() takes at most {needed} arguments ({supplied} given)"
            )));
        }
        if supplied + num_defaults < needed {
            return Err(EvalError::Arity(format!(
                "{name}() takes at least {} arguments ({supplied} given)",
                needed - num_defaults
            )));
        }

        let mut frame = Frame::empty(code, rt, globals);
        let mut slot = base;
        if let Some(receiver) = self_value {
            rt.incref(receiver);
            frame.registers[slot] = receiver;
            slot += 1;
        }
        for &a in &actuals {
            rt.incref(a);
            frame.registers[slot] = a;
            slot += 1;
        }
        // Trailing parameters come from the tail of the defaults tuple.
        let missing = needed - supplied;
        if missing > 0 {
            let defaults_items = rt
                .tuple_items(defaults)
                .ok_or_else(|| EvalError::Invariant("defaults must be a tuple".into()))?;
            let tail: Vec<Value> = defaults_items[num_defaults - missing..].to_vec();
            for d in tail {
                rt.incref(d);
                frame.registers[slot] = d;
                slot += 1;
            }
        }
        debug_assert_eq!(slot, base + needed);
        Ok(frame)
    }

    /// Attach an owned locals mapping (entry frames only).
    pub fn bind_locals(&mut self, locals: Value) {
        debug_assert!(self.locals.is_null());
        self.locals = locals;
        self.owns_locals = true;
    }

    #[inline]
    pub fn code(&self) -> &Arc<RegisterCode> {
        &self.code
    }

    #[inline]
    pub fn globals(&self) -> Value {
        self.globals
    }

    #[inline]
    pub fn builtins(&self) -> Value {
        self.builtins
    }

    #[inline]
    pub fn locals(&self) -> Value {
        self.locals
    }

    /// Read a register; reading an empty slot is corrupt code.
    #[inline]
    pub fn get(&self, r: u8) -> EvalResult<Value> {
        match self.registers.get(r as usize) {
            Some(v) if !v.is_null() => Ok(*v),
            Some(_) => Err(EvalError::Invariant(format!("read of empty register r{r}"))),
            None => Err(EvalError::Invariant(format!("register r{r} out of range"))),
        }
    }

    /// Write a register, releasing the previous occupant. The caller
    /// transfers one reference on `v`.
    #[inline]
    pub fn set(&mut self, rt: &mut Runtime, r: u8, v: Value) -> EvalResult<()> {
        match self.registers.get_mut(r as usize) {
            Some(slot) => {
                let old = std::mem::replace(slot, v);
                rt.decref(old);
                Ok(())
            }
            None => {
                rt.decref(v);
                Err(EvalError::Invariant(format!("register r{r} out of range")))
            }
        }
    }

    /// Move a value out of a register, clearing the slot; the reference
    /// travels with the returned value.
    #[inline]
    pub fn take(&mut self, r: u8) -> EvalResult<Value> {
        match self.registers.get_mut(r as usize) {
            Some(slot) if !slot.is_null() => Ok(std::mem::replace(slot, Value::NULL)),
            Some(_) => Err(EvalError::Invariant(format!("move from empty register r{r}"))),
            None => Err(EvalError::Invariant(format!("register r{r} out of range"))),
        }
    }

    /// Set the cursor to an absolute branch target after validating it
    /// lands inside the instruction area.
    #[inline]
    pub fn jump(&mut self, label: u32) -> EvalResult<()> {
        let target = label as usize;
        if target < self.code.entry_offset() || target >= self.code.instructions().len() {
            return Err(EvalError::Invariant(format!(
                "branch target {target} outside code buffer"
            )));
        }
        self.pc = target;
        Ok(())
    }

    /// Fill the reusable positional-argument tuple, allocating a new one
    /// when the arity changed. Takes over the item references; returns a
    /// handle borrowed from the frame.
    pub fn refill_call_args(&mut self, rt: &mut Runtime, items: Vec<Value>) -> EvalResult<Value> {
        if !self.call_args.is_null() && rt.tuple_len(self.call_args) == Some(items.len()) {
            rt.tuple_refill(self.call_args, items)
                .map_err(EvalError::Host)?;
        } else {
            let fresh = rt.new_tuple(items);
            let old = std::mem::replace(&mut self.call_args, fresh);
            rt.decref(old);
        }
        Ok(self.call_args)
    }

    /// Release every reference the frame still owns. Idempotent.
    pub fn release(&mut self, rt: &mut Runtime) {
        for slot in &mut self.registers {
            let v = std::mem::replace(slot, Value::NULL);
            rt.decref(v);
        }
        let args = std::mem::replace(&mut self.call_args, Value::NULL);
        rt.decref(args);
        if self.owns_locals {
            let locals = std::mem::replace(&mut self.locals, Value::NULL);
            rt.decref(locals);
            self.owns_locals = false;
        }
    }
}
