//! Code writer with forward-label patching
//!
//! The writer reserves space for the prelude up front so every position it
//! reports is a final absolute byte offset, usable directly as a branch
//! label.

use crate::instr::{
    BranchOp, Prelude, RegOp, VarRegOp, BRANCH_OP_SIZE, PRELUDE_SIZE,
};
use crate::opcode::{InstrFormat, Opcode};

/// A branch-target placeholder handed out by [`CodeWriter::emit_branch`]
/// when the target is not yet known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Emits a prelude-prefixed code buffer
pub struct CodeWriter {
    code: Vec<u8>,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self {
            code: vec![0; PRELUDE_SIZE],
        }
    }

    /// Absolute byte offset of the next instruction
    #[inline]
    pub fn position(&self) -> usize {
        self.code.len()
    }

    /// Emit a fixed-format instruction; returns its offset.
    pub fn emit_reg(&mut self, op: Opcode, arg: u16, reg1: u8, reg2: u8, reg3: u8, reg4: u8) -> usize {
        debug_assert_eq!(op.format(), InstrFormat::Reg);
        let pos = self.position();
        self.code.extend_from_slice(
            &RegOp {
                opcode: op,
                arg,
                reg1,
                reg2,
                reg3,
                reg4,
            }
            .encode(),
        );
        pos
    }

    /// Emit a variable-arity instruction; returns its offset.
    pub fn emit_var(&mut self, op: Opcode, arg: u16, regs: &[u8]) -> usize {
        debug_assert_eq!(op.format(), InstrFormat::VarReg);
        let pos = self.position();
        self.code.extend_from_slice(
            &VarRegOp {
                opcode: op,
                arg,
                regs: regs.to_vec(),
            }
            .encode(),
        );
        pos
    }

    /// Emit a branch with a known absolute target; returns its offset.
    pub fn emit_branch(&mut self, op: Opcode, reg1: u8, reg2: u8, target: usize) -> usize {
        debug_assert_eq!(op.format(), InstrFormat::Branch);
        let pos = self.position();
        self.code.extend_from_slice(
            &BranchOp {
                opcode: op,
                reg1,
                reg2,
                label: target as u32,
            }
            .encode(),
        );
        pos
    }

    /// Emit a branch whose target is not yet known; patch with
    /// [`CodeWriter::bind`] once the target position is emitted.
    pub fn emit_branch_forward(&mut self, op: Opcode, reg1: u8, reg2: u8) -> Label {
        let pos = self.emit_branch(op, reg1, reg2, 0);
        Label(pos)
    }

    /// Patch a forward branch to target the current position.
    pub fn bind(&mut self, label: Label) {
        let target = self.position() as u32;
        let at = label.0;
        debug_assert!(at + BRANCH_OP_SIZE <= self.code.len());
        self.code[at + 4..at + 8].copy_from_slice(&target.to_le_bytes());
    }

    /// Finish the buffer, filling in the prelude.
    pub fn finish(mut self, num_registers: u16, flags: u16) -> Vec<u8> {
        Prelude {
            num_registers,
            flags,
        }
        .write(&mut self.code[..PRELUDE_SIZE]);
        self.code
    }
}

impl Default for CodeWriter {
    fn default() -> Self {
        Self::new()
    }
}
