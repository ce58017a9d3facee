//! Instruction wire formats and the code-buffer prelude
//!
//! A code buffer is a contiguous byte array:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ Prelude (8 bytes)            │  magic, register count, flags
//! ├──────────────────────────────┤
//! │ instruction                  │  one of three formats, self-describing
//! │ instruction                  │  via the leading opcode byte
//! │ ...                          │
//! └──────────────────────────────┘
//! ```
//!
//! All multi-byte fields are little-endian. Branch labels are absolute byte
//! offsets into the buffer (prelude included), so a branch target computed at
//! translation time stays valid at execution time.

use crate::opcode::{InstrFormat, Opcode};
use crate::DecodeError;

/// Fixed size of [`RegOp`] on the wire
pub const REG_OP_SIZE: usize = 8;
/// Fixed size of [`BranchOp`] on the wire
pub const BRANCH_OP_SIZE: usize = 8;
/// Fixed size of the [`Prelude`]
pub const PRELUDE_SIZE: usize = 8;

/// Magic value identifying a register code buffer
pub const PRELUDE_MAGIC: u32 = 0x5052_4743;

/// Prelude flag: the translated code declares cell variables
pub const FLAG_HAS_CELLVARS: u16 = 1 << 0;

/// Fixed-size header at the start of every code buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prelude {
    /// Total register slots the code requires
    pub num_registers: u16,
    /// Feature flags (see `FLAG_*`)
    pub flags: u16,
}

impl Prelude {
    /// Encode into the first [`PRELUDE_SIZE`] bytes of `buf`
    pub fn write(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&PRELUDE_MAGIC.to_le_bytes());
        buf[4..6].copy_from_slice(&self.num_registers.to_le_bytes());
        buf[6..8].copy_from_slice(&self.flags.to_le_bytes());
    }

    /// Decode from the start of `buf`
    pub fn read(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < PRELUDE_SIZE {
            return Err(DecodeError::BadPrelude("buffer shorter than prelude".into()));
        }
        let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if magic != PRELUDE_MAGIC {
            return Err(DecodeError::BadPrelude(format!(
                "bad magic 0x{magic:08X}"
            )));
        }
        Ok(Prelude {
            num_registers: u16::from_le_bytes([buf[4], buf[5]]),
            flags: u16::from_le_bytes([buf[6], buf[7]]),
        })
    }
}

/// Fixed three/four-operand instruction
///
/// Wire layout: `[opcode][arg:16][reg1][reg2][reg3][reg4]` plus one pad byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegOp {
    pub opcode: Opcode,
    pub arg: u16,
    pub reg1: u8,
    pub reg2: u8,
    pub reg3: u8,
    pub reg4: u8,
}

impl RegOp {
    /// Decode from `buf` at `offset`. The opcode byte has already been
    /// validated by the caller.
    pub fn read(opcode: Opcode, buf: &[u8], offset: usize) -> Result<Self, DecodeError> {
        if offset + REG_OP_SIZE > buf.len() {
            return Err(DecodeError::Truncated(offset));
        }
        let b = &buf[offset..offset + REG_OP_SIZE];
        Ok(RegOp {
            opcode,
            arg: u16::from_le_bytes([b[1], b[2]]),
            reg1: b[3],
            reg2: b[4],
            reg3: b[5],
            reg4: b[6],
        })
    }

    /// Encode into an 8-byte array
    pub fn encode(&self) -> [u8; REG_OP_SIZE] {
        let arg = self.arg.to_le_bytes();
        [
            self.opcode.to_u8(),
            arg[0],
            arg[1],
            self.reg1,
            self.reg2,
            self.reg3,
            self.reg4,
            0,
        ]
    }
}

/// Variable-arity instruction
///
/// Wire layout: `[opcode][arg:16][num_registers][regs...]`; size is
/// `4 + num_registers` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarRegOp {
    pub opcode: Opcode,
    pub arg: u16,
    pub regs: Vec<u8>,
}

impl VarRegOp {
    /// Wire size of a variable-arity instruction with `n` register operands
    #[inline]
    pub fn size(n: usize) -> usize {
        4 + n
    }

    pub fn read(opcode: Opcode, buf: &[u8], offset: usize) -> Result<Self, DecodeError> {
        if offset + 4 > buf.len() {
            return Err(DecodeError::Truncated(offset));
        }
        let n = buf[offset + 3] as usize;
        if offset + Self::size(n) > buf.len() {
            return Err(DecodeError::Truncated(offset));
        }
        Ok(VarRegOp {
            opcode,
            arg: u16::from_le_bytes([buf[offset + 1], buf[offset + 2]]),
            regs: buf[offset + 4..offset + 4 + n].to_vec(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        debug_assert!(self.regs.len() <= u8::MAX as usize);
        let mut out = Vec::with_capacity(Self::size(self.regs.len()));
        out.push(self.opcode.to_u8());
        out.extend_from_slice(&self.arg.to_le_bytes());
        out.push(self.regs.len() as u8);
        out.extend_from_slice(&self.regs);
        out
    }
}

/// Branch instruction
///
/// Wire layout: `[opcode][reg1][reg2][pad][label:32]`; the label is an
/// absolute byte offset into the code buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchOp {
    pub opcode: Opcode,
    pub reg1: u8,
    pub reg2: u8,
    pub label: u32,
}

impl BranchOp {
    pub fn read(opcode: Opcode, buf: &[u8], offset: usize) -> Result<Self, DecodeError> {
        if offset + BRANCH_OP_SIZE > buf.len() {
            return Err(DecodeError::Truncated(offset));
        }
        let b = &buf[offset..offset + BRANCH_OP_SIZE];
        Ok(BranchOp {
            opcode,
            reg1: b[1],
            reg2: b[2],
            label: u32::from_le_bytes([b[4], b[5], b[6], b[7]]),
        })
    }

    pub fn encode(&self) -> [u8; BRANCH_OP_SIZE] {
        let label = self.label.to_le_bytes();
        [
            self.opcode.to_u8(),
            self.reg1,
            self.reg2,
            0,
            label[0],
            label[1],
            label[2],
            label[3],
        ]
    }
}

/// A decoded instruction of any format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    Reg(RegOp),
    VarReg(VarRegOp),
    Branch(BranchOp),
}

impl Instr {
    /// Decode the instruction at `offset`, returning it together with its
    /// wire size.
    pub fn read(buf: &[u8], offset: usize) -> Result<(Self, usize), DecodeError> {
        let byte = *buf.get(offset).ok_or(DecodeError::Truncated(offset))?;
        let opcode = Opcode::from_u8(byte).ok_or(DecodeError::UnknownOpcode(byte, offset))?;
        match opcode.format() {
            InstrFormat::Reg => {
                let op = RegOp::read(opcode, buf, offset)?;
                Ok((Instr::Reg(op), REG_OP_SIZE))
            }
            InstrFormat::VarReg => {
                let op = VarRegOp::read(opcode, buf, offset)?;
                let size = VarRegOp::size(op.regs.len());
                Ok((Instr::VarReg(op), size))
            }
            InstrFormat::Branch => {
                let op = BranchOp::read(opcode, buf, offset)?;
                Ok((Instr::Branch(op), BRANCH_OP_SIZE))
            }
        }
    }

    /// Opcode of the decoded instruction
    pub fn opcode(&self) -> Opcode {
        match self {
            Instr::Reg(op) => op.opcode,
            Instr::VarReg(op) => op.opcode,
            Instr::Branch(op) => op.opcode,
        }
    }
}
