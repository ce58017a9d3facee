//! Register bytecode encoding for the Peregrine VM
//!
//! This crate defines the wire format consumed by the evaluator:
//! - The [`Opcode`] enumeration and its three instruction formats
//! - The decoded instruction views ([`RegOp`], [`VarRegOp`], [`BranchOp`])
//!   and the fixed-size [`Prelude`] header
//! - A [`CodeWriter`] for emitting code buffers with branch-label patching
//! - A [`disasm`] helper for human-readable listings
//!
//! The encoding is byte-addressed and little-endian. Nothing in this crate
//! touches runtime values; it is shared between the translator that produces
//! register code and the evaluator that executes it.

pub mod disasm;
pub mod instr;
pub mod opcode;
pub mod writer;

pub use instr::{BranchOp, Instr, Prelude, RegOp, VarRegOp, BRANCH_OP_SIZE, PRELUDE_SIZE, REG_OP_SIZE};
pub use opcode::{InstrFormat, Opcode, BAD_REGISTER};
pub use writer::{CodeWriter, Label};

/// Errors produced while decoding a code buffer
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Buffer does not start with a valid prelude
    #[error("invalid code prelude: {0}")]
    BadPrelude(String),

    /// Opcode byte does not name any instruction
    #[error("unknown opcode byte 0x{0:02X} at offset {1}")]
    UnknownOpcode(u8, usize),

    /// Instruction extends past the end of the buffer
    #[error("truncated instruction at offset {0}")]
    Truncated(usize),
}
