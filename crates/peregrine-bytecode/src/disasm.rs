//! Code-buffer disassembly
//!
//! One line per instruction, offset-prefixed. Mostly used from tests and
//! trace logging; kept here so the evaluator does not need its own decoder
//! for diagnostics.

use crate::instr::{Instr, Prelude, PRELUDE_SIZE};
use crate::opcode::BAD_REGISTER;
use crate::DecodeError;
use std::fmt::Write;

fn fmt_reg(r: u8) -> String {
    if r == BAD_REGISTER {
        "-".to_string()
    } else {
        format!("r{r}")
    }
}

/// Render a full code buffer (prelude included) as a listing.
pub fn disassemble(buf: &[u8]) -> Result<String, DecodeError> {
    let prelude = Prelude::read(buf)?;
    let mut out = String::new();
    writeln!(
        out,
        "; registers={} flags={:#06x}",
        prelude.num_registers, prelude.flags
    )
    .unwrap();

    let mut pc = PRELUDE_SIZE;
    while pc < buf.len() {
        let (instr, size) = Instr::read(buf, pc)?;
        writeln!(out, "{:5}: {}", pc, render(&instr)).unwrap();
        pc += size;
    }
    Ok(out)
}

/// Render a single decoded instruction.
pub fn render(instr: &Instr) -> String {
    match instr {
        Instr::Reg(op) => format!(
            "{:<22} arg={} {} {} {} {}",
            op.opcode.name(),
            op.arg,
            fmt_reg(op.reg1),
            fmt_reg(op.reg2),
            fmt_reg(op.reg3),
            fmt_reg(op.reg4),
        ),
        Instr::VarReg(op) => {
            let regs: Vec<String> = op.regs.iter().map(|&r| fmt_reg(r)).collect();
            format!(
                "{:<22} arg={} [{}]",
                op.opcode.name(),
                op.arg,
                regs.join(", ")
            )
        }
        Instr::Branch(op) => format!(
            "{:<22} {} {} -> {}",
            op.opcode.name(),
            fmt_reg(op.reg1),
            fmt_reg(op.reg2),
            op.label,
        ),
    }
}
