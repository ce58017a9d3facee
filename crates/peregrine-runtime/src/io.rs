//! Printing, string rendering and the soft-space protocol
//!
//! The print instructions implement the source machine's statement-form
//! printing: consecutive printed items are separated by a single space, and
//! a per-file "soft space" flag carries that state between instructions.

use crate::object::{FileSink, Obj};
use crate::value::Value;
use crate::{RtResult, Runtime, RuntimeError};
use std::io::Write;

impl Runtime {
    // =========================================================================
    // String rendering
    // =========================================================================

    /// Display form of a value (`str`-like: strings render raw)
    pub fn str_of(&self, v: Value) -> String {
        match self.heap().get(v) {
            Obj::Str(s) => s.clone(),
            _ => self.repr_of(v),
        }
    }

    /// Source form of a value (`repr`-like: strings render quoted)
    pub fn repr_of(&self, v: Value) -> String {
        match self.heap().get(v) {
            Obj::None => "None".to_string(),
            Obj::Bool(true) => "True".to_string(),
            Obj::Bool(false) => "False".to_string(),
            Obj::Int(n) => n.to_string(),
            Obj::Long(n) => format!("{n}L"),
            Obj::Float(f) => fmt_float(*f),
            Obj::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Obj::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(|&v| self.repr_of(v)).collect();
                if parts.len() == 1 {
                    format!("({},)", parts[0])
                } else {
                    format!("({})", parts.join(", "))
                }
            }
            Obj::List(items) => {
                let parts: Vec<String> = items.iter().map(|&v| self.repr_of(v)).collect();
                format!("[{}]", parts.join(", "))
            }
            Obj::Dict(map) => {
                let mut parts: Vec<String> = map
                    .iter()
                    .map(|(k, &v)| format!("'{}': {}", k, self.repr_of(v)))
                    .collect();
                parts.sort();
                format!("{{{}}}", parts.join(", "))
            }
            Obj::Slice { start, stop, step } => format!(
                "slice({}, {}, {})",
                self.opt_repr(*start),
                self.opt_repr(*stop),
                self.opt_repr(*step)
            ),
            Obj::Function(f) => format!("<function {}>", f.name),
            Obj::Native { name, .. } => format!("<built-in function {name}>"),
            Obj::Method { func, .. } => match self.heap().get(*func) {
                Obj::Function(f) => format!("<bound method {}>", f.name),
                Obj::Native { name, .. } => format!("<bound method {name}>"),
                _ => "<bound method>".to_string(),
            },
            Obj::SeqIter { .. } => "<iterator>".to_string(),
            Obj::File { .. } => "<open file>".to_string(),
        }
    }

    fn opt_repr(&self, v: Value) -> String {
        if v.is_null() {
            "None".to_string()
        } else {
            self.repr_of(v)
        }
    }

    // =========================================================================
    // File primitives
    // =========================================================================

    /// Write a raw string to a file value.
    pub fn file_write_str(&mut self, file: Value, s: &str) -> RtResult<()> {
        match self.heap_mut().get_mut(file) {
            Obj::File { sink, .. } => match sink {
                FileSink::Stdout => std::io::stdout()
                    .write_all(s.as_bytes())
                    .map_err(|e| RuntimeError::Io(e.to_string())),
                FileSink::Buffer(buf) => {
                    buf.extend_from_slice(s.as_bytes());
                    Ok(())
                }
            },
            other => Err(RuntimeError::Type(format!(
                "expected file, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn file_softspace(&self, file: Value) -> RtResult<bool> {
        match self.heap().get(file) {
            Obj::File { softspace, .. } => Ok(*softspace),
            other => Err(RuntimeError::Type(format!(
                "expected file, got {}",
                other.type_name()
            ))),
        }
    }

    /// Set the soft-space flag, returning the previous state.
    pub fn file_set_softspace(&mut self, file: Value, flag: bool) -> RtResult<bool> {
        match self.heap_mut().get_mut(file) {
            Obj::File { softspace, .. } => Ok(std::mem::replace(softspace, flag)),
            other => Err(RuntimeError::Type(format!(
                "expected file, got {}",
                other.type_name()
            ))),
        }
    }

    /// Drain the contents of a buffer-backed file (test capture).
    pub fn take_file_buffer(&mut self, file: Value) -> Option<String> {
        match self.heap_mut().get_mut(file) {
            Obj::File {
                sink: FileSink::Buffer(buf),
                ..
            } => Some(String::from_utf8_lossy(&std::mem::take(buf)).into_owned()),
            _ => None,
        }
    }

    // =========================================================================
    // Statement printing
    // =========================================================================

    /// Print one item to `file`, honouring the soft-space convention:
    /// a pending soft space prints as a leading separator, and printing a
    /// string that ends in whitespace other than a space suppresses the
    /// next one.
    pub fn print_item(&mut self, file: Value, item: Value) -> RtResult<()> {
        if self.file_softspace(file)? {
            self.file_write_str(file, " ")?;
        }
        let text = self.str_of(item);
        self.file_write_str(file, &text)?;

        let mut softspace = true;
        if self.is_str(item) {
            if let Some(last) = text.chars().last() {
                if last.is_whitespace() && last != ' ' {
                    softspace = false;
                }
            }
        }
        self.file_set_softspace(file, softspace)?;
        Ok(())
    }

    /// Terminate a print statement: newline, soft space cleared.
    pub fn print_newline(&mut self, file: Value) -> RtResult<()> {
        self.file_write_str(file, "\n")?;
        self.file_set_softspace(file, false)?;
        Ok(())
    }
}

/// Float rendering that keeps a decimal point on integral values
fn fmt_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if f == f.trunc() && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}
