//! Dynamic object representations
//!
//! One enum covers every object kind the evaluator can observe. Containers
//! hold [`Value`] handles and own one reference per element; the heap
//! releases those references when the container dies.

use crate::value::Value;
use crate::{RtResult, Runtime};
use num_bigint::BigInt;
use rustc_hash::FxHashMap;

/// Signature of a foreign (native) callable
pub type NativeFn = fn(&mut Runtime, &[Value]) -> RtResult<Value>;

/// Metadata of an in-language function
///
/// `code_id` is an opaque ticket the evaluator's code cache resolves to a
/// compiled register-code artifact; the runtime never interprets it.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub code_id: u32,
    /// Module globals dictionary (owned reference)
    pub globals: Value,
    /// Default-argument tuple, or null when the function has no defaults
    /// (owned reference)
    pub defaults: Value,
    /// Number of declared parameters
    pub arity: u16,
}

/// Output target of a file object
pub enum FileSink {
    /// Process standard output
    Stdout,
    /// In-memory capture, used by tests
    Buffer(Vec<u8>),
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileSink::Stdout => write!(f, "Stdout"),
            FileSink::Buffer(b) => write!(f, "Buffer({} bytes)", b.len()),
        }
    }
}

/// A dynamically-typed runtime object
#[derive(Debug)]
pub enum Obj {
    None,
    Bool(bool),
    Int(i64),
    Long(BigInt),
    Float(f64),
    Str(String),
    Tuple(Vec<Value>),
    List(Vec<Value>),
    /// String-keyed mapping; the evaluator uses dictionaries for globals,
    /// builtins, locals and keyword arguments, all of which are keyed by
    /// identifier strings.
    Dict(FxHashMap<String, Value>),
    Slice {
        start: Value,
        stop: Value,
        step: Value,
    },
    Function(Function),
    Native {
        name: &'static str,
        func: NativeFn,
    },
    /// Callable bound to a receiver
    Method {
        func: Value,
        receiver: Value,
    },
    /// Iterator over a sequence (list, tuple or string)
    SeqIter {
        seq: Value,
        index: usize,
    },
    File {
        sink: FileSink,
        softspace: bool,
    },
}

impl Obj {
    /// Short type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Obj::None => "NoneType",
            Obj::Bool(_) => "bool",
            Obj::Int(_) => "int",
            Obj::Long(_) => "long",
            Obj::Float(_) => "float",
            Obj::Str(_) => "str",
            Obj::Tuple(_) => "tuple",
            Obj::List(_) => "list",
            Obj::Dict(_) => "dict",
            Obj::Slice { .. } => "slice",
            Obj::Function(_) => "function",
            Obj::Native { .. } => "builtin_function_or_method",
            Obj::Method { .. } => "instancemethod",
            Obj::SeqIter { .. } => "iterator",
            Obj::File { .. } => "file",
        }
    }

    /// Handles this object owns a reference to, in release order.
    ///
    /// The heap walks these when the object's refcount reaches zero.
    pub(crate) fn children(&self, out: &mut Vec<Value>) {
        match self {
            Obj::Tuple(items) | Obj::List(items) => out.extend(items.iter().copied()),
            Obj::Dict(map) => out.extend(map.values().copied()),
            Obj::Slice { start, stop, step } => {
                out.extend([*start, *stop, *step]);
            }
            Obj::Function(f) => out.extend([f.globals, f.defaults]),
            Obj::Method { func, receiver } => out.extend([*func, *receiver]),
            Obj::SeqIter { seq, .. } => out.push(*seq),
            _ => {}
        }
    }
}
