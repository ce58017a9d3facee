//! Reference-counted dynamic object runtime for the Peregrine VM
//!
//! This crate is the "host" side of the evaluator: an arena of
//! reference-counted, dynamically-typed objects together with the narrow
//! capability surface the evaluator calls into — arithmetic, comparison,
//! container access, iteration, attribute access, callable invocation and
//! printing.
//!
//! # Reference conventions
//!
//! [`Value`] is a `Copy` handle; ownership of references is a protocol, not
//! a type. The conventions are uniform across the crate:
//!
//! - Every function **returning** a `Value` returns an owned reference: the
//!   caller is responsible for exactly one `decref`.
//! - Every function **taking** `Value` parameters borrows them; if a
//!   container retains one, it performs its own `incref`.
//! - Freshly allocated objects start with a reference count of one.

pub mod builtins;
pub mod compare;
pub mod gil;
pub mod heap;
pub mod io;
pub mod numeric;
pub mod object;
pub mod value;

mod runtime;

pub use compare::CmpOp;
pub use gil::{Gil, GilGuard};
pub use heap::Heap;
pub use numeric::{BinOp, UnaryOp};
pub use object::{FileSink, Function, NativeFn, Obj};
pub use runtime::Runtime;
pub use value::Value;

/// Errors raised by runtime primitives — the host error indicator the
/// evaluator surfaces unchanged.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    #[error("type error: {0}")]
    Type(String),

    #[error("index out of range")]
    Index,

    #[error("key error: {0}")]
    Key(String),

    #[error("attribute error: {0}")]
    Attribute(String),

    #[error("division by zero")]
    ZeroDivision,

    #[error("value error: {0}")]
    Value(String),

    #[error("overflow: {0}")]
    Overflow(String),

    #[error("io error: {0}")]
    Io(String),
}

/// Runtime operation result
pub type RtResult<T> = Result<T, RuntimeError>;
