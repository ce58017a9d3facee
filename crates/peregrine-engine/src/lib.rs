//! Register-machine evaluator for the Peregrine VM
//!
//! Executes the register form of a dynamically-typed, reference-counted
//! stack bytecode. The translation from stack code is performed elsewhere;
//! this crate consumes [`RegisterCode`] artifacts and runs them against the
//! [`peregrine_runtime`] object runtime.
//!
//! The pieces:
//! - [`RegisterCode`] — a compiled-code artifact binding an instruction
//!   buffer to its constant and name pools
//! - [`Frame`] — per-invocation state: the owned register array, the
//!   instruction cursor and the name bindings
//! - [`Vm`] — the dispatch loop, the operation handlers (under [`ops`]) and
//!   the call protocol with its lazy code cache
//!
//! Public entry: [`Vm::eval`].

pub mod cache;
pub mod code;
pub mod eval;
pub mod frame;
pub mod ops;

pub use cache::{CodeCache, TranslateFn};
pub use code::RegisterCode;
pub use eval::{EvalOptions, Vm};
pub use frame::Frame;

use peregrine_runtime::RuntimeError;

/// Evaluator errors
///
/// `Host` carries an error raised by a runtime primitive unchanged; the
/// remaining variants originate in the evaluator itself. Unsupported
/// features and the runtime limit surface as system errors naming the
/// offending construct.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Call arity cannot be satisfied even with defaults
    #[error("{0}")]
    Arity(String),

    /// Name not found in locals, globals or builtins
    #[error("name '{0}' is not defined")]
    Name(String),

    /// Instruction or construct outside the supported subset
    #[error("system error: unsupported feature: {0}")]
    Unsupported(String),

    /// Error raised by a host-runtime primitive
    #[error(transparent)]
    Host(#[from] RuntimeError),

    /// A single frame executed more instructions than the configured limit
    #[error("system error: instruction limit exceeded (infinite loop?)")]
    LimitExceeded,

    /// Corrupt code or a broken evaluator invariant; not recoverable
    #[error("invariant violation: {0}")]
    Invariant(String),
}

/// Evaluator operation result
pub type EvalResult<T> = Result<T, EvalError>;
