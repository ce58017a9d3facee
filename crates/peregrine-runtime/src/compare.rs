//! Rich comparison
//!
//! One entry point covers the whole comparison family; the operator is
//! selected by [`CmpOp`], which decodes straight from the comparison
//! instruction's argument word. Results are the canonical boolean
//! singletons.

use crate::object::Obj;
use crate::value::Value;
use crate::{RtResult, Runtime, RuntimeError};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::cmp::Ordering;

/// Comparison operator, numbered the way the comparison instruction's
/// argument encodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
    Is,
    IsNot,
}

impl CmpOp {
    /// Decode from the instruction argument; `None` for selector values
    /// outside the supported set (containment tests, exception matching).
    pub fn from_arg(arg: u16) -> Option<Self> {
        match arg {
            0 => Some(CmpOp::Lt),
            1 => Some(CmpOp::Le),
            2 => Some(CmpOp::Eq),
            3 => Some(CmpOp::Ne),
            4 => Some(CmpOp::Gt),
            5 => Some(CmpOp::Ge),
            8 => Some(CmpOp::Is),
            9 => Some(CmpOp::IsNot),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
        }
    }
}

impl Runtime {
    /// Compare two values, returning a canonical boolean.
    pub fn rich_compare(&mut self, op: CmpOp, a: Value, b: Value) -> RtResult<Value> {
        let result = match op {
            CmpOp::Is => a == b,
            CmpOp::IsNot => a != b,
            CmpOp::Eq => self.value_eq(a, b),
            CmpOp::Ne => !self.value_eq(a, b),
            CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
                let ordering = self.value_ordering(a, b)?;
                match op {
                    CmpOp::Lt => ordering == Ordering::Less,
                    CmpOp::Le => ordering != Ordering::Greater,
                    CmpOp::Gt => ordering == Ordering::Greater,
                    CmpOp::Ge => ordering != Ordering::Less,
                    _ => unreachable!(),
                }
            }
        };
        Ok(self.bool_value(result))
    }

    /// Structural equality; values of unrelated types are unequal rather
    /// than an error.
    pub(crate) fn value_eq(&self, a: Value, b: Value) -> bool {
        if a == b {
            return true;
        }
        match (self.heap().get(a), self.heap().get(b)) {
            (Obj::None, Obj::None) => true,
            (Obj::Str(x), Obj::Str(y)) => x == y,
            (Obj::Tuple(x), Obj::Tuple(y)) | (Obj::List(x), Obj::List(y)) => {
                x.len() == y.len()
                    && x.iter()
                        .zip(y.iter())
                        .all(|(&xi, &yi)| self.value_eq(xi, yi))
            }
            (x, y) => match (numeric_view(x), numeric_view(y)) {
                (Some(x), Some(y)) => numeric_cmp(&x, &y) == Some(Ordering::Equal),
                _ => false,
            },
        }
    }

    /// Total ordering for comparable values; an error for everything else.
    pub(crate) fn value_ordering(&self, a: Value, b: Value) -> RtResult<Ordering> {
        match (self.heap().get(a), self.heap().get(b)) {
            (Obj::Str(x), Obj::Str(y)) => Ok(x.cmp(y)),
            (Obj::Tuple(x), Obj::Tuple(y)) | (Obj::List(x), Obj::List(y)) => {
                for (&xi, &yi) in x.iter().zip(y.iter()) {
                    match self.value_ordering(xi, yi)? {
                        Ordering::Equal => continue,
                        other => return Ok(other),
                    }
                }
                Ok(x.len().cmp(&y.len()))
            }
            (x, y) => match (numeric_view(x), numeric_view(y)) {
                (Some(x), Some(y)) => numeric_cmp(&x, &y).ok_or_else(|| {
                    RuntimeError::Value("cannot order NaN values".into())
                }),
                _ => Err(RuntimeError::Type(format!(
                    "no ordering between '{}' and '{}'",
                    x.type_name(),
                    y.type_name()
                ))),
            },
        }
    }
}

enum NumView {
    Big(BigInt),
    Float(f64),
}

fn numeric_view(obj: &Obj) -> Option<NumView> {
    match obj {
        Obj::Int(n) => Some(NumView::Big(BigInt::from(*n))),
        Obj::Bool(b) => Some(NumView::Big(BigInt::from(*b as i64))),
        Obj::Long(n) => Some(NumView::Big(n.clone())),
        Obj::Float(f) => Some(NumView::Float(*f)),
        _ => None,
    }
}

fn numeric_cmp(x: &NumView, y: &NumView) -> Option<Ordering> {
    match (x, y) {
        (NumView::Big(x), NumView::Big(y)) => Some(x.cmp(y)),
        (NumView::Float(x), NumView::Float(y)) => x.partial_cmp(y),
        (NumView::Big(x), NumView::Float(y)) => {
            x.to_f64().unwrap_or(f64::INFINITY).partial_cmp(y)
        }
        (NumView::Float(x), NumView::Big(y)) => {
            x.partial_cmp(&y.to_f64().unwrap_or(f64::INFINITY))
        }
    }
}
