//! Generic numeric operations
//!
//! The evaluator's fast paths handle machine-word integers themselves; this
//! module is the generic fallback and the only place that knows about
//! promotion. Machine integers promote to arbitrary-precision values on
//! overflow instead of wrapping, so the fast path and the generic path agree
//! everywhere the fast path accepts.

use crate::object::Obj;
use crate::value::Value;
use crate::{RtResult, Runtime, RuntimeError};
use num_bigint::BigInt;
use num_traits::{Pow, Signed, ToPrimitive, Zero};

/// Binary operator selector for [`Runtime::binary`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    /// Classic division: floor on integers, true division once a float is
    /// involved.
    Div,
    TrueDiv,
    FloorDiv,
    Mod,
    Lshift,
    Rshift,
    And,
    Or,
    Xor,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div | BinOp::TrueDiv => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Lshift => "<<",
            BinOp::Rshift => ">>",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
        }
    }
}

/// Unary operator selector for [`Runtime::unary`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Invert,
    Not,
    /// Source-form rendering of the operand (the stack machine's conversion
    /// operator); yields a string.
    Convert,
}

/// Numeric view of an operand
enum Num {
    Int(i64),
    Long(BigInt),
    Float(f64),
}

/// Largest shift count accepted before the operation is refused; shifting
/// further would allocate unboundedly.
const MAX_SHIFT: u32 = 1 << 20;

impl Runtime {
    fn as_num(&self, v: Value) -> Option<Num> {
        match self.heap().get(v) {
            Obj::Int(n) => Some(Num::Int(*n)),
            Obj::Bool(b) => Some(Num::Int(*b as i64)),
            Obj::Long(n) => Some(Num::Long(n.clone())),
            Obj::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }

    fn type_error(&self, op: BinOp, a: Value, b: Value) -> RuntimeError {
        RuntimeError::Type(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op.symbol(),
            self.type_name(a),
            self.type_name(b)
        ))
    }

    /// Generic binary operation. `inplace` selects the augmented-assignment
    /// variant, which only differs for mutable sequences (`list += list`
    /// extends in place); everything else falls back to the plain operator.
    pub fn binary(&mut self, op: BinOp, a: Value, b: Value, inplace: bool) -> RtResult<Value> {
        // Sequence cases first; they are not numeric.
        match op {
            BinOp::Add => {
                if let Some(v) = self.seq_concat(a, b, inplace)? {
                    return Ok(v);
                }
            }
            BinOp::Mul => {
                if let Some(v) = self.seq_repeat(a, b)? {
                    return Ok(v);
                }
            }
            _ => {}
        }

        let (x, y) = match (self.as_num(a), self.as_num(b)) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(self.type_error(op, a, b)),
        };

        match (x, y) {
            (Num::Float(x), Num::Float(y)) => self.float_binop(op, x, y, a, b),
            (Num::Float(x), Num::Int(y)) => self.float_binop(op, x, y as f64, a, b),
            (Num::Int(x), Num::Float(y)) => self.float_binop(op, x as f64, y, a, b),
            (Num::Float(x), Num::Long(y)) => {
                let y = y.to_f64().unwrap_or(f64::INFINITY);
                self.float_binop(op, x, y, a, b)
            }
            (Num::Long(x), Num::Float(y)) => {
                let x = x.to_f64().unwrap_or(f64::INFINITY);
                self.float_binop(op, x, y, a, b)
            }
            (Num::Int(x), Num::Int(y)) => self.int_binop(op, x, y),
            (Num::Long(x), Num::Int(y)) => self.long_binop(op, x, BigInt::from(y)),
            (Num::Int(x), Num::Long(y)) => self.long_binop(op, BigInt::from(x), y),
            (Num::Long(x), Num::Long(y)) => self.long_binop(op, x, y),
        }
    }

    fn float_binop(&mut self, op: BinOp, x: f64, y: f64, a: Value, b: Value) -> RtResult<Value> {
        let r = match op {
            BinOp::Add => x + y,
            BinOp::Sub => x - y,
            BinOp::Mul => x * y,
            BinOp::Div | BinOp::TrueDiv => {
                if y == 0.0 {
                    return Err(RuntimeError::ZeroDivision);
                }
                x / y
            }
            BinOp::FloorDiv => {
                if y == 0.0 {
                    return Err(RuntimeError::ZeroDivision);
                }
                (x / y).floor()
            }
            BinOp::Mod => {
                if y == 0.0 {
                    return Err(RuntimeError::ZeroDivision);
                }
                let r = x % y;
                if r != 0.0 && (r < 0.0) != (y < 0.0) {
                    r + y
                } else {
                    r
                }
            }
            _ => return Err(self.type_error(op, a, b)),
        };
        Ok(self.new_float(r))
    }

    fn int_binop(&mut self, op: BinOp, x: i64, y: i64) -> RtResult<Value> {
        match op {
            BinOp::Add => match x.checked_add(y) {
                Some(r) => Ok(self.new_int(r)),
                None => Ok(self.new_long(BigInt::from(x) + BigInt::from(y))),
            },
            BinOp::Sub => match x.checked_sub(y) {
                Some(r) => Ok(self.new_int(r)),
                None => Ok(self.new_long(BigInt::from(x) - BigInt::from(y))),
            },
            BinOp::Mul => match x.checked_mul(y) {
                Some(r) => Ok(self.new_int(r)),
                None => Ok(self.new_long(BigInt::from(x) * BigInt::from(y))),
            },
            BinOp::Div | BinOp::FloorDiv => {
                if y == 0 {
                    return Err(RuntimeError::ZeroDivision);
                }
                if x == i64::MIN && y == -1 {
                    return Ok(self.new_long(-BigInt::from(x)));
                }
                Ok(self.new_int(floor_div(x, y)))
            }
            BinOp::TrueDiv => {
                if y == 0 {
                    return Err(RuntimeError::ZeroDivision);
                }
                Ok(self.new_float(x as f64 / y as f64))
            }
            BinOp::Mod => {
                if y == 0 {
                    return Err(RuntimeError::ZeroDivision);
                }
                Ok(self.new_int(floor_mod(x, y)))
            }
            BinOp::Lshift => {
                let shift = shift_count(y)?;
                match x.checked_shl(shift).filter(|r| (r >> shift) == x) {
                    Some(r) => Ok(self.new_int(r)),
                    None => Ok(self.new_long(BigInt::from(x) << shift)),
                }
            }
            BinOp::Rshift => {
                let shift = shift_count(y)?;
                Ok(self.new_int(x >> shift.min(63)))
            }
            BinOp::And => Ok(self.new_int(x & y)),
            BinOp::Or => Ok(self.new_int(x | y)),
            BinOp::Xor => Ok(self.new_int(x ^ y)),
        }
    }

    fn long_binop(&mut self, op: BinOp, x: BigInt, y: BigInt) -> RtResult<Value> {
        let r = match op {
            BinOp::Add => x + y,
            BinOp::Sub => x - y,
            BinOp::Mul => x * y,
            BinOp::Div | BinOp::FloorDiv => {
                if y.is_zero() {
                    return Err(RuntimeError::ZeroDivision);
                }
                big_floor_div(&x, &y)
            }
            BinOp::TrueDiv => {
                if y.is_zero() {
                    return Err(RuntimeError::ZeroDivision);
                }
                let xf = x.to_f64().unwrap_or(f64::INFINITY);
                let yf = y.to_f64().unwrap_or(f64::INFINITY);
                return Ok(self.new_float(xf / yf));
            }
            BinOp::Mod => {
                if y.is_zero() {
                    return Err(RuntimeError::ZeroDivision);
                }
                big_floor_mod(&x, &y)
            }
            BinOp::Lshift => {
                let shift = shift_count(y.to_i64().ok_or_else(|| {
                    RuntimeError::Overflow("shift count too large".into())
                })?)?;
                x << shift
            }
            BinOp::Rshift => {
                let shift = shift_count(y.to_i64().ok_or_else(|| {
                    RuntimeError::Overflow("shift count too large".into())
                })?)?;
                x >> shift
            }
            BinOp::And => x & y,
            BinOp::Or => x | y,
            BinOp::Xor => x ^ y,
        };
        Ok(self.new_long(r))
    }

    /// Ternary power with an optional modulus (`None`/null means plain
    /// exponentiation).
    pub fn power(&mut self, a: Value, b: Value, modulus: Value) -> RtResult<Value> {
        let has_mod = !modulus.is_null() && !self.is_none_singleton(modulus);
        let (x, y) = match (self.as_num(a), self.as_num(b)) {
            (Some(x), Some(y)) => (x, y),
            _ => {
                return Err(RuntimeError::Type(format!(
                    "unsupported operand type(s) for **: '{}' and '{}'",
                    self.type_name(a),
                    self.type_name(b)
                )))
            }
        };

        if has_mod {
            let m = match self.as_num(modulus) {
                Some(Num::Int(m)) => BigInt::from(m),
                Some(Num::Long(m)) => m,
                _ => {
                    return Err(RuntimeError::Type(
                        "pow() modulus must be an integer".into(),
                    ))
                }
            };
            if m.is_zero() {
                return Err(RuntimeError::ZeroDivision);
            }
            let (base, exp) = match (x, y) {
                (Num::Int(x), Num::Int(y)) => (BigInt::from(x), BigInt::from(y)),
                (Num::Long(x), Num::Int(y)) => (x, BigInt::from(y)),
                (Num::Int(x), Num::Long(y)) => (BigInt::from(x), y),
                (Num::Long(x), Num::Long(y)) => (x, y),
                _ => {
                    return Err(RuntimeError::Type(
                        "pow() with modulus requires integer operands".into(),
                    ))
                }
            };
            if exp.is_negative() {
                return Err(RuntimeError::Type(
                    "pow() negative exponent with modulus".into(),
                ));
            }
            let r = base.modpow(&exp, &m);
            return Ok(self.new_long(r));
        }

        match (x, y) {
            (Num::Int(x), Num::Int(y)) => {
                if y < 0 {
                    return Ok(self.new_float((x as f64).powf(y as f64)));
                }
                let exp = u32::try_from(y)
                    .map_err(|_| RuntimeError::Overflow("exponent too large".into()))?;
                match x.checked_pow(exp) {
                    Some(r) => Ok(self.new_int(r)),
                    None => Ok(self.new_long(Pow::pow(BigInt::from(x), exp))),
                }
            }
            (Num::Long(x), Num::Int(y)) => {
                if y < 0 {
                    let xf = x.to_f64().unwrap_or(f64::INFINITY);
                    return Ok(self.new_float(xf.powf(y as f64)));
                }
                let exp = u32::try_from(y)
                    .map_err(|_| RuntimeError::Overflow("exponent too large".into()))?;
                Ok(self.new_long(Pow::pow(x, exp)))
            }
            (x, y) => {
                let xf = match x {
                    Num::Int(n) => n as f64,
                    Num::Long(n) => n.to_f64().unwrap_or(f64::INFINITY),
                    Num::Float(f) => f,
                };
                let yf = match y {
                    Num::Int(n) => n as f64,
                    Num::Long(n) => n.to_f64().unwrap_or(f64::INFINITY),
                    Num::Float(f) => f,
                };
                Ok(self.new_float(xf.powf(yf)))
            }
        }
    }

    /// Generic unary operation.
    pub fn unary(&mut self, op: UnaryOp, v: Value) -> RtResult<Value> {
        match op {
            UnaryOp::Not => {
                let truth = self.is_truthy(v);
                Ok(self.bool_value(!truth))
            }
            UnaryOp::Convert => {
                let s = self.repr_of(v);
                Ok(self.new_str(s))
            }
            UnaryOp::Neg => match self.as_num(v) {
                Some(Num::Int(n)) => match n.checked_neg() {
                    Some(r) => Ok(self.new_int(r)),
                    None => Ok(self.new_long(-BigInt::from(n))),
                },
                Some(Num::Long(n)) => Ok(self.new_long(-n)),
                Some(Num::Float(f)) => Ok(self.new_float(-f)),
                None => Err(RuntimeError::Type(format!(
                    "bad operand type for unary -: '{}'",
                    self.type_name(v)
                ))),
            },
            UnaryOp::Pos => match self.as_num(v) {
                Some(Num::Int(n)) => Ok(self.new_int(n)),
                Some(Num::Long(n)) => Ok(self.new_long(n)),
                Some(Num::Float(f)) => Ok(self.new_float(f)),
                None => Err(RuntimeError::Type(format!(
                    "bad operand type for unary +: '{}'",
                    self.type_name(v)
                ))),
            },
            UnaryOp::Invert => match self.as_num(v) {
                Some(Num::Int(n)) => Ok(self.new_int(!n)),
                Some(Num::Long(n)) => Ok(self.new_long(!n)),
                _ => Err(RuntimeError::Type(format!(
                    "bad operand type for unary ~: '{}'",
                    self.type_name(v)
                ))),
            },
        }
    }

    // =========================================================================
    // Sequence arms of Add / Mul
    // =========================================================================

    fn seq_concat(&mut self, a: Value, b: Value, inplace: bool) -> RtResult<Option<Value>> {
        match (self.heap().get(a), self.heap().get(b)) {
            (Obj::Str(x), Obj::Str(y)) => {
                let joined = format!("{x}{y}");
                Ok(Some(self.new_str(joined)))
            }
            (Obj::List(_), Obj::List(y)) => {
                let extra: Vec<Value> = y.clone();
                if inplace {
                    for &v in &extra {
                        self.incref(v);
                    }
                    if let Obj::List(items) = self.heap_mut().get_mut(a) {
                        items.extend_from_slice(&extra);
                    }
                    self.incref(a);
                    Ok(Some(a))
                } else {
                    let mut items = match self.heap().get(a) {
                        Obj::List(x) => x.clone(),
                        _ => unreachable!(),
                    };
                    items.extend_from_slice(&extra);
                    for &v in &items {
                        self.incref(v);
                    }
                    Ok(Some(self.new_list(items)))
                }
            }
            (Obj::Tuple(x), Obj::Tuple(y)) => {
                let mut items = x.clone();
                items.extend_from_slice(y);
                for &v in &items {
                    self.incref(v);
                }
                Ok(Some(self.new_tuple(items)))
            }
            _ => Ok(None),
        }
    }

    fn seq_repeat(&mut self, a: Value, b: Value) -> RtResult<Option<Value>> {
        let (seq, count) = if self.is_sequence(a) {
            (a, b)
        } else if self.is_sequence(b) {
            (b, a)
        } else {
            return Ok(None);
        };
        let n = match self.as_index(count) {
            Some(n) => n.max(0) as usize,
            None => return Ok(None),
        };
        match self.heap().get(seq) {
            Obj::Str(s) => {
                let repeated = s.repeat(n);
                Ok(Some(self.new_str(repeated)))
            }
            Obj::List(items) => {
                let base = items.clone();
                let mut out = Vec::with_capacity(base.len() * n);
                for _ in 0..n {
                    out.extend_from_slice(&base);
                }
                for &v in &out {
                    self.incref(v);
                }
                Ok(Some(self.new_list(out)))
            }
            Obj::Tuple(items) => {
                let base = items.clone();
                let mut out = Vec::with_capacity(base.len() * n);
                for _ in 0..n {
                    out.extend_from_slice(&base);
                }
                for &v in &out {
                    self.incref(v);
                }
                Ok(Some(self.new_tuple(out)))
            }
            _ => Ok(None),
        }
    }

    /// True for the sliceable sequence types (string, list, tuple)
    pub fn is_sequence(&self, v: Value) -> bool {
        matches!(
            self.heap().get(v),
            Obj::Str(_) | Obj::List(_) | Obj::Tuple(_)
        )
    }
}

/// Floor division on machine words (rounds toward negative infinity)
fn floor_div(x: i64, y: i64) -> i64 {
    let q = x / y;
    let r = x % y;
    if r != 0 && (r < 0) != (y < 0) {
        q - 1
    } else {
        q
    }
}

/// Floored modulo (result carries the divisor's sign)
fn floor_mod(x: i64, y: i64) -> i64 {
    let r = x % y;
    if r != 0 && (r < 0) != (y < 0) {
        r + y
    } else {
        r
    }
}

fn big_floor_div(x: &BigInt, y: &BigInt) -> BigInt {
    let q = x / y;
    let r = x % y;
    if !r.is_zero() && (r.is_negative() != y.is_negative()) {
        q - 1
    } else {
        q
    }
}

fn big_floor_mod(x: &BigInt, y: &BigInt) -> BigInt {
    let r = x % y;
    if !r.is_zero() && (r.is_negative() != y.is_negative()) {
        r + y
    } else {
        r
    }
}

fn shift_count(y: i64) -> RtResult<u32> {
    if y < 0 {
        return Err(RuntimeError::Value("negative shift count".into()));
    }
    let y = u32::try_from(y).map_err(|_| RuntimeError::Overflow("shift count too large".into()))?;
    if y > MAX_SHIFT {
        return Err(RuntimeError::Overflow("shift count too large".into()));
    }
    Ok(y)
}
