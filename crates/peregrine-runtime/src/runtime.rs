//! The runtime facade: allocation, predicates, containers, attributes and
//! callable invocation
//!
//! Arithmetic, comparison and printing live in their own modules as further
//! `impl Runtime` blocks.

use crate::builtins;
use crate::heap::Heap;
use crate::object::{FileSink, Function, NativeFn, Obj};
use crate::value::Value;
use crate::{RtResult, RuntimeError};
use num_traits::ToPrimitive;
use num_traits::Zero;

/// The host object runtime
///
/// Owns the heap plus the canonical singletons (`None`, `True`, `False`),
/// the standard-output file, the builtins dictionary and the native
/// functions exposed as attributes of builtin types.
pub struct Runtime {
    heap: Heap,
    none: Value,
    tru: Value,
    fls: Value,
    stdout: Value,
    builtins: Value,
    nf_list_append: Value,
    nf_file_write: Value,
}

impl Runtime {
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let none = heap.alloc(Obj::None);
        let tru = heap.alloc(Obj::Bool(true));
        let fls = heap.alloc(Obj::Bool(false));
        let stdout = heap.alloc(Obj::File {
            sink: FileSink::Stdout,
            softspace: false,
        });
        let builtins_dict = heap.alloc(Obj::Dict(Default::default()));
        let nf_list_append = heap.alloc(Obj::Native {
            name: "list.append",
            func: builtins::list_append_method,
        });
        let nf_file_write = heap.alloc(Obj::Native {
            name: "file.write",
            func: builtins::file_write_method,
        });

        let mut rt = Self {
            heap,
            none,
            tru,
            fls,
            stdout,
            builtins: builtins_dict,
            nf_list_append,
            nf_file_write,
        };
        builtins::install(&mut rt);
        rt
    }

    // =========================================================================
    // Reference counting
    // =========================================================================

    #[inline]
    pub fn incref(&mut self, v: Value) {
        self.heap.incref(v);
    }

    #[inline]
    pub fn decref(&mut self, v: Value) {
        self.heap.decref(v);
    }

    #[inline]
    pub fn refcount(&self, v: Value) -> u32 {
        self.heap.refcount(v)
    }

    #[inline]
    pub fn live_objects(&self) -> usize {
        self.heap.live_objects()
    }

    #[inline]
    pub(crate) fn heap(&self) -> &Heap {
        &self.heap
    }

    #[inline]
    pub(crate) fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    // =========================================================================
    // Singletons
    // =========================================================================

    /// Owned reference to `None`
    pub fn none_value(&mut self) -> Value {
        self.heap.incref(self.none);
        self.none
    }

    /// Owned reference to the canonical `True`/`False`
    pub fn bool_value(&mut self, b: bool) -> Value {
        let v = if b { self.tru } else { self.fls };
        self.heap.incref(v);
        v
    }

    /// Identity test against the canonical `False` (borrowed, no refcount
    /// traffic) — used by branch handlers to short-circuit truthiness.
    #[inline]
    pub fn is_false_singleton(&self, v: Value) -> bool {
        v == self.fls
    }

    /// Identity test against the canonical `True`
    #[inline]
    pub fn is_true_singleton(&self, v: Value) -> bool {
        v == self.tru
    }

    /// Identity test against `None`
    #[inline]
    pub fn is_none_singleton(&self, v: Value) -> bool {
        v == self.none
    }

    /// Owned reference to the standard-output file object
    pub fn stdout_value(&mut self) -> Value {
        self.heap.incref(self.stdout);
        self.stdout
    }

    /// Borrowed handle to the builtins dictionary
    #[inline]
    pub fn builtins_handle(&self) -> Value {
        self.builtins
    }

    // =========================================================================
    // Constructors (all return owned references)
    // =========================================================================

    pub fn new_int(&mut self, n: i64) -> Value {
        self.heap.alloc(Obj::Int(n))
    }

    pub fn new_long(&mut self, n: num_bigint::BigInt) -> Value {
        self.heap.alloc(Obj::Long(n))
    }

    pub fn new_float(&mut self, f: f64) -> Value {
        self.heap.alloc(Obj::Float(f))
    }

    pub fn new_str(&mut self, s: impl Into<String>) -> Value {
        self.heap.alloc(Obj::Str(s.into()))
    }

    /// Build a tuple, taking over the callers' element references.
    pub fn new_tuple(&mut self, items: Vec<Value>) -> Value {
        self.heap.alloc(Obj::Tuple(items))
    }

    /// Build a list, taking over the callers' element references.
    pub fn new_list(&mut self, items: Vec<Value>) -> Value {
        self.heap.alloc(Obj::List(items))
    }

    pub fn new_dict(&mut self) -> Value {
        self.heap.alloc(Obj::Dict(Default::default()))
    }

    /// Build a slice object from borrowed endpoint handles.
    pub fn new_slice(&mut self, start: Value, stop: Value, step: Value) -> Value {
        self.heap.incref(start);
        self.heap.incref(stop);
        self.heap.incref(step);
        self.heap.alloc(Obj::Slice { start, stop, step })
    }

    /// Build an in-language function object. `globals` and `defaults` are
    /// borrowed; `defaults` may be null.
    pub fn new_function(
        &mut self,
        name: impl Into<String>,
        code_id: u32,
        globals: Value,
        defaults: Value,
        arity: u16,
    ) -> Value {
        self.heap.incref(globals);
        self.heap.incref(defaults);
        self.heap.alloc(Obj::Function(Function {
            name: name.into(),
            code_id,
            globals,
            defaults,
            arity,
        }))
    }

    pub fn new_native(&mut self, name: &'static str, func: NativeFn) -> Value {
        self.heap.alloc(Obj::Native { name, func })
    }

    /// Bind a callable to a receiver; both are borrowed.
    pub fn bind_method(&mut self, func: Value, receiver: Value) -> Value {
        self.heap.incref(func);
        self.heap.incref(receiver);
        self.heap.alloc(Obj::Method { func, receiver })
    }

    /// A file object writing into an in-memory buffer (test capture).
    pub fn new_buffer_file(&mut self) -> Value {
        self.heap.alloc(Obj::File {
            sink: FileSink::Buffer(Vec::new()),
            softspace: false,
        })
    }

    // =========================================================================
    // Predicates and accessors
    // =========================================================================

    pub fn type_name(&self, v: Value) -> &'static str {
        self.heap.get(v).type_name()
    }

    /// Exact machine-word integer (not bool, not long)
    #[inline]
    pub fn is_exact_int(&self, v: Value) -> bool {
        matches!(self.heap.get(v), Obj::Int(_))
    }

    #[inline]
    pub fn is_exact_float(&self, v: Value) -> bool {
        matches!(self.heap.get(v), Obj::Float(_))
    }

    #[inline]
    pub fn is_list(&self, v: Value) -> bool {
        matches!(self.heap.get(v), Obj::List(_))
    }

    #[inline]
    pub fn is_str(&self, v: Value) -> bool {
        matches!(self.heap.get(v), Obj::Str(_))
    }

    #[inline]
    pub fn is_method(&self, v: Value) -> bool {
        matches!(self.heap.get(v), Obj::Method { .. })
    }

    /// True for callables the host runtime executes itself: native
    /// functions, and methods whose underlying callable is native.
    pub fn is_foreign_callable(&self, v: Value) -> bool {
        match self.heap.get(v) {
            Obj::Native { .. } => true,
            Obj::Method { func, .. } => matches!(self.heap.get(*func), Obj::Native { .. }),
            _ => false,
        }
    }

    #[inline]
    pub fn as_int(&self, v: Value) -> Option<i64> {
        match self.heap.get(v) {
            Obj::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_float(&self, v: Value) -> Option<f64> {
        match self.heap.get(v) {
            Obj::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self, v: Value) -> Option<&str> {
        match self.heap.get(v) {
            Obj::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Accept Int, Bool or small-enough Long as a sequence index.
    pub fn as_index(&self, v: Value) -> Option<i64> {
        match self.heap.get(v) {
            Obj::Int(n) => Some(*n),
            Obj::Bool(b) => Some(*b as i64),
            Obj::Long(n) => n.to_i64(),
            _ => None,
        }
    }

    /// Truthiness of any value
    pub fn is_truthy(&self, v: Value) -> bool {
        match self.heap.get(v) {
            Obj::None => false,
            Obj::Bool(b) => *b,
            Obj::Int(n) => *n != 0,
            Obj::Long(n) => !n.is_zero(),
            Obj::Float(f) => *f != 0.0,
            Obj::Str(s) => !s.is_empty(),
            Obj::Tuple(items) | Obj::List(items) => !items.is_empty(),
            Obj::Dict(map) => !map.is_empty(),
            _ => true,
        }
    }

    // =========================================================================
    // Function and method introspection
    // =========================================================================

    /// `(code_id, globals, defaults, arity)` of an in-language function
    pub fn function_parts(&self, v: Value) -> Option<(u32, Value, Value, u16)> {
        match self.heap.get(v) {
            Obj::Function(f) => Some((f.code_id, f.globals, f.defaults, f.arity)),
            _ => None,
        }
    }

    pub fn function_name(&self, v: Value) -> Option<&str> {
        match self.heap.get(v) {
            Obj::Function(f) => Some(&f.name),
            Obj::Native { name, .. } => Some(name),
            _ => None,
        }
    }

    /// `(callable, receiver)` of a bound method
    pub fn method_parts(&self, v: Value) -> Option<(Value, Value)> {
        match self.heap.get(v) {
            Obj::Method { func, receiver } => Some((*func, *receiver)),
            _ => None,
        }
    }

    // =========================================================================
    // Dictionaries
    // =========================================================================

    /// Look up `key` (a string value) in a dictionary; the result, if any,
    /// is an owned reference.
    pub fn dict_get(&mut self, dict: Value, key: Value) -> RtResult<Option<Value>> {
        let key = self
            .as_str(key)
            .ok_or_else(|| RuntimeError::Type("dictionary keys must be strings".into()))?
            .to_owned();
        self.dict_get_str(dict, &key)
    }

    pub fn dict_get_str(&mut self, dict: Value, key: &str) -> RtResult<Option<Value>> {
        let found = match self.heap.get(dict) {
            Obj::Dict(map) => map.get(key).copied(),
            other => {
                return Err(RuntimeError::Type(format!(
                    "expected dict, got {}",
                    other.type_name()
                )))
            }
        };
        if let Some(v) = found {
            self.heap.incref(v);
        }
        Ok(found)
    }

    /// Bind `key -> value` in a dictionary; `value` is borrowed.
    pub fn dict_set(&mut self, dict: Value, key: Value, value: Value) -> RtResult<()> {
        let key = self
            .as_str(key)
            .ok_or_else(|| RuntimeError::Type("dictionary keys must be strings".into()))?
            .to_owned();
        self.dict_set_str(dict, &key, value)
    }

    pub fn dict_set_str(&mut self, dict: Value, key: &str, value: Value) -> RtResult<()> {
        self.heap.incref(value);
        let displaced = match self.heap.get_mut(dict) {
            Obj::Dict(map) => map.insert(key.to_owned(), value),
            other => {
                let type_name = other.type_name();
                self.heap.decref(value);
                return Err(RuntimeError::Type(format!(
                    "expected dict, got {type_name}"
                )));
            }
        };
        if let Some(old) = displaced {
            self.heap.decref(old);
        }
        Ok(())
    }

    // =========================================================================
    // Subscription
    // =========================================================================

    /// `obj[key]`; the result is an owned reference.
    pub fn get_item(&mut self, obj: Value, key: Value) -> RtResult<Value> {
        if let Obj::Slice { start, stop, .. } = self.heap.get(key) {
            let (start, stop) = (*start, *stop);
            let lo = self.slice_bound(start, 0)?;
            let hi = self.slice_bound(stop, isize::MAX as i64)?;
            return self.seq_slice(obj, lo, hi);
        }
        match self.heap.get(obj) {
            Obj::List(_) | Obj::Tuple(_) => {
                let index = self.as_index(key).ok_or_else(|| {
                    RuntimeError::Type(format!(
                        "sequence indices must be integers, not {}",
                        self.type_name(key)
                    ))
                })?;
                let items = match self.heap.get(obj) {
                    Obj::List(items) | Obj::Tuple(items) => items,
                    _ => unreachable!(),
                };
                let i = wrap_index(index, items.len()).ok_or(RuntimeError::Index)?;
                let item = items[i];
                self.heap.incref(item);
                Ok(item)
            }
            Obj::Str(s) => {
                let index = self
                    .as_index(key)
                    .ok_or_else(|| RuntimeError::Type("string indices must be integers".into()))?;
                let chars: Vec<char> = s.chars().collect();
                let i = wrap_index(index, chars.len()).ok_or(RuntimeError::Index)?;
                let ch = chars[i].to_string();
                Ok(self.new_str(ch))
            }
            Obj::Dict(_) => {
                let name = self
                    .as_str(key)
                    .ok_or_else(|| RuntimeError::Type("dictionary keys must be strings".into()))?
                    .to_owned();
                self.dict_get_str(obj, &name)?
                    .ok_or(RuntimeError::Key(name))
            }
            other => Err(RuntimeError::Type(format!(
                "{} object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    /// `obj[key] = value`; `value` is borrowed.
    pub fn set_item(&mut self, obj: Value, key: Value, value: Value) -> RtResult<()> {
        match self.heap.get(obj) {
            Obj::List(items) => {
                let len = items.len();
                let index = self.as_index(key).ok_or_else(|| {
                    RuntimeError::Type("list indices must be integers".into())
                })?;
                let i = wrap_index(index, len).ok_or(RuntimeError::Index)?;
                self.heap.incref(value);
                let old = match self.heap.get_mut(obj) {
                    Obj::List(items) => std::mem::replace(&mut items[i], value),
                    _ => unreachable!(),
                };
                self.heap.decref(old);
                Ok(())
            }
            Obj::Dict(_) => self.dict_set(obj, key, value),
            other => Err(RuntimeError::Type(format!(
                "{} object does not support item assignment",
                other.type_name()
            ))),
        }
    }

    /// Direct list element fetch used by the evaluator's subscript fast
    /// path; `index` has already been wrapped and bounds-checked against
    /// [`Runtime::list_len`].
    pub fn list_get_unchecked(&mut self, list: Value, index: usize) -> Value {
        let item = match self.heap.get(list) {
            Obj::List(items) => items[index],
            _ => unreachable!("fast path caller checked the receiver is a list"),
        };
        self.heap.incref(item);
        item
    }

    pub fn list_len(&self, list: Value) -> Option<usize> {
        match self.heap.get(list) {
            Obj::List(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Append `item` (borrowed) to a list.
    pub fn list_append(&mut self, list: Value, item: Value) -> RtResult<()> {
        self.heap.incref(item);
        match self.heap.get_mut(list) {
            Obj::List(items) => {
                items.push(item);
                Ok(())
            }
            other => {
                let type_name = other.type_name();
                self.heap.decref(item);
                Err(RuntimeError::Type(format!(
                    "cannot append to {type_name}"
                )))
            }
        }
    }

    pub fn tuple_len(&self, v: Value) -> Option<usize> {
        match self.heap.get(v) {
            Obj::Tuple(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Borrowed view of tuple elements
    pub fn tuple_items(&self, v: Value) -> Option<&[Value]> {
        match self.heap.get(v) {
            Obj::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Replace a tuple's elements in place, releasing the old ones. The new
    /// elements' references are taken over from the caller. Used for the
    /// evaluator's reusable call-argument tuple.
    pub fn tuple_refill(&mut self, tuple: Value, items: Vec<Value>) -> RtResult<()> {
        let old = match self.heap.get_mut(tuple) {
            Obj::Tuple(slots) => std::mem::replace(slots, items),
            other => {
                let type_name = other.type_name();
                return Err(RuntimeError::Type(format!(
                    "expected tuple, got {type_name}"
                )));
            }
        };
        for v in old {
            self.heap.decref(v);
        }
        Ok(())
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// `iter(obj)`; the result is an owned reference.
    pub fn iter(&mut self, obj: Value) -> RtResult<Value> {
        match self.heap.get(obj) {
            Obj::List(_) | Obj::Tuple(_) | Obj::Str(_) => {
                self.heap.incref(obj);
                Ok(self.heap.alloc(Obj::SeqIter { seq: obj, index: 0 }))
            }
            Obj::SeqIter { .. } => {
                self.heap.incref(obj);
                Ok(obj)
            }
            other => Err(RuntimeError::Type(format!(
                "{} object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Advance an iterator. `Ok(None)` signals exhaustion; a yielded value
    /// is an owned reference.
    pub fn iter_next(&mut self, it: Value) -> RtResult<Option<Value>> {
        let (seq, index) = match self.heap.get(it) {
            Obj::SeqIter { seq, index } => (*seq, *index),
            other => {
                return Err(RuntimeError::Type(format!(
                    "{} object is not an iterator",
                    other.type_name()
                )))
            }
        };
        let item = match self.heap.get(seq) {
            Obj::List(items) | Obj::Tuple(items) => items.get(index).copied(),
            Obj::Str(s) => {
                let ch = s.chars().nth(index).map(|c| c.to_string());
                match ch {
                    Some(ch) => Some(self.new_str(ch)),
                    None => None,
                }
            }
            other => {
                return Err(RuntimeError::Type(format!(
                    "iterator over broken sequence ({})",
                    other.type_name()
                )))
            }
        };
        match item {
            Some(item) => {
                // Strings allocate fresh one-char values; list and tuple
                // elements need the extra reference.
                if !matches!(self.heap.get(seq), Obj::Str(_)) {
                    self.heap.incref(item);
                }
                if let Obj::SeqIter { index, .. } = self.heap.get_mut(it) {
                    *index += 1;
                }
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    // =========================================================================
    // Slicing
    // =========================================================================

    /// Normalise a slice endpoint value: null or `None` maps to `default`,
    /// integers pass through.
    pub fn slice_bound(&self, v: Value, default: i64) -> RtResult<i64> {
        if v.is_null() || self.is_none_singleton(v) {
            return Ok(default);
        }
        self.as_index(v).ok_or_else(|| {
            RuntimeError::Type(format!(
                "slice indices must be integers, not {}",
                self.type_name(v)
            ))
        })
    }

    /// `obj[lo:hi]` over a sequence; negative endpoints wrap, everything is
    /// clamped to the sequence length. The result is an owned reference.
    pub fn seq_slice(&mut self, obj: Value, lo: i64, hi: i64) -> RtResult<Value> {
        match self.heap.get(obj) {
            Obj::List(items) | Obj::Tuple(items) => {
                let is_tuple = matches!(self.heap.get(obj), Obj::Tuple(_));
                let (lo, hi) = clamp_slice(lo, hi, items.len());
                let slice: Vec<Value> = items[lo..hi].to_vec();
                for &v in &slice {
                    self.heap.incref(v);
                }
                if is_tuple {
                    Ok(self.new_tuple(slice))
                } else {
                    Ok(self.new_list(slice))
                }
            }
            Obj::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let (lo, hi) = clamp_slice(lo, hi, chars.len());
                let out: String = chars[lo..hi].iter().collect();
                Ok(self.new_str(out))
            }
            other => Err(RuntimeError::Type(format!(
                "{} object cannot be sliced",
                other.type_name()
            ))),
        }
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// `obj.name`; the result is an owned reference.
    pub fn get_attr(&mut self, obj: Value, name: Value) -> RtResult<Value> {
        let name = self
            .as_str(name)
            .ok_or_else(|| RuntimeError::Type("attribute name must be a string".into()))?
            .to_owned();
        match (self.heap.get(obj), name.as_str()) {
            (Obj::List(_), "append") => Ok(self.bind_method(self.nf_list_append, obj)),
            (Obj::File { .. }, "write") => Ok(self.bind_method(self.nf_file_write, obj)),
            (Obj::File { softspace, .. }, "softspace") => {
                let softspace = *softspace;
                Ok(self.new_int(softspace as i64))
            }
            (other, _) => Err(RuntimeError::Attribute(format!(
                "{} object has no attribute '{}'",
                other.type_name(),
                name
            ))),
        }
    }

    /// `obj.name = value`; `value` is borrowed.
    pub fn set_attr(&mut self, obj: Value, name: Value, value: Value) -> RtResult<()> {
        let name = self
            .as_str(name)
            .ok_or_else(|| RuntimeError::Type("attribute name must be a string".into()))?
            .to_owned();
        match (self.heap.get(obj), name.as_str()) {
            (Obj::File { .. }, "softspace") => {
                let flag = self.is_truthy(value);
                if let Obj::File { softspace, .. } = self.heap.get_mut(obj) {
                    *softspace = flag;
                }
                Ok(())
            }
            (other, _) => Err(RuntimeError::Attribute(format!(
                "cannot set attribute '{}' on {} object",
                name,
                other.type_name()
            ))),
        }
    }

    // =========================================================================
    // Callable invocation (foreign path)
    // =========================================================================

    /// Generic host call: executes native callables directly. In-language
    /// functions cannot run here — interpreting them is the evaluator's
    /// job — so they fail with a type error, which is what the evaluator's
    /// fallback path surfaces when no compiled code exists for a callee.
    pub fn call(&mut self, callee: Value, args: Value, kwargs: Value) -> RtResult<Value> {
        if !kwargs.is_null() {
            let non_empty = match self.heap.get(kwargs) {
                Obj::Dict(map) => !map.is_empty(),
                _ => true,
            };
            if non_empty {
                return Err(RuntimeError::Type(
                    "native callables take no keyword arguments".into(),
                ));
            }
        }
        let argv: Vec<Value> = self
            .tuple_items(args)
            .ok_or_else(|| RuntimeError::Type("argument pack must be a tuple".into()))?
            .to_vec();

        match self.heap.get(callee) {
            Obj::Native { func, .. } => {
                let func = *func;
                func(self, &argv)
            }
            Obj::Method { func, receiver } => {
                let (func, receiver) = (*func, *receiver);
                match self.heap.get(func) {
                    Obj::Native { func, .. } => {
                        let func = *func;
                        let mut bound = Vec::with_capacity(argv.len() + 1);
                        bound.push(receiver);
                        bound.extend_from_slice(&argv);
                        func(self, &bound)
                    }
                    other => Err(RuntimeError::Type(format!(
                        "'{}' method is not callable by the host runtime",
                        other.type_name()
                    ))),
                }
            }
            other => Err(RuntimeError::Type(format!(
                "'{}' object is not callable by the host runtime",
                other.type_name()
            ))),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap a possibly-negative index against `len`; `None` when out of range.
pub(crate) fn wrap_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { index + len } else { index };
    if (0..len).contains(&i) {
        Some(i as usize)
    } else {
        None
    }
}

/// Clamp slice endpoints the way sequence slicing does: negatives wrap,
/// everything lands in `[0, len]`, and an empty range collapses.
pub(crate) fn clamp_slice(lo: i64, hi: i64, len: usize) -> (usize, usize) {
    let len = len as i64;
    let adjust = |i: i64| -> i64 {
        let i = if i < 0 { i.saturating_add(len) } else { i };
        i.clamp(0, len)
    };
    let lo = adjust(lo);
    let hi = adjust(hi);
    (lo as usize, hi.max(lo) as usize)
}
