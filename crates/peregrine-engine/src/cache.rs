//! Lazy, memoised compiled-code cache
//!
//! Functions observed during calls are resolved to register code on first
//! use. A translator hook performs the actual stack-to-register
//! translation; when it declines (or none is installed), the failure is
//! memoised so the call protocol permanently falls back to host invocation
//! for that function.

use crate::code::RegisterCode;
use peregrine_runtime::{Runtime, Value};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Translator hook: given the function object, produce register code or
/// decline.
pub type TranslateFn = Box<dyn Fn(&mut Runtime, Value) -> Option<RegisterCode>>;

/// Function-to-code memo
pub struct CodeCache {
    compiled: FxHashMap<u32, Option<Arc<RegisterCode>>>,
    translator: Option<TranslateFn>,
    next_id: u32,
}

impl CodeCache {
    pub fn new() -> Self {
        Self {
            compiled: FxHashMap::default(),
            translator: None,
            next_id: 0,
        }
    }

    /// Install the stack-to-register translator.
    pub fn set_translator(&mut self, translator: TranslateFn) {
        self.translator = Some(translator);
    }

    /// Allocate a fresh code id for a function being declared.
    pub fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Pre-register compiled code under an id (the translator-output path
    /// used by [`crate::Vm::declare_function`]).
    pub fn insert(&mut self, code_id: u32, code: Arc<RegisterCode>) {
        self.compiled.insert(code_id, Some(code));
    }

    /// Resolve a function's code, translating and memoising on first use.
    /// `None` means the function cannot be interpreted and the caller
    /// should fall back to host invocation.
    pub fn resolve(
        &mut self,
        rt: &mut Runtime,
        code_id: u32,
        function: Value,
    ) -> Option<Arc<RegisterCode>> {
        if let Some(entry) = self.compiled.get(&code_id) {
            return entry.clone();
        }
        let translated = self
            .translator
            .as_ref()
            .and_then(|t| t(rt, function))
            .map(|mut code| {
                code.set_function(function);
                Arc::new(code)
            });
        self.compiled.insert(code_id, translated.clone());
        translated
    }

    /// Number of memoised entries (hits and failures)
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

impl Default for CodeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peregrine_bytecode::{CodeWriter, Opcode};
    use std::cell::Cell;
    use std::rc::Rc;

    fn trivial_code() -> RegisterCode {
        let mut w = CodeWriter::new();
        w.emit_reg(Opcode::ReturnValue, 0, 0, 0, 0, 0);
        RegisterCode::new(w.finish(1, 0), vec![], vec![], 0).unwrap()
    }

    #[test]
    fn test_insert_and_resolve() {
        let mut rt = Runtime::new();
        let mut cache = CodeCache::new();
        let id = cache.next_id();
        cache.insert(id, Arc::new(trivial_code()));
        assert!(cache.resolve(&mut rt, id, Value::NULL).is_some());
    }

    #[test]
    fn test_missing_translation_is_memoised() {
        let mut rt = Runtime::new();
        let mut cache = CodeCache::new();
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        cache.set_translator(Box::new(move |_, _| {
            seen.set(seen.get() + 1);
            None
        }));

        let id = cache.next_id();
        assert!(cache.resolve(&mut rt, id, Value::NULL).is_none());
        assert!(cache.resolve(&mut rt, id, Value::NULL).is_none());
        // Failure memoised: translator ran once
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_translator_runs_once_per_function() {
        let mut rt = Runtime::new();
        let mut cache = CodeCache::new();
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        cache.set_translator(Box::new(move |_, _| {
            seen.set(seen.get() + 1);
            Some(trivial_code())
        }));

        let id = cache.next_id();
        assert!(cache.resolve(&mut rt, id, Value::NULL).is_some());
        assert!(cache.resolve(&mut rt, id, Value::NULL).is_some());
        assert_eq!(calls.get(), 1);
    }
}
