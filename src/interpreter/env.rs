use std::collections::HashMap;

use crate::config::Config;
use crate::diagnostics::{Fault, FaultKind, Position};
use crate::interpreter::value::{Slot, Value};

struct Scope {
    bindings: HashMap<String, Slot>,
}

impl Scope {
    fn new() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }
}

/// One function activation: its own scope stack, opened with the
/// parameter bindings at the bottom. The global (top-level) context is
/// the sentinel at the bottom of the environment's context stack.
struct CallContext {
    function_name: String,
    scopes: Vec<Scope>,
    recursion_depth: usize,
}

impl CallContext {
    fn new(function_name: String, recursion_depth: usize) -> Self {
        Self {
            function_name,
            scopes: vec![Scope::new()],
            recursion_depth,
        }
    }
}

/// Variable environment: a bounded stack of call contexts. Name lookup
/// never crosses a context boundary (functions are closed over their
/// parameters only).
pub struct Environment {
    contexts: Vec<CallContext>,
    max_func_depth: usize,
    max_rec_depth: usize,
}

impl Environment {
    pub fn new(config: &Config) -> Self {
        Self {
            contexts: vec![CallContext::new("<top-level>".to_string(), 0)],
            max_func_depth: config.max_func_depth,
            max_rec_depth: config.max_rec_depth,
        }
    }

    fn current(&mut self) -> &mut CallContext {
        self.contexts.last_mut().expect("global context always exists")
    }

    pub fn enter_scope(&mut self) {
        self.current().scopes.push(Scope::new());
    }

    pub fn exit_scope(&mut self) {
        let context = self.current();
        debug_assert!(context.scopes.len() > 1, "cannot pop a context's bottom scope");
        context.scopes.pop();
    }

    /// Binds a slot in the innermost scope of the current context.
    pub fn declare(&mut self, name: &str, slot: Slot) {
        self.current()
            .scopes
            .last_mut()
            .expect("context always has a scope")
            .bindings
            .insert(name.to_string(), slot);
    }

    /// Finds a slot by walking the current context's scopes outward.
    pub fn slot(&self, name: &str) -> Option<Slot> {
        let context = self.contexts.last().expect("global context always exists");
        context
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name).cloned())
    }

    pub fn load(&self, name: &str) -> Option<Value> {
        self.slot(name).map(|slot| slot.borrow().clone())
    }

    /// Pushes a fresh activation for `function_name`, enforcing both the
    /// overall context-stack bound and the consecutive-recursion bound.
    pub fn push_context(&mut self, function_name: &str, call_site: Position) -> Result<(), Fault> {
        let user_depth = self.contexts.len(); // sentinel excluded, new context included
        if user_depth > self.max_func_depth {
            return Err(Fault::new(FaultKind::CallStackLimitExceeded, call_site));
        }
        let top = self.contexts.last().expect("global context always exists");
        let recursion_depth = if top.function_name == function_name {
            top.recursion_depth + 1
        } else {
            1
        };
        if recursion_depth > self.max_rec_depth {
            return Err(Fault::new(FaultKind::CallStackLimitExceeded, call_site));
        }
        self.contexts
            .push(CallContext::new(function_name.to_string(), recursion_depth));
        Ok(())
    }

    pub fn pop_context(&mut self) {
        debug_assert!(self.contexts.len() > 1, "cannot pop the global context");
        self.contexts.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(func_depth: usize, rec_depth: usize) -> Config {
        let mut config = Config::default();
        config.max_func_depth = func_depth;
        config.max_rec_depth = rec_depth;
        config
    }

    #[test]
    fn lookup_walks_scopes_of_current_context_only() {
        let mut env = Environment::new(&Config::default());
        env.declare("g", Value::new_slot(Value::Int(1)));
        env.push_context("f", Position::new(1, 1)).expect("push failed");
        assert!(env.slot("g").is_none());
        env.declare("p", Value::new_slot(Value::Int(2)));
        env.enter_scope();
        assert!(env.slot("p").is_some());
        env.exit_scope();
        env.pop_context();
        assert!(env.slot("g").is_some());
    }

    #[test]
    fn func_depth_limit_fires_at_depth_plus_one() {
        let mut env = Environment::new(&small_config(2, 100));
        env.push_context("a", Position::new(1, 1)).expect("first push");
        env.push_context("b", Position::new(1, 1)).expect("second push");
        let fault = env
            .push_context("c", Position::new(2, 3))
            .expect_err("third push must fault");
        assert_eq!(fault.kind, FaultKind::CallStackLimitExceeded);
        assert_eq!(fault.position, Position::new(2, 3));
    }

    #[test]
    fn recursion_limit_counts_consecutive_same_function_entries() {
        let mut env = Environment::new(&small_config(100, 2));
        env.push_context("f", Position::new(1, 1)).expect("push");
        env.push_context("f", Position::new(1, 1)).expect("push");
        assert!(env.push_context("f", Position::new(1, 1)).is_err());
    }

    #[test]
    fn alternating_functions_reset_the_recursion_counter() {
        let mut env = Environment::new(&small_config(100, 2));
        for _ in 0..3 {
            env.push_context("f", Position::new(1, 1)).expect("push f");
            env.push_context("g", Position::new(1, 1)).expect("push g");
        }
    }

    #[test]
    fn aliased_slots_observe_writes() {
        let mut env = Environment::new(&Config::default());
        let slot = Value::new_slot(Value::Int(1));
        env.declare("x", slot.clone());
        env.push_context("f", Position::new(1, 1)).expect("push");
        env.declare("p", slot);
        let alias = env.slot("p").expect("alias must resolve");
        *alias.borrow_mut() = Value::Int(9);
        env.pop_context();
        match env.load("x").expect("x must resolve") {
            Value::Int(value) => assert_eq!(value, 9),
            other => panic!("unexpected {other:?}"),
        }
    }
}
