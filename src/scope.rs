use crate::value::Value;
use std::collections::HashMap;

/// Flat name -> value mapping. Function calls run in a snapshot of the
/// caller's scope which is discarded when the call ends.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    values: HashMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Binds `name`, creating it if it does not exist yet.
    pub fn assign(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Shallow copy: list values stay shared with the original.
    pub fn snapshot(&self) -> Scope {
        self.clone()
    }

    /// Snapshot of this scope with each parameter bound to its argument.
    pub fn bind_parameters(&self, params: &[String], args: Vec<Value>) -> Scope {
        let mut local = self.snapshot();
        for (param, arg) in params.iter().zip(args) {
            local.assign(param, arg);
        }
        local
    }

    /// Bound names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
