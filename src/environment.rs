use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::interpreter::{LoxRuntimeError, Object};
use crate::tokens::Token;

/// A single scope frame: bindings plus a link to the enclosing frame.
///
/// Frames are shared mutable state behind `Rc<RefCell<...>>` because closures
/// capture the frame that was current at declaration time and keep it alive
/// after the declaring block has finished executing.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Object>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: &Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(Rc::clone(enclosing)),
        }
    }

    /// Binds (or rebinds) `name` in this frame. Redefinition is deliberate:
    /// the REPL and top-level scripts may re-`var` a global.
    pub fn define(&mut self, name: String, value: Object) {
        self.values.insert(name, value);
    }

    /// Writes to the nearest enclosing frame that already contains `name`.
    /// Assignment never creates a binding.
    pub fn assign(&mut self, name: &Token, value: Object) -> Result<(), LoxRuntimeError> {
        let key = name.lexeme();
        if self.values.contains_key(&key) {
            self.values.insert(key, value);
            return Ok(());
        }

        if let Some(ref enclosing) = self.enclosing {
            return enclosing.borrow_mut().assign(name, value);
        }

        Err(LoxRuntimeError {
            token: name.clone(),
            message: format!("Undefined variable {}.", key),
        })
    }

    pub fn get(&self, name: &Token) -> Result<Object, LoxRuntimeError> {
        let key = name.lexeme();
        if let Some(value) = self.values.get(&key) {
            return Ok(value.clone());
        }

        if let Some(ref enclosing) = self.enclosing {
            return enclosing.borrow().get(name);
        }

        Err(LoxRuntimeError {
            token: name.clone(),
            message: format!("Undefined variable {}.", key),
        })
    }

    /// Walks `distance` parent links up the chain.
    pub fn ancestor(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
    ) -> Rc<RefCell<Environment>> {
        let mut current = Rc::clone(env);
        for _ in 0..distance {
            let enclosing = current.borrow().enclosing.clone();
            match enclosing {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }

    /// Reads `name` directly out of the frame `distance` hops up, skipping
    /// the chain walk. The resolver guarantees the binding exists there; a
    /// `None` therefore only shows up if resolution data is missing.
    pub fn get_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
    ) -> Option<Object> {
        let frame = Self::ancestor(env, distance);
        let value = frame.borrow().values.get(name).cloned();
        value
    }

    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        value: Object,
    ) -> Option<()> {
        let frame = Self::ancestor(env, distance);
        let mut frame = frame.borrow_mut();
        if frame.values.contains_key(name) {
            frame.values.insert(name.to_owned(), value);
            Some(())
        } else {
            None
        }
    }
}
