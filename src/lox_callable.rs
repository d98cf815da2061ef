use crate::environment::Environment;
use crate::interpreter::{Interpreter, LoxRuntimeError, Object, Unwind};
use crate::parser::FunctionDecl;
use std::cell::RefCell;
use std::fmt;
use std::fmt::Debug;
use std::rc::Rc;

/// Anything a `Call` expression can invoke: user functions, natives, and the
/// bound list methods. Classes are callable too but keep their own
/// representation so instances can point back at them.
pub trait LoxCallable: Debug + fmt::Display {
    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Object>,
    ) -> Result<Object, LoxRuntimeError>;

    fn arity(&self) -> usize;
}

/// Runtime representation of a declared function: the syntax node plus the
/// environment frame that was current at declaration time.
#[derive(Clone)]
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
    is_initializer: bool,
}

// The closure chain can reach back to this very function, so Debug must not
// recurse into it.
impl Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.declaration.name.lexeme())
    }
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        LoxFunction {
            declaration,
            closure,
            is_initializer,
        }
    }

    /// Produces a copy of this method whose closure is a fresh frame holding
    /// `this -> instance`, nested inside the original closure. The method
    /// body then sees `this` one scope out, matching the resolver's implicit
    /// class scope.
    pub fn bind(&self, instance: Object) -> LoxFunction {
        let environment = Rc::new(RefCell::new(Environment::with_enclosing(&self.closure)));
        environment.borrow_mut().define("this".to_owned(), instance);
        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: environment,
            is_initializer: self.is_initializer,
        }
    }
}

impl LoxCallable for LoxFunction {
    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Object>,
    ) -> Result<Object, LoxRuntimeError> {
        // Every call gets its own frame; recursion depends on it.
        let environment = Rc::new(RefCell::new(Environment::with_enclosing(&self.closure)));
        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.borrow_mut().define(param.lexeme(), argument);
        }

        let returned = match interpreter.execute_block(&self.declaration.body, environment) {
            Ok(()) => Object::Nil,
            Err(Unwind::Return(value)) => value,
            Err(Unwind::Error(e)) => return Err(e),
        };

        if self.is_initializer {
            // init() always hands back the instance under construction.
            return Ok(Environment::get_at(&self.closure, 0, "this").unwrap_or(Object::Nil));
        }
        Ok(returned)
    }

    fn arity(&self) -> usize {
        self.declaration.params.len()
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.declaration.name.lexeme())
    }
}

#[derive(Debug)]
pub struct LoxBuiltinClock {}

impl LoxCallable for LoxBuiltinClock {
    fn call(
        &self,
        _interpreter: &mut Interpreter,
        _arguments: Vec<Object>,
    ) -> Result<Object, LoxRuntimeError> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Ok(Object::Double(now.as_secs_f64()))
    }

    fn arity(&self) -> usize {
        0
    }
}

impl fmt::Display for LoxBuiltinClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}
