use crate::interpreter::{Interpreter, LoxCallableWrapper, LoxRuntimeError, Object};
use crate::lox_callable::{LoxCallable, LoxFunction};
use crate::tokens::Token;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// The class stores behavior, the instance stores state.
#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    methods: HashMap<String, LoxFunction>,
}

impl LoxClass {
    pub fn new(name: String, methods: HashMap<String, LoxFunction>) -> Self {
        LoxClass { name, methods }
    }

    pub fn find_method(&self, name: &str) -> Option<&LoxFunction> {
        self.methods.get(name)
    }

    /// A class called like a function constructs an instance, so its arity
    /// is its initializer's.
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, LoxFunction::arity)
    }

    pub fn instantiate(
        class: &Rc<LoxClass>,
        interpreter: &mut Interpreter,
        arguments: Vec<Object>,
    ) -> Result<Object, LoxRuntimeError> {
        let instance = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(class))));
        let object = Object::Instance(Rc::clone(&instance));

        if let Some(initializer) = class.find_method("init") {
            initializer.bind(object.clone()).call(interpreter, arguments)?;
        }

        Ok(object)
    }
}

impl fmt::Display for LoxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug)]
pub struct LoxInstance {
    class: Rc<LoxClass>,
    fields: HashMap<String, Object>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        LoxInstance {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class_name(&self) -> String {
        self.class.name.clone()
    }

    /// Property access: a field if one is set, otherwise a method bound to
    /// this instance. Fields shadow methods.
    pub fn get(
        instance: &Rc<RefCell<LoxInstance>>,
        name: &Token,
    ) -> Result<Object, LoxRuntimeError> {
        if let Some(field) = instance.borrow().fields.get(&name.lexeme()) {
            return Ok(field.clone());
        }

        let method = instance
            .borrow()
            .class
            .find_method(&name.lexeme())
            .cloned();
        if let Some(method) = method {
            let bound = method.bind(Object::Instance(Rc::clone(instance)));
            return Ok(Object::Callable(LoxCallableWrapper::new(Rc::new(bound))));
        }

        Err(LoxRuntimeError {
            token: name.clone(),
            message: format!("Undefined property {}", name.lexeme()),
        })
    }

    /// Fields may be created freely; there is no declared shape to enforce.
    pub fn set(&mut self, name: &Token, value: Object) {
        self.fields.insert(name.lexeme(), value);
    }
}
