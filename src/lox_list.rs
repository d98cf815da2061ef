use crate::interpreter::{Interpreter, LoxCallableWrapper, LoxRuntimeError, Object};
use crate::lox_callable::LoxCallable;
use crate::tokens::Token;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A first-class list value. The element vector is shared so every handle to
/// the same list observes `append`/`delete` mutations.
#[derive(Debug)]
pub struct LoxList {
    items: Vec<Object>,
}

impl LoxList {
    pub fn new(items: Vec<Object>) -> Self {
        LoxList { items }
    }

    pub fn items(&self) -> &[Object] {
        &self.items
    }

    /// Lists expose a fixed method surface instead of instance fields.
    pub fn get(list: &Rc<RefCell<LoxList>>, name: &Token) -> Result<Object, LoxRuntimeError> {
        match name.lexeme().as_str() {
            "append" => Ok(Object::Callable(LoxCallableWrapper::new(Rc::new(
                LoxListAppend {
                    list: Rc::clone(list),
                },
            )))),
            "delete" => Ok(Object::Callable(LoxCallableWrapper::new(Rc::new(
                LoxListDelete {
                    list: Rc::clone(list),
                    name: name.clone(),
                },
            )))),
            other => Err(LoxRuntimeError {
                token: name.clone(),
                message: format!("Undefined property {}", other),
            }),
        }
    }

    pub fn get_item(&self, index: &Object, at: &Token) -> Result<Object, LoxRuntimeError> {
        let index = self.validate_index(index, at)?;
        Ok(self.items[index].clone())
    }

    /// Indexes must be whole-number doubles inside `0..len`.
    fn validate_index(&self, index: &Object, at: &Token) -> Result<usize, LoxRuntimeError> {
        let number = match index {
            Object::Double(n) => *n,
            _ => {
                return Err(LoxRuntimeError {
                    token: at.clone(),
                    message: "List index must be a number.".to_owned(),
                })
            }
        };

        if number.fract() != 0.0 || number < 0.0 || (number as usize) >= self.items.len() {
            return Err(LoxRuntimeError {
                token: at.clone(),
                message: "Index out of range.".to_owned(),
            });
        }

        Ok(number as usize)
    }
}

/// `list.append(value)` bound to its receiver.
#[derive(Debug)]
struct LoxListAppend {
    list: Rc<RefCell<LoxList>>,
}

impl LoxCallable for LoxListAppend {
    fn call(
        &self,
        _interpreter: &mut Interpreter,
        arguments: Vec<Object>,
    ) -> Result<Object, LoxRuntimeError> {
        let value = arguments.into_iter().next().unwrap_or(Object::Nil);
        self.list.borrow_mut().items.push(value);
        Ok(Object::Nil)
    }

    fn arity(&self) -> usize {
        1
    }
}

impl fmt::Display for LoxListAppend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn append>")
    }
}

/// `list.delete(index)` bound to its receiver. Removes the element at the
/// index and hands it back.
#[derive(Debug)]
struct LoxListDelete {
    list: Rc<RefCell<LoxList>>,
    name: Token,
}

impl LoxCallable for LoxListDelete {
    fn call(
        &self,
        _interpreter: &mut Interpreter,
        arguments: Vec<Object>,
    ) -> Result<Object, LoxRuntimeError> {
        let index = arguments.into_iter().next().unwrap_or(Object::Nil);
        let mut list = self.list.borrow_mut();
        let index = list.validate_index(&index, &self.name)?;
        Ok(list.items.remove(index))
    }

    fn arity(&self) -> usize {
        1
    }
}

impl fmt::Display for LoxListDelete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn delete>")
    }
}
