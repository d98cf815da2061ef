use crate::environment::Environment;
use crate::lox_callable::{LoxBuiltinClock, LoxCallable, LoxFunction};
use crate::lox_class::{LoxClass, LoxInstance};
use crate::lox_list::LoxList;
use crate::parser::{Expr, ExprId, LiteralValue, Stmt};
use crate::resolver::ResolvedLocals;
use crate::tokens::{Token, TokenType};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fmt::Debug;
use std::rc::Rc;

pub const EXPECT_TYPE_NUMBER: &str = "Operands must be numbers.";
pub const EXPECT_TYPE_NUMBER_OR_STRING: &str = "Operands must be two numbers or two strings.";
pub const DIVIDE_BY_ZERO_ERROR: &str = "Can not divide by zero.";
pub const INVALID_BINARY_EXPRESSION: &str = "Operator is not a valid binary expression.";

#[derive(Debug, Clone)]
pub enum Object {
    Nil,
    Boolean(bool),
    Double(f64),
    String(String),
    Callable(LoxCallableWrapper),
    Class(Rc<LoxClass>),
    Instance(Rc<RefCell<LoxInstance>>),
    List(Rc<RefCell<LoxList>>),
}

// This wrapper hides the trait object so Object stays a plain cloneable enum
// while callables of any shape (user functions, natives, bound list methods)
// share one representation.
#[derive(Clone)]
pub struct LoxCallableWrapper {
    inner: Rc<dyn LoxCallable>,
}

impl LoxCallableWrapper {
    pub fn new(inner: Rc<dyn LoxCallable>) -> Self {
        LoxCallableWrapper { inner }
    }
}

impl LoxCallable for LoxCallableWrapper {
    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Object>,
    ) -> Result<Object, LoxRuntimeError> {
        self.inner.call(interpreter, arguments)
    }

    fn arity(&self) -> usize {
        self.inner.arity()
    }
}

impl Debug for LoxCallableWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.inner)
    }
}

impl fmt::Display for LoxCallableWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

#[derive(Debug, Clone)]
pub struct LoxRuntimeError {
    pub token: Token,
    pub message: String,
}

impl fmt::Display for LoxRuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}\n[line {}]", self.message, self.token.line)
    }
}

impl std::error::Error for LoxRuntimeError {}

/// Non-local exits of statement execution. A `return` is ordinary control
/// flow that the enclosing function call absorbs; a runtime error unwinds
/// all the way out of `interpret`.
#[derive(Debug)]
pub enum Unwind {
    Error(LoxRuntimeError),
    Return(Object),
}

impl From<LoxRuntimeError> for Unwind {
    fn from(error: LoxRuntimeError) -> Self {
        Unwind::Error(error)
    }
}

pub fn truthy(o: &Object) -> bool {
    match o {
        Object::Nil => false,
        Object::Boolean(x) => *x,
        _ => true,
    }
}

pub fn is_equal(a: &Object, b: &Object) -> bool {
    match (a, b) {
        (Object::Nil, Object::Nil) => true,
        (Object::Nil, _) | (_, Object::Nil) => false,
        (Object::Boolean(left), Object::Boolean(right)) => left == right,
        (Object::Double(left), Object::Double(right)) => left == right,
        (Object::String(left), Object::String(right)) => left == right,
        (Object::Class(left), Object::Class(right)) => Rc::ptr_eq(left, right),
        (Object::Instance(left), Object::Instance(right)) => Rc::ptr_eq(left, right),
        (Object::List(left), Object::List(right)) => Rc::ptr_eq(left, right),
        _ => false,
    }
}

pub fn stringify(o: &Object) -> String {
    match o {
        Object::Nil => "nil".to_owned(),
        Object::Boolean(b) => b.to_string(),
        // Display for f64 already drops an integral value's ".0".
        Object::Double(d) => d.to_string(),
        Object::String(s) => s.clone(),
        Object::Callable(c) => c.to_string(),
        Object::Class(c) => c.to_string(),
        Object::Instance(i) => format!("{} instance", i.borrow().class_name()),
        Object::List(l) => {
            let items: Vec<String> = l.borrow().items().iter().map(stringify).collect();
            format!("[{}]", items.join(", "))
        }
    }
}

pub struct Interpreter {
    pub globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: ResolvedLocals,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define(
            "clock".to_owned(),
            Object::Callable(LoxCallableWrapper::new(Rc::new(LoxBuiltinClock {}))),
        );
        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
        }
    }

    /// Merges a resolution pass's depth map into the interpreter. Entries
    /// accumulate so functions defined by earlier REPL lines keep working.
    pub fn resolve(&mut self, locals: ResolvedLocals) {
        self.locals.extend(locals);
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), LoxRuntimeError> {
        for statement in statements {
            match self.execute(statement) {
                Ok(()) => {}
                Err(Unwind::Error(e)) => return Err(e),
                // The resolver rejects top-level returns before we get here.
                Err(Unwind::Return(_)) => unreachable!(),
            }
        }
        Ok(())
    }

    pub fn execute(&mut self, statement: &Stmt) -> Result<(), Unwind> {
        match statement {
            Stmt::Expression { expression } => {
                self.evaluate(expression)?;
                Ok(())
            }
            Stmt::Print { expression } => {
                let value = self.evaluate(expression)?;
                println!("{}", stringify(&value));
                Ok(())
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expression) => self.evaluate(expression)?,
                    None => Object::Nil,
                };
                self.environment.borrow_mut().define(name.lexeme(), value);
                Ok(())
            }
            Stmt::Block { statements } => {
                let environment = Rc::new(RefCell::new(Environment::with_enclosing(
                    &self.environment,
                )));
                self.execute_block(statements, environment)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(())
                }
            }
            Stmt::While { condition, body } => {
                while truthy(&self.evaluate(condition)?) {
                    self.execute(body)?;
                }
                Ok(())
            }
            Stmt::Function { declaration } => {
                let function =
                    LoxFunction::new(Rc::clone(declaration), Rc::clone(&self.environment), false);
                self.environment.borrow_mut().define(
                    declaration.name.lexeme(),
                    Object::Callable(LoxCallableWrapper::new(Rc::new(function))),
                );
                Ok(())
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expression) => self.evaluate(expression)?,
                    None => Object::Nil,
                };
                Err(Unwind::Return(value))
            }
            Stmt::Class { name, methods } => {
                // Two-stage binding so methods can refer to the class name.
                self.environment
                    .borrow_mut()
                    .define(name.lexeme(), Object::Nil);

                let mut method_table = HashMap::new();
                for method in methods {
                    let function = LoxFunction::new(
                        Rc::clone(method),
                        Rc::clone(&self.environment),
                        method.name.lexeme() == "init",
                    );
                    method_table.insert(method.name.lexeme(), function);
                }

                let class = LoxClass::new(name.lexeme(), method_table);
                self.environment
                    .borrow_mut()
                    .assign(name, Object::Class(Rc::new(class)))?;
                Ok(())
            }
        }
    }

    /// Runs `statements` with `environment` installed as the current frame,
    /// restoring the previous frame on every exit path, including a return
    /// signal or runtime error passing through.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<(), Unwind> {
        let previous = Rc::clone(&self.environment);
        self.environment = environment;

        let mut result = Ok(());
        for statement in statements {
            result = self.execute(statement);
            if result.is_err() {
                break;
            }
        }

        self.environment = previous;
        result
    }

    fn look_up_variable(&mut self, id: ExprId, name: &Token) -> Result<Object, Unwind> {
        if let Some(&distance) = self.locals.get(&id) {
            Environment::get_at(&self.environment, distance, &name.lexeme()).ok_or_else(|| {
                Unwind::Error(LoxRuntimeError {
                    token: name.clone(),
                    message: format!("Undefined variable {}.", name.lexeme()),
                })
            })
        } else {
            let value = self.globals.borrow().get(name)?;
            Ok(value)
        }
    }

    pub fn evaluate(&mut self, expression: &Expr) -> Result<Object, Unwind> {
        match expression {
            Expr::Literal { value } => Ok(match value {
                LiteralValue::Boolean(b) => Object::Boolean(*b),
                LiteralValue::Nil => Object::Nil,
                LiteralValue::Number(n) => Object::Double(*n),
                LiteralValue::String(s) => Object::String(s.clone()),
            }),
            Expr::Grouping { expression } => self.evaluate(expression),
            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),
            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),
            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                if operator.token_type == TokenType::OR {
                    if truthy(&left) {
                        return Ok(left);
                    }
                } else if !truthy(&left) {
                    return Ok(left);
                }
                self.evaluate(right)
            }
            Expr::Ternary {
                condition,
                truthy: truthy_branch,
                falsy,
            } => {
                if truthy(&self.evaluate(condition)?) {
                    self.evaluate(truthy_branch)
                } else {
                    self.evaluate(falsy)
                }
            }
            Expr::Variable { id, name } => self.look_up_variable(*id, name),
            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),
            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                if let Some(&distance) = self.locals.get(id) {
                    Environment::assign_at(
                        &self.environment,
                        distance,
                        &name.lexeme(),
                        value.clone(),
                    )
                    .ok_or_else(|| {
                        Unwind::Error(LoxRuntimeError {
                            token: name.clone(),
                            message: format!("Undefined variable {}.", name.lexeme()),
                        })
                    })?;
                } else {
                    self.globals.borrow_mut().assign(name, value.clone())?;
                }
                Ok(value)
            }
            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let mut evaluated = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    evaluated.push(self.evaluate(argument)?);
                }

                let arity = match &callee {
                    Object::Callable(callable) => callable.arity(),
                    Object::Class(class) => class.arity(),
                    _ => {
                        return Err(Unwind::Error(LoxRuntimeError {
                            token: paren.clone(),
                            message: "Can only call functions and classes.".to_owned(),
                        }))
                    }
                };
                if evaluated.len() != arity {
                    return Err(Unwind::Error(LoxRuntimeError {
                        token: paren.clone(),
                        message: format!(
                            "Expected {} arguments but got {}.",
                            arity,
                            evaluated.len()
                        ),
                    }));
                }

                let result = match callee {
                    Object::Callable(callable) => callable.call(self, evaluated)?,
                    Object::Class(class) => LoxClass::instantiate(&class, self, evaluated)?,
                    _ => unreachable!(),
                };
                Ok(result)
            }
            Expr::Get { object, name } => {
                let object = self.evaluate(object)?;
                match object {
                    Object::Instance(instance) => {
                        let value = LoxInstance::get(&instance, name)?;
                        Ok(value)
                    }
                    Object::List(list) => {
                        let value = LoxList::get(&list, name)?;
                        Ok(value)
                    }
                    _ => Err(Unwind::Error(LoxRuntimeError {
                        token: name.clone(),
                        message: "Only class instances have properties.".to_owned(),
                    })),
                }
            }
            Expr::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object)?;
                match object {
                    Object::Instance(instance) => {
                        let value = self.evaluate(value)?;
                        instance.borrow_mut().set(name, value.clone());
                        Ok(value)
                    }
                    Object::List(_) => Err(Unwind::Error(LoxRuntimeError {
                        token: name.clone(),
                        message: "Can not set properties on a list.".to_owned(),
                    })),
                    _ => Err(Unwind::Error(LoxRuntimeError {
                        token: name.clone(),
                        message: "Only class instances have properties.".to_owned(),
                    })),
                }
            }
            Expr::List { items } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.evaluate(item)?);
                }
                Ok(Object::List(Rc::new(RefCell::new(LoxList::new(values)))))
            }
            Expr::Index {
                list,
                bracket,
                index,
            } => {
                let list = self.evaluate(list)?;
                let list = match list {
                    Object::List(list) => list,
                    _ => {
                        return Err(Unwind::Error(LoxRuntimeError {
                            token: bracket.clone(),
                            message: "Only lists can be indexed.".to_owned(),
                        }))
                    }
                };
                let index = self.evaluate(index)?;
                let value = list.borrow().get_item(&index, bracket)?;
                Ok(value)
            }
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Object, Unwind> {
        let right = self.evaluate(right)?;
        match (&operator.token_type, right) {
            (TokenType::MINUS, Object::Double(x)) => Ok(Object::Double(-x)),
            (TokenType::MINUS, _) => Err(Unwind::Error(LoxRuntimeError {
                token: operator.clone(),
                message: EXPECT_TYPE_NUMBER.to_owned(),
            })),
            (TokenType::BANG, o) => Ok(Object::Boolean(!truthy(&o))),
            _ => Err(Unwind::Error(LoxRuntimeError {
                token: operator.clone(),
                message: INVALID_BINARY_EXPRESSION.to_owned(),
            })),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<Object, Unwind> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        // Equality works on any pair of values.
        match operator.token_type {
            TokenType::EQUAL_EQUAL => return Ok(Object::Boolean(is_equal(&left, &right))),
            TokenType::BANG_EQUAL => return Ok(Object::Boolean(!is_equal(&left, &right))),
            _ => {}
        }

        // Handling PLUS first keeps the numbers-only check in one place for
        // the remaining operators.
        if operator.token_type == TokenType::PLUS {
            return match (left, right) {
                (Object::Double(l), Object::Double(r)) => Ok(Object::Double(l + r)),
                (Object::String(l), Object::String(r)) => Ok(Object::String(format!("{}{}", l, r))),
                _ => Err(Unwind::Error(LoxRuntimeError {
                    token: operator.clone(),
                    message: EXPECT_TYPE_NUMBER_OR_STRING.to_owned(),
                })),
            };
        }

        let (l, r) = match (left, right) {
            (Object::Double(l), Object::Double(r)) => (l, r),
            _ => {
                return Err(Unwind::Error(LoxRuntimeError {
                    token: operator.clone(),
                    message: EXPECT_TYPE_NUMBER.to_owned(),
                }))
            }
        };

        match operator.token_type {
            TokenType::MINUS => Ok(Object::Double(l - r)),
            TokenType::STAR => Ok(Object::Double(l * r)),
            TokenType::SLASH => {
                if r == 0.0 {
                    return Err(Unwind::Error(LoxRuntimeError {
                        token: operator.clone(),
                        message: DIVIDE_BY_ZERO_ERROR.to_owned(),
                    }));
                }
                Ok(Object::Double(l / r))
            }
            TokenType::GREATER => Ok(Object::Boolean(l > r)),
            TokenType::GREATER_EQUAL => Ok(Object::Boolean(l >= r)),
            TokenType::LESS => Ok(Object::Boolean(l < r)),
            TokenType::LESS_EQUAL => Ok(Object::Boolean(l <= r)),
            _ => Err(Unwind::Error(LoxRuntimeError {
                token: operator.clone(),
                message: INVALID_BINARY_EXPRESSION.to_owned(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lox_error::LoxError;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::scanner::scan_tokens;

    struct TestLox {
        pub has_error: bool,
        pub errors: Vec<(i32, String)>,
    }

    impl TestLox {
        fn new() -> Self {
            TestLox {
                has_error: false,
                errors: vec![],
            }
        }
    }

    impl LoxError for TestLox {
        fn error(&mut self, line: i32, message: &str) {
            self.report(line, "", message);
        }

        fn report(&mut self, line: i32, _wh: &str, message: &str) {
            self.errors.push((line, message.to_owned()));
            self.has_error = true;
        }

        fn runtime_error(&mut self, _error: &LoxRuntimeError) {}

        fn has_error(&self) -> bool {
            self.has_error
        }

        fn has_runtime_error(&self) -> bool {
            false
        }
    }

    /// Scans, parses, resolves, and interprets `source` with a fresh
    /// interpreter, returning it for state inspection along with the
    /// outcome of the run.
    fn run_source(source: &str) -> (Interpreter, Result<(), LoxRuntimeError>) {
        let mut lox = TestLox::new();
        let tokens = scan_tokens(&mut lox, source);
        let mut tok = tokens.iter().peekable();
        let statements = {
            let mut parser = Parser::new(&mut tok, &mut lox);
            parser.parse()
        };
        assert!(!lox.has_error, "static errors: {:?}", lox.errors);
        let locals = {
            let resolver = Resolver::new(&mut lox);
            resolver.resolve(&statements)
        };
        assert!(!lox.has_error, "static errors: {:?}", lox.errors);

        let mut interpreter = Interpreter::new();
        interpreter.resolve(locals);
        let result = interpreter.interpret(&statements);
        (interpreter, result)
    }

    fn global(interpreter: &Interpreter, name: &str) -> Object {
        let token = Token {
            token_type: TokenType::IDENTIFIER(name.to_owned()),
            line: 0,
        };
        interpreter
            .globals
            .borrow()
            .get(&token)
            .unwrap_or_else(|e| panic!("global {} missing: {}", name, e))
    }

    fn expect_runtime_error(source: &str) -> LoxRuntimeError {
        let (_, result) = run_source(source);
        result.expect_err("expected a runtime error")
    }

    #[test]
    fn test_arithmetic() {
        let (interpreter, result) = run_source("var r = 1 + 2 * 3 - 8 / 4;");
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "r"), &Object::Double(5.0)));
    }

    #[test]
    fn test_unary_negation_and_not() {
        let (interpreter, result) = run_source("var a = -(1 + 2); var b = !nil; var c = !0;");
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "a"), &Object::Double(-3.0)));
        assert!(is_equal(&global(&interpreter, "b"), &Object::Boolean(true)));
        // Zero is truthy, so !0 is false.
        assert!(is_equal(&global(&interpreter, "c"), &Object::Boolean(false)));
    }

    #[test]
    fn test_string_concatenation() {
        let (interpreter, result) = run_source("var r = \"Hello \" + \"World!\";");
        result.unwrap();
        assert!(is_equal(
            &global(&interpreter, "r"),
            &Object::String("Hello World!".to_owned())
        ));
    }

    #[test]
    fn test_divide_by_zero() {
        let error = expect_runtime_error("var r = 1 / 0;");
        assert_eq!(error.message, DIVIDE_BY_ZERO_ERROR);
    }

    #[test]
    fn test_arithmetic_type_error() {
        let error = expect_runtime_error("var r = 1 - \"x\";");
        assert_eq!(error.message, EXPECT_TYPE_NUMBER);
    }

    #[test]
    fn test_plus_type_error() {
        let error = expect_runtime_error("var r = 1 + \"x\";");
        assert_eq!(error.message, EXPECT_TYPE_NUMBER_OR_STRING);
    }

    #[test]
    fn test_unary_minus_type_error() {
        let error = expect_runtime_error("var r = -\"x\";");
        assert_eq!(error.message, EXPECT_TYPE_NUMBER);
    }

    #[test]
    fn test_comparisons() {
        let (interpreter, result) =
            run_source("var a = 1 < 2; var b = 2 <= 2; var c = 1 > 2; var d = 2 >= 3;");
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "a"), &Object::Boolean(true)));
        assert!(is_equal(&global(&interpreter, "b"), &Object::Boolean(true)));
        assert!(is_equal(&global(&interpreter, "c"), &Object::Boolean(false)));
        assert!(is_equal(&global(&interpreter, "d"), &Object::Boolean(false)));
    }

    #[test]
    fn test_equality_with_nil() {
        let (interpreter, result) =
            run_source("var a = nil == nil; var b = nil == 0; var c = nil != \"x\";");
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "a"), &Object::Boolean(true)));
        assert!(is_equal(&global(&interpreter, "b"), &Object::Boolean(false)));
        assert!(is_equal(&global(&interpreter, "c"), &Object::Boolean(true)));
    }

    #[test]
    fn test_logical_operators_return_operands() {
        let (interpreter, result) = run_source(
            "var a = \"hi\" or 2; var b = nil or \"yes\"; var c = false and 1; var d = 1 and 2;",
        );
        result.unwrap();
        assert!(is_equal(
            &global(&interpreter, "a"),
            &Object::String("hi".to_owned())
        ));
        assert!(is_equal(
            &global(&interpreter, "b"),
            &Object::String("yes".to_owned())
        ));
        assert!(is_equal(&global(&interpreter, "c"), &Object::Boolean(false)));
        assert!(is_equal(&global(&interpreter, "d"), &Object::Double(2.0)));
    }

    #[test]
    fn test_logical_short_circuit_skips_side_effects() {
        let (interpreter, result) =
            run_source("var hits = 0; fun bump() { hits = hits + 1; return true; } var r = true or bump(); var s = false and bump();");
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "hits"), &Object::Double(0.0)));
    }

    #[test]
    fn test_ternary_evaluates_single_branch() {
        let (interpreter, result) = run_source(
            "var taken = 0; var skipped = 0; fun t() { taken = taken + 1; return 1; } fun s() { skipped = skipped + 1; return 2; } var r = 1 < 2 ? t() : s();",
        );
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "r"), &Object::Double(1.0)));
        assert!(is_equal(&global(&interpreter, "taken"), &Object::Double(1.0)));
        assert!(is_equal(
            &global(&interpreter, "skipped"),
            &Object::Double(0.0)
        ));
    }

    #[test]
    fn test_block_scoping_and_shadowing() {
        let (interpreter, result) = run_source(
            "var a = 1; var inner = 0; { var a = 2; inner = a; } var outer = a;",
        );
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "inner"), &Object::Double(2.0)));
        assert!(is_equal(&global(&interpreter, "outer"), &Object::Double(1.0)));
    }

    #[test]
    fn test_uninitialized_variable_is_nil() {
        let (interpreter, result) = run_source("var a; var r = a == nil;");
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "r"), &Object::Boolean(true)));
    }

    #[test]
    fn test_undefined_variable() {
        let error = expect_runtime_error("print missing;");
        assert_eq!(error.message, "Undefined variable missing.");
    }

    #[test]
    fn test_assignment_is_an_expression() {
        let (interpreter, result) = run_source("var a = 1; var b = a = 2;");
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "a"), &Object::Double(2.0)));
        assert!(is_equal(&global(&interpreter, "b"), &Object::Double(2.0)));
    }

    #[test]
    fn test_while_loop() {
        let (interpreter, result) =
            run_source("var i = 0; var sum = 0; while (i < 5) { sum = sum + i; i = i + 1; }");
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "sum"), &Object::Double(10.0)));
    }

    #[test]
    fn test_for_loop() {
        let (interpreter, result) =
            run_source("var sum = 0; for (var i = 0; i < 3; i = i + 1) sum = sum + i;");
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "sum"), &Object::Double(3.0)));
    }

    #[test]
    fn test_function_call_and_return() {
        let (interpreter, result) =
            run_source("fun add(a, b) { return a + b; } var r = add(1, 2);");
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "r"), &Object::Double(3.0)));
    }

    #[test]
    fn test_function_without_return_yields_nil() {
        let (interpreter, result) = run_source("fun noop() {} var r = noop() == nil;");
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "r"), &Object::Boolean(true)));
    }

    #[test]
    fn test_return_unwinds_nested_blocks() {
        let (interpreter, result) = run_source(
            "fun f() { { { return 42; } } } var r = f(); var after = 1;",
        );
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "r"), &Object::Double(42.0)));
        // Execution continues normally after the call.
        assert!(is_equal(&global(&interpreter, "after"), &Object::Double(1.0)));
    }

    #[test]
    fn test_recursion() {
        let (interpreter, result) = run_source(
            "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } var r = fib(10);",
        );
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "r"), &Object::Double(55.0)));
    }

    #[test]
    fn test_closure_counter() {
        let (interpreter, result) = run_source(
            "fun make() { var i = 0; fun inc() { i = i + 1; return i; } return inc; } \
             var f = make(); var a = f(); var b = f(); var c = f();",
        );
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "a"), &Object::Double(1.0)));
        assert!(is_equal(&global(&interpreter, "b"), &Object::Double(2.0)));
        assert!(is_equal(&global(&interpreter, "c"), &Object::Double(3.0)));
    }

    #[test]
    fn test_closures_capture_the_declaring_frame() {
        // Two counters do not share state.
        let (interpreter, result) = run_source(
            "fun make() { var i = 0; fun inc() { i = i + 1; return i; } return inc; } \
             var f = make(); var g = make(); f(); var a = f(); var b = g();",
        );
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "a"), &Object::Double(2.0)));
        assert!(is_equal(&global(&interpreter, "b"), &Object::Double(1.0)));
    }

    #[test]
    fn test_global_forward_reference_from_function() {
        let (interpreter, result) =
            run_source("fun f() { return later; } var later = 7; var r = f();");
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "r"), &Object::Double(7.0)));
    }

    #[test]
    fn test_call_non_callable() {
        let error = expect_runtime_error("var x = 1; x();");
        assert_eq!(error.message, "Can only call functions and classes.");
    }

    #[test]
    fn test_arity_mismatch() {
        let error = expect_runtime_error("fun f(a, b) { return a; } f(1);");
        assert_eq!(error.message, "Expected 2 arguments but got 1.");
    }

    #[test]
    fn test_clock_is_seeded() {
        let (interpreter, result) = run_source("var r = clock() >= 0;");
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "r"), &Object::Boolean(true)));
    }

    #[test]
    fn test_class_init_and_fields() {
        let (interpreter, result) = run_source(
            "class Point { init(x, y) { this.x = x; this.y = y; } sum() { return this.x + this.y; } } \
             var p = Point(3, 4); var r = p.sum(); var x = p.x;",
        );
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "r"), &Object::Double(7.0)));
        assert!(is_equal(&global(&interpreter, "x"), &Object::Double(3.0)));
    }

    #[test]
    fn test_fields_shadow_methods() {
        let (interpreter, result) = run_source(
            "class C { m() { return 1; } } var c = C(); c.m = 2; var r = c.m;",
        );
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "r"), &Object::Double(2.0)));
    }

    #[test]
    fn test_bound_method_keeps_this() {
        let (interpreter, result) = run_source(
            "class Greeter { init(n) { this.n = n; } name() { return this.n; } } \
             var m = Greeter(\"x\").name; var r = m();",
        );
        result.unwrap();
        assert!(is_equal(
            &global(&interpreter, "r"),
            &Object::String("x".to_owned())
        ));
    }

    #[test]
    fn test_class_arity_follows_init() {
        let error = expect_runtime_error(
            "class Point { init(x, y) { this.x = x; this.y = y; } } Point(1);",
        );
        assert_eq!(error.message, "Expected 2 arguments but got 1.");
    }

    #[test]
    fn test_class_without_init_takes_no_arguments() {
        let error = expect_runtime_error("class C {} C(1);");
        assert_eq!(error.message, "Expected 0 arguments but got 1.");
    }

    #[test]
    fn test_undefined_property() {
        let error = expect_runtime_error("class C {} var c = C(); print c.missing;");
        assert_eq!(error.message, "Undefined property missing");
    }

    #[test]
    fn test_property_on_non_instance() {
        let error = expect_runtime_error("var x = 1; print x.field;");
        assert_eq!(error.message, "Only class instances have properties.");
    }

    #[test]
    fn test_list_literal_and_index() {
        let (interpreter, result) = run_source("var x = [1, 2, 3]; var r = x[1];");
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "r"), &Object::Double(2.0)));
    }

    #[test]
    fn test_list_append_and_delete() {
        let (interpreter, result) = run_source(
            "var x = [1, 2, 3]; x.append(4); var a = x[3]; var d = x.delete(0); var b = x[0];",
        );
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "a"), &Object::Double(4.0)));
        assert!(is_equal(&global(&interpreter, "d"), &Object::Double(1.0)));
        assert!(is_equal(&global(&interpreter, "b"), &Object::Double(2.0)));
    }

    #[test]
    fn test_list_index_out_of_range() {
        let error = expect_runtime_error("var x = [1]; print x[1];");
        assert_eq!(error.message, "Index out of range.");
    }

    #[test]
    fn test_list_index_must_be_number() {
        let error = expect_runtime_error("var x = [1]; print x[\"a\"];");
        assert_eq!(error.message, "List index must be a number.");
    }

    #[test]
    fn test_indexing_non_list() {
        let error = expect_runtime_error("var x = 1; print x[0];");
        assert_eq!(error.message, "Only lists can be indexed.");
    }

    #[test]
    fn test_set_on_list_is_rejected() {
        let error = expect_runtime_error("var x = [1]; x.size = 2;");
        assert_eq!(error.message, "Can not set properties on a list.");
    }

    #[test]
    fn test_nested_lists() {
        let (interpreter, result) = run_source("var x = [[1], [2, 3]]; var r = x[1][0];");
        result.unwrap();
        assert!(is_equal(&global(&interpreter, "r"), &Object::Double(2.0)));
    }

    #[test]
    fn test_stringify_forms() {
        assert_eq!(stringify(&Object::Nil), "nil");
        assert_eq!(stringify(&Object::Double(3.0)), "3");
        assert_eq!(stringify(&Object::Double(2.5)), "2.5");
        assert_eq!(stringify(&Object::Boolean(true)), "true");
        assert_eq!(stringify(&Object::String("hi".to_owned())), "hi");
        let list = Object::List(Rc::new(RefCell::new(LoxList::new(vec![
            Object::Double(1.0),
            Object::String("a".to_owned()),
        ]))));
        assert_eq!(stringify(&list), "[1, a]");
    }

    #[test]
    fn test_truthiness_table() {
        assert!(!truthy(&Object::Nil));
        assert!(!truthy(&Object::Boolean(false)));
        assert!(truthy(&Object::Boolean(true)));
        assert!(truthy(&Object::Double(0.0)));
        assert!(truthy(&Object::String(String::new())));
        assert!(truthy(&Object::List(Rc::new(RefCell::new(LoxList::new(
            vec![]
        ))))));
    }

    #[test]
    fn test_runtime_error_carries_line() {
        let error = expect_runtime_error("var a = 1;\nvar b = a / 0;");
        assert_eq!(error.token.line, 2);
        assert_eq!(format!("{}", error), "Can not divide by zero.\n[line 2]");
    }
}
