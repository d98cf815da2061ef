use crate::lox_error::LoxError;
use crate::parser::{Expr, ExprId, FunctionDecl, Stmt};
use crate::tokens::Token;
use std::collections::HashMap;

/// Map from a `Variable`/`Assign`/`This` node to the number of environment
/// frames between the reference and the frame holding its binding. Names
/// absent from the map resolve against the globals at runtime.
pub type ResolvedLocals = HashMap<ExprId, usize>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

/// Static scope analysis over the parsed statement list.
///
/// Walks every node once, tracking the stack of block scopes in flight. Only
/// local scopes are tracked; top-level declarations stay dynamic and fall
/// back to the global environment. Scope violations are reported but never
/// halt the traversal, so one pass can surface every error.
pub struct Resolver<'a> {
    lox: &'a mut dyn LoxError,
    // Innermost scope last. The bool tracks whether the name's initializer
    // has finished resolving: false = declared, true = defined.
    scopes: Vec<HashMap<String, bool>>,
    locals: ResolvedLocals,
    current_function: FunctionType,
}

impl<'a> Resolver<'a> {
    pub fn new(lox: &'a mut dyn LoxError) -> Self {
        Resolver {
            lox,
            scopes: Vec::new(),
            locals: HashMap::new(),
            current_function: FunctionType::None,
        }
    }

    pub fn resolve(mut self, statements: &[Stmt]) -> ResolvedLocals {
        self.resolve_statements(statements);
        self.locals
    }

    fn resolve_statements(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_statement(statement);
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme()) {
                self.lox.error(
                    name.line,
                    "Already a variable with this name in this scope.",
                );
            }
            scope.insert(name.lexeme(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme(), true);
        }
    }

    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme()) {
                self.locals.insert(id, depth);
                return;
            }
        }
        // Not found locally; assume global.
    }

    fn resolve_function(&mut self, declaration: &FunctionDecl, function_type: FunctionType) {
        let enclosing_function = self.current_function;
        self.current_function = function_type;

        self.begin_scope();
        for param in &declaration.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_statements(&declaration.body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn resolve_statement(&mut self, statement: &Stmt) {
        match statement {
            Stmt::Block { statements } => {
                self.begin_scope();
                self.resolve_statements(statements);
                self.end_scope();
            }
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(initializer) = initializer {
                    self.resolve_expression(initializer);
                }
                self.define(name);
            }
            Stmt::Function { declaration } => {
                // The name is defined eagerly so the body can recurse.
                self.declare(&declaration.name);
                self.define(&declaration.name);
                self.resolve_function(declaration, FunctionType::Function);
            }
            Stmt::Class { name, methods } => {
                self.declare(name);
                self.define(name);

                // Methods resolve inside an implicit scope holding `this`.
                self.begin_scope();
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert("this".to_owned(), true);
                }
                for method in methods {
                    let function_type = if method.name.lexeme() == "init" {
                        FunctionType::Initializer
                    } else {
                        FunctionType::Method
                    };
                    self.resolve_function(method, function_type);
                }
                self.end_scope();
            }
            Stmt::Expression { expression } | Stmt::Print { expression } => {
                self.resolve_expression(expression);
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expression(condition);
                self.resolve_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_statement(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expression(condition);
                self.resolve_statement(body);
            }
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.lox
                        .error(keyword.line, "Can't return from top-level code.");
                }
                if let Some(value) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.lox
                            .error(keyword.line, "Can't return a value from an initializer.");
                    }
                    self.resolve_expression(value);
                }
            }
        }
    }

    fn resolve_expression(&mut self, expression: &Expr) {
        match expression {
            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme()) == Some(&false) {
                        self.lox.error(
                            name.line,
                            "Can't read local variable in its own initializer.",
                        );
                    }
                }
                self.resolve_local(*id, name);
            }
            Expr::Assign { id, name, value } => {
                self.resolve_expression(value);
                self.resolve_local(*id, name);
            }
            Expr::This { id, keyword } => {
                self.resolve_local(*id, keyword);
            }
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expression(left);
                self.resolve_expression(right);
            }
            Expr::Unary { right, .. } => self.resolve_expression(right),
            Expr::Grouping { expression } => self.resolve_expression(expression),
            Expr::Literal { .. } => {}
            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expression(callee);
                for argument in arguments {
                    self.resolve_expression(argument);
                }
            }
            Expr::Get { object, .. } => self.resolve_expression(object),
            Expr::Set { object, value, .. } => {
                self.resolve_expression(value);
                self.resolve_expression(object);
            }
            Expr::Ternary {
                condition,
                truthy,
                falsy,
            } => {
                self.resolve_expression(condition);
                self.resolve_expression(truthy);
                self.resolve_expression(falsy);
            }
            Expr::List { items } => {
                for item in items {
                    self.resolve_expression(item);
                }
            }
            Expr::Index { list, index, .. } => {
                self.resolve_expression(list);
                self.resolve_expression(index);
            }
        }
    }
}
