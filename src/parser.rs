// Grammar (precedence low -> high)
//
// program        → declaration* EOF ;
// declaration    → varDecl | funDecl | classDecl | statement ;
// varDecl        → "var" IDENTIFIER ( "=" expression )? ";" ;
// funDecl        → "fun" function ;
// function       → IDENTIFIER "(" parameters? ")" block ;
// parameters     → IDENTIFIER ( "," IDENTIFIER )* ;
// classDecl      → "class" IDENTIFIER "{" function* "}" ;
// statement      → whileStmt | forStmt | ifStmt | printStmt
//                | block | returnStmt | exprStmt ;
// whileStmt      → "while" "(" expression ")" statement ;
// forStmt        → "for" "(" ( varDecl | exprStmt | ";" )
//                  expression? ";" expression? ")" statement ;
// ifStmt         → "if" "(" expression ")" statement ( "else" statement )? ;
// printStmt      → "print" expression ";" ;
// block          → "{" declaration* "}" ;
// returnStmt     → "return" expression? ";" ;
// exprStmt       → expression ";" ;
// expression     → assignment ;
// assignment     → ( call "." )? IDENTIFIER "=" assignment | ternary ;
// ternary        → logic_or ( "?" ternary ":" ternary )? ;
// logic_or       → logic_and ( "or" logic_and )* ;
// logic_and      → equality ( "and" equality )* ;
// equality       → comparison ( ( "!=" | "==" ) comparison )* ;
// comparison     → term ( ( "<" | "<=" | ">" | ">=" ) term )* ;
// term           → factor ( ( "+" | "-" ) factor )* ;
// factor         → unary ( ( "*" | "/" ) unary )* ;
// unary          → ( "!" | "-" ) unary | call ;
// call           → grouping ( "(" arguments? ")" | "." IDENTIFIER )* ;
// arguments      → expression ( "," expression )* ;
// grouping       → "(" expression ")" | listIndex ;
// listIndex      → listLit ( "[" logic_or "]" )* ;
// listLit        → "[" ( logic_or ( "," logic_or )* )? "]" | primary ;
// primary        → "true" | "false" | "nil" | "this"
//                | NUMBER | STRING | IDENTIFIER ;

use crate::lox_error::LoxError;
use crate::tokens::{Token, TokenType};
use itertools::Itertools;
use std::fmt;
use std::iter::Iterator;
use std::iter::Peekable;
use std::rc::Rc;
use std::slice::Iter;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Identity handle for the expression nodes the resolver tracks. Ids are
/// unique for the lifetime of the process so a REPL can accumulate
/// resolutions across entries without collisions.
pub type ExprId = usize;

static NEXT_EXPR_ID: AtomicUsize = AtomicUsize::new(0);

fn next_expr_id() -> ExprId {
    NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone)]
pub enum LiteralValue {
    Boolean(bool),
    Nil,
    Number(f64),
    String(String),
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Nil => write!(f, "nil"),
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Unary {
        operator: Token,
        right: Box<Expr>,
    },
    Literal {
        value: LiteralValue,
    },
    Grouping {
        expression: Box<Expr>,
    },
    Variable {
        id: ExprId,
        name: Token,
    },
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        paren: Token,
        arguments: Vec<Expr>,
    },
    Get {
        object: Box<Expr>,
        name: Token,
    },
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },
    This {
        id: ExprId,
        keyword: Token,
    },
    Ternary {
        condition: Box<Expr>,
        truthy: Box<Expr>,
        falsy: Box<Expr>,
    },
    List {
        items: Vec<Expr>,
    },
    Index {
        list: Box<Expr>,
        bracket: Token,
        index: Box<Expr>,
    },
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expression {
        expression: Expr,
    },
    Print {
        expression: Expr,
    },
    Var {
        name: Token,
        initializer: Option<Expr>,
    },
    Block {
        statements: Vec<Stmt>,
    },
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Function {
        declaration: Rc<FunctionDecl>,
    },
    Return {
        keyword: Token,
        value: Option<Expr>,
    },
    Class {
        name: Token,
        methods: Vec<Rc<FunctionDecl>>,
    },
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary {
                left,
                operator,
                right,
            } => write!(f, "({} {} {})", operator, left, right),
            Self::Unary { operator, right } => write!(f, "({} {})", operator, right),
            Self::Literal { value } => write!(f, "{}", value),
            Self::Grouping { expression } => write!(f, "(group {})", expression),
            Self::Variable { name, .. } => write!(f, "{}", name),
            Self::Assign { name, value, .. } => write!(f, "(= {} {})", name, value),
            Self::Logical {
                left,
                operator,
                right,
            } => write!(f, "({} {} {})", operator, left, right),
            Self::Call {
                callee, arguments, ..
            } => {
                write!(f, "(call {}", callee)?;
                for argument in arguments {
                    write!(f, " {}", argument)?;
                }
                write!(f, ")")
            }
            Self::Get { object, name } => write!(f, "(. {} {})", object, name),
            Self::Set {
                object,
                name,
                value,
            } => write!(f, "(set {} {} {})", object, name, value),
            Self::This { .. } => write!(f, "this"),
            Self::Ternary {
                condition,
                truthy,
                falsy,
            } => write!(f, "(? {} {} {})", condition, truthy, falsy),
            Self::List { items } => {
                write!(f, "[{}]", items.iter().format(", "))
            }
            Self::Index { list, index, .. } => write!(f, "(index {} {})", list, index),
        }
    }
}

#[derive(Debug)]
pub struct ParseError {
    pub token: Token,
    pub message: String,
}

impl ParseError {
    fn new(token: Token, message: &str) -> Self {
        ParseError {
            token,
            message: message.to_owned(),
        }
    }
}

type ParseResult<T> = Result<T, ParseError>;

type Tokenz<'a> = &'a mut Peekable<Iter<'a, Token>>;

pub struct Parser<'a> {
    tokens: Tokenz<'a>,
    lox: &'a mut dyn LoxError,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Tokenz<'a>, lox: &'a mut dyn LoxError) -> Self {
        Self { tokens, lox }
    }

    pub fn parse(&mut self) -> Vec<Stmt> {
        let mut statements = vec![];
        while !self.is_at_end() {
            match self.declaration() {
                Ok(statement) => statements.push(statement),
                Err(e) => {
                    self.lox.error(e.token.line, &e.message);
                    self.synchronize();
                }
            }
        }
        statements
    }

    fn is_at_end(&mut self) -> bool {
        matches!(
            self.tokens.peek(),
            None | Some(Token {
                token_type: TokenType::EOF,
                ..
            })
        )
    }

    fn check(&mut self, token_type: &TokenType) -> bool {
        matches!(self.tokens.peek(), Some(t) if t.token_type == *token_type)
    }

    fn token_match(&mut self, types: &[TokenType]) -> Option<Token> {
        let cur_token = self.tokens.peek()?;
        if types.contains(&cur_token.token_type) {
            self.tokens.next().cloned()
        } else {
            None
        }
    }

    fn current_token(&mut self) -> Token {
        self.tokens.peek().map(|t| (*t).clone()).unwrap_or(Token {
            token_type: TokenType::EOF,
            line: -1,
        })
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> ParseResult<Token> {
        match self.token_match(std::slice::from_ref(&token_type)) {
            Some(token) => Ok(token),
            None => Err(ParseError::new(self.current_token(), message)),
        }
    }

    fn consume_identifier(&mut self, message: &str) -> ParseResult<Token> {
        let is_identifier = matches!(
            self.tokens.peek(),
            Some(t) if matches!(t.token_type, TokenType::IDENTIFIER(_))
        );
        if is_identifier {
            if let Some(token) = self.tokens.next() {
                return Ok(token.clone());
            }
        }
        Err(ParseError::new(self.current_token(), message))
    }

    /// Discard tokens until just past the next `;` so the parser can pick up
    /// the following statement after an error.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            if let Some(token) = self.tokens.next() {
                if token.token_type == TokenType::SEMICOLON {
                    return;
                }
            }
        }
    }

    fn declaration(&mut self) -> ParseResult<Stmt> {
        if self.token_match(&[TokenType::VAR]).is_some() {
            return self.var_declaration();
        }
        if self.token_match(&[TokenType::FUN]).is_some() {
            return Ok(Stmt::Function {
                declaration: Rc::new(self.function()?),
            });
        }
        if self.token_match(&[TokenType::CLASS]).is_some() {
            return self.class_declaration();
        }
        self.statement()
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume_identifier("Expect variable name.")?;

        let mut initializer = None;
        if self.token_match(&[TokenType::EQUAL]).is_some() {
            initializer = Some(self.expression()?);
        }

        self.consume(
            TokenType::SEMICOLON,
            "Expect ';' after variable declaration.",
        )?;
        Ok(Stmt::Var { name, initializer })
    }

    fn class_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume_identifier("Expect class name.")?;
        self.consume(TokenType::LEFT_BRACE, "Expect '{' after class name.")?;

        let mut methods = vec![];
        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            methods.push(Rc::new(self.function()?));
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after class body.")?;
        Ok(Stmt::Class { name, methods })
    }

    fn function(&mut self) -> ParseResult<FunctionDecl> {
        let name = self.consume_identifier("Expect function name.")?;
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after function name.")?;

        let mut params = vec![];
        if !self.check(&TokenType::RIGHT_PAREN) {
            params.push(self.consume_identifier("Expect parameter name.")?);
            while self.token_match(&[TokenType::COMMA]).is_some() {
                params.push(self.consume_identifier("Expect parameter name.")?);
            }
        }
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;

        self.consume(TokenType::LEFT_BRACE, "Expect '{' before function body.")?;
        let body = self.block_statements()?;
        Ok(FunctionDecl { name, params, body })
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.token_match(&[TokenType::WHILE]).is_some() {
            return self.while_statement();
        }
        if self.token_match(&[TokenType::FOR]).is_some() {
            return self.for_statement();
        }
        if self.token_match(&[TokenType::IF]).is_some() {
            return self.if_statement();
        }
        if self.token_match(&[TokenType::PRINT]).is_some() {
            return self.print_statement();
        }
        if self.token_match(&[TokenType::LEFT_BRACE]).is_some() {
            return Ok(Stmt::Block {
                statements: self.block_statements()?,
            });
        }
        if let Some(keyword) = self.token_match(&[TokenType::RETURN]) {
            return self.return_statement(keyword);
        }
        self.expression_statement()
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after while condition.")?;
        let body = self.statement()?;
        Ok(Stmt::While {
            condition,
            body: Box::new(body),
        })
    }

    /// `for (I; C; U) B` is lowered onto the while machinery:
    /// `{ I; while (C) { B; U; } }`, dropping the pieces that are absent.
    fn for_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'for'.")?;

        let initializer = if self.token_match(&[TokenType::SEMICOLON]).is_some() {
            None
        } else if self.token_match(&[TokenType::VAR]).is_some() {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(&TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::SEMICOLON, "Expect ';' after loop condition.")?;

        let increment = if !self.check(&TokenType::RIGHT_PAREN) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block {
                statements: vec![
                    body,
                    Stmt::Expression {
                        expression: increment,
                    },
                ],
            };
        }

        let condition = condition.unwrap_or(Expr::Literal {
            value: LiteralValue::Boolean(true),
        });
        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block {
                statements: vec![initializer, body],
            };
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after if condition.")?;

        let then_branch = self.statement()?;
        let mut else_branch = None;
        if self.token_match(&[TokenType::ELSE]).is_some() {
            else_branch = Some(Box::new(self.statement()?));
        }

        Ok(Stmt::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch,
        })
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let expression = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after expression.")?;
        Ok(Stmt::Print { expression })
    }

    fn block_statements(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = vec![];
        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn return_statement(&mut self, keyword: Token) -> ParseResult<Stmt> {
        let mut value = None;
        if !self.check(&TokenType::SEMICOLON) {
            value = Some(self.expression()?);
        }

        self.consume(TokenType::SEMICOLON, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expression = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after expression.")?;
        Ok(Stmt::Expression { expression })
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.ternary()?;

        if let Some(equals) = self.token_match(&[TokenType::EQUAL]) {
            let value = self.assignment()?;

            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::Assign {
                    id: next_expr_id(),
                    name,
                    value: Box::new(value),
                }),
                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value: Box::new(value),
                }),
                _ => Err(ParseError::new(equals, "Invalid assignment target.")),
            };
        }
        Ok(expr)
    }

    fn ternary(&mut self) -> ParseResult<Expr> {
        let expr = self.logic_or()?;

        if self.token_match(&[TokenType::QUESTION]).is_some() {
            let truthy = self.ternary()?;
            self.consume(
                TokenType::COLON,
                "Expect ':' after ternary truthy expression.",
            )?;
            let falsy = self.ternary()?;
            return Ok(Expr::Ternary {
                condition: Box::new(expr),
                truthy: Box::new(truthy),
                falsy: Box::new(falsy),
            });
        }

        Ok(expr)
    }

    fn logic_or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.logic_and()?;
        while let Some(operator) = self.token_match(&[TokenType::OR]) {
            let right = self.logic_and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn logic_and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;
        while let Some(operator) = self.token_match(&[TokenType::AND]) {
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;
        while let Some(operator) =
            self.token_match(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL])
        {
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;
        while let Some(operator) = self.token_match(&[
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let right = self.term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;
        while let Some(operator) = self.token_match(&[TokenType::PLUS, TokenType::MINUS]) {
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;
        while let Some(operator) = self.token_match(&[TokenType::STAR, TokenType::SLASH]) {
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if let Some(operator) = self.token_match(&[TokenType::BANG, TokenType::MINUS]) {
            let right = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }
        self.call()
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.grouping()?;

        loop {
            if self.token_match(&[TokenType::LEFT_PAREN]).is_some() {
                expr = self.finish_call(expr)?;
            } else if self.token_match(&[TokenType::DOT]).is_some() {
                let name = self.consume_identifier("Expect property name after '.'.")?;
                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut arguments = vec![];
        if !self.check(&TokenType::RIGHT_PAREN) {
            arguments.push(self.expression()?);
            while self.token_match(&[TokenType::COMMA]).is_some() {
                arguments.push(self.expression()?);
            }
        }

        let paren = self.consume(TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?;
        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn grouping(&mut self) -> ParseResult<Expr> {
        if self.token_match(&[TokenType::LEFT_PAREN]).is_some() {
            let expr = self.expression()?;
            self.consume(TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping {
                expression: Box::new(expr),
            });
        }
        self.list_index()
    }

    fn list_index(&mut self) -> ParseResult<Expr> {
        let mut expr = self.list_lit()?;

        while let Some(bracket) = self.token_match(&[TokenType::LEFT_BRACKET]) {
            let index = self.logic_or()?;
            self.consume(TokenType::RIGHT_BRACKET, "Expect ']' after list index.")?;
            expr = Expr::Index {
                list: Box::new(expr),
                bracket,
                index: Box::new(index),
            };
        }

        Ok(expr)
    }

    fn list_lit(&mut self) -> ParseResult<Expr> {
        if self.token_match(&[TokenType::LEFT_BRACKET]).is_some() {
            let mut items = vec![];
            if !self.check(&TokenType::RIGHT_BRACKET) {
                items.push(self.logic_or()?);
                while self.token_match(&[TokenType::COMMA]).is_some() {
                    items.push(self.logic_or()?);
                }
            }
            self.consume(TokenType::RIGHT_BRACKET, "Expect ']' after list expression.")?;
            return Ok(Expr::List { items });
        }
        self.primary()
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let cur_token = self.tokens.next().cloned().unwrap_or(Token {
            token_type: TokenType::EOF,
            line: -1,
        });
        match &cur_token.token_type {
            TokenType::TRUE => Ok(Expr::Literal {
                value: LiteralValue::Boolean(true),
            }),
            TokenType::FALSE => Ok(Expr::Literal {
                value: LiteralValue::Boolean(false),
            }),
            TokenType::NIL => Ok(Expr::Literal {
                value: LiteralValue::Nil,
            }),
            TokenType::NUMBER(value) => Ok(Expr::Literal {
                value: LiteralValue::Number(*value),
            }),
            TokenType::STRING(value) => Ok(Expr::Literal {
                value: LiteralValue::String(value.clone()),
            }),
            TokenType::IDENTIFIER(_) => Ok(Expr::Variable {
                id: next_expr_id(),
                name: cur_token,
            }),
            TokenType::THIS => Ok(Expr::This {
                id: next_expr_id(),
                keyword: cur_token,
            }),
            _ => Err(ParseError::new(cur_token, "Expect expression.")),
        }
    }
}
