use lazy_static::lazy_static;
use maplit::hashmap;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub line: i32,
}

impl Token {
    pub fn lexeme(&self) -> String {
        self.token_type.lexeme()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token_type)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[allow(non_camel_case_types)]
pub enum TokenType {
    // Single-character tokens.
    LEFT_PAREN,
    RIGHT_PAREN,
    LEFT_BRACE,
    RIGHT_BRACE,
    LEFT_BRACKET,
    RIGHT_BRACKET,
    COMMA,
    DOT,
    MINUS,
    PLUS,
    SEMICOLON,
    SLASH,
    STAR,
    QUESTION,
    COLON,

    // One or two character tokens.
    BANG,
    BANG_EQUAL,
    EQUAL,
    EQUAL_EQUAL,
    GREATER,
    GREATER_EQUAL,
    LESS,
    LESS_EQUAL,

    // Literals.
    IDENTIFIER(String),
    STRING(String),
    NUMBER(f64),

    // Keywords.
    AND,
    CLASS,
    ELSE,
    FALSE,
    FUN,
    FOR,
    IF,
    NIL,
    OR,

    PRINT,
    RETURN,
    THIS,
    TRUE,
    VAR,
    WHILE,

    EOF,
}

impl TokenType {
    pub fn lexeme(&self) -> String {
        match self {
            Self::LEFT_PAREN => "(".to_owned(),
            Self::RIGHT_PAREN => ")".to_owned(),
            Self::LEFT_BRACE => "{".to_owned(),
            Self::RIGHT_BRACE => "}".to_owned(),
            Self::LEFT_BRACKET => "[".to_owned(),
            Self::RIGHT_BRACKET => "]".to_owned(),
            Self::COMMA => ",".to_owned(),
            Self::DOT => ".".to_owned(),
            Self::MINUS => "-".to_owned(),
            Self::PLUS => "+".to_owned(),
            Self::SEMICOLON => ";".to_owned(),
            Self::SLASH => "/".to_owned(),
            Self::STAR => "*".to_owned(),
            Self::QUESTION => "?".to_owned(),
            Self::COLON => ":".to_owned(),
            Self::BANG => "!".to_owned(),
            Self::BANG_EQUAL => "!=".to_owned(),
            Self::EQUAL => "=".to_owned(),
            Self::EQUAL_EQUAL => "==".to_owned(),
            Self::GREATER => ">".to_owned(),
            Self::GREATER_EQUAL => ">=".to_owned(),
            Self::LESS => "<".to_owned(),
            Self::LESS_EQUAL => "<=".to_owned(),
            Self::IDENTIFIER(name) => name.clone(),
            Self::STRING(value) => value.clone(),
            Self::NUMBER(value) => format!("{}", value),
            Self::AND => "and".to_owned(),
            Self::CLASS => "class".to_owned(),
            Self::ELSE => "else".to_owned(),
            Self::FALSE => "false".to_owned(),
            Self::FUN => "fun".to_owned(),
            Self::FOR => "for".to_owned(),
            Self::IF => "if".to_owned(),
            Self::NIL => "nil".to_owned(),
            Self::OR => "or".to_owned(),
            Self::PRINT => "print".to_owned(),
            Self::RETURN => "return".to_owned(),
            Self::THIS => "this".to_owned(),
            Self::TRUE => "true".to_owned(),
            Self::VAR => "var".to_owned(),
            Self::WHILE => "while".to_owned(),
            Self::EOF => "/0".to_owned(),
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lexeme())
    }
}

lazy_static! {
    pub static ref KEYWORDS: HashMap<&'static str, TokenType> = hashmap! {
        "and" => TokenType::AND,
        "class" => TokenType::CLASS,
        "else" => TokenType::ELSE,
        "false" => TokenType::FALSE,
        "fun" => TokenType::FUN,
        "for" => TokenType::FOR,
        "if" => TokenType::IF,
        "nil" => TokenType::NIL,
        "or" => TokenType::OR,

        "print" => TokenType::PRINT,
        "return" => TokenType::RETURN,
        "this" => TokenType::THIS,
        "true" => TokenType::TRUE,
        "var" => TokenType::VAR,
        "while" => TokenType::WHILE,
    };
}
