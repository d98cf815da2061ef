use crate::lox_error::LoxError;
use crate::tokens::{Token, TokenType, KEYWORDS};
use itertools::peek_nth;
use take_until::TakeUntilExt;

/// Lexes a source string into a token stream terminated by `EOF`.
///
/// Errors are reported through `lox` and scanning keeps going, so a single
/// run can surface every bad character in the input.
pub fn scan_tokens(lox: &mut dyn LoxError, source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut chars = peek_nth(source.chars());

    while let Some(c) = chars.next() {
        match c {
            // Ignore white space
            ' ' | '\t' | '\r' => {}
            '\n' => line += 1,
            // Single-character tokens.
            '(' => tokens.push(Token {
                token_type: TokenType::LEFT_PAREN,
                line,
            }),
            ')' => tokens.push(Token {
                token_type: TokenType::RIGHT_PAREN,
                line,
            }),
            '{' => tokens.push(Token {
                token_type: TokenType::LEFT_BRACE,
                line,
            }),
            '}' => tokens.push(Token {
                token_type: TokenType::RIGHT_BRACE,
                line,
            }),
            '[' => tokens.push(Token {
                token_type: TokenType::LEFT_BRACKET,
                line,
            }),
            ']' => tokens.push(Token {
                token_type: TokenType::RIGHT_BRACKET,
                line,
            }),
            ',' => tokens.push(Token {
                token_type: TokenType::COMMA,
                line,
            }),
            '.' => tokens.push(Token {
                token_type: TokenType::DOT,
                line,
            }),
            '-' => tokens.push(Token {
                token_type: TokenType::MINUS,
                line,
            }),
            '+' => tokens.push(Token {
                token_type: TokenType::PLUS,
                line,
            }),
            ';' => tokens.push(Token {
                token_type: TokenType::SEMICOLON,
                line,
            }),
            '*' => tokens.push(Token {
                token_type: TokenType::STAR,
                line,
            }),
            '?' => tokens.push(Token {
                token_type: TokenType::QUESTION,
                line,
            }),
            ':' => tokens.push(Token {
                token_type: TokenType::COLON,
                line,
            }),
            // One or two character tokens.
            '!' => {
                let token_type = if chars.peek() == Some(&'=') {
                    chars.next();
                    TokenType::BANG_EQUAL
                } else {
                    TokenType::BANG
                };
                tokens.push(Token { token_type, line });
            }
            '=' => {
                let token_type = if chars.peek() == Some(&'=') {
                    chars.next();
                    TokenType::EQUAL_EQUAL
                } else {
                    TokenType::EQUAL
                };
                tokens.push(Token { token_type, line });
            }
            '<' => {
                let token_type = if chars.peek() == Some(&'=') {
                    chars.next();
                    TokenType::LESS_EQUAL
                } else {
                    TokenType::LESS
                };
                tokens.push(Token { token_type, line });
            }
            '>' => {
                let token_type = if chars.peek() == Some(&'=') {
                    chars.next();
                    TokenType::GREATER_EQUAL
                } else {
                    TokenType::GREATER
                };
                tokens.push(Token { token_type, line });
            }
            // SLASH or comment
            '/' => {
                if chars.peek() == Some(&'/') {
                    if (&mut chars).take_until(|c| *c == '\n').last() == Some('\n') {
                        line += 1;
                    }
                } else {
                    tokens.push(Token {
                        token_type: TokenType::SLASH,
                        line,
                    });
                }
            }
            // String literal
            '"' => {
                let open_line = line;
                let mut value = Vec::new();
                while chars.peek().is_some() && chars.peek() != Some(&'"') {
                    let x = chars.next();
                    if x == Some('\n') {
                        line += 1;
                    }
                    if let Some(x) = x {
                        value.push(x);
                    }
                }
                if chars.next().is_none() {
                    // The closing quote never showed up; the token is dropped.
                    lox.error(open_line, "Unterminated string.");
                } else {
                    tokens.push(Token {
                        token_type: TokenType::STRING(value.into_iter().collect()),
                        line,
                    });
                }
            }
            // Number literal
            '0'..='9' => {
                let mut value = Vec::new();
                value.push(c);
                while chars.peek().is_some() && chars.peek().unwrap().is_ascii_digit() {
                    let x = chars.next().unwrap();
                    value.push(x);
                }
                if chars.peek() == Some(&'.')
                    && chars.peek_nth(1).is_some()
                    && chars.peek_nth(1).unwrap().is_ascii_digit()
                {
                    let x = chars.next().unwrap();
                    value.push(x);
                    while chars.peek().is_some() && chars.peek().unwrap().is_ascii_digit() {
                        let x = chars.next().unwrap();
                        value.push(x);
                    }
                }
                let string_value: String = value.into_iter().collect();
                let value: f64 = string_value.parse::<f64>().unwrap_or(f64::NAN);
                tokens.push(Token {
                    token_type: TokenType::NUMBER(value),
                    line,
                });
            }
            // Identifier or reserved word
            'a'..='z' | 'A'..='Z' | '_' => {
                let mut value = Vec::new();
                value.push(c);
                while chars.peek().is_some()
                    && (chars.peek().unwrap().is_ascii_alphanumeric() || chars.peek() == Some(&'_'))
                {
                    value.push(chars.next().unwrap());
                }
                let lexeme: String = value.into_iter().collect();
                let token_type = KEYWORDS
                    .get(lexeme.as_str())
                    .cloned()
                    .unwrap_or(TokenType::IDENTIFIER(lexeme));
                tokens.push(Token { token_type, line });
            }
            _ => {
                lox.error(line, "Unexpected character.");
            }
        }
    }

    tokens.push(Token {
        token_type: TokenType::EOF,
        line,
    });
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::LoxRuntimeError;

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

    fn scan(source: &str) -> (Vec<TokenType>, TestLox) {
        let mut lox = TestLox::new();
        let tokens = scan_tokens(&mut lox, source);
        (tokens.into_iter().map(|t| t.token_type).collect(), lox)
    }

    #[test]
    fn test_token_round_trip() {
        let (tokens, lox) = scan("var x = 1 + 2;");
        assert_eq!(
            tokens,
            vec![
                TokenType::VAR,
                TokenType::IDENTIFIER("x".to_owned()),
                TokenType::EQUAL,
                TokenType::NUMBER(1.0),
                TokenType::PLUS,
                TokenType::NUMBER(2.0),
                TokenType::SEMICOLON,
                TokenType::EOF,
            ]
        );
        assert!(!lox.has_error);
    }

    #[test]
    fn test_decimal_number() {
        let (tokens, _) = scan("4.125");
        assert_eq!(tokens, vec![TokenType::NUMBER(4.125), TokenType::EOF]);
    }

    #[test]
    fn test_dot_without_fraction_is_not_part_of_number() {
        // A trailing dot is a DOT token, not a malformed number.
        let (tokens, _) = scan("4.foo");
        assert_eq!(
            tokens,
            vec![
                TokenType::NUMBER(4.0),
                TokenType::DOT,
                TokenType::IDENTIFIER("foo".to_owned()),
                TokenType::EOF,
            ]
        );
    }

    #[test]
    fn test_two_char_operators() {
        let (tokens, _) = scan("! != = == < <= > >=");
        assert_eq!(
            tokens,
            vec![
                TokenType::BANG,
                TokenType::BANG_EQUAL,
                TokenType::EQUAL,
                TokenType::EQUAL_EQUAL,
                TokenType::LESS,
                TokenType::LESS_EQUAL,
                TokenType::GREATER,
                TokenType::GREATER_EQUAL,
                TokenType::EOF,
            ]
        );
    }

    #[test]
    fn test_string_literal() {
        let (tokens, lox) = scan("\"Today is the day.\";");
        assert_eq!(
            tokens,
            vec![
                TokenType::STRING("Today is the day.".to_owned()),
                TokenType::SEMICOLON,
                TokenType::EOF,
            ]
        );
        assert!(!lox.has_error);
    }

    #[test]
    fn test_unterminated_string_reports_opening_line() {
        let (tokens, lox) = scan("var a;\n\"oops\nstill open");
        // No STRING token is produced for the unterminated literal.
        assert_eq!(
            tokens,
            vec![
                TokenType::VAR,
                TokenType::IDENTIFIER("a".to_owned()),
                TokenType::SEMICOLON,
                TokenType::EOF,
            ]
        );
        assert_eq!(lox.errors, vec![(2, "Unterminated string.".to_owned())]);
    }

    #[test]
    fn test_invalid_character_keeps_scanning() {
        let (tokens, lox) = scan("42 + @ + 7 # 1");
        assert_eq!(
            tokens,
            vec![
                TokenType::NUMBER(42.0),
                TokenType::PLUS,
                TokenType::PLUS,
                TokenType::NUMBER(7.0),
                TokenType::NUMBER(1.0),
                TokenType::EOF,
            ]
        );
        assert_eq!(
            lox.errors,
            vec![
                (1, "Unexpected character.".to_owned()),
                (1, "Unexpected character.".to_owned()),
            ]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let (tokens, _) = scan("if ifall _under score_2 this");
        assert_eq!(
            tokens,
            vec![
                TokenType::IF,
                TokenType::IDENTIFIER("ifall".to_owned()),
                TokenType::IDENTIFIER("_under".to_owned()),
                TokenType::IDENTIFIER("score_2".to_owned()),
                TokenType::THIS,
                TokenType::EOF,
            ]
        );
    }

    #[test]
    fn test_comment_runs_to_end_of_line() {
        let (tokens, lox) = scan("1 // comment ;;; @@@\n2");
        assert_eq!(
            tokens,
            vec![TokenType::NUMBER(1.0), TokenType::NUMBER(2.0), TokenType::EOF]
        );
        assert!(!lox.has_error);
    }

    #[test]
    fn test_newlines_tracked_for_lines() {
        let mut lox = TestLox::new();
        let tokens = scan_tokens(&mut lox, "1\n2\n\n3");
        let lines: Vec<i32> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 2, 4, 4]);
    }

    #[test]
    fn test_string_with_newline_inside() {
        let mut lox = TestLox::new();
        let tokens = scan_tokens(&mut lox, "\"a\nb\" x");
        assert_eq!(
            tokens[0].token_type,
            TokenType::STRING("a\nb".to_owned())
        );
        // The identifier after the string sits on line 2.
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn test_brackets_question_colon() {
        let (tokens, _) = scan("[1] ? a : b");
        assert_eq!(
            tokens,
            vec![
                TokenType::LEFT_BRACKET,
                TokenType::NUMBER(1.0),
                TokenType::RIGHT_BRACKET,
                TokenType::QUESTION,
                TokenType::IDENTIFIER("a".to_owned()),
                TokenType::COLON,
                TokenType::IDENTIFIER("b".to_owned()),
                TokenType::EOF,
            ]
        );
    }
}
