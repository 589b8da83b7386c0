//! Expression lexer - turns formula text into tokens.

use crate::error::{CompileError, CompileResult, TextRange};
use crate::syntax::token::{Token, TokenKind};

pub struct Lexer {
    input: String,
    position: usize,
    current_char: Option<char>,
}

impl Lexer {
    pub fn new(input: String) -> Self {
        let mut lexer = Lexer {
            input,
            position: 0,
            current_char: None,
        };
        lexer.current_char = lexer.input.chars().next();
        lexer
    }

    /// Tokenize the whole input. The result always ends with an `Eof` token.
    pub fn tokenize(&mut self) -> CompileResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> CompileResult<Token> {
        self.skip_whitespace_and_comments();

        let start = self.position;
        let c = match self.current_char {
            Some(c) => c,
            None => return Ok(Token::new(TokenKind::Eof, TextRange::new(start, start))),
        };

        let kind = match c {
            '+' => {
                self.advance();
                TokenKind::Plus
            }
            '-' => {
                self.advance();
                TokenKind::Minus
            }
            '*' => {
                self.advance();
                if self.current_char == Some('*') {
                    self.advance();
                    TokenKind::DoubleStar
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                self.advance();
                if self.current_char == Some('/') {
                    self.advance();
                    TokenKind::DoubleSlash
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                self.advance();
                TokenKind::Percent
            }
            '<' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            '=' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    TokenKind::DoubleEqual
                } else {
                    TokenKind::Equal
                }
            }
            '!' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    TokenKind::NotEqual
                } else {
                    return Err(self.error_at(start, "expected '=' after '!'"));
                }
            }
            '?' => {
                self.advance();
                if self.current_char == Some('?') {
                    self.advance();
                    TokenKind::DoubleQuestion
                } else {
                    return Err(self.error_at(start, "expected '?' after '?'"));
                }
            }
            '(' => {
                self.advance();
                TokenKind::LeftParen
            }
            ')' => {
                self.advance();
                TokenKind::RightParen
            }
            ',' => {
                self.advance();
                TokenKind::Comma
            }
            '"' => self.read_string(start)?,
            '$' => self.read_reference(start)?,
            c if c.is_ascii_digit() => self.read_number(start)?,
            c if c.is_ascii_alphabetic() || c == '_' => self.read_identifier(),
            c => {
                return Err(self.error_at(start, format!("unexpected character '{}'", c)));
            }
        };

        Ok(Token::new(kind, TextRange::new(start, self.position)))
    }

    fn advance(&mut self) {
        if let Some(c) = self.current_char {
            self.position += c.len_utf8();
            self.current_char = self.input[self.position..].chars().next();
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.current_char {
                Some(c) if c.is_whitespace() => self.advance(),
                Some('#') => {
                    while self.current_char.is_some() && self.current_char != Some('\n') {
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn error_at(&self, start: usize, message: impl Into<String>) -> CompileError {
        CompileError::syntax(message, TextRange::new(start, self.position.max(start + 1)))
    }

    fn read_number(&mut self, start: usize) -> CompileResult<TokenKind> {
        let mut is_float = false;
        while matches!(self.current_char, Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        if self.current_char == Some('.') {
            is_float = true;
            self.advance();
            while matches!(self.current_char, Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.current_char, Some('e') | Some('E')) {
            is_float = true;
            self.advance();
            if matches!(self.current_char, Some('+') | Some('-')) {
                self.advance();
            }
            if !matches!(self.current_char, Some(c) if c.is_ascii_digit()) {
                return Err(self.error_at(start, "expected digits in the exponent"));
            }
            while matches!(self.current_char, Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text = &self.input[start..self.position];
        if is_float {
            match text.parse::<f64>() {
                Ok(value) => Ok(TokenKind::Float(value)),
                Err(_) => Err(self.error_at(start, format!("invalid number '{}'", text))),
            }
        } else {
            match text.parse::<i64>() {
                Ok(value) => Ok(TokenKind::Integer(value)),
                Err(_) => Err(self.error_at(
                    start,
                    format!("integer '{}' is out of range", text),
                )),
            }
        }
    }

    fn read_string(&mut self, start: usize) -> CompileResult<TokenKind> {
        // Opening quote.
        self.advance();
        let mut value = String::new();
        loop {
            match self.current_char {
                None => return Err(self.error_at(start, "unterminated string literal")),
                Some('"') => {
                    self.advance();
                    return Ok(TokenKind::String(value));
                }
                Some('\\') => {
                    self.advance();
                    match self.current_char {
                        Some('"') => value.push('"'),
                        Some('\\') => value.push('\\'),
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some(c) => {
                            return Err(
                                self.error_at(start, format!("unknown escape '\\{}'", c))
                            );
                        }
                        None => {
                            return Err(self.error_at(start, "unterminated string literal"));
                        }
                    }
                    self.advance();
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }

    fn read_identifier(&mut self) -> TokenKind {
        let start = self.position;
        while matches!(self.current_char, Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        let text = &self.input[start..self.position];
        match text {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "MISSING" => TokenKind::Missing,
            _ if text.eq_ignore_ascii_case("true") => TokenKind::True,
            _ if text.eq_ignore_ascii_case("false") => TokenKind::False,
            _ => TokenKind::Identifier(text.to_string()),
        }
    }

    /// `$name$`, `$["name"]`, `$[ROW_INDEX]`, `$[ROW_ID]`, `$$name$$`, or
    /// `$$["name"]`.
    fn read_reference(&mut self, start: usize) -> CompileResult<TokenKind> {
        // Leading '$'.
        self.advance();
        if self.current_char == Some('$') {
            self.advance();
            return self.read_flow_var(start);
        }

        if self.current_char == Some('[') {
            self.advance();
            self.skip_whitespace_and_comments();
            let kind = match self.current_char {
                Some('"') => {
                    let name = match self.read_string(self.position)? {
                        TokenKind::String(name) => name,
                        _ => unreachable!("read_string yields string tokens"),
                    };
                    TokenKind::Column(name)
                }
                Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                    match self.read_identifier() {
                        TokenKind::Identifier(name) if name == "ROW_INDEX" => TokenKind::RowIndex,
                        TokenKind::Identifier(name) if name == "ROW_ID" => TokenKind::RowId,
                        other => {
                            return Err(self.error_at(
                                start,
                                format!("unknown special column reference '{}'", other),
                            ));
                        }
                    }
                }
                _ => {
                    return Err(
                        self.error_at(start, "expected a column name or special reference")
                    );
                }
            };
            self.skip_whitespace_and_comments();
            if self.current_char != Some(']') {
                return Err(self.error_at(start, "expected ']' to close the column reference"));
            }
            self.advance();
            return Ok(kind);
        }

        // Shorthand: $name$
        let name_start = self.position;
        while self.current_char.is_some() && self.current_char != Some('$') {
            self.advance();
        }
        if self.current_char != Some('$') {
            return Err(self.error_at(start, "unterminated column reference"));
        }
        let name = self.input[name_start..self.position].to_string();
        self.advance();
        if name.is_empty() {
            return Err(self.error_at(start, "empty column reference"));
        }
        Ok(TokenKind::Column(name))
    }

    fn read_flow_var(&mut self, start: usize) -> CompileResult<TokenKind> {
        if self.current_char == Some('[') {
            self.advance();
            self.skip_whitespace_and_comments();
            if self.current_char != Some('"') {
                return Err(self.error_at(start, "expected a flow variable name"));
            }
            let name = match self.read_string(self.position)? {
                TokenKind::String(name) => name,
                _ => unreachable!("read_string yields string tokens"),
            };
            self.skip_whitespace_and_comments();
            if self.current_char != Some(']') {
                return Err(
                    self.error_at(start, "expected ']' to close the flow variable reference")
                );
            }
            self.advance();
            return Ok(TokenKind::FlowVar(name));
        }

        // Shorthand: $$name$$
        let name_start = self.position;
        loop {
            match self.current_char {
                None => {
                    return Err(self.error_at(start, "unterminated flow variable reference"));
                }
                Some('$') => break,
                Some(_) => self.advance(),
            }
        }
        let name = self.input[name_start..self.position].to_string();
        self.advance();
        if self.current_char != Some('$') {
            return Err(self.error_at(start, "expected '$$' to close the flow variable"));
        }
        self.advance();
        if name.is_empty() {
            return Err(self.error_at(start, "empty flow variable reference"));
        }
        Ok(TokenKind::FlowVar(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input.to_string())
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1 42 2.5 1e3 2.5e-1"),
            vec![
                TokenKind::Integer(1),
                TokenKind::Integer(42),
                TokenKind::Float(2.5),
                TokenKind::Float(1000.0),
                TokenKind::Float(0.25),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_integer_overflow_is_an_error() {
        let err = Lexer::new("99999999999999999999".to_string())
            .tokenize()
            .unwrap_err();
        assert!(err.message.contains("out of range"));
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("+ - * ** / // % < <= > >= == != ?? ( ) , ="),
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::DoubleStar,
                TokenKind::Slash,
                TokenKind::DoubleSlash,
                TokenKind::Percent,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::DoubleEqual,
                TokenKind::NotEqual,
                TokenKind::DoubleQuestion,
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::Comma,
                TokenKind::Equal,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("true FALSE MISSING and or not average MAX"),
            vec![
                TokenKind::True,
                TokenKind::False,
                TokenKind::Missing,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::Identifier("average".to_string()),
                TokenKind::Identifier("MAX".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\"b" "line\n" "tab\t" "back\\""#),
            vec![
                TokenKind::String("a\"b".to_string()),
                TokenKind::String("line\n".to_string()),
                TokenKind::String("tab\t".to_string()),
                TokenKind::String("back\\".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("\"abc".to_string()).tokenize().unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_column_references() {
        assert_eq!(
            kinds("$price$ $[\"unit price\"] $[ROW_INDEX] $[ROW_ID]"),
            vec![
                TokenKind::Column("price".to_string()),
                TokenKind::Column("unit price".to_string()),
                TokenKind::RowIndex,
                TokenKind::RowId,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_flow_var_references() {
        assert_eq!(
            kinds("$$threshold$$ $$[\"max rows\"]"),
            vec![
                TokenKind::FlowVar("threshold".to_string()),
                TokenKind::FlowVar("max rows".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("1 # the rest is ignored\n+ 2"),
            vec![
                TokenKind::Integer(1),
                TokenKind::Plus,
                TokenKind::Integer(2),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_token_ranges_are_byte_offsets() {
        let tokens = Lexer::new("1 + 23".to_string()).tokenize().unwrap();
        assert_eq!(tokens[0].range, TextRange::new(0, 1));
        assert_eq!(tokens[1].range, TextRange::new(2, 3));
        assert_eq!(tokens[2].range, TextRange::new(4, 6));
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::new("1 @ 2".to_string()).tokenize().unwrap_err();
        assert!(err.message.contains("'@'"));
        assert_eq!(err.location, Some(TextRange::new(2, 3)));
    }
}
