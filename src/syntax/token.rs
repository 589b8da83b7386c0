//! Token definitions for the expression language.

use std::fmt;

use crate::error::TextRange;

/// A lexed token together with its byte range in the input text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: TextRange,
}

impl Token {
    pub fn new(kind: TokenKind, range: TextRange) -> Self {
        Self { kind, range }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Integer(i64),
    Float(f64),
    String(String),
    True,
    False,
    Missing,

    // References
    /// `$name$` or `$["name"]`
    Column(String),
    /// `$[ROW_INDEX]`
    RowIndex,
    /// `$[ROW_ID]`
    RowId,
    /// `$$name$$` or `$$["name"]`
    FlowVar(String),

    /// A bare name: function call, aggregation call, or named-argument key.
    Identifier(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    DoubleStar,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    DoubleEqual,
    NotEqual,
    DoubleQuestion,
    And,
    Or,
    Not,

    // Punctuation
    LeftParen,
    RightParen,
    Comma,
    Equal,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Integer(value) => write!(f, "{}", value),
            TokenKind::Float(value) => write!(f, "{:?}", value),
            TokenKind::String(value) => write!(f, "\"{}\"", value),
            TokenKind::True => write!(f, "TRUE"),
            TokenKind::False => write!(f, "FALSE"),
            TokenKind::Missing => write!(f, "MISSING"),
            TokenKind::Column(name) => write!(f, "$[\"{}\"]", name),
            TokenKind::RowIndex => write!(f, "$[ROW_INDEX]"),
            TokenKind::RowId => write!(f, "$[ROW_ID]"),
            TokenKind::FlowVar(name) => write!(f, "$$[\"{}\"]", name),
            TokenKind::Identifier(name) => write!(f, "{}", name),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::DoubleSlash => write!(f, "//"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::DoubleStar => write!(f, "**"),
            TokenKind::Less => write!(f, "<"),
            TokenKind::LessEqual => write!(f, "<="),
            TokenKind::Greater => write!(f, ">"),
            TokenKind::GreaterEqual => write!(f, ">="),
            TokenKind::DoubleEqual => write!(f, "=="),
            TokenKind::NotEqual => write!(f, "!="),
            TokenKind::DoubleQuestion => write!(f, "??"),
            TokenKind::And => write!(f, "and"),
            TokenKind::Or => write!(f, "or"),
            TokenKind::Not => write!(f, "not"),
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Equal => write!(f, "="),
            TokenKind::Eof => write!(f, "end of expression"),
        }
    }
}
