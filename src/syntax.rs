//! Formula text front-end: lexer, tokens, and the recursive-descent parser.

pub mod lexer;
pub mod parser;
pub mod token;

pub use lexer::Lexer;
pub use parser::{parse, Parser};
pub use token::{Token, TokenKind};
