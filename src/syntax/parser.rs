//! Expression parser - converts tokens to an AST.
//!
//! Recursive descent, one method per precedence level, loosest first:
//! `or` → `and` → `not` → comparison → `??` → additive → multiplicative →
//! unary minus → power (right-associative) → primary.

use std::collections::HashMap;

use crate::ast::{
    Arguments, Ast, BinaryOperator, ColumnAccess, ColumnId, ConstantAst, ConstantKind, ExprKind,
    UnaryOperator,
};
use crate::error::{CompileError, CompileResult, TextRange};
use crate::syntax::lexer::Lexer;
use crate::syntax::token::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(text: &str) -> CompileResult<Self> {
        let tokens = Lexer::new(text.to_string()).tokenize()?;
        Ok(Parser {
            tokens,
            position: 0,
        })
    }

    /// Parse the whole input as a single expression.
    pub fn parse(mut self) -> CompileResult<Ast> {
        let expr = self.parse_expression()?;
        if self.current().kind != TokenKind::Eof {
            return Err(self.unexpected("end of expression"));
        }
        Ok(expr)
    }

    fn current(&self) -> &Token {
        // tokenize() always appends Eof, so the last token is a stopper.
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        token
    }

    fn peek(&self) -> &Token {
        let next = (self.position + 1).min(self.tokens.len() - 1);
        &self.tokens[next]
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> CompileResult<Token> {
        if self.current().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        let token = self.current();
        CompileError::syntax(
            format!("expected {}, found '{}'", expected, token.kind),
            token.range,
        )
    }

    fn parse_expression(&mut self) -> CompileResult<Ast> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> CompileResult<Ast> {
        let mut left = self.parse_and()?;
        while self.current().kind == TokenKind::Or {
            let op_range = self.advance().range;
            let right = self.parse_and()?;
            left = binary(BinaryOperator::Or, left, right, op_range);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> CompileResult<Ast> {
        let mut left = self.parse_not()?;
        while self.current().kind == TokenKind::And {
            let op_range = self.advance().range;
            let right = self.parse_not()?;
            left = binary(BinaryOperator::And, left, right, op_range);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> CompileResult<Ast> {
        if self.current().kind == TokenKind::Not {
            let op_range = self.advance().range;
            let operand = self.parse_not()?;
            let range = match operand.location() {
                Some(loc) => op_range.cover(loc),
                None => op_range,
            };
            return Ok(Ast::unary(UnaryOperator::Not, operand).with_location(range));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> CompileResult<Ast> {
        let mut left = self.parse_fallback()?;
        loop {
            let op = match self.current().kind {
                TokenKind::DoubleEqual => BinaryOperator::Equal,
                TokenKind::NotEqual => BinaryOperator::NotEqual,
                TokenKind::Less => BinaryOperator::Less,
                TokenKind::LessEqual => BinaryOperator::LessEqual,
                TokenKind::Greater => BinaryOperator::Greater,
                TokenKind::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => return Ok(left),
            };
            let op_range = self.advance().range;
            let right = self.parse_fallback()?;
            left = binary(op, left, right, op_range);
        }
    }

    fn parse_fallback(&mut self) -> CompileResult<Ast> {
        let mut left = self.parse_additive()?;
        while self.current().kind == TokenKind::DoubleQuestion {
            let op_range = self.advance().range;
            let right = self.parse_additive()?;
            left = binary(BinaryOperator::MissingFallback, left, right, op_range);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> CompileResult<Ast> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOperator::Plus,
                TokenKind::Minus => BinaryOperator::Minus,
                _ => return Ok(left),
            };
            let op_range = self.advance().range;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right, op_range);
        }
    }

    fn parse_multiplicative(&mut self) -> CompileResult<Ast> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOperator::Multiply,
                TokenKind::Slash => BinaryOperator::Divide,
                TokenKind::DoubleSlash => BinaryOperator::FloorDivide,
                TokenKind::Percent => BinaryOperator::Remainder,
                _ => return Ok(left),
            };
            let op_range = self.advance().range;
            let right = self.parse_unary()?;
            left = binary(op, left, right, op_range);
        }
    }

    fn parse_unary(&mut self) -> CompileResult<Ast> {
        if self.current().kind == TokenKind::Minus {
            let op_range = self.advance().range;
            let operand = self.parse_unary()?;
            let range = match operand.location() {
                Some(loc) => op_range.cover(loc),
                None => op_range,
            };
            return Ok(Ast::unary(UnaryOperator::Minus, operand).with_location(range));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> CompileResult<Ast> {
        let base = self.parse_primary()?;
        if self.current().kind == TokenKind::DoubleStar {
            let op_range = self.advance().range;
            // Right-associative; the exponent may carry its own unary minus.
            let exponent = self.parse_unary()?;
            return Ok(binary(BinaryOperator::Power, base, exponent, op_range));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> CompileResult<Ast> {
        let token = self.current().clone();
        let node = match token.kind {
            TokenKind::Integer(value) => {
                self.advance();
                Ast::integer(value)
            }
            TokenKind::Float(value) => {
                self.advance();
                Ast::float(value)
            }
            TokenKind::String(ref value) => {
                self.advance();
                Ast::string(value.clone())
            }
            TokenKind::True => {
                self.advance();
                Ast::boolean(true)
            }
            TokenKind::False => {
                self.advance();
                Ast::boolean(false)
            }
            TokenKind::Missing => {
                self.advance();
                Ast::missing()
            }
            TokenKind::Column(ref name) => {
                self.advance();
                Ast::column(name.clone())
            }
            TokenKind::RowIndex => {
                self.advance();
                Ast::column_access(ColumnAccess::new(ColumnId::RowIndex))
            }
            TokenKind::RowId => {
                self.advance();
                Ast::column_access(ColumnAccess::new(ColumnId::RowId))
            }
            TokenKind::FlowVar(ref name) => {
                self.advance();
                Ast::flow_var(name.clone())
            }
            TokenKind::Identifier(ref name) => {
                let name = name.clone();
                return self.parse_call(name, token.range);
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                let close = self.expect(TokenKind::RightParen, "')'")?;
                let range = token.range.cover(close.range);
                // Re-spanned so the group's diagnostics include the parens.
                return Ok(inner.with_location(range));
            }
            _ => return Err(self.unexpected("an expression")),
        };
        Ok(node.with_location(token.range))
    }

    fn parse_call(&mut self, name: String, name_range: TextRange) -> CompileResult<Ast> {
        self.advance();
        self.expect(TokenKind::LeftParen, "'(' after the call name")?;
        let args = self.parse_arguments()?;
        let close = self.expect(TokenKind::RightParen, "')' to close the argument list")?;
        let range = name_range.cover(close.range);

        if is_aggregation_name(&name) {
            let constants = args.try_map(to_constant)?;
            Ok(Ast::aggregation(name, constants).with_location(range))
        } else {
            Ok(Ast::function(name, args).with_location(range))
        }
    }

    fn parse_arguments(&mut self) -> CompileResult<Arguments<Ast>> {
        let mut positional = Vec::new();
        let mut named: HashMap<String, Ast> = HashMap::new();

        if self.current().kind == TokenKind::RightParen {
            return Ok(Arguments::new(positional, named));
        }

        loop {
            // `name = expr` is a named argument; a bare identifier followed
            // by anything else starts an ordinary expression.
            let is_named = matches!(self.current().kind, TokenKind::Identifier(_))
                && self.peek().kind == TokenKind::Equal;
            if is_named {
                let name_token = self.advance();
                let name = match name_token.kind {
                    TokenKind::Identifier(name) => name,
                    _ => unreachable!("checked above"),
                };
                self.advance(); // '='
                let value = self.parse_expression()?;
                if named.insert(name.clone(), value).is_some() {
                    return Err(CompileError::syntax(
                        format!("the argument '{}' was provided twice", name),
                        name_token.range,
                    ));
                }
            } else {
                if !named.is_empty() {
                    return Err(CompileError::syntax(
                        "positional arguments must precede named arguments",
                        self.current().range,
                    ));
                }
                positional.push(self.parse_expression()?);
            }

            if self.current().kind != TokenKind::Comma {
                return Ok(Arguments::new(positional, named));
            }
            self.advance();
        }
    }
}

/// Parse formula text into an expression tree.
pub fn parse(text: &str) -> CompileResult<Ast> {
    Parser::new(text)?.parse()
}

fn binary(op: BinaryOperator, left: Ast, right: Ast, op_range: TextRange) -> Ast {
    let range = match (left.location(), right.location()) {
        (Some(l), Some(r)) => l.cover(r),
        (Some(l), None) => l.cover(op_range),
        (None, Some(r)) => op_range.cover(r),
        (None, None) => op_range,
    };
    Ast::binary(op, left, right).with_location(range)
}

/// All-uppercase call names are aggregations.
fn is_aggregation_name(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase())
        && !name.chars().any(|c| c.is_ascii_lowercase())
}

/// Demote a parsed argument to a constant, as aggregation arguments must be.
fn to_constant(arg: &Ast) -> CompileResult<ConstantAst> {
    let kind = match arg.kind() {
        ExprKind::MissingConstant => ConstantKind::Missing,
        ExprKind::BooleanConstant(value) => ConstantKind::Boolean(*value),
        ExprKind::IntegerConstant(value) => ConstantKind::Integer(*value),
        ExprKind::FloatConstant(value) => ConstantKind::Float(*value),
        ExprKind::StringConstant(value) => ConstantKind::String(value.clone()),
        _ => {
            return Err(CompileError::syntax(
                "aggregation arguments must be constants",
                arg.location().unwrap_or(TextRange::new(0, 0)),
            ));
        }
    };
    let constant = ConstantAst::new(kind);
    Ok(match arg.location() {
        Some(range) => constant.with_location(range),
        None => constant,
    })
}
