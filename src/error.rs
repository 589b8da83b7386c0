//! Compile-time and evaluation-time error types.

use std::fmt;

use thiserror::Error;

/// Byte-offset range into the original expression text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest range covering both inputs.
    pub fn cover(self, other: TextRange) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Category of a compile-time failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Syntax,
    Typing,
    MissingColumn,
    MissingFlowVariable,
    AggregationNotImplemented,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Syntax => "Syntax error",
            ErrorKind::Typing => "Typing error",
            ErrorKind::MissingColumn => "Missing column",
            ErrorKind::MissingFlowVariable => "Missing flow variable",
            ErrorKind::AggregationNotImplemented => "Aggregation not implemented",
        }
    }
}

/// A failure raised while turning expression text into an executable form:
/// parsing, type inference, column resolution, or computer construction.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
    pub kind: ErrorKind,
    pub location: Option<TextRange>,
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, location: Option<TextRange>) -> Self {
        Self {
            message: message.into(),
            kind,
            location,
        }
    }

    pub fn syntax(message: impl Into<String>, location: TextRange) -> Self {
        Self::new(ErrorKind::Syntax, message, Some(location))
    }

    pub fn typing(message: impl Into<String>, location: Option<TextRange>) -> Self {
        Self::new(ErrorKind::Typing, message, location)
    }

    pub fn missing_column(message: impl Into<String>, location: Option<TextRange>) -> Self {
        Self::new(ErrorKind::MissingColumn, message, location)
    }

    pub fn missing_flow_variable(message: impl Into<String>, location: Option<TextRange>) -> Self {
        Self::new(ErrorKind::MissingFlowVariable, message, location)
    }

    pub fn aggregation_not_implemented(
        message: impl Into<String>,
        location: Option<TextRange>,
    ) -> Self {
        Self::new(ErrorKind::AggregationNotImplemented, message, location)
    }

    /// Full diagnostic including kind and position, for direct display to
    /// the expression author.
    pub fn long_message(&self) -> String {
        match self.location {
            Some(range) => format!("{} at {}: {}", self.kind.as_str(), range, self.message),
            None => format!("{}: {}", self.kind.as_str(), self.message),
        }
    }
}

/// Result type for compile-stage operations.
pub type CompileResult<T> = Result<T, CompileError>;

/// A failure raised while evaluating a compiled expression against a row.
///
/// Carries a chain of source locations, innermost first: each enclosing
/// computer appends its own node's range as the error propagates outward.
#[derive(Error, Debug, Clone, PartialEq)]
pub struct EvalError {
    pub message: String,
    pub trace: Vec<TextRange>,
}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: Vec::new(),
        }
    }

    /// Append an enclosing node's location to the trace.
    pub fn with_location(mut self, range: TextRange) -> Self {
        self.trace.push(range);
        self
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for range in &self.trace {
            write!(f, " at {}", range)?;
        }
        Ok(())
    }
}

/// Result type for per-row evaluation.
pub type EvalResult<T> = Result<T, EvalError>;
