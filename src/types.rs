//! The value-type lattice of the expression language.
//!
//! Four base types plus a distinguished `Missing` type; every base type also
//! exists in an optional (missing-capable) variant. `Missing` is its own base
//! type and its own optional type.

use std::fmt;

/// Static type of an expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Boolean,
    Integer,
    Float,
    String,
    Missing,
    OptBoolean,
    OptInteger,
    OptFloat,
    OptString,
}

impl ValueType {
    /// Strip the optional wrapper. Idempotent.
    pub fn base_type(&self) -> ValueType {
        match self {
            ValueType::OptBoolean => ValueType::Boolean,
            ValueType::OptInteger => ValueType::Integer,
            ValueType::OptFloat => ValueType::Float,
            ValueType::OptString => ValueType::String,
            other => *other,
        }
    }

    /// Add the optional wrapper. Idempotent; `Missing` stays `Missing`.
    pub fn optional_type(&self) -> ValueType {
        match self {
            ValueType::Boolean => ValueType::OptBoolean,
            ValueType::Integer => ValueType::OptInteger,
            ValueType::Float => ValueType::OptFloat,
            ValueType::String => ValueType::OptString,
            other => *other,
        }
    }

    /// Whether values of this type can be missing at runtime.
    pub fn is_optional(&self) -> bool {
        matches!(
            self,
            ValueType::OptBoolean
                | ValueType::OptInteger
                | ValueType::OptFloat
                | ValueType::OptString
                | ValueType::Missing
        )
    }

    /// Whether the base type is `Integer` or `Float`.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.base_type(),
            ValueType::Integer | ValueType::Float
        )
    }

    /// Keep the base type, make the result optional iff `optional` is true.
    pub fn with_optional(&self, optional: bool) -> ValueType {
        if optional {
            self.optional_type()
        } else {
            self.base_type()
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Boolean => write!(f, "BOOLEAN"),
            ValueType::Integer => write!(f, "INTEGER"),
            ValueType::Float => write!(f, "FLOAT"),
            ValueType::String => write!(f, "STRING"),
            ValueType::Missing => write!(f, "MISSING"),
            ValueType::OptBoolean => write!(f, "BOOLEAN | MISSING"),
            ValueType::OptInteger => write!(f, "INTEGER | MISSING"),
            ValueType::OptFloat => write!(f, "FLOAT | MISSING"),
            ValueType::OptString => write!(f, "STRING | MISSING"),
        }
    }
}
