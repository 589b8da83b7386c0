//! Kleene three-valued logic.
//!
//! Boolean operators over missing-capable operands follow the strong Kleene
//! truth tables, with `Unknown` standing for a missing operand.

/// Truth value of a missing-aware boolean expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TruthValue {
    True,
    False,
    Unknown,
}

impl TruthValue {
    /// Map a computed value and its missing flag to a truth value.
    pub fn of(value: bool, missing: bool) -> TruthValue {
        if missing {
            TruthValue::Unknown
        } else if value {
            TruthValue::True
        } else {
            TruthValue::False
        }
    }

    /// `Some(bool)` for a determined value, `None` for `Unknown`.
    pub fn to_option(self) -> Option<bool> {
        match self {
            TruthValue::True => Some(true),
            TruthValue::False => Some(false),
            TruthValue::Unknown => None,
        }
    }

    pub fn not(self) -> TruthValue {
        match self {
            TruthValue::True => TruthValue::False,
            TruthValue::False => TruthValue::True,
            TruthValue::Unknown => TruthValue::Unknown,
        }
    }

    pub fn and(self, other: TruthValue) -> TruthValue {
        match (self, other) {
            (TruthValue::False, _) | (_, TruthValue::False) => TruthValue::False,
            (TruthValue::True, TruthValue::True) => TruthValue::True,
            _ => TruthValue::Unknown,
        }
    }

    pub fn or(self, other: TruthValue) -> TruthValue {
        match (self, other) {
            (TruthValue::True, _) | (_, TruthValue::True) => TruthValue::True,
            (TruthValue::False, TruthValue::False) => TruthValue::False,
            _ => TruthValue::Unknown,
        }
    }
}

impl From<Option<bool>> for TruthValue {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => TruthValue::True,
            Some(false) => TruthValue::False,
            None => TruthValue::Unknown,
        }
    }
}
