//! Lazily-evaluated, missing-aware computation units.
//!
//! A `Computer` is the compiled form of one expression node: a pair of
//! thunks (`compute`, `is_missing`) over the host's current row. Composite
//! computers capture their child computers, so evaluation is fully lazy and
//! re-entrant; nothing is cached between calls.

use std::fmt;
use std::rc::Rc;

use crate::error::{EvalError, EvalResult, TextRange};
use crate::logic::TruthValue;
use crate::types::ValueType;

/// A lazily-evaluated closure producing a value or an evaluation error.
pub type Thunk<T> = Rc<dyn Fn() -> EvalResult<T>>;

macro_rules! typed_computer {
    ($name:ident, $ty:ty, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone)]
        pub struct $name {
            compute: Thunk<$ty>,
            is_missing: Thunk<bool>,
        }

        impl $name {
            pub fn new(compute: Thunk<$ty>, is_missing: Thunk<bool>) -> Self {
                Self {
                    compute,
                    is_missing,
                }
            }

            /// A never-missing constant.
            pub fn constant(value: $ty) -> Self {
                Self {
                    compute: Rc::new(move || Ok(value.clone())),
                    is_missing: Rc::new(|| Ok(false)),
                }
            }

            /// The value for the current row. Only meaningful when
            /// `is_missing` reported false.
            pub fn compute(&self) -> EvalResult<$ty> {
                (self.compute)()
            }

            pub fn is_missing(&self) -> EvalResult<bool> {
                (self.is_missing)()
            }
        }
    };
}

typed_computer!(BooleanComputer, bool, "A boolean-valued computer.");
typed_computer!(IntegerComputer, i64, "An integer-valued computer.");
typed_computer!(FloatComputer, f64, "A float-valued computer.");
typed_computer!(StringComputer, String, "A string-valued computer.");

/// The compiled form of one expression node.
#[derive(Clone)]
pub enum Computer {
    Boolean(BooleanComputer),
    Integer(IntegerComputer),
    Float(FloatComputer),
    String(StringComputer),
    /// The always-missing computer of the `MISSING` constant.
    Missing,
}

impl Computer {
    pub fn is_missing(&self) -> EvalResult<bool> {
        match self {
            Computer::Boolean(c) => c.is_missing(),
            Computer::Integer(c) => c.is_missing(),
            Computer::Float(c) => c.is_missing(),
            Computer::String(c) => c.is_missing(),
            Computer::Missing => Ok(true),
        }
    }

    /// The base type this computer produces, or `Missing`.
    pub fn result_type(&self) -> ValueType {
        match self {
            Computer::Boolean(_) => ValueType::Boolean,
            Computer::Integer(_) => ValueType::Integer,
            Computer::Float(_) => ValueType::Float,
            Computer::String(_) => ValueType::String,
            Computer::Missing => ValueType::Missing,
        }
    }

    /// Kleene truth value of a boolean computer for the current row.
    pub fn truth_value(&self) -> EvalResult<TruthValue> {
        match self {
            Computer::Boolean(c) => {
                if c.is_missing()? {
                    Ok(TruthValue::Unknown)
                } else {
                    Ok(TruthValue::of(c.compute()?, false))
                }
            }
            Computer::Missing => Ok(TruthValue::Unknown),
            _ => Err(EvalError::new(format!(
                "expected a BOOLEAN value, got {}",
                self.result_type()
            ))),
        }
    }

    /// Current boolean value. Errors on a missing result or a non-boolean
    /// computer; only meaningful after `is_missing` reported false.
    pub fn compute_boolean(&self) -> EvalResult<bool> {
        match self {
            Computer::Boolean(c) => c.compute(),
            Computer::Missing => Err(EvalError::new("computed the value of a missing result")),
            other => Err(EvalError::new(format!(
                "expected a BOOLEAN value, got {}",
                other.result_type()
            ))),
        }
    }

    /// Current integer value.
    pub fn compute_integer(&self) -> EvalResult<i64> {
        match self {
            Computer::Integer(c) => c.compute(),
            Computer::Missing => Err(EvalError::new("computed the value of a missing result")),
            other => Err(EvalError::new(format!(
                "expected an INTEGER value, got {}",
                other.result_type()
            ))),
        }
    }

    /// Current float value; an integer computer is promoted.
    pub fn compute_float(&self) -> EvalResult<f64> {
        match self {
            Computer::Float(c) => c.compute(),
            Computer::Integer(c) => Ok(c.compute()? as f64),
            Computer::Missing => Err(EvalError::new("computed the value of a missing result")),
            other => Err(EvalError::new(format!(
                "expected a FLOAT value, got {}",
                other.result_type()
            ))),
        }
    }

    /// Current string value.
    pub fn compute_string(&self) -> EvalResult<String> {
        match self {
            Computer::String(c) => c.compute(),
            Computer::Missing => Err(EvalError::new("computed the value of a missing result")),
            other => Err(EvalError::new(format!(
                "expected a STRING value, got {}",
                other.result_type()
            ))),
        }
    }

    /// View this computer as float-valued, promoting an integer computer.
    /// `None` for non-numeric computers.
    pub fn as_float(&self) -> Option<FloatComputer> {
        match self {
            Computer::Float(c) => Some(c.clone()),
            Computer::Integer(c) => {
                let inner = c.clone();
                let missing = c.clone();
                Some(FloatComputer::new(
                    Rc::new(move || Ok(inner.compute()? as f64)),
                    Rc::new(move || missing.is_missing()),
                ))
            }
            _ => None,
        }
    }

    /// Textual form of the current value, with a missing value rendered as
    /// the literal text `MISSING`. Never fails on missing input.
    pub fn string_repr(&self) -> Thunk<String> {
        match self {
            Computer::Boolean(c) => {
                let c = c.clone();
                Rc::new(move || {
                    if c.is_missing()? {
                        Ok("MISSING".to_string())
                    } else {
                        Ok(if c.compute()? { "true" } else { "false" }.to_string())
                    }
                })
            }
            Computer::Integer(c) => {
                let c = c.clone();
                Rc::new(move || {
                    if c.is_missing()? {
                        Ok("MISSING".to_string())
                    } else {
                        Ok(c.compute()?.to_string())
                    }
                })
            }
            Computer::Float(c) => {
                let c = c.clone();
                Rc::new(move || {
                    if c.is_missing()? {
                        Ok("MISSING".to_string())
                    } else {
                        // Debug formatting keeps the decimal point on whole
                        // floats (3.0 rather than 3).
                        Ok(format!("{:?}", c.compute()?))
                    }
                })
            }
            Computer::String(c) => {
                let c = c.clone();
                Rc::new(move || {
                    if c.is_missing()? {
                        Ok("MISSING".to_string())
                    } else {
                        c.compute()
                    }
                })
            }
            Computer::Missing => Rc::new(|| Ok("MISSING".to_string())),
        }
    }
}

// The thunks are opaque closures; the produced type is the useful part.
impl fmt::Debug for Computer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Computer({})", self.result_type())
    }
}

/// Wrap a computer so any evaluation error propagating through it carries
/// this node's source location.
pub fn with_location(computer: Computer, range: TextRange) -> Computer {
    fn wrap<T: 'static>(thunk: Thunk<T>, range: TextRange) -> Thunk<T> {
        Rc::new(move || thunk().map_err(|e| e.with_location(range)))
    }

    match computer {
        Computer::Boolean(c) => Computer::Boolean(BooleanComputer::new(
            wrap(c.compute.clone(), range),
            wrap(c.is_missing, range),
        )),
        Computer::Integer(c) => Computer::Integer(IntegerComputer::new(
            wrap(c.compute.clone(), range),
            wrap(c.is_missing, range),
        )),
        Computer::Float(c) => Computer::Float(FloatComputer::new(
            wrap(c.compute.clone(), range),
            wrap(c.is_missing, range),
        )),
        Computer::String(c) => Computer::String(StringComputer::new(
            wrap(c.compute.clone(), range),
            wrap(c.is_missing, range),
        )),
        Computer::Missing => Computer::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn optional_int(value: i64, missing: &Rc<Cell<bool>>) -> Computer {
        let m1 = Rc::clone(missing);
        Computer::Integer(IntegerComputer::new(
            Rc::new(move || Ok(value)),
            Rc::new(move || Ok(m1.get())),
        ))
    }

    #[test]
    fn test_constant_computers() {
        let c = IntegerComputer::constant(42);
        assert!(!c.is_missing().unwrap());
        assert_eq!(c.compute().unwrap(), 42);

        let s = StringComputer::constant("hi".to_string());
        assert_eq!(s.compute().unwrap(), "hi");
    }

    #[test]
    fn test_missing_computer() {
        assert!(Computer::Missing.is_missing().unwrap());
        assert_eq!(Computer::Missing.result_type(), ValueType::Missing);
    }

    #[test]
    fn test_debug_names_the_result_type() {
        let c = Computer::Integer(IntegerComputer::constant(1));
        assert_eq!(format!("{:?}", c), "Computer(INTEGER)");
        assert_eq!(format!("{:?}", Computer::Missing), "Computer(MISSING)");
    }

    #[test]
    fn test_truth_value() {
        let t = Computer::Boolean(BooleanComputer::constant(true));
        assert_eq!(t.truth_value().unwrap(), TruthValue::True);
        assert_eq!(Computer::Missing.truth_value().unwrap(), TruthValue::Unknown);

        let err = Computer::Integer(IntegerComputer::constant(1))
            .truth_value()
            .unwrap_err();
        assert!(err.message.contains("BOOLEAN"));
    }

    #[test]
    fn test_as_float_promotes_integer() {
        let c = Computer::Integer(IntegerComputer::constant(3));
        let f = c.as_float().unwrap();
        assert_eq!(f.compute().unwrap(), 3.0);
        assert!(Computer::String(StringComputer::constant(String::new()))
            .as_float()
            .is_none());
    }

    #[test]
    fn test_string_repr() {
        assert_eq!(
            (Computer::Boolean(BooleanComputer::constant(true)).string_repr())().unwrap(),
            "true"
        );
        assert_eq!(
            (Computer::Integer(IntegerComputer::constant(-5)).string_repr())().unwrap(),
            "-5"
        );
        assert_eq!(
            (Computer::Float(FloatComputer::constant(3.0)).string_repr())().unwrap(),
            "3.0"
        );
        assert_eq!((Computer::Missing.string_repr())().unwrap(), "MISSING");
    }

    #[test]
    fn test_string_repr_of_missing_value() {
        let missing = Rc::new(Cell::new(true));
        let c = optional_int(1, &missing);
        assert_eq!((c.string_repr())().unwrap(), "MISSING");
        // Re-entrancy: flipping the row state changes the next call.
        missing.set(false);
        assert_eq!((c.string_repr())().unwrap(), "1");
    }

    #[test]
    fn test_with_location_appends_trace() {
        let failing: Thunk<i64> = Rc::new(|| Err(EvalError::new("boom")));
        let c = Computer::Integer(IntegerComputer::new(failing, Rc::new(|| Ok(false))));
        let wrapped = with_location(c, TextRange::new(2, 4));
        match wrapped {
            Computer::Integer(c) => {
                let err = c.compute().unwrap_err();
                assert_eq!(err.trace, vec![TextRange::new(2, 4)]);
            }
            _ => unreachable!(),
        }
    }
}
