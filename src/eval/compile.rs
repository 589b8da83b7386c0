//! Compilation of a typed expression tree into one root `Computer`.
//!
//! Dispatch is driven by each node's inferred type: the typing pass has
//! already rejected every illegal operator/type combination, so any
//! uncovered combination here is an internal invariant violation, not a
//! user-facing error.

use std::rc::Rc;

use log::debug;

use crate::ast::{
    Arguments, Ast, BinaryOperator, ColumnAccess, ExprKind, NodeId, UnaryOperator,
};
use crate::error::{CompileError, CompileResult, EvalResult};
use crate::eval::computer::{
    with_location, BooleanComputer, Computer, FloatComputer, IntegerComputer, StringComputer,
    Thunk,
};
use crate::logic::TruthValue;
use crate::registry::Registry;
use crate::types::ValueType;
use crate::typing::NodeTypes;

/// External bindings needed to evaluate an expression row by row.
pub trait EvalContext {
    /// Computer reading the referenced column of the host's current row.
    fn column_computer(&self, access: &ColumnAccess) -> Option<Computer>;

    fn flow_var_computer(&self, name: &str) -> Option<Computer> {
        let _ = name;
        None
    }

    /// Host-precomputed result of an aggregation call node.
    fn aggregation_result(&self, node: NodeId) -> Option<Computer> {
        let _ = node;
        None
    }

    fn registry(&self) -> &Registry;
}

/// Build the root computer for a fully typed tree.
pub fn compile_expr(
    root: &Ast,
    types: &NodeTypes,
    ctx: &dyn EvalContext,
) -> CompileResult<Computer> {
    let compiler = ComputerCompiler { types, ctx };
    let computer = compiler.compile(root)?;
    debug!("compiled expression to a {} computer", computer.result_type());
    Ok(computer)
}

/// Floor division, rounding toward negative infinity. Division by zero is
/// defined as 0 rather than an error.
pub fn floor_div(a: i64, b: i64) -> i64 {
    if b == 0 {
        return 0;
    }
    let q = a.wrapping_div(b);
    if a.wrapping_rem(b) != 0 && (a < 0) != (b < 0) {
        q.wrapping_sub(1)
    } else {
        q
    }
}

/// Floor modulus, result has the sign of the divisor. Modulus by zero is 0.
pub fn floor_mod(a: i64, b: i64) -> i64 {
    if b == 0 {
        return 0;
    }
    let r = a.wrapping_rem(b);
    if r != 0 && (r < 0) != (b < 0) {
        r.wrapping_add(b)
    } else {
        r
    }
}

struct ComputerCompiler<'a> {
    types: &'a NodeTypes,
    ctx: &'a dyn EvalContext,
}

impl ComputerCompiler<'_> {
    fn compile(&self, node: &Ast) -> CompileResult<Computer> {
        let computer = match node.kind() {
            ExprKind::MissingConstant => Computer::Missing,
            ExprKind::BooleanConstant(value) => {
                Computer::Boolean(BooleanComputer::constant(*value))
            }
            ExprKind::IntegerConstant(value) => {
                Computer::Integer(IntegerComputer::constant(*value))
            }
            ExprKind::FloatConstant(value) => Computer::Float(FloatComputer::constant(*value)),
            ExprKind::StringConstant(value) => {
                Computer::String(StringComputer::constant(value.clone()))
            }
            ExprKind::ColumnAccess(access) => {
                self.ctx.column_computer(access).ok_or_else(|| {
                    CompileError::missing_column(
                        format!("column {} is not available", access.column),
                        node.location(),
                    )
                })?
            }
            ExprKind::FlowVarAccess(name) => {
                self.ctx.flow_var_computer(name).ok_or_else(|| {
                    CompileError::missing_flow_variable(
                        format!("flow variable '{}' is not available", name),
                        node.location(),
                    )
                })?
            }
            ExprKind::UnaryOp { op, operand } => {
                let child = self.compile(operand)?;
                self.compile_unary(node, *op, child)
            }
            ExprKind::BinaryOp { op, left, right } => {
                let left = self.compile(left)?;
                let right = self.compile(right)?;
                self.compile_binary(node, *op, left, right)
            }
            ExprKind::FunctionCall { name, args } => self.compile_function(node, name, args)?,
            ExprKind::AggregationCall { name, .. } => {
                self.ctx.aggregation_result(node.id()).ok_or_else(|| {
                    CompileError::aggregation_not_implemented(
                        format!(
                            "no precomputed result for aggregation '{}' is available",
                            name
                        ),
                        node.location(),
                    )
                })?
            }
        };
        Ok(match node.location() {
            Some(range) => with_location(computer, range),
            None => computer,
        })
    }

    fn output_type(&self, node: &Ast) -> ValueType {
        match self.types.of(node) {
            Some(value_type) => value_type,
            None => unreachable!("type inference ran before computer construction"),
        }
    }

    fn compile_unary(&self, node: &Ast, op: UnaryOperator, child: Computer) -> Computer {
        match op {
            UnaryOperator::Not => {
                let truth = Rc::new(move || child.truth_value().map(TruthValue::not));
                kleene_computer(truth)
            }
            UnaryOperator::Minus => match self.output_type(node).base_type() {
                ValueType::Integer => {
                    let value = child.clone();
                    let missing = child;
                    Computer::Integer(IntegerComputer::new(
                        Rc::new(move || Ok(value.compute_integer()?.wrapping_neg())),
                        Rc::new(move || missing.is_missing()),
                    ))
                }
                ValueType::Float => {
                    let value = child.clone();
                    let missing = child;
                    Computer::Float(FloatComputer::new(
                        Rc::new(move || Ok(-value.compute_float()?)),
                        Rc::new(move || missing.is_missing()),
                    ))
                }
                other => unreachable!("unary '-' typed as {}", other),
            },
        }
    }

    fn compile_binary(
        &self,
        node: &Ast,
        op: BinaryOperator,
        left: Computer,
        right: Computer,
    ) -> Computer {
        if op.is_ordering() {
            return ordering_computer(op, left, right);
        }
        if op.is_equality() {
            return equality_computer(op, left, right);
        }
        if op.is_logical() {
            let truth = Rc::new(move || {
                let lt = left.truth_value()?;
                let rt = right.truth_value()?;
                Ok(match op {
                    BinaryOperator::And => lt.and(rt),
                    BinaryOperator::Or => lt.or(rt),
                    _ => unreachable!("not a logical operator"),
                })
            });
            return kleene_computer(truth);
        }
        if op == BinaryOperator::MissingFallback {
            return fallback_computer(self.output_type(node), left, right);
        }

        // Arithmetic, dispatched on the inferred output base type.
        match self.output_type(node).base_type() {
            ValueType::String => {
                let left_repr = left.string_repr();
                let right_repr = right.string_repr();
                Computer::String(StringComputer::new(
                    Rc::new(move || Ok(format!("{}{}", left_repr()?, right_repr()?))),
                    Rc::new(|| Ok(false)),
                ))
            }
            ValueType::Integer => integer_arithmetic(op, left, right),
            ValueType::Float => float_arithmetic(op, left, right),
            other => unreachable!("operator '{}' typed as {}", op.symbol(), other),
        }
    }

    fn compile_function(
        &self,
        node: &Ast,
        name: &str,
        args: &Arguments<Ast>,
    ) -> CompileResult<Computer> {
        let function = self.ctx.registry().function(name).ok_or_else(|| {
            CompileError::typing(format!("unknown function '{}'", name), node.location())
        })?;
        let arg_computers = args.try_map(|arg| self.compile(arg))?;
        let bound = function
            .signature()
            .bind(
                arg_computers.positional_args().to_vec(),
                arg_computers.named_args().clone(),
            )
            .map_err(|msg| {
                CompileError::typing(
                    format!("invalid arguments to '{}': {}", name, msg),
                    node.location(),
                )
            })?;
        Ok(function.compile(bound))
    }
}

/// Boolean computer from a combined Kleene truth thunk: the result is
/// missing iff the combined truth value is `Unknown`.
fn kleene_computer(truth: Rc<dyn Fn() -> EvalResult<TruthValue>>) -> Computer {
    let compute_truth = Rc::clone(&truth);
    Computer::Boolean(BooleanComputer::new(
        Rc::new(move || Ok(compute_truth()? == TruthValue::True)),
        Rc::new(move || Ok(truth()? == TruthValue::Unknown)),
    ))
}

/// Ordering comparison with missing-aware semantics: `<` and `>` are false
/// when either side is missing; `<=` and `>=` are true when both sides are
/// missing and false when exactly one is. Operands are compared as floats
/// when either side is a float.
fn ordering_computer(op: BinaryOperator, left: Computer, right: Computer) -> Computer {
    let as_float = matches!(left.result_type(), ValueType::Float)
        || matches!(right.result_type(), ValueType::Float);
    let compute: Thunk<bool> = Rc::new(move || {
        let lm = left.is_missing()?;
        let rm = right.is_missing()?;
        let ordered = |lt: bool| -> EvalResult<bool> {
            // lt: accept strictly-less; otherwise strictly-greater.
            if as_float {
                let (a, b) = (left.compute_float()?, right.compute_float()?);
                Ok(if lt { a < b } else { a > b })
            } else {
                let (a, b) = (left.compute_integer()?, right.compute_integer()?);
                Ok(if lt { a < b } else { a > b })
            }
        };
        let ordered_or_equal = |le: bool| -> EvalResult<bool> {
            if as_float {
                let (a, b) = (left.compute_float()?, right.compute_float()?);
                Ok(if le { a <= b } else { a >= b })
            } else {
                let (a, b) = (left.compute_integer()?, right.compute_integer()?);
                Ok(if le { a <= b } else { a >= b })
            }
        };
        match op {
            BinaryOperator::Less => Ok(!lm && !rm && ordered(true)?),
            BinaryOperator::Greater => Ok(!lm && !rm && ordered(false)?),
            BinaryOperator::LessEqual => {
                if lm && rm {
                    Ok(true)
                } else if lm || rm {
                    Ok(false)
                } else {
                    ordered_or_equal(true)
                }
            }
            BinaryOperator::GreaterEqual => {
                if lm && rm {
                    Ok(true)
                } else if lm || rm {
                    Ok(false)
                } else {
                    ordered_or_equal(false)
                }
            }
            _ => unreachable!("not an ordering operator"),
        }
    });
    Computer::Boolean(BooleanComputer::new(compute, Rc::new(|| Ok(false))))
}

/// Two-layer equality: the result computer is never missing. `==` is true
/// iff both sides are missing, or both are present and value-equal; a side
/// that is statically known to be missing can never be value-equal to
/// anything.
fn equality_computer(op: BinaryOperator, left: Computer, right: Computer) -> Computer {
    let value_eq: Thunk<bool> = match (&left, &right) {
        (Computer::Missing, _) | (_, Computer::Missing) => Rc::new(|| Ok(false)),
        (Computer::Integer(a), Computer::Integer(b)) => {
            let (a, b) = (a.clone(), b.clone());
            Rc::new(move || Ok(a.compute()? == b.compute()?))
        }
        (Computer::Boolean(a), Computer::Boolean(b)) => {
            let (a, b) = (a.clone(), b.clone());
            Rc::new(move || Ok(a.compute()? == b.compute()?))
        }
        (Computer::String(a), Computer::String(b)) => {
            let (a, b) = (a.clone(), b.clone());
            Rc::new(move || Ok(a.compute()? == b.compute()?))
        }
        (a, b) => {
            // Typing guarantees the remaining case is numeric; promote both
            // sides to float.
            let (a, b) = (a.clone(), b.clone());
            Rc::new(move || Ok(a.compute_float()? == b.compute_float()?))
        }
    };

    let negate = op == BinaryOperator::NotEqual;
    let compute: Thunk<bool> = Rc::new(move || {
        let lm = left.is_missing()?;
        let rm = right.is_missing()?;
        let equal = if lm && rm {
            true
        } else if lm != rm {
            false
        } else {
            value_eq()?
        };
        Ok(equal != negate)
    });
    Computer::Boolean(BooleanComputer::new(compute, Rc::new(|| Ok(false))))
}

/// `left ?? right`: the left value when present, else the right one;
/// missing only when both sides are.
fn fallback_computer(output: ValueType, left: Computer, right: Computer) -> Computer {
    let (lm, rm) = (left.clone(), right.clone());
    let is_missing: Thunk<bool> = Rc::new(move || Ok(lm.is_missing()? && rm.is_missing()?));

    macro_rules! pick {
        ($computer:ident, $extract:ident, $variant:ident) => {{
            let (l, r) = (left, right);
            Computer::$variant($computer::new(
                Rc::new(move || {
                    if !l.is_missing()? {
                        l.$extract()
                    } else {
                        r.$extract()
                    }
                }),
                is_missing,
            ))
        }};
    }

    match output.base_type() {
        ValueType::Boolean => pick!(BooleanComputer, compute_boolean, Boolean),
        ValueType::Integer => pick!(IntegerComputer, compute_integer, Integer),
        ValueType::Float => pick!(FloatComputer, compute_float, Float),
        ValueType::String => pick!(StringComputer, compute_string, String),
        ValueType::Missing => Computer::Missing,
        other => unreachable!("'??' typed as {}", other),
    }
}

fn integer_arithmetic(op: BinaryOperator, left: Computer, right: Computer) -> Computer {
    let (lm, rm) = (left.clone(), right.clone());
    Computer::Integer(IntegerComputer::new(
        Rc::new(move || {
            let a = left.compute_integer()?;
            let b = right.compute_integer()?;
            Ok(match op {
                BinaryOperator::Plus => a.wrapping_add(b),
                BinaryOperator::Minus => a.wrapping_sub(b),
                BinaryOperator::Multiply => a.wrapping_mul(b),
                BinaryOperator::FloorDivide => floor_div(a, b),
                BinaryOperator::Remainder => floor_mod(a, b),
                BinaryOperator::Power => (a as f64).powf(b as f64).round() as i64,
                other => unreachable!("operator '{}' typed as INTEGER", other.symbol()),
            })
        }),
        Rc::new(move || Ok(lm.is_missing()? || rm.is_missing()?)),
    ))
}

fn float_arithmetic(op: BinaryOperator, left: Computer, right: Computer) -> Computer {
    let (lm, rm) = (left.clone(), right.clone());
    Computer::Float(FloatComputer::new(
        Rc::new(move || {
            let a = left.compute_float()?;
            let b = right.compute_float()?;
            Ok(match op {
                BinaryOperator::Plus => a + b,
                BinaryOperator::Minus => a - b,
                BinaryOperator::Multiply => a * b,
                BinaryOperator::Divide => a / b,
                // Native float remainder, not floor-mod.
                BinaryOperator::Remainder => a % b,
                BinaryOperator::Power => a.powf(b),
                other => unreachable!("operator '{}' typed as FLOAT", other.symbol()),
            })
        }),
        Rc::new(move || Ok(lm.is_missing()? || rm.is_missing()?)),
    ))
}
