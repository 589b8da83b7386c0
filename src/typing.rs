//! Type inference over expression trees.
//!
//! A strict post-order pass: every child is fully typed before its parent
//! is visited. Inferred types are collected in a `NodeTypes` side-map keyed
//! by node identity, leaving the tree itself untouched. Inference fails
//! fast at the first incompatibility.

use std::collections::HashMap;

use log::debug;

use crate::ast::{
    dispatch, Arguments, Ast, AstVisitor, BinaryOperator, ColumnAccess, ConstantAst, ConstantKind,
    NodeId, UnaryOperator,
};
use crate::error::{CompileError, CompileResult};
use crate::registry::Registry;
use crate::types::ValueType;

/// Inferred types of every node in one expression tree.
#[derive(Debug, Default, Clone)]
pub struct NodeTypes {
    types: HashMap<NodeId, ValueType>,
}

impl NodeTypes {
    pub fn get(&self, id: NodeId) -> Option<ValueType> {
        self.types.get(&id).copied()
    }

    pub fn of(&self, node: &Ast) -> Option<ValueType> {
        self.get(node.id())
    }

    fn insert(&mut self, id: NodeId, value_type: ValueType) {
        self.types.insert(id, value_type);
    }
}

/// External bindings needed to type an expression.
pub trait TypingContext {
    fn column_type(&self, access: &ColumnAccess) -> Option<ValueType>;

    fn flow_var_type(&self, name: &str) -> Option<ValueType> {
        let _ = name;
        None
    }

    fn registry(&self) -> &Registry;
}

/// Infer a type for every node of the tree, or fail with the first error.
pub fn infer_types(root: &Ast, ctx: &dyn TypingContext) -> CompileResult<NodeTypes> {
    let mut inference = TypeInference {
        ctx,
        types: NodeTypes::default(),
    };
    let root_type = inference.infer(root)?;
    debug!("inferred root type {}", root_type);
    Ok(inference.types)
}

/// Type of a constant, for aggregation arguments. Constants are never
/// optional except the missing constant itself.
pub fn constant_type(constant: &ConstantAst) -> ValueType {
    match constant.kind() {
        ConstantKind::Missing => ValueType::Missing,
        ConstantKind::Boolean(_) => ValueType::Boolean,
        ConstantKind::Integer(_) => ValueType::Integer,
        ConstantKind::Float(_) => ValueType::Float,
        ConstantKind::String(_) => ValueType::String,
    }
}

struct TypeInference<'a> {
    ctx: &'a dyn TypingContext,
    types: NodeTypes,
}

impl TypeInference<'_> {
    fn infer(&mut self, node: &Ast) -> CompileResult<ValueType> {
        if let Some(cached) = self.types.of(node) {
            return Ok(cached);
        }
        let value_type = dispatch(node, self)?;
        self.types.insert(node.id(), value_type);
        Ok(value_type)
    }

    fn binary_error(
        &self,
        node: &Ast,
        op: BinaryOperator,
        lt: ValueType,
        rt: ValueType,
    ) -> CompileError {
        CompileError::typing(
            format!(
                "operator '{}' is not applicable to {} and {}",
                op.symbol(),
                lt,
                rt
            ),
            node.location(),
        )
    }
}

impl AstVisitor for TypeInference<'_> {
    type Output = ValueType;
    type Error = CompileError;

    fn visit_missing_constant(&mut self, _node: &Ast) -> CompileResult<ValueType> {
        Ok(ValueType::Missing)
    }

    fn visit_boolean_constant(&mut self, _node: &Ast, _value: bool) -> CompileResult<ValueType> {
        Ok(ValueType::Boolean)
    }

    fn visit_integer_constant(&mut self, _node: &Ast, _value: i64) -> CompileResult<ValueType> {
        Ok(ValueType::Integer)
    }

    fn visit_float_constant(&mut self, _node: &Ast, _value: f64) -> CompileResult<ValueType> {
        Ok(ValueType::Float)
    }

    fn visit_string_constant(&mut self, _node: &Ast, _value: &str) -> CompileResult<ValueType> {
        Ok(ValueType::String)
    }

    fn visit_column_access(
        &mut self,
        node: &Ast,
        access: &ColumnAccess,
    ) -> CompileResult<ValueType> {
        self.ctx.column_type(access).ok_or_else(|| {
            CompileError::missing_column(
                format!("column {} is not available", access.column),
                node.location(),
            )
        })
    }

    fn visit_flow_var_access(&mut self, node: &Ast, name: &str) -> CompileResult<ValueType> {
        self.ctx.flow_var_type(name).ok_or_else(|| {
            CompileError::missing_flow_variable(
                format!("flow variable '{}' is not available", name),
                node.location(),
            )
        })
    }

    fn visit_unary_op(
        &mut self,
        node: &Ast,
        op: UnaryOperator,
        operand: &Ast,
    ) -> CompileResult<ValueType> {
        let t = self.infer(operand)?;
        match op {
            UnaryOperator::Minus if t.is_numeric() => Ok(t),
            UnaryOperator::Not if t.base_type() == ValueType::Boolean => Ok(t),
            _ => Err(CompileError::typing(
                format!("operator '{}' is not applicable to {}", op.symbol(), t),
                node.location(),
            )),
        }
    }

    fn visit_binary_op(
        &mut self,
        node: &Ast,
        op: BinaryOperator,
        left: &Ast,
        right: &Ast,
    ) -> CompileResult<ValueType> {
        let lt = self.infer(left)?;
        let rt = self.infer(right)?;
        let either_optional = lt.is_optional() || rt.is_optional();
        let neither_missing = lt != ValueType::Missing && rt != ValueType::Missing;

        if op == BinaryOperator::MissingFallback {
            return match (lt, rt) {
                (ValueType::Missing, rt) => Ok(rt),
                (lt, ValueType::Missing) => Ok(lt),
                (lt, rt) if lt.base_type() == rt.base_type() => Ok(rt),
                _ => Err(self.binary_error(node, op, lt, rt)),
            };
        }

        // String concatenation wins over numeric addition.
        if op == BinaryOperator::Plus
            && neither_missing
            && (lt.base_type() == ValueType::String || rt.base_type() == ValueType::String)
        {
            return Ok(ValueType::String);
        }

        if op.is_arithmetic() {
            if !lt.is_numeric() || !rt.is_numeric() {
                return Err(self.binary_error(node, op, lt, rt));
            }
            let both_integer =
                lt.base_type() == ValueType::Integer && rt.base_type() == ValueType::Integer;
            return match op {
                BinaryOperator::Divide => Ok(ValueType::Float.with_optional(either_optional)),
                BinaryOperator::FloorDivide => {
                    if both_integer {
                        Ok(ValueType::Integer.with_optional(either_optional))
                    } else {
                        Err(self.binary_error(node, op, lt, rt))
                    }
                }
                _ => {
                    if both_integer {
                        Ok(ValueType::Integer.with_optional(either_optional))
                    } else {
                        Ok(ValueType::Float.with_optional(either_optional))
                    }
                }
            };
        }

        if op.is_ordering() {
            return if lt.is_numeric() && rt.is_numeric() {
                Ok(ValueType::Boolean)
            } else {
                Err(self.binary_error(node, op, lt, rt))
            };
        }

        if op.is_equality() {
            let legal = lt.base_type() == rt.base_type()
                || lt == ValueType::Missing
                || rt == ValueType::Missing
                || (lt.is_numeric() && rt.is_numeric());
            return if legal {
                Ok(ValueType::Boolean)
            } else {
                Err(self.binary_error(node, op, lt, rt))
            };
        }

        if op.is_logical() {
            return if lt.base_type() == ValueType::Boolean && rt.base_type() == ValueType::Boolean
            {
                Ok(ValueType::Boolean.with_optional(either_optional))
            } else {
                Err(self.binary_error(node, op, lt, rt))
            };
        }

        Err(self.binary_error(node, op, lt, rt))
    }

    fn visit_function_call(
        &mut self,
        node: &Ast,
        name: &str,
        args: &Arguments<Ast>,
    ) -> CompileResult<ValueType> {
        let function = match self.ctx.registry().function(name) {
            Some(function) => function,
            None => {
                let suggestions = self.ctx.registry().suggest_function(name);
                return Err(CompileError::typing(
                    unknown_callable_message("function", name, &suggestions),
                    node.location(),
                ));
            }
        };

        let arg_types = args.try_map(|arg| self.infer(arg))?;
        let bound = function
            .signature()
            .bind(
                arg_types.positional_args().to_vec(),
                arg_types.named_args().clone(),
            )
            .map_err(|msg| {
                CompileError::typing(
                    format!("invalid arguments to '{}': {}", name, msg),
                    node.location(),
                )
            })?;
        function.signature().check_types(&bound).map_err(|msg| {
            CompileError::typing(
                format!("invalid arguments to '{}': {}", name, msg),
                node.location(),
            )
        })?;
        function.return_type(&bound).map_err(|msg| {
            CompileError::typing(format!("cannot call '{}': {}", name, msg), node.location())
        })
    }

    fn visit_aggregation_call(
        &mut self,
        node: &Ast,
        name: &str,
        args: &Arguments<ConstantAst>,
    ) -> CompileResult<ValueType> {
        let aggregation = match self.ctx.registry().aggregation(name) {
            Some(aggregation) => aggregation,
            None => {
                let suggestions = self.ctx.registry().suggest_aggregation(name);
                return Err(CompileError::typing(
                    unknown_callable_message("aggregation", name, &suggestions),
                    node.location(),
                ));
            }
        };

        let arg_types = args.map(constant_type);
        let bound = aggregation
            .signature()
            .bind(
                arg_types.positional_args().to_vec(),
                arg_types.named_args().clone(),
            )
            .map_err(|msg| {
                CompileError::typing(
                    format!("invalid arguments to '{}': {}", name, msg),
                    node.location(),
                )
            })?;
        aggregation.signature().check_types(&bound).map_err(|msg| {
            CompileError::typing(
                format!("invalid arguments to '{}': {}", name, msg),
                node.location(),
            )
        })?;
        aggregation.return_type(&bound).map_err(|msg| {
            CompileError::typing(format!("cannot call '{}': {}", name, msg), node.location())
        })
    }
}

fn unknown_callable_message(kind: &str, name: &str, suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        format!("unknown {} '{}'", kind, name)
    } else {
        let quoted: Vec<String> = suggestions.iter().map(|s| format!("'{}'", s)).collect();
        format!(
            "unknown {} '{}'; did you mean {}?",
            kind,
            name,
            quoted.join(", ")
        )
    }
}
