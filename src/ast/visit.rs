//! Typed visitor dispatch and generic traversal over expression trees.

use crate::ast::args::Arguments;
use crate::ast::expr::{Ast, ColumnAccess, ConstantAst, ExprKind};
use crate::ast::op::{BinaryOperator, UnaryOperator};

/// One method per node variant. `dispatch` routes a node to the matching
/// method, so an exhaustive pass over the tree cannot silently skip a new
/// variant.
pub trait AstVisitor {
    type Output;
    type Error;

    fn visit_missing_constant(&mut self, node: &Ast) -> Result<Self::Output, Self::Error>;
    fn visit_boolean_constant(
        &mut self,
        node: &Ast,
        value: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_integer_constant(
        &mut self,
        node: &Ast,
        value: i64,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_float_constant(
        &mut self,
        node: &Ast,
        value: f64,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_string_constant(
        &mut self,
        node: &Ast,
        value: &str,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_column_access(
        &mut self,
        node: &Ast,
        access: &ColumnAccess,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_flow_var_access(
        &mut self,
        node: &Ast,
        name: &str,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_unary_op(
        &mut self,
        node: &Ast,
        op: UnaryOperator,
        operand: &Ast,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_binary_op(
        &mut self,
        node: &Ast,
        op: BinaryOperator,
        left: &Ast,
        right: &Ast,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_function_call(
        &mut self,
        node: &Ast,
        name: &str,
        args: &Arguments<Ast>,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_aggregation_call(
        &mut self,
        node: &Ast,
        name: &str,
        args: &Arguments<ConstantAst>,
    ) -> Result<Self::Output, Self::Error>;
}

/// Route one node to the visitor method for its variant.
pub fn dispatch<V: AstVisitor + ?Sized>(
    node: &Ast,
    visitor: &mut V,
) -> Result<V::Output, V::Error> {
    match node.kind() {
        ExprKind::MissingConstant => visitor.visit_missing_constant(node),
        ExprKind::BooleanConstant(value) => visitor.visit_boolean_constant(node, *value),
        ExprKind::IntegerConstant(value) => visitor.visit_integer_constant(node, *value),
        ExprKind::FloatConstant(value) => visitor.visit_float_constant(node, *value),
        ExprKind::StringConstant(value) => visitor.visit_string_constant(node, value),
        ExprKind::ColumnAccess(access) => visitor.visit_column_access(node, access),
        ExprKind::FlowVarAccess(name) => visitor.visit_flow_var_access(node, name),
        ExprKind::UnaryOp { op, operand } => visitor.visit_unary_op(node, *op, operand),
        ExprKind::BinaryOp { op, left, right } => {
            visitor.visit_binary_op(node, *op, left, right)
        }
        ExprKind::FunctionCall { name, args } => visitor.visit_function_call(node, name, args),
        ExprKind::AggregationCall { name, args } => {
            visitor.visit_aggregation_call(node, name, args)
        }
    }
}

/// Pre-order walk: parent before children.
pub fn for_each_pre(node: &Ast, f: &mut impl FnMut(&Ast)) {
    f(node);
    for child in node.children() {
        for_each_pre(child, f);
    }
}

/// Post-order walk: children before parent.
pub fn for_each_post(node: &Ast, f: &mut impl FnMut(&Ast)) {
    for child in node.children() {
        for_each_post(child, f);
    }
    f(node);
}

/// Post-order walk that aborts at the first error.
pub fn try_for_each_post<E>(
    node: &Ast,
    f: &mut impl FnMut(&Ast) -> Result<(), E>,
) -> Result<(), E> {
    for child in node.children() {
        try_for_each_post(child, f)?;
    }
    f(node)
}
