//! Expression AST node definitions.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ast::args::Arguments;
use crate::ast::op::{BinaryOperator, UnaryOperator};
use crate::error::TextRange;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// Stable identity of an AST node, minted at construction.
///
/// Analysis passes key their side-maps (inferred types, resolved column
/// indices) by `NodeId`, so the tree itself stays immutable and can be
/// shared read-only between passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of a referenced column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnId {
    Named(String),
    RowIndex,
    RowId,
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnId::Named(name) => write!(f, "$[\"{}\"]", name),
            ColumnId::RowIndex => write!(f, "$[ROW_INDEX]"),
            ColumnId::RowId => write!(f, "$[ROW_ID]"),
        }
    }
}

/// A column reference with a row offset.
///
/// The offset is structural only; windowed evaluation semantics are owned by
/// the host. Offset 0 is the current row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnAccess {
    pub column: ColumnId,
    pub offset: i64,
}

impl ColumnAccess {
    pub fn new(column: ColumnId) -> Self {
        Self { column, offset: 0 }
    }

    pub fn with_offset(column: ColumnId, offset: i64) -> Self {
        Self { column, offset }
    }
}

/// An expression tree node.
///
/// Structural equality compares the node kind (recursively) and ignores
/// node identity and source location.
#[derive(Debug, Clone)]
pub struct Ast {
    id: NodeId,
    location: Option<TextRange>,
    kind: ExprKind,
}

/// The variants of an expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    MissingConstant,
    BooleanConstant(bool),
    IntegerConstant(i64),
    FloatConstant(f64),
    StringConstant(String),
    ColumnAccess(ColumnAccess),
    FlowVarAccess(String),
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Ast>,
    },
    BinaryOp {
        op: BinaryOperator,
        left: Box<Ast>,
        right: Box<Ast>,
    },
    FunctionCall {
        name: String,
        args: Arguments<Ast>,
    },
    AggregationCall {
        name: String,
        args: Arguments<ConstantAst>,
    },
}

impl Ast {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            id: NodeId::fresh(),
            location: None,
            kind,
        }
    }

    pub fn with_location(mut self, location: TextRange) -> Self {
        self.location = Some(location);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn location(&self) -> Option<TextRange> {
        self.location
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    // Constructor helpers.

    pub fn missing() -> Self {
        Self::new(ExprKind::MissingConstant)
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(ExprKind::BooleanConstant(value))
    }

    pub fn integer(value: i64) -> Self {
        Self::new(ExprKind::IntegerConstant(value))
    }

    pub fn float(value: f64) -> Self {
        Self::new(ExprKind::FloatConstant(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ExprKind::StringConstant(value.into()))
    }

    pub fn column(name: impl Into<String>) -> Self {
        Self::new(ExprKind::ColumnAccess(ColumnAccess::new(ColumnId::Named(
            name.into(),
        ))))
    }

    pub fn column_access(access: ColumnAccess) -> Self {
        Self::new(ExprKind::ColumnAccess(access))
    }

    pub fn flow_var(name: impl Into<String>) -> Self {
        Self::new(ExprKind::FlowVarAccess(name.into()))
    }

    pub fn unary(op: UnaryOperator, operand: Ast) -> Self {
        Self::new(ExprKind::UnaryOp {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn binary(op: BinaryOperator, left: Ast, right: Ast) -> Self {
        Self::new(ExprKind::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn function(name: impl Into<String>, args: Arguments<Ast>) -> Self {
        Self::new(ExprKind::FunctionCall {
            name: name.into(),
            args,
        })
    }

    pub fn aggregation(name: impl Into<String>, args: Arguments<ConstantAst>) -> Self {
        Self::new(ExprKind::AggregationCall {
            name: name.into(),
            args,
        })
    }

    /// Direct child expressions, in evaluation order. Aggregation arguments
    /// are constants and do not appear here.
    pub fn children(&self) -> Vec<&Ast> {
        match &self.kind {
            ExprKind::MissingConstant
            | ExprKind::BooleanConstant(_)
            | ExprKind::IntegerConstant(_)
            | ExprKind::FloatConstant(_)
            | ExprKind::StringConstant(_)
            | ExprKind::ColumnAccess(_)
            | ExprKind::FlowVarAccess(_)
            | ExprKind::AggregationCall { .. } => Vec::new(),
            ExprKind::UnaryOp { operand, .. } => vec![operand],
            ExprKind::BinaryOp { left, right, .. } => vec![left, right],
            ExprKind::FunctionCall { args, .. } => args.iter().collect(),
        }
    }

    /// Whether this subtree contains no column or flow-variable references.
    pub fn is_constant(&self) -> bool {
        match &self.kind {
            ExprKind::ColumnAccess(_) | ExprKind::FlowVarAccess(_) => false,
            ExprKind::AggregationCall { .. } => true,
            _ => self.children().iter().all(|child| child.is_constant()),
        }
    }
}

impl PartialEq for Ast {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

/// A constant expression, used where only literals are legal (aggregation
/// arguments).
#[derive(Debug, Clone)]
pub struct ConstantAst {
    id: NodeId,
    location: Option<TextRange>,
    kind: ConstantKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstantKind {
    Missing,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl ConstantAst {
    pub fn new(kind: ConstantKind) -> Self {
        Self {
            id: NodeId::fresh(),
            location: None,
            kind,
        }
    }

    pub fn with_location(mut self, location: TextRange) -> Self {
        self.location = Some(location);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn location(&self) -> Option<TextRange> {
        self.location
    }

    pub fn kind(&self) -> &ConstantKind {
        &self.kind
    }
}

impl PartialEq for ConstantAst {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_ids_are_unique() {
        let a = Ast::integer(1);
        let b = Ast::integer(1);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_structural_equality_ignores_identity_and_location() {
        let a = Ast::binary(BinaryOperator::Plus, Ast::integer(1), Ast::integer(2));
        let b = Ast::binary(BinaryOperator::Plus, Ast::integer(1), Ast::integer(2))
            .with_location(TextRange::new(0, 5));
        assert_eq!(a, b);

        let c = Ast::binary(BinaryOperator::Plus, Ast::integer(1), Ast::integer(3));
        assert_ne!(a, c);
    }

    #[test]
    fn test_children() {
        let expr = Ast::binary(
            BinaryOperator::Multiply,
            Ast::column("x"),
            Ast::unary(UnaryOperator::Minus, Ast::integer(3)),
        );
        let children = expr.children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0], &Ast::column("x"));

        assert!(Ast::integer(1).children().is_empty());
        assert!(Ast::column("x").children().is_empty());
    }

    #[test]
    fn test_is_constant() {
        assert!(Ast::integer(42).is_constant());
        assert!(!Ast::column("x").is_constant());
        assert!(!Ast::flow_var("v").is_constant());
        assert!(Ast::binary(BinaryOperator::Plus, Ast::integer(1), Ast::float(2.0)).is_constant());
        assert!(
            !Ast::binary(BinaryOperator::Plus, Ast::integer(1), Ast::column("x")).is_constant()
        );
    }

    #[test]
    fn test_column_id_display() {
        assert_eq!(ColumnId::Named("age".to_string()).to_string(), "$[\"age\"]");
        assert_eq!(ColumnId::RowIndex.to_string(), "$[ROW_INDEX]");
        assert_eq!(ColumnId::RowId.to_string(), "$[ROW_ID]");
    }
}
