//! Expression AST: node definitions, operators, call arguments, and
//! traversal utilities.

pub mod args;
pub mod expr;
pub mod op;
pub mod visit;

pub use args::Arguments;
pub use expr::{Ast, ColumnAccess, ColumnId, ConstantAst, ConstantKind, ExprKind, NodeId};
pub use op::{BinaryOperator, UnaryOperator};
pub use visit::{dispatch, for_each_post, for_each_pre, try_for_each_post, AstVisitor};
