//! Resolution of column references against a concrete table schema.
//!
//! Typing only needs column types; the evaluation host additionally needs
//! the physical index of every referenced column. This pass walks the tree
//! once and records that index per column-access node, leaving the tree
//! itself untouched.

use std::collections::HashMap;

use log::debug;

use crate::ast::{try_for_each_post, Ast, ColumnId, ExprKind, NodeId};
use crate::error::{CompileError, CompileResult};

/// Side-map from column-access nodes to physical column indices.
///
/// Special references (`ROW_INDEX`, `ROW_ID`) have no physical column and
/// carry no entry.
#[derive(Debug, Default, Clone)]
pub struct ColumnIndices {
    indices: HashMap<NodeId, usize>,
}

impl ColumnIndices {
    pub fn get(&self, id: NodeId) -> Option<usize> {
        self.indices.get(&id).copied()
    }

    pub fn of(&self, node: &Ast) -> Option<usize> {
        self.get(node.id())
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Physical layout of the table an expression runs against.
pub trait ColumnSchema {
    /// Index of a named column, or `None` when the table has no such
    /// column.
    fn column_index(&self, name: &str) -> Option<usize>;
}

/// A plain name list doubles as a schema; the position is the index.
impl ColumnSchema for &[&str] {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.iter().position(|candidate| *candidate == name)
    }
}

impl ColumnSchema for Vec<String> {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.iter().position(|candidate| candidate == name)
    }
}

/// Resolve every named column reference in the tree to its physical index.
pub fn resolve_column_indices(
    root: &Ast,
    schema: &dyn ColumnSchema,
) -> CompileResult<ColumnIndices> {
    let mut indices = HashMap::new();
    try_for_each_post(root, &mut |node| {
        if let ExprKind::ColumnAccess(access) = node.kind() {
            if let ColumnId::Named(name) = &access.column {
                let index = schema.column_index(name).ok_or_else(|| {
                    CompileError::missing_column(
                        format!("the column '{}' does not exist in the table", name),
                        node.location(),
                    )
                })?;
                indices.insert(node.id(), index);
            }
        }
        Ok(())
    })?;
    debug!("resolved {} column reference(s)", indices.len());
    Ok(ColumnIndices { indices })
}
