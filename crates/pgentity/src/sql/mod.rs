//! SQL generation.
//!
//! Every builder here is a pure function of the model metadata and the
//! directive set: it returns a [`Statement`] with `$n` placeholders numbered in
//! emission order and never touches a pool.

mod mutation;
mod select;
mod where_clause;

#[cfg(test)]
mod tests;

pub use mutation::{ReturnColumns, build_delete, build_insert, build_update};
pub use select::{SelectPlan, build_count, build_select, columns_to_select, order_by};
pub use where_clause::{build_where, compile_where};

use serde_json::Value;

/// A SQL string with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: String, params: Vec<Value>) -> Self {
        Self { sql, params }
    }
}
