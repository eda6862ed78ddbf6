//! SQL and population logging via `tracing`.
//!
//! Statements are logged at `DEBUG` on target `pgentity.sql`; population
//! stages and lifecycle hooks at `TRACE` on `pgentity.populate` and
//! `pgentity.hook`. With the `tracing` feature off every call is a no-op.

use crate::sql::Statement;

/// Logs each statement right before it is handed to a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SqlLog {
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    max_sql_length: Option<usize>,
}

impl Default for SqlLog {
    fn default() -> Self {
        Self {
            max_sql_length: Some(200),
        }
    }
}

impl SqlLog {
    pub(crate) fn new(max_sql_length: Option<usize>) -> Self {
        Self { max_sql_length }
    }

    fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }

    pub(crate) fn statement(&self, model: &str, op: &str, stmt: &Statement) {
        #[cfg(feature = "tracing")]
        {
            let sql = self.truncate_sql(&stmt.sql);
            tracing::debug!(
                target: "pgentity.sql",
                model,
                op,
                param_count = stmt.params.len(),
                sql = %sql,
            );
        }
        #[cfg(not(feature = "tracing"))]
        let _ = (model, op, stmt);
    }
}

/// Cut `sql` to at most `max_bytes`, backing off to a char boundary.
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// `trace!` on `pgentity.populate`.
macro_rules! populate_trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        tracing::trace!(target: "pgentity.populate", $($arg)*);
    }};
}

/// `trace!` on `pgentity.hook`.
macro_rules! hook_trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        tracing::trace!(target: "pgentity.hook", $($arg)*);
    }};
}

pub(crate) use {hook_trace, populate_trace};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_sql_bytes("SELECT 1", 100), "SELECT 1");
        assert_eq!(truncate_sql_bytes("SELECT 1", 6), "SELECT");
        // 'é' is two bytes; cutting in the middle backs off.
        assert_eq!(truncate_sql_bytes("é", 1), "");
    }

    #[test]
    fn truncated_sql_is_marked() {
        let log = SqlLog::new(Some(6));
        assert_eq!(log.truncate_sql("SELECT 1"), "SELECT...");
        assert_eq!(SqlLog::new(None).truncate_sql("SELECT 1"), "SELECT 1");
    }
}
