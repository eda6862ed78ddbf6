use crate::error::{OrmError, OrmResult};
use crate::ident::{push_ident, quote_ident, quote_ident_list};
use crate::metadata::{ColumnKind, ColumnMetadata, ModelMetadata, Registry};
use crate::predicate::WhereQuery;
use crate::record::Record;
use crate::sql::Statement;
use crate::sql::select::columns_to_select;
use crate::sql::where_clause::compile_where;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;

/// Which columns a mutation hands back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReturnColumns {
    /// No RETURNING clause.
    #[default]
    Nothing,
    /// Every physical column.
    All,
    /// The listed properties plus the primary key.
    Select(Vec<String>),
}

impl ReturnColumns {
    fn push_clause(&self, model: &ModelMetadata, sql: &mut String) -> OrmResult<()> {
        let columns = match self {
            ReturnColumns::Nothing => return Ok(()),
            ReturnColumns::All => columns_to_select(model, None)?,
            ReturnColumns::Select(props) => columns_to_select(model, Some(props.as_slice()))?,
        };
        sql.push_str(" RETURNING ");
        sql.push_str(&columns);
        Ok(())
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, ReturnColumns::Nothing)
    }
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Reduce an entity-like object written to a belongs-to column to the
/// target's primary key.
fn write_value(
    model: &ModelMetadata,
    registry: &Registry,
    column: &ColumnMetadata,
    value: &Value,
) -> OrmResult<Value> {
    match (&column.kind, value) {
        (ColumnKind::BelongsTo { .. }, Value::Object(map)) => {
            let target = registry.relation_target(model, column)?;
            let pk = target.require_primary_key()?;
            map.get(&pk.property_name).cloned().ok_or_else(|| {
                OrmError::query(
                    model.name(),
                    format!(
                        "value for `{}` has no primary key `{}`",
                        column.property_name, pk.property_name
                    ),
                )
            })
        }
        _ => Ok(value.clone()),
    }
}

/// Fill create-time defaults for properties the record leaves undefined.
fn apply_insert_defaults(model: &ModelMetadata, record: &mut Record, timestamp: &Value) {
    for column in model.columns() {
        if column.is_collection() || !column.insert || record.contains_key(&column.property_name) {
            continue;
        }
        let value = if column.create_date || column.update_date {
            Some(timestamp.clone())
        } else if column.version {
            Some(Value::from(1))
        } else {
            column.defaults_to.as_ref().map(|d| d.resolve())
        };
        if let Some(value) = value {
            record.insert(column.property_name.clone(), value);
        }
    }
}

/// Build a single multi-row `INSERT`.
///
/// Parameters are numbered column-major: every record's value for the first
/// column, then every record's value for the second, and so on. A column
/// defined on some records but not others is written as `DEFAULT` where absent.
pub fn build_insert(
    model: &ModelMetadata,
    registry: &Registry,
    records: &[Record],
    returning: &ReturnColumns,
) -> OrmResult<Statement> {
    if records.is_empty() {
        return Err(OrmError::query(model.name(), "cannot insert zero records"));
    }

    let timestamp = now();
    let records: Vec<Record> = records
        .iter()
        .map(|record| {
            let mut record = record.clone();
            apply_insert_defaults(model, &mut record, &timestamp);
            record
        })
        .collect();

    let columns: Vec<&ColumnMetadata> = model
        .columns()
        .iter()
        .filter(|c| !c.is_collection() && c.insert)
        .filter(|c| records.iter().any(|r| r.contains_key(&c.property_name)))
        .collect();

    let mut sql = String::from("INSERT INTO ");
    push_ident(&mut sql, model.table_name());

    let mut params = Vec::new();
    if columns.is_empty() {
        // Nothing to write: let every column take its database default.
        let pk = model.require_primary_key()?;
        sql.push_str(&format!(" ({}) VALUES ", quote_ident(&pk.name)));
        sql.push_str(&vec!["(DEFAULT)"; records.len()].join(","));
    } else {
        let mut rows: Vec<Vec<String>> = vec![Vec::with_capacity(columns.len()); records.len()];
        for column in &columns {
            for (row, record) in rows.iter_mut().zip(&records) {
                match record.get(&column.property_name) {
                    Some(value) => {
                        params.push(write_value(model, registry, column, value)?);
                        row.push(format!("${}", params.len()));
                    }
                    None => row.push("DEFAULT".to_string()),
                }
            }
        }

        sql.push_str(" (");
        sql.push_str(&quote_ident_list(columns.iter().map(|c| c.name.as_str())));
        sql.push_str(") VALUES ");
        let groups: Vec<String> = rows
            .iter()
            .map(|row| format!("({})", row.join(",")))
            .collect();
        sql.push_str(&groups.join(","));
    }

    returning.push_clause(model, &mut sql)?;
    Ok(Statement::new(sql, params))
}

/// Build `UPDATE "table" SET ... [WHERE ...] [RETURNING ...]`.
///
/// Assignments follow column declaration order. `updateDate` columns are
/// refreshed and `version` columns incremented unless the payload sets them.
pub fn build_update(
    model: &ModelMetadata,
    registry: &Registry,
    where_: &WhereQuery,
    values: &Record,
    returning: &ReturnColumns,
) -> OrmResult<Statement> {
    let mut params = Vec::new();
    let mut assignments = Vec::new();
    let mut explicit = 0usize;

    for column in model.columns() {
        if column.is_collection() || !column.update {
            continue;
        }
        let ident = quote_ident(&column.name);
        match values.get(&column.property_name) {
            Some(value) => {
                params.push(write_value(model, registry, column, value)?);
                assignments.push(format!("{ident}=${}", params.len()));
                explicit += 1;
            }
            None if column.update_date => {
                params.push(now());
                assignments.push(format!("{ident}=${}", params.len()));
            }
            None if column.version => assignments.push(format!("{ident}={ident}+1")),
            None => {}
        }
    }

    if explicit == 0 {
        return Err(OrmError::query_with_predicate(
            model.name(),
            "update requires at least one writable property",
            Value::Object(values.clone()).to_string(),
        ));
    }

    let mut sql = String::from("UPDATE ");
    push_ident(&mut sql, model.table_name());
    sql.push_str(" SET ");
    sql.push_str(&assignments.join(","));

    let where_sql = compile_where(model, registry, where_, &mut params)?;
    if !where_sql.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_sql);
    }

    returning.push_clause(model, &mut sql)?;
    Ok(Statement::new(sql, params))
}

/// Build `DELETE FROM "table" [WHERE ...] [RETURNING ...]`.
pub fn build_delete(
    model: &ModelMetadata,
    registry: &Registry,
    where_: &WhereQuery,
    returning: &ReturnColumns,
) -> OrmResult<Statement> {
    let mut sql = String::from("DELETE FROM ");
    push_ident(&mut sql, model.table_name());

    let mut params = Vec::new();
    let where_sql = compile_where(model, registry, where_, &mut params)?;
    if !where_sql.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_sql);
    }

    returning.push_clause(model, &mut sql)?;
    Ok(Statement::new(sql, params))
}
