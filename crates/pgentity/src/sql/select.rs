use crate::error::{OrmError, OrmResult};
use crate::ident::{push_ident, quote_ident};
use crate::metadata::{ModelMetadata, Registry};
use crate::predicate::WhereQuery;
use crate::sort::{Sort, SortDirection};
use crate::sql::Statement;
use crate::sql::where_clause::compile_where;

/// Directive set of one SELECT.
#[derive(Debug, Clone, Default)]
pub struct SelectPlan {
    /// Property names to select; `None` selects every physical column.
    pub select: Option<Vec<String>>,
    pub where_: WhereQuery,
    pub sorts: Vec<Sort>,
    /// OFFSET; `0` emits no clause.
    pub skip: u64,
    /// LIMIT; `0` emits no clause.
    pub limit: u64,
}

/// Render the select list: `"col"` or `"col" AS "prop"`, comma separated.
///
/// An explicit `select` always gains the primary key if it was omitted.
/// Collection properties have no column and are skipped.
pub fn columns_to_select(model: &ModelMetadata, select: Option<&[String]>) -> OrmResult<String> {
    let columns: Vec<&crate::metadata::ColumnMetadata> = match select {
        Some(props) => {
            let mut columns: Vec<&crate::metadata::ColumnMetadata> = Vec::with_capacity(props.len() + 1);
            for prop in props {
                let column = model.column(prop).ok_or_else(|| {
                    OrmError::query(
                        model.name(),
                        format!("cannot select unknown property `{prop}`"),
                    )
                })?;
                if !column.is_collection() && !columns.iter().any(|c| std::ptr::eq(*c, column)) {
                    columns.push(column);
                }
            }
            if let Some(pk) = model.primary_key_column()
                && !columns.iter().any(|c| std::ptr::eq(*c, pk))
            {
                columns.push(pk);
            }
            columns
        }
        None => model.columns().iter().filter(|c| !c.is_collection()).collect(),
    };

    let mut out = String::new();
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_ident(&mut out, &column.name);
        if column.name != column.property_name {
            out.push_str(" AS ");
            push_ident(&mut out, &column.property_name);
        }
    }
    Ok(out)
}

/// Render `ORDER BY ...`, or an empty string when there are no sorts.
pub fn order_by(model: &ModelMetadata, sorts: &[Sort]) -> OrmResult<String> {
    if sorts.is_empty() {
        return Ok(String::new());
    }
    let mut terms = Vec::with_capacity(sorts.len());
    for sort in sorts {
        let column = model
            .column(&sort.property)
            .filter(|c| !c.is_collection())
            .ok_or_else(|| {
                OrmError::query(
                    model.name(),
                    format!("cannot sort by unknown property `{}`", sort.property),
                )
            })?;
        let ident = quote_ident(&column.name);
        terms.push(match sort.direction {
            SortDirection::Asc => ident,
            SortDirection::Desc => format!("{ident} DESC"),
        });
    }
    Ok(format!("ORDER BY {}", terms.join(",")))
}

/// Build `SELECT <cols> FROM "table" [WHERE] [ORDER BY] [LIMIT] [OFFSET]`.
pub fn build_select(
    model: &ModelMetadata,
    registry: &Registry,
    plan: &SelectPlan,
) -> OrmResult<Statement> {
    let mut sql = String::from("SELECT ");
    sql.push_str(&columns_to_select(model, plan.select.as_deref())?);
    sql.push_str(" FROM ");
    push_ident(&mut sql, model.table_name());

    let mut params = Vec::new();
    let where_sql = compile_where(model, registry, &plan.where_, &mut params)?;
    if !where_sql.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_sql);
    }

    let order = order_by(model, &plan.sorts)?;
    if !order.is_empty() {
        sql.push(' ');
        sql.push_str(&order);
    }
    if plan.limit > 0 {
        sql.push_str(&format!(" LIMIT {}", plan.limit));
    }
    if plan.skip > 0 {
        sql.push_str(&format!(" OFFSET {}", plan.skip));
    }

    Ok(Statement::new(sql, params))
}

/// Build `SELECT count(*) AS "count" FROM "table" [WHERE]`.
pub fn build_count(
    model: &ModelMetadata,
    registry: &Registry,
    where_: &WhereQuery,
) -> OrmResult<Statement> {
    let mut sql = String::from(r#"SELECT count(*) AS "count" FROM "#);
    push_ident(&mut sql, model.table_name());

    let mut params = Vec::new();
    let where_sql = compile_where(model, registry, where_, &mut params)?;
    if !where_sql.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_sql);
    }
    Ok(Statement::new(sql, params))
}
