//! WHERE compiler: predicate objects to parameterized boolean expressions.

use crate::error::{OrmError, OrmResult};
use crate::ident::quote_ident;
use crate::metadata::{ColumnKind, ColumnMetadata, ColumnType, ModelMetadata, Registry};
use crate::predicate::{Clause, Predicate, WhereQuery};
use serde_json::{Value, json};

/// Compile `query` against `model`, appending its parameters to `params`.
///
/// Placeholders continue from `params.len() + 1`. Returns an empty string for
/// an empty query.
pub fn compile_where(
    model: &ModelMetadata,
    registry: &Registry,
    query: &WhereQuery,
    params: &mut Vec<Value>,
) -> OrmResult<String> {
    Compiler {
        model,
        registry,
        params,
    }
    .query(query)
}

/// Compile `query` into `(expression, params)` starting at `$1`.
pub fn build_where(
    model: &ModelMetadata,
    registry: &Registry,
    query: &WhereQuery,
) -> OrmResult<(String, Vec<Value>)> {
    let mut params = Vec::new();
    let sql = compile_where(model, registry, query, &mut params)?;
    Ok((sql, params))
}

/// How one column is addressed in a predicate.
struct Target {
    name: String,
    ident: String,
    cast: &'static str,
    is_array: bool,
    /// Key used to reduce entity-like objects; `None` keeps objects as-is.
    reduce_key: Option<String>,
}

impl Target {
    fn new(model: &ModelMetadata, registry: &Registry, column: &ColumnMetadata) -> OrmResult<Self> {
        let name = column.name.clone();
        let ident = quote_ident(&name);
        match &column.kind {
            ColumnKind::Plain { ty, .. } => Ok(Self {
                name,
                ident,
                cast: ty.sql_type(),
                is_array: ty.is_array(),
                reduce_key: (*ty != ColumnType::Json).then(|| "id".to_string()),
            }),
            ColumnKind::BelongsTo { .. } => {
                let target = registry.relation_target(model, column)?;
                let pk = target.require_primary_key()?;
                Ok(Self {
                    name,
                    ident,
                    cast: pk.column_type().map_or("TEXT", ColumnType::sql_type),
                    is_array: false,
                    reduce_key: Some(pk.property_name.clone()),
                })
            }
            ColumnKind::Collection { .. } => Err(OrmError::configuration(format!(
                "`{}.{}` is a collection and has no column",
                model.name(),
                column.property_name
            ))),
        }
    }

    fn reduce(&self, value: &Value) -> Result<Value, String> {
        match (value, &self.reduce_key) {
            (Value::Object(map), Some(key)) => map
                .get(key)
                .cloned()
                .ok_or_else(|| format!("object value has no primary key `{key}`")),
            _ => Ok(value.clone()),
        }
    }

    fn null_check(&self, negated: bool) -> String {
        if negated {
            format!("{} IS NOT NULL", self.ident)
        } else {
            format!("{} IS NULL", self.ident)
        }
    }

    /// Combine a value expression with a NULL alternative.
    fn with_null(&self, expr: Option<String>, has_null: bool, negated: bool) -> String {
        match (expr, has_null) {
            (None, false) => (if negated { "1=1" } else { "1<>1" }).to_string(),
            (None, true) => self.null_check(negated),
            (Some(expr), false) => expr,
            (Some(expr), true) if negated => format!("({} IS NOT NULL AND {expr})", self.ident),
            (Some(expr), true) => format!("({} IS NULL OR {expr})", self.ident),
        }
    }
}

struct Compiler<'a> {
    model: &'a ModelMetadata,
    registry: &'a Registry,
    params: &'a mut Vec<Value>,
}

impl Compiler<'_> {
    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    fn query(&mut self, query: &WhereQuery) -> OrmResult<String> {
        let mut parts = Vec::with_capacity(query.clauses().len());
        for clause in query.clauses() {
            let part = match clause {
                Clause::Property { name, predicate } => self.property(name, predicate)?,
                Clause::Or(members) => self.group(members, " OR ")?,
                Clause::And(members) => self.group(members, " AND ")?,
            };
            if !part.is_empty() {
                parts.push(part);
            }
        }
        Ok(parts.join(" AND "))
    }

    fn group(&mut self, members: &[WhereQuery], separator: &str) -> OrmResult<String> {
        let mut parts = Vec::with_capacity(members.len());
        for member in members {
            let sql = self.query(member)?;
            if !sql.is_empty() {
                parts.push(format!("({sql})"));
            }
        }
        if parts.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("({})", parts.join(separator)))
    }

    fn property(&mut self, name: &str, predicate: &Predicate) -> OrmResult<String> {
        let model = self.model;
        let fail = |message: String| {
            OrmError::query_with_predicate(
                model.name(),
                message,
                json!({ name: predicate.to_json() }).to_string(),
            )
        };

        let column = model
            .column(name)
            .ok_or_else(|| fail(format!("unknown property `{name}`")))?;
        if column.is_collection() {
            return Err(fail(format!(
                "`{name}` is a collection and cannot be used in a where clause"
            )));
        }

        let target = Target::new(model, self.registry, column)?;
        self.constraint(&target, predicate, false).map_err(fail)
    }

    fn constraint(
        &mut self,
        target: &Target,
        predicate: &Predicate,
        negated: bool,
    ) -> Result<String, String> {
        match predicate {
            Predicate::Negated(inner) => self.constraint(target, inner, !negated),
            Predicate::IsNull => Ok(target.null_check(negated)),
            Predicate::Equals(value) => {
                let value = target.reduce(value)?;
                if value.is_null() {
                    return Ok(target.null_check(negated));
                }
                Ok(self.equals(target, value, negated))
            }
            Predicate::In(values) => self.membership(target, values, negated),
            Predicate::Like(patterns) => self.like(target, patterns, negated),
            Predicate::Compare(op, value) => {
                let value = target.reduce(value)?;
                if value.is_null() {
                    return Err(format!("cannot compare with null using `{}`", op.sql()));
                }
                let op = if negated { op.negate() } else { *op };
                let placeholder = self.bind(value);
                Ok(format!("{}{}{placeholder}", target.ident, op.sql()))
            }
            Predicate::AllOf(preds) => {
                let mut parts = Vec::with_capacity(preds.len());
                for pred in preds {
                    parts.push(self.constraint(target, pred, negated)?);
                }
                Ok(match parts.len() {
                    0 => String::new(),
                    1 => parts.remove(0),
                    // NOT (a AND b) == (NOT a OR NOT b)
                    _ if negated => format!("({})", parts.join(" OR ")),
                    _ => format!("({})", parts.join(" AND ")),
                })
            }
        }
    }

    fn equals(&mut self, target: &Target, value: Value, negated: bool) -> String {
        let placeholder = self.bind(value);
        match (target.is_array, negated) {
            (true, false) => format!("{placeholder}=ANY({})", target.ident),
            (true, true) => format!("{placeholder}<>ALL({})", target.ident),
            (false, false) => format!("{}={placeholder}", target.ident),
            (false, true) => format!("{}<>{placeholder}", target.ident),
        }
    }

    fn membership(
        &mut self,
        target: &Target,
        values: &[Value],
        negated: bool,
    ) -> Result<String, String> {
        let (mut list, has_null) = split_nulls(values, |v| target.reduce(v))?;

        let expr = match list.len() {
            0 => None,
            1 => Some(self.equals(target, list.remove(0), negated)),
            _ => {
                let placeholder = self.bind(Value::Array(list));
                let (ident, cast) = (&target.ident, target.cast);
                Some(match (target.is_array, negated) {
                    (true, false) => format!("{ident}&&{placeholder}::{cast}[]"),
                    (true, true) => format!("NOT {ident}&&{placeholder}::{cast}[]"),
                    (false, false) => format!("{ident}=ANY({placeholder}::{cast}[])"),
                    (false, true) => format!("{ident}<>ALL({placeholder}::{cast}[])"),
                })
            }
        };
        Ok(target.with_null(expr, has_null, negated))
    }

    fn like(
        &mut self,
        target: &Target,
        patterns: &[Value],
        negated: bool,
    ) -> Result<String, String> {
        let (mut list, has_null) = split_nulls(patterns, pattern_text)?;

        if target.is_array {
            let alias = quote_ident(&format!("unnest_{}", target.name));
            let matcher = match list.len() {
                0 => None,
                1 => Some(format!("ILIKE {}", self.bind(list.remove(0)))),
                _ => Some(format!("ILIKE ANY({}::TEXT[])", self.bind(Value::Array(list)))),
            };
            let expr = matcher.map(|matcher| {
                let exists = format!(
                    "EXISTS(SELECT 1 FROM unnest({}) AS {alias} WHERE {alias} {matcher})",
                    target.ident
                );
                if negated { format!("NOT {exists}") } else { exists }
            });
            return Ok(target.with_null(expr, has_null, negated));
        }

        let mut parts = Vec::with_capacity(list.len() + 1);
        for pattern in list {
            let placeholder = self.bind(pattern);
            parts.push(if negated {
                format!("{} NOT ILIKE {placeholder}", target.ident)
            } else {
                format!("{} ILIKE {placeholder}", target.ident)
            });
        }
        if has_null {
            parts.push(target.null_check(negated));
        }

        Ok(match parts.len() {
            0 => (if negated { "1=1" } else { "1<>1" }).to_string(),
            1 => parts.remove(0),
            _ if negated => parts.join(" AND "),
            _ => format!("({})", parts.join(" OR ")),
        })
    }
}

fn split_nulls(
    values: &[Value],
    map: impl Fn(&Value) -> Result<Value, String>,
) -> Result<(Vec<Value>, bool), String> {
    let mut list = Vec::with_capacity(values.len());
    let mut has_null = false;
    for value in values {
        let value = map(value)?;
        if value.is_null() {
            has_null = true;
        } else {
            list.push(value);
        }
    }
    Ok((list, has_null))
}

fn pattern_text(value: &Value) -> Result<Value, String> {
    match value {
        Value::Null | Value::String(_) => Ok(value.clone()),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        other => Err(format!("like pattern must be a string, got {other}")),
    }
}
