//! Predicate objects accepted by `where`.
//!
//! A [`WhereQuery`] is an ordered list of clauses combined with AND. Each
//! property clause carries a [`Predicate`] drawn from a closed set of variants,
//! so compiling a predicate is a total match with no fallthrough.
//!
//! Predicates can be built fluently:
//!
//! ```ignore
//! use pgentity::WhereQuery;
//!
//! let w = WhereQuery::new()
//!     .eq("store", 42)
//!     .is_in("id", [1, 2, 3])
//!     .not_like("name", "%test%")
//!     .or([WhereQuery::new().eq("a", 1), WhereQuery::new().eq("b", 2)]);
//! ```
//!
//! or parsed from the loose object form:
//!
//! ```ignore
//! let w = WhereQuery::from_json(json!({
//!     "id": [1, 2, 3],
//!     "name": { "!": { "like": ["%a%", "%b%"] } },
//!     "or": [{ "a": 1 }, { "b": 2 }],
//! }))?;
//! ```

use crate::error::{OrmError, OrmResult};
use serde_json::{Map, Value, json};

/// Ordering comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn sql(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }

    /// The operator matching exactly the rows this one rejects (ignoring NULL).
    pub fn negate(self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::Gte,
            CompareOp::Lte => CompareOp::Gt,
            CompareOp::Gt => CompareOp::Lte,
            CompareOp::Gte => CompareOp::Lt,
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Lte),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Gte),
            _ => None,
        }
    }
}

/// Constraint on a single property.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `col IS NULL`
    IsNull,
    /// `col = value`. Objects are treated as entities and reduced to their primary key.
    Equals(Value),
    /// Membership in a list; `null` members match NULL.
    In(Vec<Value>),
    /// Case-insensitive pattern match against any of the patterns.
    Like(Vec<Value>),
    /// `col < value` and friends.
    Compare(CompareOp, Value),
    /// Logical negation of the inner predicate.
    Negated(Box<Predicate>),
    /// Several predicates on the same property, all of which must hold.
    AllOf(Vec<Predicate>),
}

impl Predicate {
    pub fn not(self) -> Self {
        Predicate::Negated(Box::new(self))
    }

    /// Loose object form of this predicate, used for diagnostics.
    pub fn to_json(&self) -> Value {
        match self {
            Predicate::IsNull => Value::Null,
            Predicate::Equals(v) => v.clone(),
            Predicate::In(values) => Value::Array(values.clone()),
            Predicate::Like(patterns) => match patterns.as_slice() {
                [single] => json!({ "like": single }),
                _ => json!({ "like": patterns }),
            },
            Predicate::Compare(op, v) => {
                let mut map = Map::new();
                map.insert(op.sql().to_string(), v.clone());
                Value::Object(map)
            }
            Predicate::Negated(inner) => json!({ "!": inner.to_json() }),
            Predicate::AllOf(preds) => {
                let mut map = Map::new();
                for pred in preds {
                    if let Value::Object(inner) = pred.to_json() {
                        map.extend(inner);
                    }
                }
                Value::Object(map)
            }
        }
    }
}

impl From<Value> for Predicate {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Predicate::IsNull,
            Value::Array(values) => Predicate::In(values),
            other => Predicate::Equals(other),
        }
    }
}

/// One AND-ed member of a [`WhereQuery`].
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Property { name: String, predicate: Predicate },
    /// Sibling predicates combined with OR.
    Or(Vec<WhereQuery>),
    /// Sibling predicates combined with AND, each parenthesised.
    And(Vec<WhereQuery>),
}

/// A predicate object: clauses combined with implicit AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereQuery {
    clauses: Vec<Clause>,
}

const OPERATOR_KEYS: &[&str] = &[
    "!", "like", "startsWith", "endsWith", "contains", "<", "<=", ">", ">=",
];

impl WhereQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Append a clause.
    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    /// Constrain `name` with an explicit predicate.
    pub fn predicate(mut self, name: &str, predicate: Predicate) -> Self {
        self.clauses.push(Clause::Property {
            name: name.to_string(),
            predicate,
        });
        self
    }

    /// AND another query's clauses onto this one.
    pub fn and_where(mut self, other: WhereQuery) -> Self {
        self.clauses.extend(other.clauses);
        self
    }

    /// `name = value` (`IS NULL` for `null`, membership for arrays).
    pub fn eq(self, name: &str, value: impl Into<Value>) -> Self {
        self.predicate(name, Predicate::from(value.into()))
    }

    /// `name <> value`
    pub fn ne(self, name: &str, value: impl Into<Value>) -> Self {
        self.predicate(name, Predicate::from(value.into()).not())
    }

    pub fn is_null(self, name: &str) -> Self {
        self.predicate(name, Predicate::IsNull)
    }

    pub fn is_not_null(self, name: &str) -> Self {
        self.predicate(name, Predicate::IsNull.not())
    }

    /// Membership: `name = ANY(values)`.
    pub fn is_in<V: Into<Value>>(self, name: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.predicate(name, Predicate::In(values))
    }

    /// Exclusion: `name <> ALL(values)`.
    pub fn not_in<V: Into<Value>>(self, name: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.predicate(name, Predicate::In(values).not())
    }

    /// Case-insensitive match against a pattern (`%` and `_` wildcards).
    pub fn like(self, name: &str, pattern: impl Into<Value>) -> Self {
        self.predicate(name, Predicate::Like(vec![pattern.into()]))
    }

    /// Case-insensitive match against any of the patterns.
    pub fn like_any<V: Into<Value>>(
        self,
        name: &str,
        patterns: impl IntoIterator<Item = V>,
    ) -> Self {
        let patterns = patterns.into_iter().map(Into::into).collect();
        self.predicate(name, Predicate::Like(patterns))
    }

    pub fn not_like(self, name: &str, pattern: impl Into<Value>) -> Self {
        self.predicate(name, Predicate::Like(vec![pattern.into()]).not())
    }

    pub fn starts_with(self, name: &str, prefix: &str) -> Self {
        self.like(name, format!("{prefix}%"))
    }

    pub fn ends_with(self, name: &str, suffix: &str) -> Self {
        self.like(name, format!("%{suffix}"))
    }

    pub fn contains(self, name: &str, needle: &str) -> Self {
        self.like(name, format!("%{needle}%"))
    }

    pub fn lt(self, name: &str, value: impl Into<Value>) -> Self {
        self.predicate(name, Predicate::Compare(CompareOp::Lt, value.into()))
    }

    pub fn lte(self, name: &str, value: impl Into<Value>) -> Self {
        self.predicate(name, Predicate::Compare(CompareOp::Lte, value.into()))
    }

    pub fn gt(self, name: &str, value: impl Into<Value>) -> Self {
        self.predicate(name, Predicate::Compare(CompareOp::Gt, value.into()))
    }

    pub fn gte(self, name: &str, value: impl Into<Value>) -> Self {
        self.predicate(name, Predicate::Compare(CompareOp::Gte, value.into()))
    }

    /// OR group of sibling predicates.
    pub fn or(mut self, members: impl IntoIterator<Item = WhereQuery>) -> Self {
        self.clauses.push(Clause::Or(members.into_iter().collect()));
        self
    }

    /// Parenthesised AND group of sibling predicates.
    pub fn and(mut self, members: impl IntoIterator<Item = WhereQuery>) -> Self {
        self.clauses.push(Clause::And(members.into_iter().collect()));
        self
    }

    /// Parse the loose object form.
    ///
    /// Keys are property names, or `or`/`and` holding an array of objects.
    /// Property values may be a literal, `null`, an array (membership), an
    /// operator object (`!`, `like`, `startsWith`, `endsWith`, `contains`,
    /// `<`, `<=`, `>`, `>=`), or any other object (treated as an entity and
    /// reduced to its primary key at compile time).
    pub fn from_json(value: Value) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::Object(map) => Self::from_map(map),
            other => Err(invalid(format!("expected an object, got {other}"))),
        }
    }

    fn from_map(map: Map<String, Value>) -> OrmResult<Self> {
        let mut query = Self::new();
        for (key, value) in map {
            match key.as_str() {
                "or" | "and" => {
                    let Value::Array(items) = value else {
                        return Err(invalid(format!("`{key}` expects an array of objects")));
                    };
                    let members = items
                        .into_iter()
                        .map(Self::from_json)
                        .collect::<OrmResult<Vec<_>>>()?;
                    query.clauses.push(if key == "or" {
                        Clause::Or(members)
                    } else {
                        Clause::And(members)
                    });
                }
                _ => {
                    let predicate = parse_predicate(value)?;
                    query.clauses.push(Clause::Property {
                        name: key,
                        predicate,
                    });
                }
            }
        }
        Ok(query)
    }

    /// Loose object form of this query, used for diagnostics.
    ///
    /// Repeated keys are merged into one operator object when their operators
    /// are disjoint, and otherwise appended to an `and` array.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for clause in &self.clauses {
            let (key, value) = match clause {
                Clause::Property { name, predicate } => (name.clone(), predicate.to_json()),
                Clause::Or(members) => (
                    "or".to_string(),
                    Value::Array(members.iter().map(WhereQuery::to_json).collect()),
                ),
                Clause::And(members) => (
                    "and".to_string(),
                    Value::Array(members.iter().map(WhereQuery::to_json).collect()),
                ),
            };
            push_json_clause(&mut map, key, value);
        }
        Value::Object(map)
    }
}

fn push_json_clause(map: &mut Map<String, Value>, key: String, value: Value) {
    let Some(existing) = map.get_mut(&key) else {
        map.insert(key, value);
        return;
    };
    if let (Value::Object(held), Value::Object(more)) = (&mut *existing, &value)
        && is_operator_object(held)
        && is_operator_object(more)
        && !more.keys().any(|k| held.contains_key(k))
    {
        held.extend(more.clone());
        return;
    }

    let extra = match value {
        Value::Array(items) if key == "and" => items,
        value => vec![Value::Object(Map::from_iter([(key, value)]))],
    };
    match map.get_mut("and") {
        Some(Value::Array(items)) => items.extend(extra),
        _ => {
            map.insert("and".to_string(), Value::Array(extra));
        }
    }
}

impl TryFrom<Value> for WhereQuery {
    type Error = OrmError;

    fn try_from(value: Value) -> OrmResult<Self> {
        WhereQuery::from_json(value)
    }
}

fn invalid(message: String) -> OrmError {
    OrmError::query(crate::query::UNBOUND, format!("invalid where clause: {message}"))
}

fn is_operator_object(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| OPERATOR_KEYS.contains(&k.as_str()))
}

fn parse_predicate(value: Value) -> OrmResult<Predicate> {
    let map = match value {
        Value::Object(map) if is_operator_object(&map) => map,
        other => return Ok(Predicate::from(other)),
    };

    let mut preds = Vec::with_capacity(map.len());
    for (key, operand) in map {
        let pred = match key.as_str() {
            "!" => parse_predicate(operand)?.not(),
            "like" => Predicate::Like(patterns(operand, |p| p.to_string())?),
            "startsWith" => Predicate::Like(patterns(operand, |p| format!("{p}%"))?),
            "endsWith" => Predicate::Like(patterns(operand, |p| format!("%{p}"))?),
            "contains" => Predicate::Like(patterns(operand, |p| format!("%{p}%"))?),
            op => match CompareOp::from_key(op) {
                Some(op) => Predicate::Compare(op, operand),
                None => return Err(invalid(format!("unsupported operator `{op}`"))),
            },
        };
        preds.push(pred);
    }

    Ok(match preds.len() {
        1 => preds.remove(0),
        _ => Predicate::AllOf(preds),
    })
}

fn patterns(operand: Value, shape: impl Fn(&str) -> String) -> OrmResult<Vec<Value>> {
    let items = match operand {
        Value::Array(items) => items,
        single => vec![single],
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Null => Ok(Value::Null),
            Value::String(s) => Ok(Value::String(shape(&s))),
            Value::Number(n) => Ok(Value::String(shape(&n.to_string()))),
            Value::Bool(b) => Ok(Value::String(shape(&b.to_string()))),
            other => Err(invalid(format!("pattern must be a string, got {other}"))),
        })
        .collect()
}
