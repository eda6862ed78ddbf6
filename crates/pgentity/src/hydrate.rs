//! Result hydration: raw rows to [`Entity`] values.
//!
//! Rows arrive as JSON objects keyed by property name (the select list aliases
//! db names). Hydration never invents rows: a `null` row stays absent. String
//! values in integer/float columns are parsed only when doing so loses no
//! precision; anything else is kept verbatim.

use crate::error::{OrmError, OrmResult};
use crate::metadata::{ColumnType, ModelMetadata};
use crate::model::Model;
use crate::record::Record;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

/// Largest integer an IEEE-754 double represents exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A hydrated row of model `M`.
///
/// Holds only the selected properties. Methods are attached by implementing
/// traits for `Entity<M>`; they are shared by every instance.
pub struct Entity<M> {
    values: Record,
    _model: PhantomData<fn() -> M>,
}

impl<M> Entity<M> {
    pub(crate) fn from_record(values: Record) -> Self {
        Self {
            values,
            _model: PhantomData,
        }
    }

    pub fn values(&self) -> &Record {
        &self.values
    }

    pub fn into_record(self) -> Record {
        self.values
    }

    /// Deserialize the selected properties into a user type.
    pub fn into_typed<T: DeserializeOwned>(self) -> OrmResult<T> {
        serde_json::from_value(Value::Object(self.values))
            .map_err(|e| OrmError::decode("<entity>", e.to_string()))
    }

    /// A populated belongs-to relation.
    ///
    /// Returns `Ok(None)` when the property is `null` or was left undefined by
    /// population (no matching target row). A bare foreign key means the
    /// relation was not populated and is reported as an error.
    pub fn populated<R>(&self, property: &str) -> OrmResult<Option<Entity<R>>> {
        match self.values.get(property) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(Entity::from_record(map.clone()))),
            Some(other) => Err(OrmError::decode(
                property,
                format!("relation was not populated (found {other})"),
            )),
        }
    }

    /// A populated collection relation.
    pub fn populated_many<R>(&self, property: &str) -> OrmResult<Vec<Entity<R>>> {
        match self.values.get(property) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(Entity::from_record(map.clone())),
                    other => Err(OrmError::decode(
                        property,
                        format!("expected populated objects, found {other}"),
                    )),
                })
                .collect(),
            _ => Err(OrmError::decode(property, "collection was not populated")),
        }
    }
}

impl<M> Deref for Entity<M> {
    type Target = Record;

    fn deref(&self) -> &Record {
        &self.values
    }
}

impl<M> DerefMut for Entity<M> {
    fn deref_mut(&mut self) -> &mut Record {
        &mut self.values
    }
}

impl<M> Clone for Entity<M> {
    fn clone(&self) -> Self {
        Self::from_record(self.values.clone())
    }
}

impl<M> PartialEq for Entity<M> {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl<M: Model> fmt::Debug for Entity<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(M::NAME).field(&self.values).finish()
    }
}

impl<M> Serialize for Entity<M> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}

/// Hydrate one raw row. `null` (an absent row) yields `None`.
pub(crate) fn hydrate_row(model: &ModelMetadata, row: Value) -> OrmResult<Option<Record>> {
    let mut record = match row {
        Value::Null => return Ok(None),
        Value::Object(map) => map,
        other => {
            return Err(OrmError::decode(
                model.table_name(),
                format!("expected a row object, got {other}"),
            ));
        }
    };

    for column in model.columns() {
        let Some(ty) = column.column_type() else {
            continue;
        };
        let Some(value) = record.get_mut(&column.property_name) else {
            continue;
        };
        match (ty, value) {
            (ColumnType::Integer | ColumnType::Float, value) => coerce_in_place(value),
            (ColumnType::IntegerArray | ColumnType::FloatArray, Value::Array(items)) => {
                items.iter_mut().for_each(coerce_in_place);
            }
            _ => {}
        }
    }
    Ok(Some(record))
}

/// Hydrate a row set, dropping absent rows.
pub(crate) fn hydrate_rows(model: &ModelMetadata, rows: Vec<Value>) -> OrmResult<Vec<Record>> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        if let Some(record) = hydrate_row(model, row)? {
            records.push(record);
        }
    }
    Ok(records)
}

fn coerce_in_place(value: &mut Value) {
    if let Value::String(s) = value
        && let Some(number) = coerce_numeric(s)
    {
        *value = Value::Number(number);
    }
}

/// Parse a numeric string only if the resulting double round-trips to the
/// same decimal value and stays within safe-integer magnitude.
pub fn coerce_numeric(input: &str) -> Option<Number> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed: f64 = trimmed.parse().ok()?;
    if !parsed.is_finite() || parsed.abs() > MAX_SAFE_INTEGER {
        return None;
    }

    let original = Decimal::from_str(trimmed).ok()?;
    let reprinted = Decimal::from_str(&parsed.to_string()).ok()?;
    if original != reprinted {
        return None;
    }

    if parsed.fract() == 0.0 {
        Some(Number::from(parsed as i64))
    } else {
        Number::from_f64(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ColumnMetadata;
    use serde_json::json;

    struct Widget;

    impl Model for Widget {
        const NAME: &'static str = "Widget";
    }

    trait Describe {
        fn describe(&self) -> String;
    }

    impl Describe for Entity<Widget> {
        fn describe(&self) -> String {
            format!("widget {}", self["id"])
        }
    }

    fn model() -> ModelMetadata {
        ModelMetadata::new("Widget", "widgets")
            .with_column(ColumnMetadata::plain("id", ColumnType::Integer).primary())
            .with_column(ColumnMetadata::plain("price", ColumnType::Float))
            .with_column(ColumnMetadata::plain("code", ColumnType::String))
            .with_column(ColumnMetadata::plain("scores", ColumnType::FloatArray))
    }

    #[test]
    fn safe_numeric_strings_become_numbers() {
        assert_eq!(coerce_numeric("42.24"), Number::from_f64(42.24));
        assert_eq!(coerce_numeric("42"), Some(Number::from(42)));
        assert_eq!(coerce_numeric("-7.50"), Number::from_f64(-7.5));
    }

    #[test]
    fn unsafe_numeric_strings_stay_strings() {
        assert_eq!(coerce_numeric("922337203685477580700.42"), None);
        assert_eq!(coerce_numeric("9007199254740993"), None);
        assert_eq!(coerce_numeric("0.1000000000000000055511151231257827"), None);
        assert_eq!(coerce_numeric("abc"), None);
        assert_eq!(coerce_numeric(""), None);
        assert_eq!(coerce_numeric("NaN"), None);
    }

    #[test]
    fn hydrates_only_numeric_columns() {
        let row = json!({
            "id": "12",
            "price": "922337203685477580700.42",
            "code": "0042",
            "scores": ["1.5", "x"],
        });
        let record = hydrate_row(&model(), row).unwrap().unwrap();
        assert_eq!(record["id"], json!(12));
        assert_eq!(record["price"], json!("922337203685477580700.42"));
        assert_eq!(record["code"], json!("0042"));
        assert_eq!(record["scores"], json!([1.5, "x"]));
    }

    #[test]
    fn null_rows_are_absent() {
        assert!(hydrate_row(&model(), Value::Null).unwrap().is_none());
        let rows = hydrate_rows(&model(), vec![Value::Null, json!({ "id": 1 })]).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn non_object_rows_are_decode_errors() {
        let err = hydrate_row(&model(), json!(5)).unwrap_err();
        assert!(matches!(err, OrmError::Decode { .. }));
    }

    #[test]
    fn equal_rows_hydrate_to_equal_independent_entities() {
        let row = json!({ "id": 1, "price": "2.5" });
        let hydrate = |row: Value| hydrate_row(&model(), row).unwrap().unwrap();
        let a: Entity<Widget> = Entity::from_record(hydrate(row.clone()));
        let mut b: Entity<Widget> = Entity::from_record(hydrate(row));
        assert_eq!(a, b);
        assert_eq!(a.describe(), b.describe());

        b.insert("price".into(), json!(3));
        assert_ne!(a, b);
        assert_eq!(a["price"], json!(2.5));
    }

    #[test]
    fn typed_conversion_and_relations() {
        #[derive(serde::Deserialize)]
        struct Plain {
            id: i64,
        }

        let entity: Entity<Widget> = Entity::from_record(
            json!({ "id": 3, "owner": { "id": 9 }, "parts": [{ "id": 1 }], "fk": 4 })
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(entity.populated::<Widget>("owner").unwrap().unwrap()["id"], json!(9));
        assert!(entity.populated::<Widget>("missing").unwrap().is_none());
        assert!(entity.populated::<Widget>("fk").is_err());
        assert_eq!(entity.populated_many::<Widget>("parts").unwrap().len(), 1);
        assert!(entity.populated_many::<Widget>("owner").is_err());
        assert_eq!(entity.into_typed::<Plain>().unwrap().id, 3);
    }
}
