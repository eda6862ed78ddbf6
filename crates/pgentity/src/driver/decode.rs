use crate::error::{OrmError, OrmResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use std::error::Error;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Kind, Type};
use uuid::Uuid;

/// Decode a row into a JSON object keyed by result column name.
pub(crate) fn decode_row(row: &Row) -> OrmResult<Value> {
    let mut map = Map::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, idx, column.type_())
            .map_err(|e| OrmError::decode(column.name(), e.to_string()))?;
        map.insert(column.name().to_string(), value);
    }
    Ok(Value::Object(map))
}

fn decode_column(row: &Row, idx: usize, ty: &Type) -> Result<Value, tokio_postgres::Error> {
    Ok(match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool).into(),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(Value::from).into(),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(Value::from).into(),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::from).into(),
        Type::FLOAT4 => float(row.try_get::<_, Option<f32>>(idx)?.map(f64::from)),
        Type::FLOAT8 => float(row.try_get::<_, Option<f64>>(idx)?),
        // Kept as text so hydration decides whether a number is safe.
        Type::NUMERIC => row
            .try_get::<_, Option<Decimal>>(idx)?
            .map(|d| Value::String(d.to_string()))
            .into(),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(idx)?.unwrap_or(Value::Null),
        Type::UUID => row
            .try_get::<_, Option<Uuid>>(idx)?
            .map(|u| Value::String(u.to_string()))
            .into(),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
            .into(),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|dt| Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .into(),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|d| Value::String(d.to_string()))
            .into(),
        Type::BYTEA => row
            .try_get::<_, Option<Vec<u8>>>(idx)?
            .map(|b| Value::Array(b.into_iter().map(Value::from).collect()))
            .into(),
        _ => match ty.kind() {
            Kind::Array(member) => decode_array(row, idx, member)?,
            _ => row
                .try_get::<_, Option<RawText>>(idx)?
                .map(|t| Value::String(t.0))
                .into(),
        },
    })
}

fn decode_array(row: &Row, idx: usize, member: &Type) -> Result<Value, tokio_postgres::Error> {
    fn list<T>(items: Option<Vec<Option<T>>>, f: impl Fn(T) -> Value) -> Value {
        match items {
            Some(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| item.map(&f).unwrap_or(Value::Null))
                    .collect(),
            ),
            None => Value::Null,
        }
    }

    Ok(match *member {
        Type::BOOL => list(row.try_get(idx)?, Value::Bool),
        Type::INT2 => list::<i16>(row.try_get(idx)?, Value::from),
        Type::INT4 => list::<i32>(row.try_get(idx)?, Value::from),
        Type::INT8 => list::<i64>(row.try_get(idx)?, Value::from),
        Type::FLOAT4 => list::<f32>(row.try_get(idx)?, |f| float(Some(f64::from(f)))),
        Type::FLOAT8 => list::<f64>(row.try_get(idx)?, |f| float(Some(f))),
        Type::NUMERIC => list::<Decimal>(row.try_get(idx)?, |d| Value::String(d.to_string())),
        Type::UUID => list::<Uuid>(row.try_get(idx)?, |u| Value::String(u.to_string())),
        Type::JSON | Type::JSONB => list::<Value>(row.try_get(idx)?, |v| v),
        _ => list::<RawText>(row.try_get(idx)?, |t| Value::String(t.0)),
    })
}

fn float(value: Option<f64>) -> Value {
    value
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Text-format fallback for types without a dedicated mapping (text, varchar,
/// enums, ...). Their binary representation is the UTF-8 text itself.
struct RawText(String);

impl<'a> FromSql<'a> for RawText {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(RawText(std::str::from_utf8(raw)?.to_string()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}
