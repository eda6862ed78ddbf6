use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::error::Error;
use std::str::FromStr;
use tokio_postgres::types::{IsNull, Json, Kind, ToSql, Type, to_sql_checked};
use uuid::Uuid;

type BoxError = Box<dyn Error + Sync + Send>;

/// A JSON value bound as a statement parameter.
///
/// Accepts every type; the conversion is chosen from the declared parameter
/// type and fails at bind time if the value does not fit.
#[derive(Debug)]
pub(crate) struct JsonParam<'a>(pub &'a Value);

impl ToSql for JsonParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        let value = self.0;
        if value.is_null() {
            return Ok(IsNull::Yes);
        }

        match *ty {
            Type::BOOL => as_bool(value)?.to_sql(ty, out),
            Type::INT2 => i16::try_from(as_i64(value)?)?.to_sql(ty, out),
            Type::INT4 => i32::try_from(as_i64(value)?)?.to_sql(ty, out),
            Type::INT8 => as_i64(value)?.to_sql(ty, out),
            Type::FLOAT4 => (as_f64(value)? as f32).to_sql(ty, out),
            Type::FLOAT8 => as_f64(value)?.to_sql(ty, out),
            Type::NUMERIC => as_decimal(value)?.to_sql(ty, out),
            Type::JSON | Type::JSONB => Json(value).to_sql(ty, out),
            Type::UUID => Uuid::parse_str(as_str(value)?)?.to_sql(ty, out),
            Type::TIMESTAMPTZ => as_timestamptz(value)?.to_sql(ty, out),
            Type::TIMESTAMP => as_timestamp(value)?.to_sql(ty, out),
            Type::DATE => as_date(value)?.to_sql(ty, out),
            Type::BYTEA => as_bytes(value)?.to_sql(ty, out),
            _ => match ty.kind() {
                Kind::Array(_) => {
                    let Value::Array(items) = value else {
                        return Err(format!("expected an array for {ty}, got {value}").into());
                    };
                    let items: Vec<JsonParam<'_>> = items.iter().map(JsonParam).collect();
                    items.to_sql(ty, out)
                }
                // Text-like types and enums share the text wire format.
                _ => {
                    match value {
                        Value::String(s) => out.extend_from_slice(s.as_bytes()),
                        other => out.extend_from_slice(other.to_string().as_bytes()),
                    }
                    Ok(IsNull::No)
                }
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn as_bool(value: &Value) -> Result<bool, BoxError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.as_str() {
            "true" | "t" => Ok(true),
            "false" | "f" => Ok(false),
            _ => Err(format!("cannot bind {s:?} as boolean").into()),
        },
        other => Err(format!("cannot bind {other} as boolean").into()),
    }
}

fn as_i64(value: &Value) -> Result<i64, BoxError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| format!("cannot bind {n} as integer").into()),
        Value::String(s) => Ok(s.trim().parse()?),
        other => Err(format!("cannot bind {other} as integer").into()),
    }
}

fn as_f64(value: &Value) -> Result<f64, BoxError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("cannot bind {n} as float").into()),
        Value::String(s) => Ok(s.trim().parse()?),
        other => Err(format!("cannot bind {other} as float").into()),
    }
}

fn as_decimal(value: &Value) -> Result<Decimal, BoxError> {
    match value {
        Value::Number(n) => Ok(Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))?),
        Value::String(s) => Ok(Decimal::from_str(s.trim())?),
        other => Err(format!("cannot bind {other} as numeric").into()),
    }
}

fn as_str(value: &Value) -> Result<&str, BoxError> {
    value
        .as_str()
        .ok_or_else(|| format!("expected a string, got {value}").into())
}

fn as_timestamptz(value: &Value) -> Result<DateTime<Utc>, BoxError> {
    Ok(DateTime::parse_from_rfc3339(as_str(value)?)?.with_timezone(&Utc))
}

fn as_timestamp(value: &Value) -> Result<NaiveDateTime, BoxError> {
    let s = as_str(value)?;
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Ok(dt.naive_utc()),
        Err(_) => Ok(NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))?),
    }
}

fn as_date(value: &Value) -> Result<NaiveDate, BoxError> {
    let s = as_str(value)?;
    let day = s.get(..10).unwrap_or(s);
    Ok(NaiveDate::parse_from_str(day, "%Y-%m-%d")?)
}

fn as_bytes(value: &Value) -> Result<Vec<u8>, BoxError> {
    match value {
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| BoxError::from(format!("invalid byte {item}")))
            })
            .collect(),
        other => Err(format!("cannot bind {other} as bytea").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(value: Value, ty: &Type) -> Result<(IsNull, BytesMut), BoxError> {
        let mut out = BytesMut::new();
        let is_null = JsonParam(&value).to_sql(ty, &mut out)?;
        Ok((is_null, out))
    }

    #[test]
    fn null_binds_as_sql_null() {
        let (is_null, out) = encode(Value::Null, &Type::INT4).unwrap();
        assert!(matches!(is_null, IsNull::Yes));
        assert!(out.is_empty());
    }

    #[test]
    fn integers_use_the_declared_width() {
        let (_, out) = encode(json!(7), &Type::INT4).unwrap();
        assert_eq!(&out[..], &7i32.to_be_bytes());
        let (_, out) = encode(json!("7"), &Type::INT8).unwrap();
        assert_eq!(&out[..], &7i64.to_be_bytes());
        assert!(encode(json!(70000), &Type::INT2).is_err());
    }

    #[test]
    fn text_fallback_writes_raw_bytes() {
        let (_, out) = encode(json!("abc"), &Type::TEXT).unwrap();
        assert_eq!(&out[..], b"abc");
        let (_, out) = encode(json!(12), &Type::VARCHAR).unwrap();
        assert_eq!(&out[..], b"12");
    }

    #[test]
    fn mismatched_values_fail_at_bind_time() {
        assert!(encode(json!("yes"), &Type::BOOL).is_err());
        assert!(encode(json!("not-a-uuid"), &Type::UUID).is_err());
        assert!(encode(json!(1), &Type::INT4_ARRAY).is_err());
    }

    #[test]
    fn arrays_bind_element_wise() {
        assert!(encode(json!([1, 2, 3]), &Type::INT4_ARRAY).is_ok());
        assert!(encode(json!(["a", null]), &Type::TEXT_ARRAY).is_ok());
    }
}
