//! Conversions between [`Value`] and the PostgreSQL driver.

use crate::error::DbError;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use core_types::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::error::BoxDynError;
use sqlx::postgres::types::{Oid, PgInterval, PgTimeTz};
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgRow, PgTypeInfo, Postgres};
use sqlx::query::Query;
use sqlx::{Column, Row, TypeInfo};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// A NULL parameter whose type the server infers from context, so a missing
/// value can be bound against a column of any type.
#[derive(Debug, Clone, Copy)]
struct UntypedNull;

impl sqlx::Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

/// Binds `value` as the next positional parameter of `query`.
pub(crate) fn bind_value<'q>(
    query: PgQuery<'q>,
    column: &str,
    value: &Value,
) -> Result<PgQuery<'q>, DbError> {
    let query = match value {
        Value::Null => query.bind(UntypedNull),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.clone()),
        Value::Date(d) => query.bind(*d),
        Value::Time(t) => query.bind(*t),
        Value::Timestamp(ts) => query.bind(*ts),
        Value::Duration(d) => query.bind(*d),
        Value::Array(items) => bind_array(query, column, items)?,
    };
    Ok(query)
}

fn bind_array<'q>(query: PgQuery<'q>, column: &str, items: &[Value]) -> Result<PgQuery<'q>, DbError> {
    let unsupported = |reason: &str| DbError::UnsupportedBind {
        column: column.to_string(),
        reason: reason.to_string(),
    };

    let Some(first) = items.first() else {
        // An empty int8[] is assignment-castable to the usual array columns.
        return Ok(query.bind(Vec::<i64>::new()));
    };
    if items.iter().any(|v| v.value_type() != first.value_type()) {
        return Err(unsupported("array elements must all have the same type"));
    }

    macro_rules! collect {
        ($variant:ident, $ty:ty) => {
            items
                .iter()
                .filter_map(|v| match v {
                    Value::$variant(x) => Some(x.clone()),
                    _ => None,
                })
                .collect::<Vec<$ty>>()
        };
    }

    let query = match first {
        Value::Bool(_) => query.bind(collect!(Bool, bool)),
        Value::Int(_) => query.bind(collect!(Int, i64)),
        Value::Float(_) => query.bind(collect!(Float, f64)),
        Value::Text(_) => query.bind(collect!(Text, String)),
        Value::Date(_) => query.bind(collect!(Date, NaiveDate)),
        Value::Timestamp(_) => query.bind(collect!(Timestamp, NaiveDateTime)),
        other => {
            return Err(unsupported(&format!(
                "arrays of {} are not supported",
                other.value_type()
            )));
        }
    };
    Ok(query)
}

/// Decodes every column of `row` into [`Value`]s, in column order.
pub(crate) fn decode_row(row: &PgRow) -> Result<Vec<Value>, DbError> {
    (0..row.columns().len())
        .map(|index| decode_column(row, index))
        .collect()
}

fn decode_column(row: &PgRow, index: usize) -> Result<Value, DbError> {
    let column = &row.columns()[index];
    let type_name = column.type_info().name().to_string();
    let fail = |reason: String| DbError::Decode {
        column: column.name().to_string(),
        type_name: type_name.clone(),
        reason,
    };

    macro_rules! get {
        ($ty:ty) => {
            row.try_get::<Option<$ty>, _>(index)
                .map_err(|e| fail(e.to_string()))?
        };
    }
    macro_rules! array {
        ($ty:ty, $variant:ident) => {
            get!(Vec<$ty>).map(|items| {
                Value::Array(items.into_iter().map(|x| Value::$variant(x.into())).collect())
            })
        };
    }

    let value = match type_name.as_str() {
        "BOOL" => get!(bool).map(Value::Bool),
        "INT2" => get!(i16).map(|i| Value::Int(i64::from(i))),
        "INT4" => get!(i32).map(|i| Value::Int(i64::from(i))),
        "INT8" => get!(i64).map(Value::Int),
        "FLOAT4" => get!(f32).map(|f| Value::Float(f64::from(f))),
        "FLOAT8" => get!(f64).map(Value::Float),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => get!(String).map(Value::Text),
        "DATE" => get!(NaiveDate).map(Value::Date),
        "TIME" => get!(NaiveTime).map(Value::Time),
        "TIMETZ" => get!(PgTimeTz<NaiveTime, FixedOffset>).map(|t| Value::Time(t.time)),
        "TIMESTAMP" => get!(NaiveDateTime).map(Value::Timestamp),
        "TIMESTAMPTZ" => get!(DateTime<Utc>).map(|ts| Value::Timestamp(ts.naive_utc())),
        "INTERVAL" => get!(PgInterval).map(|i| Value::Duration(interval_to_delta(&i))),
        "BOOL[]" => array!(bool, Bool),
        "INT2[]" => array!(i16, Int),
        "INT4[]" => array!(i32, Int),
        "INT8[]" => array!(i64, Int),
        "FLOAT4[]" => array!(f32, Float),
        "FLOAT8[]" => array!(f64, Float),
        "TEXT[]" | "VARCHAR[]" => array!(String, Text),
        "DATE[]" => array!(NaiveDate, Date),
        "TIMESTAMP[]" => array!(NaiveDateTime, Timestamp),
        _ => return Err(fail("unsupported column type".to_string())),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Months are counted as 30 days; PostgreSQL uses the same convention when
/// justifying intervals.
fn interval_to_delta(interval: &PgInterval) -> TimeDelta {
    let days = i64::from(interval.months) * 30 + i64::from(interval.days);
    TimeDelta::days(days) + TimeDelta::microseconds(interval.microseconds)
}
