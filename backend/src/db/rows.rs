//! Rendering PostgreSQL result rows as JSON objects.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use postgres::types::Type;
use postgres::Row;
use serde_json::{Map, Number, Value};
use uuid::Uuid;

use crate::error::{GatewayError, GatewayResult};

/// One result row, column name to value, in column order.
pub type QueryRow = Map<String, Value>;

/// Convert a row, failing on the first column whose type has no mapping.
pub fn row_to_json(row: &Row, statement: &str) -> GatewayResult<QueryRow> {
    let mut obj = Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = column_value(row, idx, column.type_()).map_err(|err| match err {
            ColumnError::Unsupported => GatewayError::UnsupportedColumn {
                column: column.name().to_string(),
                type_name: column.type_().name().to_string(),
            },
            ColumnError::Decode(message) => GatewayError::query(statement, message),
        })?;
        obj.insert(column.name().to_string(), value);
    }
    Ok(obj)
}

enum ColumnError {
    Unsupported,
    Decode(String),
}

fn column_value(row: &Row, idx: usize, ty: &Type) -> Result<Value, ColumnError> {
    fn get<'a, T: postgres::types::FromSql<'a>>(row: &'a Row, idx: usize) -> Result<Option<T>, ColumnError> {
        row.try_get::<_, Option<T>>(idx)
            .map_err(|e| ColumnError::Decode(e.to_string()))
    }

    let value = if *ty == Type::BOOL {
        get::<bool>(row, idx)?.map(Value::Bool)
    } else if *ty == Type::INT2 {
        get::<i16>(row, idx)?.map(Value::from)
    } else if *ty == Type::INT4 {
        get::<i32>(row, idx)?.map(Value::from)
    } else if *ty == Type::INT8 {
        get::<i64>(row, idx)?.map(Value::from)
    } else if *ty == Type::FLOAT4 {
        get::<f32>(row, idx)?.and_then(|f| Number::from_f64(f64::from(f)).map(Value::Number))
    } else if *ty == Type::FLOAT8 {
        get::<f64>(row, idx)?.and_then(|f| Number::from_f64(f).map(Value::Number))
    } else if [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME].contains(ty) {
        get::<String>(row, idx)?.map(Value::String)
    } else if *ty == Type::UUID {
        get::<Uuid>(row, idx)?.map(|u| Value::String(u.to_string()))
    } else if *ty == Type::DATE {
        get::<NaiveDate>(row, idx)?.map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
    } else if *ty == Type::TIMESTAMP {
        get::<NaiveDateTime>(row, idx)?.map(|t| Value::String(t.to_string()))
    } else if *ty == Type::TIMESTAMPTZ {
        get::<DateTime<Utc>>(row, idx)?.map(|t| Value::String(t.to_rfc3339()))
    } else {
        return Err(ColumnError::Unsupported);
    };

    Ok(value.unwrap_or(Value::Null))
}
