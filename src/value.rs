// src/value.rs
//! Typed element values.
//!
//! The backend ships every element value as untyped JSON next to a
//! declared data-type tag. Values are decoded here, once, at the wire
//! boundary so the rest of the crate only sees [`Value`].
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::DataModelError;

/// Family a declared data-type tag belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Text,
    Integer,
    Decimal,
    Boolean,
    DateTime,
    Other(String),
}

impl DataType {
    /// Map a declared tag onto its family (case-insensitive).
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "string" | "text" | "varchar" | "nvarchar" | "char" | "nchar" | "guid" | "uuid" => {
                DataType::Text
            }
            "int" | "integer" | "int16" | "int32" | "int64" | "long" | "short" | "bigint"
            | "smallint" | "tinyint" => DataType::Integer,
            "decimal" | "double" | "float" | "single" | "real" | "number" | "numeric"
            | "money" => DataType::Decimal,
            "bool" | "boolean" | "bit" => DataType::Boolean,
            "date" | "datetime" | "datetime2" | "datetimeoffset" | "timestamp" | "time" => {
                DataType::DateTime
            }
            _ => DataType::Other(tag.to_string()),
        }
    }
}

/// A decoded element value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
    /// Kept as the server's string form; no timezone juggling here.
    DateTime(String),
    /// Unknown data type: raw JSON passthrough.
    Raw(Json),
}

impl Value {
    /// Decode `raw` according to the declared `data_type` tag.
    pub fn decode(element_id: u32, data_type: &str, raw: Json) -> Result<Self, DataModelError> {
        if raw.is_null() {
            return Ok(Value::Null);
        }

        let mismatch = |raw: &Json| DataModelError::ValueMismatch {
            element_id,
            data_type: data_type.to_string(),
            raw: raw.to_string(),
        };

        match DataType::parse(data_type) {
            DataType::Text => Ok(Value::Text(match raw {
                Json::String(s) => s,
                Json::Number(_) | Json::Bool(_) => raw.to_string(),
                other => return Err(mismatch(&other)),
            })),
            DataType::Integer => match &raw {
                Json::Number(n) => n.as_i64().map(Value::Integer).ok_or_else(|| mismatch(&raw)),
                Json::String(s) => s.trim().parse::<i64>().map(Value::Integer).map_err(|_| mismatch(&raw)),
                _ => Err(mismatch(&raw)),
            },
            DataType::Decimal => match &raw {
                Json::Number(n) => n.as_f64().map(Value::Decimal).ok_or_else(|| mismatch(&raw)),
                Json::String(s) => s.trim().parse::<f64>().map(Value::Decimal).map_err(|_| mismatch(&raw)),
                _ => Err(mismatch(&raw)),
            },
            DataType::Boolean => match &raw {
                Json::Bool(b) => Ok(Value::Bool(*b)),
                Json::Number(n) if n.as_i64() == Some(0) => Ok(Value::Bool(false)),
                Json::Number(n) if n.as_i64() == Some(1) => Ok(Value::Bool(true)),
                Json::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" => Ok(Value::Bool(true)),
                    "false" | "0" => Ok(Value::Bool(false)),
                    _ => Err(mismatch(&raw)),
                },
                _ => Err(mismatch(&raw)),
            },
            DataType::DateTime => match raw {
                Json::String(s) => Ok(Value::DateTime(s)),
                other => Err(mismatch(&other)),
            },
            DataType::Other(_) => Ok(Value::Raw(raw)),
        }
    }

    /// JSON form used by exports.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Integer(i) => Json::from(*i),
            Value::Decimal(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Text(s) | Value::DateTime(s) => Json::String(s.clone()),
            Value::Raw(j) => j.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Text(s) | Value::DateTime(s) => f.write_str(s),
            Value::Raw(Json::String(s)) => f.write_str(s),
            Value::Raw(j) => write!(f, "{j}"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Wire shape of an element value before decoding.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawElementValue {
    pub element_id: u32,
    #[serde(default)]
    pub value: Json,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub revision_id: i64,
    #[serde(default)]
    pub user_id: Option<String>,
}
