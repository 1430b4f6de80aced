use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parameters attached to an outbound call, keyed by name.
///
/// A `BTreeMap` so the encoded JSON has a stable key order.
pub type Parameters = BTreeMap<String, ParameterValue>;

/// Every shape an outbound parameter may take.
///
/// Primitives, sequences of values and string-keyed mappings of values.
/// Anything richer has to be lowered into this first, see
/// [`ParameterValue::from_serializable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<ParameterValue>),
    Map(BTreeMap<String, ParameterValue>),
}

impl ParameterValue {
    /// Lowers any `Serialize` value into a `ParameterValue`.
    ///
    /// Fails for values whose JSON form contains `null` or that serde_json
    /// refuses to serialize (e.g. maps with non-string keys).
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> ValueResult<Self> {
        let json = serde_json::to_value(value).map_err(|e| ValueError::Serialize {
            message: e.to_string(),
        })?;
        Self::try_from_json(json, "$")
    }

    fn try_from_json(json: serde_json::Value, path: &str) -> ValueResult<Self> {
        match json {
            serde_json::Value::Null => Err(ValueError::Unsupported {
                path: path.to_string(),
                kind: "null".to_string(),
            }),
            serde_json::Value::Bool(b) => Ok(ParameterValue::Bool(b)),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Ok(ParameterValue::Integer(i)),
                (None, Some(f)) => Ok(ParameterValue::Float(f)),
                (None, None) => Err(ValueError::Unsupported {
                    path: path.to_string(),
                    kind: format!("number {}", n),
                }),
            },
            serde_json::Value::String(s) => Ok(ParameterValue::String(s)),
            serde_json::Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| Self::try_from_json(item, &format!("{}[{}]", path, i)))
                .collect::<ValueResult<Vec<_>>>()
                .map(ParameterValue::List),
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| {
                    let child = format!("{}.{}", path, k);
                    Self::try_from_json(v, &child).map(|v| (k, v))
                })
                .collect::<ValueResult<BTreeMap<_, _>>>()
                .map(ParameterValue::Map),
        }
    }

    /// Checks the value can be written as JSON without loss.
    pub fn validate(&self, path: &str) -> ValueResult<()> {
        match self {
            ParameterValue::Float(f) if !f.is_finite() => Err(ValueError::NonFinite {
                path: path.to_string(),
                value: *f,
            }),
            ParameterValue::List(items) => items
                .iter()
                .enumerate()
                .try_for_each(|(i, item)| item.validate(&format!("{}[{}]", path, i))),
            ParameterValue::Map(map) => map
                .iter()
                .try_for_each(|(k, v)| v.validate(&format!("{}.{}", path, k))),
            _ => Ok(()),
        }
    }
}

pub fn validate_parameters(parameters: &Parameters) -> ValueResult<()> {
    parameters
        .iter()
        .try_for_each(|(k, v)| v.validate(&format!("parameters.{}", k)))
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

impl From<i32> for ParameterValue {
    fn from(value: i32) -> Self {
        ParameterValue::Integer(value as i64)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Integer(value)
    }
}

impl From<u32> for ParameterValue {
    fn from(value: u32) -> Self {
        ParameterValue::Integer(value as i64)
    }
}

impl From<f32> for ParameterValue {
    fn from(value: f32) -> Self {
        ParameterValue::Float(value as f64)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Float(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::String(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::String(value)
    }
}

impl<T: Into<ParameterValue>> From<Vec<T>> for ParameterValue {
    fn from(value: Vec<T>) -> Self {
        ParameterValue::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ParameterValue>> From<BTreeMap<String, T>> for ParameterValue {
    fn from(value: BTreeMap<String, T>) -> Self {
        ParameterValue::Map(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<ParameterValue>> From<HashMap<String, T>> for ParameterValue {
    fn from(value: HashMap<String, T>) -> Self {
        ParameterValue::Map(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ValueError {
    #[error("unsupported value at {path}: {kind}")]
    Unsupported { path: String, kind: String },
    #[error("non-finite number at {path}: {value}")]
    NonFinite { path: String, value: f64 },
    #[error("value could not be serialized: {message}")]
    Serialize { message: String },
}

pub type ValueResult<T> = Result<T, ValueError>;
