use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Runtime-classified shape of a value stored in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeTag {
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "number", alias = "double")]
    Number,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "boolean[]")]
    BooleanArray,
    #[serde(rename = "number[]", alias = "double[]")]
    NumberArray,
    #[serde(rename = "string[]")]
    StringArray,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::BooleanArray => "boolean[]",
            Self::NumberArray => "number[]",
            Self::StringArray => "string[]",
        }
    }

    /// Parse a tag name. The telemetry table's own `double` spelling is
    /// accepted as an alias for `number`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "boolean" => Some(Self::Boolean),
            "number" | "double" => Some(Self::Number),
            "string" => Some(Self::String),
            "boolean[]" => Some(Self::BooleanArray),
            "number[]" | "double[]" => Some(Self::NumberArray),
            "string[]" => Some(Self::StringArray),
            _ => None,
        }
    }

    /// Element tag of an array tag.
    pub fn element(&self) -> Option<Self> {
        match self {
            Self::BooleanArray => Some(Self::Boolean),
            Self::NumberArray => Some(Self::Number),
            Self::StringArray => Some(Self::String),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        self.element().is_some()
    }

    /// Classify a dynamic value. Returns `None` for shapes the table cannot
    /// hold: null, objects, empty arrays and arrays mixing element kinds.
    pub fn classify(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(_) => Some(Self::Boolean),
            Value::Number(_) => Some(Self::Number),
            Value::String(_) => Some(Self::String),
            Value::Array(items) => {
                let tag = match items.first()? {
                    Value::Bool(_) => Self::BooleanArray,
                    Value::Number(_) => Self::NumberArray,
                    Value::String(_) => Self::StringArray,
                    _ => return None,
                };
                let element = tag.element()?;
                items
                    .iter()
                    .all(|item| Self::classify(item) == Some(element))
                    .then_some(tag)
            }
            Value::Null | Value::Object(_) => None,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value held under one key of the canonical table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableValue {
    Boolean(bool),
    Number(f64),
    String(String),
    BooleanArray(Vec<bool>),
    NumberArray(Vec<f64>),
    StringArray(Vec<String>),
}

impl TableValue {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Self::Boolean(_) => TypeTag::Boolean,
            Self::Number(_) => TypeTag::Number,
            Self::String(_) => TypeTag::String,
            Self::BooleanArray(_) => TypeTag::BooleanArray,
            Self::NumberArray(_) => TypeTag::NumberArray,
            Self::StringArray(_) => TypeTag::StringArray,
        }
    }

    /// Convert a dynamic value, classifying it first.
    pub fn from_json(value: &Value) -> Option<Self> {
        let tag = TypeTag::classify(value)?;
        Some(match tag {
            TypeTag::Boolean => Self::Boolean(value.as_bool()?),
            TypeTag::Number => Self::Number(value.as_f64()?),
            TypeTag::String => Self::String(value.as_str()?.to_string()),
            TypeTag::BooleanArray => Self::BooleanArray(
                value
                    .as_array()?
                    .iter()
                    .filter_map(Value::as_bool)
                    .collect(),
            ),
            TypeTag::NumberArray => {
                Self::NumberArray(value.as_array()?.iter().filter_map(Value::as_f64).collect())
            }
            TypeTag::StringArray => Self::StringArray(
                value
                    .as_array()?
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
        })
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for TableValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for TableValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for TableValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl fmt::Display for TableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

/// A provider's view of one key: `{ value, type, name }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    pub value: TableValue,
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    #[serde(default)]
    pub name: String,
}

impl TableEntry {
    /// Entry whose display name defaults to the key itself.
    pub fn new(key: &str, value: TableValue) -> Self {
        Self {
            type_tag: value.type_tag(),
            value,
            name: key.to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_rejects_unknown_shapes() {
        assert_eq!(TypeTag::classify(&json!(null)), None);
        assert_eq!(TypeTag::classify(&json!({"a": 1})), None);
        assert_eq!(TypeTag::classify(&json!([])), None);
        assert_eq!(TypeTag::classify(&json!([1, "a"])), None);
        assert_eq!(TypeTag::classify(&json!([[1]])), None);
    }

    #[test]
    fn classify_scalars_and_arrays() {
        assert_eq!(TypeTag::classify(&json!(true)), Some(TypeTag::Boolean));
        assert_eq!(TypeTag::classify(&json!(3)), Some(TypeTag::Number));
        assert_eq!(TypeTag::classify(&json!(2.5)), Some(TypeTag::Number));
        assert_eq!(TypeTag::classify(&json!("a")), Some(TypeTag::String));
        assert_eq!(
            TypeTag::classify(&json!([1, 2.5])),
            Some(TypeTag::NumberArray)
        );
        assert_eq!(
            TypeTag::classify(&json!(["a", "b"])),
            Some(TypeTag::StringArray)
        );
    }

    #[test]
    fn entry_deserializes_with_type_field() {
        let entry: TableEntry =
            serde_json::from_value(json!({"value": 3, "type": "double", "name": "x"})).unwrap();
        assert_eq!(entry.type_tag, TypeTag::Number);
        assert_eq!(entry.value, TableValue::Number(3.0));
        assert_eq!(entry.name, "x");
    }

    #[test]
    fn integers_become_numbers() {
        assert_eq!(TableValue::from_json(&json!(9)), Some(TableValue::Number(9.0)));
    }
}
