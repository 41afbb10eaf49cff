//! Operator attributes.

use crate::errors::{QuantRnnError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Int(i64),
    Float(f32),
    String(String),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
    Strings(Vec<String>),
}

impl AttributeValue {
    fn kind(&self) -> &'static str {
        match self {
            AttributeValue::Int(_) => "int",
            AttributeValue::Float(_) => "float",
            AttributeValue::String(_) => "string",
            AttributeValue::Ints(_) => "ints",
            AttributeValue::Floats(_) => "floats",
            AttributeValue::Strings(_) => "strings",
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<f32> for AttributeValue {
    fn from(v: f32) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<Vec<i64>> for AttributeValue {
    fn from(v: Vec<i64>) -> Self {
        AttributeValue::Ints(v)
    }
}

impl From<Vec<f32>> for AttributeValue {
    fn from(v: Vec<f32>) -> Self {
        AttributeValue::Floats(v)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(v: Vec<String>) -> Self {
        AttributeValue::Strings(v)
    }
}

impl From<Vec<&str>> for AttributeValue {
    fn from(v: Vec<&str>) -> Self {
        AttributeValue::Strings(v.into_iter().map(str::to_string).collect())
    }
}

/// Named attributes of one operator node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    values: BTreeMap<String, AttributeValue>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Insert or overwrite.
    pub fn set(&mut self, name: &str, value: impl Into<AttributeValue>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    fn wrong_kind(name: &str, expected: &str, value: &AttributeValue) -> QuantRnnError {
        QuantRnnError::attribute(
            name,
            format!("expected {} attribute, found {}", expected, value.kind()),
        )
    }

    pub fn int(&self, name: &str) -> Result<Option<i64>> {
        match self.get(name) {
            None => Ok(None),
            Some(AttributeValue::Int(v)) => Ok(Some(*v)),
            Some(other) => Err(Self::wrong_kind(name, "int", other)),
        }
    }

    pub fn int_or(&self, name: &str, default: i64) -> Result<i64> {
        Ok(self.int(name)?.unwrap_or(default))
    }

    pub fn required_int(&self, name: &str) -> Result<i64> {
        self.int(name)?
            .ok_or_else(|| QuantRnnError::attribute(name, "required attribute is missing"))
    }

    /// Float attribute; an `Int` value is widened.
    pub fn float(&self, name: &str) -> Result<Option<f32>> {
        match self.get(name) {
            None => Ok(None),
            Some(AttributeValue::Float(v)) => Ok(Some(*v)),
            Some(AttributeValue::Int(v)) => Ok(Some(*v as f32)),
            Some(other) => Err(Self::wrong_kind(name, "float", other)),
        }
    }

    pub fn string(&self, name: &str) -> Result<Option<&str>> {
        match self.get(name) {
            None => Ok(None),
            Some(AttributeValue::String(v)) => Ok(Some(v.as_str())),
            Some(other) => Err(Self::wrong_kind(name, "string", other)),
        }
    }

    pub fn floats(&self, name: &str) -> Result<Vec<f32>> {
        match self.get(name) {
            None => Ok(Vec::new()),
            Some(AttributeValue::Floats(v)) => Ok(v.clone()),
            Some(other) => Err(Self::wrong_kind(name, "floats", other)),
        }
    }

    pub fn strings(&self, name: &str) -> Result<Vec<String>> {
        match self.get(name) {
            None => Ok(Vec::new()),
            Some(AttributeValue::Strings(v)) => Ok(v.clone()),
            Some(other) => Err(Self::wrong_kind(name, "strings", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters() {
        let attrs = Attributes::new()
            .with("hidden_size", 4i64)
            .with("direction", "forward")
            .with("clip", 2.5f32)
            .with("activations", vec!["sigmoid", "tanh", "tanh"]);

        assert_eq!(attrs.required_int("hidden_size").unwrap(), 4);
        assert_eq!(attrs.string("direction").unwrap(), Some("forward"));
        assert_eq!(attrs.float("clip").unwrap(), Some(2.5));
        assert_eq!(attrs.strings("activations").unwrap().len(), 3);
        assert_eq!(attrs.int_or("input_forget", 0).unwrap(), 0);
    }

    #[test]
    fn wrong_kind_is_an_attribute_error() {
        let attrs = Attributes::new().with("hidden_size", "four");
        let err = attrs.required_int("hidden_size").unwrap_err();
        assert!(matches!(err, QuantRnnError::InvalidAttribute { .. }));
    }

    #[test]
    fn missing_required_is_an_error() {
        assert!(Attributes::new().required_int("hidden_size").is_err());
    }
}
