// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the attribute injected into features produced by a multi-layer query
pub const LAYER_NAME_ATTRIBUTE: &str = "layer_name";

/// A scalar attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Convert into a JSON value. Non-finite reals have no JSON spelling and become null.
    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Null => Value::Null,
            AttributeValue::Integer(value) => Value::from(*value),
            AttributeValue::Real(value) => serde_json::Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AttributeValue::Text(value) => Value::String(value.clone()),
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Real(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(AttributeValue::Null)
    }
}

/// Ordered mapping from attribute name to value
///
/// Column order of the backing layer is preserved so that serialized properties read in
/// the same order as the source table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(Vec<(String, AttributeValue)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, replacing the value in place if the name already exists
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert into a JSON object suitable for GeoJSON `properties`
    pub fn to_json_map(&self) -> Map<String, Value> {
        self.0
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<AttributeValue>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = Attributes::new();
        for (name, value) in iter {
            out.insert(name, value);
        }
        out
    }
}

/// One geometry and its attributes
///
/// The geometry of a [Feature] has already been checked for validity; features whose
/// geometry is missing or invalid stay [RawFeature]s and never reach predicate
/// evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry,
    pub attributes: Attributes,
}

impl Feature {
    pub fn new(geometry: Geometry, attributes: Attributes) -> Self {
        Self {
            geometry,
            attributes,
        }
    }

    /// Tag this feature with the layer it came from
    pub fn with_layer_name(mut self, layer_name: &str) -> Self {
        self.attributes.insert(LAYER_NAME_ATTRIBUTE, layer_name);
        self
    }

    pub fn layer_name(&self) -> Option<&str> {
        self.attributes
            .get(LAYER_NAME_ATTRIBUTE)
            .and_then(|value| value.as_str())
    }
}

/// A feature as read from storage, before geometry filtering
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature {
    pub geometry: Option<Geometry>,
    pub attributes: Attributes,
}

impl RawFeature {
    pub fn new(geometry: Option<Geometry>, attributes: Attributes) -> Self {
        Self {
            geometry,
            attributes,
        }
    }
}
