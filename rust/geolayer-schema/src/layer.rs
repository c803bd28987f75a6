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
use serde::Serialize;

use crate::crs::Crs;
use crate::feature::{Feature, RawFeature};

/// A named collection of features sharing one reference system
///
/// Layers are read-only snapshots: they are loaded for one request and dropped once the
/// response has been assembled.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    /// `None` when the backing storage does not declare a reference system
    pub crs: Option<Crs>,
    pub features: Vec<Feature>,
}

impl Layer {
    pub fn new(name: impl Into<String>, crs: Option<Crs>, features: Vec<Feature>) -> Self {
        Self {
            name: name.into(),
            crs,
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }
}

/// A layer as read from storage, before geometry filtering
#[derive(Debug, Clone, PartialEq)]
pub struct RawLayer {
    pub name: String,
    pub crs: Option<Crs>,
    pub features: Vec<RawFeature>,
}

impl RawLayer {
    pub fn new(name: impl Into<String>, crs: Option<Crs>, features: Vec<RawFeature>) -> Self {
        Self {
            name: name.into(),
            crs,
            features,
        }
    }
}

/// Descriptive information about a stored layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerInfo {
    pub name: String,
    /// Storage driver the layer was read with (for example "GPKG")
    pub driver: String,
    pub crs: Option<Crs>,
    pub geometry_column: Option<String>,
    pub geometry_type: Option<String>,
    pub columns: Vec<ColumnInfo>,
    pub feature_count: usize,
}

/// An attribute column of a stored layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
        }
    }
}
