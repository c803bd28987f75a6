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
use std::fmt::Debug;
use std::path::Path;

use geolayer_geometry::validity::geometry_type_name;
use geolayer_geopackage::{GeoPackage, GpkgError};
use geolayer_schema::{
    feature::AttributeValue,
    layer::{ColumnInfo, LayerInfo, RawLayer},
};

use crate::error::{GeolayerError, Result};

/// Read-only storage holding named layers
///
/// Implementations are shared by concurrently running queries and are called from
/// blocking worker threads.
pub trait LayerBackend: Debug + Send + Sync {
    /// Short name of the storage driver, e.g. "GPKG"
    fn driver(&self) -> &str;

    /// Names of every layer, in the spelling the backend stores them
    fn list_layers(&self) -> Result<Vec<String>>;

    /// Every feature of a layer, including features without usable geometry
    fn read_layer(&self, name: &str) -> Result<RawLayer>;

    /// Describe a layer without materializing its features where possible
    fn describe_layer(&self, name: &str) -> Result<LayerInfo>;
}

/// Layers stored in a GeoPackage file
#[derive(Debug, Clone)]
pub struct GeoPackageBackend {
    gpkg: GeoPackage,
}

impl GeoPackageBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let gpkg = GeoPackage::open(path.as_ref()).map_err(|err| {
            GeolayerError::CatalogUnavailable(format!(
                "Can't open GeoPackage {}: {err}",
                path.as_ref().display()
            ))
        })?;
        Ok(Self { gpkg })
    }

    pub fn geopackage(&self) -> &GeoPackage {
        &self.gpkg
    }
}

fn layer_error(name: &str, err: GpkgError) -> GeolayerError {
    match err {
        GpkgError::LayerNotFound(_) => GeolayerError::LayerNotFound(name.to_string()),
        other => GeolayerError::LayerLoad {
            layer: name.to_string(),
            message: other.to_string(),
        },
    }
}

impl LayerBackend for GeoPackageBackend {
    fn driver(&self) -> &str {
        geolayer_geopackage::reader::GPKG_DRIVER
    }

    fn list_layers(&self) -> Result<Vec<String>> {
        self.gpkg
            .list_layers()
            .map_err(|err| GeolayerError::CatalogUnavailable(err.to_string()))
    }

    fn read_layer(&self, name: &str) -> Result<RawLayer> {
        self.gpkg.read_layer(name).map_err(|err| layer_error(name, err))
    }

    fn describe_layer(&self, name: &str) -> Result<LayerInfo> {
        self.gpkg
            .describe_layer(name)
            .map_err(|err| layer_error(name, err))
    }
}

/// Layers held in memory
///
/// Used by tests and by embedders that already have their features in hand.
/// Lookups are exact; case-insensitive resolution happens in the catalog.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    layers: Vec<RawLayer>,
}

pub const MEMORY_DRIVER: &str = "Memory";

impl MemoryBackend {
    pub fn new(layers: Vec<RawLayer>) -> Self {
        Self { layers }
    }

    /// Add a layer, replacing any layer of the same name
    pub fn with_layer(mut self, layer: RawLayer) -> Self {
        self.layers.retain(|existing| existing.name != layer.name);
        self.layers.push(layer);
        self
    }

    fn find(&self, name: &str) -> Result<&RawLayer> {
        self.layers
            .iter()
            .find(|layer| layer.name == name)
            .ok_or_else(|| GeolayerError::LayerNotFound(name.to_string()))
    }
}

impl LayerBackend for MemoryBackend {
    fn driver(&self) -> &str {
        MEMORY_DRIVER
    }

    fn list_layers(&self) -> Result<Vec<String>> {
        let mut names = self
            .layers
            .iter()
            .map(|layer| layer.name.clone())
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    fn read_layer(&self, name: &str) -> Result<RawLayer> {
        self.find(name).cloned()
    }

    fn describe_layer(&self, name: &str) -> Result<LayerInfo> {
        let layer = self.find(name)?;

        let columns = layer
            .features
            .first()
            .map(|feature| {
                feature
                    .attributes
                    .iter()
                    .map(|(name, value)| ColumnInfo::new(name, declared_type(value)))
                    .collect()
            })
            .unwrap_or_default();

        let mut geometry_types = layer
            .features
            .iter()
            .filter_map(|feature| feature.geometry.as_ref())
            .map(geometry_type_name);
        let geometry_type = match geometry_types.next() {
            Some(first) if geometry_types.all(|other| other == first) => first,
            _ => "GEOMETRY",
        };

        Ok(LayerInfo {
            name: layer.name.clone(),
            driver: MEMORY_DRIVER.to_string(),
            crs: layer.crs.clone(),
            geometry_column: None,
            geometry_type: Some(geometry_type.to_uppercase()),
            columns,
            feature_count: layer.features.len(),
        })
    }
}

fn declared_type(value: &AttributeValue) -> &'static str {
    match value {
        AttributeValue::Null => "NULL",
        AttributeValue::Integer(_) => "INTEGER",
        AttributeValue::Real(_) => "REAL",
        AttributeValue::Text(_) => "TEXT",
    }
}
