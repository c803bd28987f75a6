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
use std::sync::Arc;

use geo_types::Geometry;
use geolayer_geometry::{
    error::GeolayerGeometryError,
    transform::{transform_geometry, CrsEngine},
    validity::is_participating,
};
use geolayer_schema::{crs::Crs, feature::Feature, layer::Layer};

use crate::error::Result;

/// Brings layers and query geometries into one target reference system
///
/// Normalization is idempotent: a layer already in the target CRS is returned as is,
/// without touching a single coordinate.
#[derive(Debug, Clone)]
pub struct CrsNormalizer {
    engine: Arc<dyn CrsEngine>,
    target: Crs,
}

impl CrsNormalizer {
    pub fn new(engine: Arc<dyn CrsEngine>, target: Crs) -> Self {
        Self { engine, target }
    }

    pub fn target(&self) -> &Crs {
        &self.target
    }

    /// Reproject every feature of `layer` into the target CRS
    ///
    /// Fails when the layer declares no CRS or no transform to the target exists.
    /// Attributes and feature order are preserved. Features whose geometry is no
    /// longer valid after reprojection are dropped.
    pub fn normalize(&self, layer: Layer) -> Result<Layer> {
        let source = match &layer.crs {
            Some(crs) if *crs == self.target => return Ok(layer),
            Some(crs) => crs.clone(),
            None => {
                return Err(GeolayerGeometryError::Invalid(format!(
                    "Layer '{}' has no coordinate reference system",
                    layer.name
                ))
                .into())
            }
        };

        let transform = self
            .engine
            .get_transform_crs_to_crs(&source.to_authority_code(), &self.target.to_authority_code())?;
        log::debug!(
            "Reprojecting {} features of '{}' from {source} to {}",
            layer.len(),
            layer.name,
            self.target
        );

        let total = layer.len();
        let mut features = Vec::with_capacity(total);
        for feature in layer.features {
            let geometry = transform_geometry(&feature.geometry, transform.as_ref())?;
            if is_participating(&geometry) {
                features.push(Feature::new(geometry, feature.attributes));
            }
        }

        let dropped = total - features.len();
        if dropped > 0 {
            log::debug!(
                "Dropped {dropped} of {total} features of '{}' invalid after reprojection",
                layer.name
            );
        }

        Ok(Layer::new(layer.name, Some(self.target.clone()), features))
    }

    /// Reproject a single geometry from `source` into the target CRS
    pub fn normalize_geometry(&self, geometry: Geometry, source: &Crs) -> Result<Geometry> {
        if *source == self.target {
            return Ok(geometry);
        }

        let transform = self
            .engine
            .get_transform_crs_to_crs(&source.to_authority_code(), &self.target.to_authority_code())?;
        Ok(transform_geometry(&geometry, transform.as_ref())?)
    }
}
