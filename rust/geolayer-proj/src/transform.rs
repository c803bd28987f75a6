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
use std::sync::Arc;

use geolayer_geometry::error::GeolayerGeometryError;
use geolayer_geometry::transform::{CrsEngine, CrsTransform};
use proj4rs::adaptors::transform_vertex_2d;
use proj4rs::Proj;

use crate::definitions::find_definition;

/// A [CrsEngine] implemented using the [proj4rs] crate
///
/// Reference systems are identified as `AUTHORITY:CODE` (see
/// [find_definition]) or given directly as proj4 strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProjCrsEngine;

impl ProjCrsEngine {
    fn proj(crs: &str) -> Result<Proj, GeolayerGeometryError> {
        let definition = find_definition(crs).ok_or_else(|| {
            GeolayerGeometryError::Invalid(format!(
                "Unknown coordinate reference system '{crs}'"
            ))
        })?;
        Proj::from_proj_string(&definition).map_err(|e| {
            GeolayerGeometryError::Invalid(format!(
                "Projection creation for '{crs}' failed with error: {e}"
            ))
        })
    }
}

impl CrsEngine for ProjCrsEngine {
    fn get_transform_crs_to_crs(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Arc<dyn CrsTransform>, GeolayerGeometryError> {
        Ok(Arc::new(ProjTransform {
            definition: format!("{from} -> {to}"),
            from: Self::proj(from)?,
            to: Self::proj(to)?,
        }))
    }
}

/// A [CrsTransform] implemented using the [proj4rs] crate
///
/// Geographic coordinates go in and come out in degrees, longitude first.
struct ProjTransform {
    definition: String,
    from: Proj,
    to: Proj,
}

impl Debug for ProjTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjTransform")
            .field("definition", &self.definition)
            .finish()
    }
}

impl CrsTransform for ProjTransform {
    fn transform_coord(&self, coord: &mut (f64, f64)) -> Result<(), GeolayerGeometryError> {
        // proj4rs works in radians
        let input = if self.from.is_latlong() {
            (coord.0.to_radians(), coord.1.to_radians())
        } else {
            *coord
        };

        let (x, y) = transform_vertex_2d(&self.from, &self.to, input).map_err(|e| {
            GeolayerGeometryError::Invalid(format!(
                "Coordinate transformation {} failed with error: {e}",
                self.definition
            ))
        })?;

        *coord = if self.to.is_latlong() {
            (x.to_degrees(), y.to_degrees())
        } else {
            (x, y)
        };
        Ok(())
    }
}
