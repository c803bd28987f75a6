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

use geolayer_geometry::validity::is_participating;
use geolayer_schema::{
    crs::Crs,
    feature::Feature,
    layer::{Layer, RawLayer},
};

use crate::backend::LayerBackend;
use crate::error::Result;

/// Result of loading a layer
#[derive(Debug, Clone, PartialEq)]
pub enum LayerLoad {
    /// At least one feature with usable geometry
    Loaded(Layer),
    /// The layer exists but none of its features has usable geometry
    Empty { name: String, crs: Option<Crs> },
}

impl LayerLoad {
    pub fn name(&self) -> &str {
        match self {
            LayerLoad::Loaded(layer) => &layer.name,
            LayerLoad::Empty { name, .. } => name,
        }
    }
}

/// Loads whole layers from a backend, keeping only features that may take part in
/// spatial predicates
#[derive(Debug, Clone)]
pub struct LayerStore {
    backend: Arc<dyn LayerBackend>,
}

impl LayerStore {
    pub fn new(backend: Arc<dyn LayerBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn LayerBackend> {
        &self.backend
    }

    /// Load a layer by its stored name
    ///
    /// Fails with `LayerNotFound` for unknown names and `LayerLoad` when the backend
    /// cannot read the layer. Blocks on backend I/O.
    pub fn load_layer(&self, name: &str) -> Result<LayerLoad> {
        let raw = self.backend.read_layer(name)?;
        Ok(filter_layer(raw))
    }
}

/// Drop features whose geometry is missing, empty, non-finite or invalid
pub fn filter_layer(raw: RawLayer) -> LayerLoad {
    let total = raw.features.len();
    let features = raw
        .features
        .into_iter()
        .filter_map(|feature| match feature.geometry {
            Some(geometry) if is_participating(&geometry) => {
                Some(Feature::new(geometry, feature.attributes))
            }
            _ => None,
        })
        .collect::<Vec<_>>();

    let dropped = total - features.len();
    if dropped > 0 {
        log::debug!(
            "Dropped {dropped} of {total} features of '{}' without valid geometry",
            raw.name
        );
    }

    if features.is_empty() {
        LayerLoad::Empty {
            name: raw.name,
            crs: raw.crs,
        }
    } else {
        LayerLoad::Loaded(Layer::new(raw.name, raw.crs, features))
    }
}

#[cfg(test)]
mod tests {
    use geolayer_schema::{crs::lnglat, feature::AttributeValue};
    use geolayer_testing::{
        create::make_raw_feature,
        fixtures::{parks_layer, scenario_layers, BOWTIE},
    };

    use super::*;
    use crate::backend::MemoryBackend;
    use crate::error::GeolayerError;

    #[test]
    fn invalid_and_null_geometry_dropped() {
        let LayerLoad::Loaded(layer) = filter_layer(parks_layer()) else {
            panic!("expected a loaded layer");
        };
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.crs, Some(lnglat()));
        let names = layer
            .iter()
            .map(|feature| feature.attributes.get("name").cloned())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                Some(AttributeValue::from("Golden Gate Park")),
                Some(AttributeValue::from("Alum Rock Park"))
            ]
        );
    }

    #[test]
    fn empty_is_not_missing() {
        let raw = RawLayer::new(
            "vacant",
            Some(lnglat()),
            vec![
                make_raw_feature(None, &[("lot", 1_i64.into())]),
                make_raw_feature(Some(BOWTIE), &[("lot", 2_i64.into())]),
            ],
        );
        let store = LayerStore::new(Arc::new(MemoryBackend::new(vec![raw])));
        let load = store.load_layer("vacant").unwrap();
        assert_eq!(
            load,
            LayerLoad::Empty {
                name: "vacant".to_string(),
                crs: Some(lnglat())
            }
        );
        assert_eq!(load.name(), "vacant");

        assert!(matches!(
            store.load_layer("nonexistent"),
            Err(GeolayerError::LayerNotFound(_))
        ));
    }

    #[test]
    fn load_from_backend() {
        let store = LayerStore::new(Arc::new(MemoryBackend::new(scenario_layers())));
        let LayerLoad::Loaded(roads) = store.load_layer("roads").unwrap() else {
            panic!("expected a loaded layer");
        };
        assert_eq!(roads.len(), 1);
        assert_eq!(roads.crs, Some(Crs::from_srid(3310)));
    }
}
