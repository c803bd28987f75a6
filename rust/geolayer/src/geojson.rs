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

//! GeoJSON request and response shapes
//!
//! Two multi-layer shapes are served from one [QueryOutcome]: a flat
//! FeatureCollection whose features carry `properties.layer_name`, and a grouped
//! object with one FeatureCollection and count per layer.

use ::geojson::{Feature as GeoJsonFeature, FeatureCollection, Geometry as GeoJsonGeometry};
use geolayer_schema::{crs::deserialize_crs, feature::Feature};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::{LayerDocument, LayerMatches};
use crate::error::{GeolayerError, Result};
use crate::predicate::PredicateKind;
use crate::query::{LayerOutcome, QueryOutcome, SkipReason, SpatialQuery};
use crate::query_geometry::QueryGeometry;

/// A multi-layer query answered with one flat FeatureCollection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatQueryRequest {
    /// GeoJSON Feature drawn by the user
    pub drawn_boundary: Value,
    pub target_layers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Reference system of the boundary coordinates when not longitude/latitude
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<Value>,
}

impl FlatQueryRequest {
    pub fn to_spatial_query(&self) -> Result<SpatialQuery> {
        build_query(
            &self.drawn_boundary,
            self.crs.as_ref(),
            &self.target_layers,
            self.operation.as_deref(),
        )
    }
}

/// A multi-layer query answered per layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedQueryRequest {
    /// GeoJSON geometry (a Feature is accepted as well)
    pub geometry: Value,
    pub layers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<Value>,
}

impl GroupedQueryRequest {
    pub fn to_spatial_query(&self) -> Result<SpatialQuery> {
        build_query(
            &self.geometry,
            self.crs.as_ref(),
            &self.layers,
            self.operation.as_deref(),
        )
    }
}

/// Geometry first, then predicate: both are checked before any layer is touched
fn build_query(
    geometry: &Value,
    crs: Option<&Value>,
    layers: &[String],
    operation: Option<&str>,
) -> Result<SpatialQuery> {
    let mut query_geometry = QueryGeometry::from_geojson(geometry)?;
    if let Some(crs_value) = crs {
        let declared = deserialize_crs(crs_value)
            .map_err(|err| GeolayerError::InvalidGeometry(format!("Invalid crs: {err}")))?;
        if let Some(declared) = declared {
            query_geometry = query_geometry.with_crs(declared);
        }
    }

    let predicate = PredicateKind::parse_or_default(operation)?;
    Ok(SpatialQuery::new(query_geometry, layers.iter().cloned()).with_predicate(predicate))
}

/// Convert a feature into a GeoJSON Feature with its attributes as properties
pub fn to_geojson_feature(feature: &Feature) -> GeoJsonFeature {
    GeoJsonFeature {
        bbox: None,
        geometry: Some(GeoJsonGeometry::new(::geojson::Value::from(
            &feature.geometry,
        ))),
        id: None,
        properties: Some(feature.attributes.to_json_map()),
        foreign_members: None,
    }
}

/// Collect features into a FeatureCollection, preserving order
pub fn layer_feature_collection<'a>(
    features: impl IntoIterator<Item = &'a Feature>,
) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: features.into_iter().map(to_geojson_feature).collect(),
        foreign_members: None,
    }
}

/// Matches of one layer: `{"geojson": FeatureCollection, "count": n}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerMatchesResponse {
    pub geojson: FeatureCollection,
    pub count: usize,
}

impl LayerMatchesResponse {
    pub fn from_features<'a>(features: impl IntoIterator<Item = &'a Feature>) -> Self {
        let geojson = layer_feature_collection(features);
        let count = geojson.features.len();
        Self { geojson, count }
    }
}

impl From<&LayerMatches> for LayerMatchesResponse {
    fn from(matches: &LayerMatches) -> Self {
        Self::from_features(&matches.features)
    }
}

/// A requested layer that contributed nothing, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLayer {
    pub layer: String,
    pub reason: SkipReason,
}

/// `{"results": {layer: {"geojson", "count"}}, "skipped": [{"layer", "reason"}]}`
///
/// Results keep request order. A layer requested twice appears once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedQueryResponse {
    pub results: Map<String, Value>,
    pub skipped: Vec<SkippedLayer>,
}

impl GroupedQueryResponse {
    pub fn try_from_outcome(outcome: &QueryOutcome) -> Result<Self> {
        let mut results = Map::new();
        let mut skipped = Vec::new();
        for result in &outcome.layers {
            match &result.outcome {
                LayerOutcome::Matched(features) => {
                    let response = LayerMatchesResponse::from_features(features);
                    results.insert(result.layer.clone(), serde_json::to_value(response)?);
                }
                LayerOutcome::Empty => {
                    let response = LayerMatchesResponse::from_features(&[]);
                    results.insert(result.layer.clone(), serde_json::to_value(response)?);
                }
                LayerOutcome::Skipped(reason) => skipped.push(SkippedLayer {
                    layer: result.layer.clone(),
                    reason: *reason,
                }),
            }
        }

        Ok(Self { results, skipped })
    }
}

/// A whole layer: `{"geojson": FeatureCollection, "metadata": string|null}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerDocumentResponse {
    pub geojson: FeatureCollection,
    pub metadata: Option<String>,
}

impl From<&LayerDocument> for LayerDocumentResponse {
    fn from(document: &LayerDocument) -> Self {
        Self {
            geojson: layer_feature_collection(&document.features),
            metadata: document.metadata.clone(),
        }
    }
}

/// `{"layers": [...]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerListResponse {
    pub layers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use geolayer_schema::{crs::Crs, feature::LAYER_NAME_ATTRIBUTE};
    use geolayer_testing::create::make_feature;
    use serde_json::json;

    use super::*;
    use crate::query::LayerResult;

    fn outcome() -> QueryOutcome {
        QueryOutcome {
            predicate: PredicateKind::Intersects,
            layers: vec![
                LayerResult {
                    layer: "parks".to_string(),
                    outcome: LayerOutcome::Matched(vec![make_feature(
                        "POINT (1 2)",
                        &[("name", "A".into())],
                    )
                    .with_layer_name("parks")]),
                },
                LayerResult {
                    layer: "vacant".to_string(),
                    outcome: LayerOutcome::Empty,
                },
                LayerResult {
                    layer: "nonexistent".to_string(),
                    outcome: LayerOutcome::Skipped(SkipReason::NotFound),
                },
                LayerResult {
                    layer: "roads".to_string(),
                    outcome: LayerOutcome::Matched(vec![]),
                },
            ],
        }
    }

    #[test]
    fn flat_request() {
        let request: FlatQueryRequest = serde_json::from_value(json!({
            "drawn_boundary": {
                "type": "Feature",
                "properties": {},
                "geometry": {"type": "Point", "coordinates": [1, 2]}
            },
            "target_layers": ["parks", "roads"]
        }))
        .unwrap();
        let query = request.to_spatial_query().unwrap();
        assert_eq!(query.layers, vec!["parks", "roads"]);
        assert_eq!(query.predicate, PredicateKind::Intersects);
    }

    #[test]
    fn grouped_request() {
        let request: GroupedQueryRequest = serde_json::from_value(json!({
            "geometry": {"type": "Point", "coordinates": [0, -4000000]},
            "layers": ["roads"],
            "operation": "within",
            "crs": "EPSG:3310"
        }))
        .unwrap();
        let query = request.to_spatial_query().unwrap();
        assert_eq!(query.predicate, PredicateKind::Within);
        assert_eq!(query.geometry.crs(), &Crs::from_srid(3310));
    }

    #[test]
    fn geometry_checked_before_predicate() {
        let request = GroupedQueryRequest {
            geometry: json!({"type": "Point"}),
            layers: vec!["parks".to_string()],
            operation: Some("near".to_string()),
            crs: None,
        };
        assert!(matches!(
            request.to_spatial_query(),
            Err(GeolayerError::InvalidGeometry(_))
        ));

        let request = GroupedQueryRequest {
            geometry: json!({"type": "Point", "coordinates": [1, 2]}),
            ..request
        };
        assert!(matches!(
            request.to_spatial_query(),
            Err(GeolayerError::InvalidPredicate(_))
        ));
    }

    #[test]
    fn flat_response() {
        let outcome = outcome();
        let collection = layer_feature_collection(outcome.features());
        assert_eq!(collection.features.len(), 1);
        let value = serde_json::to_value(&collection).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(
            value["features"][0]["properties"][LAYER_NAME_ATTRIBUTE],
            json!("parks")
        );
        assert_eq!(value["features"][0]["properties"]["name"], json!("A"));
        assert_eq!(
            value["features"][0]["geometry"],
            json!({"type": "Point", "coordinates": [1.0, 2.0]})
        );
    }

    #[test]
    fn grouped_response() {
        let response = GroupedQueryResponse::try_from_outcome(&outcome()).unwrap();
        let value = serde_json::to_value(&response).unwrap();

        let keys = value["results"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["parks", "vacant", "roads"]);
        assert_eq!(value["results"]["parks"]["count"], json!(1));
        assert_eq!(value["results"]["vacant"]["count"], json!(0));
        assert_eq!(
            value["results"]["roads"]["geojson"]["features"],
            json!([])
        );
        assert_eq!(
            value["skipped"],
            json!([{"layer": "nonexistent", "reason": "not_found"}])
        );
    }

    #[test]
    fn layer_document() {
        let document = LayerDocument {
            name: "parks".to_string(),
            features: vec![make_feature("POINT (1 2)", &[("name", "A".into())])],
            metadata: None,
        };
        let value = serde_json::to_value(LayerDocumentResponse::from(&document)).unwrap();
        assert_eq!(value["metadata"], Value::Null);
        assert_eq!(value["geojson"]["features"][0]["properties"], json!({"name": "A"}));

        let list = serde_json::to_value(LayerListResponse {
            layers: vec!["parks".to_string()],
        })
        .unwrap();
        assert_eq!(list, json!({"layers": ["parks"]}));
    }
}
