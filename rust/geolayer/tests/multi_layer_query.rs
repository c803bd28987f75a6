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
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use geolayer::{
    backend::{LayerBackend, MemoryBackend},
    error::Result,
    geojson::{FlatQueryRequest, GroupedQueryRequest},
    query::{LayerOutcome, SkipReason},
    EngineOptions, GeolayerContext, GeolayerError, PredicateKind, QueryGeometry, SpatialQuery,
};
use geolayer_schema::crs::Crs;
use geolayer_schema::feature::{AttributeValue, RawFeature};
use geolayer_schema::layer::{LayerInfo, RawLayer};
use geolayer_testing::{
    create::{make_attributes, make_geometry, project_lnglat},
    fixtures::{parks_layer, scenario_layers, ROADS_CRS, SCENARIO_QUERY},
};
use rstest::rstest;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

const SACRAMENTO: &str =
    "POLYGON ((-121.6 38.4, -121.3 38.4, -121.3 38.7, -121.6 38.7, -121.6 38.4))";

/// Counts backend calls and optionally sleeps while reading a layer
#[derive(Debug)]
struct CountingBackend {
    inner: MemoryBackend,
    read_delay: Duration,
    listings: AtomicUsize,
    reads: AtomicUsize,
}

impl CountingBackend {
    fn new(read_delay: Duration) -> Self {
        Self {
            inner: MemoryBackend::new(scenario_layers()),
            read_delay,
            listings: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.listings.load(Ordering::SeqCst) + self.reads.load(Ordering::SeqCst)
    }
}

impl LayerBackend for CountingBackend {
    fn driver(&self) -> &str {
        "Counting"
    }

    fn list_layers(&self) -> Result<Vec<String>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        self.inner.list_layers()
    }

    fn read_layer(&self, name: &str) -> Result<RawLayer> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.read_delay);
        self.inner.read_layer(name)
    }

    fn describe_layer(&self, name: &str) -> Result<LayerInfo> {
        self.inner.describe_layer(name)
    }
}

fn scenario_context() -> GeolayerContext {
    GeolayerContext::new(
        Arc::new(MemoryBackend::new(scenario_layers())),
        EngineOptions::default(),
    )
}

fn polygon_json(wkt_value: &str) -> Value {
    let geometry = make_geometry(wkt_value);
    serde_json::to_value(::geojson::Geometry::new(::geojson::Value::from(&geometry))).unwrap()
}

fn drawn_boundary(wkt_value: &str) -> Value {
    json!({"type": "Feature", "properties": {}, "geometry": polygon_json(wkt_value)})
}

fn layer_names(layers: &[&str]) -> Vec<String> {
    layers.iter().map(|name| name.to_string()).collect()
}

#[tokio::test]
async fn flat_scenario() {
    let request = FlatQueryRequest {
        drawn_boundary: drawn_boundary(SCENARIO_QUERY),
        target_layers: layer_names(&["parks", "roads", "nonexistent"]),
        operation: None,
        crs: None,
    };
    let collection = scenario_context().query_flat(&request).await.unwrap();
    assert_eq!(collection.features.len(), 1);

    let properties = collection.features[0].properties.as_ref().unwrap();
    assert_eq!(properties["name"], json!("Golden Gate Park"));
    assert_eq!(properties["layer_name"], json!("parks"));
}

#[tokio::test]
async fn grouped_scenario() {
    let request = GroupedQueryRequest {
        geometry: polygon_json(SCENARIO_QUERY),
        layers: layer_names(&["parks", "roads", "nonexistent"]),
        operation: Some("intersects".to_string()),
        crs: None,
    };
    let response = scenario_context().query_grouped(&request).await.unwrap();
    let value = serde_json::to_value(&response).unwrap();

    assert_eq!(value["results"]["parks"]["count"], json!(1));
    assert_eq!(value["results"]["roads"]["count"], json!(0));
    assert_eq!(
        value["skipped"],
        json!([{"layer": "nonexistent", "reason": "not_found"}])
    );
}

#[rstest]
#[case(PredicateKind::Intersects, 1)]
#[case(PredicateKind::Within, 1)]
#[case(PredicateKind::Contains, 0)]
#[case(PredicateKind::Disjoint, 1)]
#[tokio::test]
async fn predicates(#[case] predicate: PredicateKind, #[case] expected: usize) {
    let query = SpatialQuery::new(
        QueryGeometry::lnglat(make_geometry(SCENARIO_QUERY)).unwrap(),
        ["parks"],
    )
    .with_predicate(predicate);
    let outcome = scenario_context().query(query).await.unwrap();
    assert_eq!(outcome.feature_count(), expected);

    let expected_park = if predicate == PredicateKind::Disjoint {
        "Alum Rock Park"
    } else {
        "Golden Gate Park"
    };
    for feature in outcome.features() {
        assert_eq!(
            feature.attributes.get("name").and_then(|v| v.as_str()),
            Some(expected_park)
        );
    }
}

#[tokio::test]
async fn results_are_lnglat() {
    let query = SpatialQuery::new(
        QueryGeometry::lnglat(make_geometry(SACRAMENTO)).unwrap(),
        ["roads"],
    );
    let outcome = scenario_context().query(query).await.unwrap();
    let features = outcome.features().collect::<Vec<_>>();
    assert_eq!(features.len(), 1);

    let geo_types::Geometry::LineString(line) = &features[0].geometry else {
        panic!("expected a linestring");
    };
    for coord in line.coords() {
        assert!((-121.6..-121.3).contains(&coord.x), "{coord:?}");
        assert!((38.4..38.7).contains(&coord.y), "{coord:?}");
    }
}

#[tokio::test]
async fn unknown_layers_never_fail() {
    let query = SpatialQuery::new(
        QueryGeometry::lnglat(make_geometry(SCENARIO_QUERY)).unwrap(),
        ["nope", "also_nope"],
    );
    let outcome = scenario_context().query(query).await.unwrap();
    assert_eq!(outcome.feature_count(), 0);
    assert_eq!(
        outcome.skipped().collect::<Vec<_>>(),
        vec![("nope", SkipReason::NotFound), ("also_nope", SkipReason::NotFound)]
    );
}

#[rstest]
#[case(json!({"type": "Point"}), None)]
#[case(json!({"type": "Polygon", "coordinates": [[[0, 0], [1, 1], [1, 0], [0, 1], [0, 0]]]}), None)]
#[case(json!({"type": "FeatureCollection", "features": []}), None)]
#[case(json!("POLYGON ((0 0, 1 0"), None)]
#[case(json!({"type": "Point", "coordinates": [1, 2]}), Some("nearby"))]
#[tokio::test]
async fn bad_requests_touch_nothing(#[case] geometry: Value, #[case] operation: Option<&str>) {
    let backend = Arc::new(CountingBackend::new(Duration::ZERO));
    let context = GeolayerContext::new(backend.clone(), EngineOptions::default());
    let request = GroupedQueryRequest {
        geometry,
        layers: layer_names(&["parks"]),
        operation: operation.map(str::to_string),
        crs: None,
    };

    let err = context.query_grouped(&request).await.unwrap_err();
    match operation {
        Some(_) => assert!(matches!(err, GeolayerError::InvalidPredicate(_)), "{err}"),
        None => assert!(matches!(err, GeolayerError::InvalidGeometry(_)), "{err}"),
    }
    assert!(err.is_request_fault());
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn projected_query_geometry() {
    let projected = project_lnglat(SACRAMENTO, ROADS_CRS);
    let request = GroupedQueryRequest {
        geometry: serde_json::to_value(::geojson::Geometry::new(::geojson::Value::from(
            &projected,
        )))
        .unwrap(),
        layers: layer_names(&["roads"]),
        operation: None,
        crs: Some(json!(ROADS_CRS)),
    };
    let response = scenario_context().query_grouped(&request).await.unwrap();
    assert_eq!(response.results["roads"]["count"], json!(1));
    assert!(response.skipped.is_empty());
}

#[tokio::test]
async fn state_plane_layer() {
    // California State Plane zone II, in US survey feet
    let capitol = RawFeature::new(
        Some(project_lnglat("POINT (-121.4935 38.5766)", "EPSG:2226")),
        make_attributes(&[("name", AttributeValue::from("Capitol"))]),
    );
    let landmarks = RawLayer::new("landmarks", Some(Crs::from_srid(2226)), vec![capitol]);
    let unknown = RawLayer::new(
        "unknown_crs",
        Some(Crs::from_srid(999999)),
        vec![RawFeature::new(
            Some(make_geometry("POINT (0 0)")),
            make_attributes(&[]),
        )],
    );
    let backend = MemoryBackend::new(vec![landmarks, unknown]);
    let context = GeolayerContext::new(Arc::new(backend), EngineOptions::default());

    let query = SpatialQuery::new(
        QueryGeometry::lnglat(make_geometry(SACRAMENTO)).unwrap(),
        ["landmarks", "unknown_crs"],
    );
    let outcome = context.query(query).await.unwrap();
    let features = outcome.features().collect::<Vec<_>>();
    assert_eq!(features.len(), 1);
    assert_eq!(
        features[0].attributes.get("name").and_then(|v| v.as_str()),
        Some("Capitol")
    );
    let geo_types::Geometry::Point(point) = &features[0].geometry else {
        panic!("expected a point");
    };
    assert!((point.x() + 121.4935).abs() < 1e-6, "{point:?}");
    assert!((point.y() - 38.5766).abs() < 1e-6, "{point:?}");
    assert_eq!(
        outcome.skipped().collect::<Vec<_>>(),
        vec![("unknown_crs", SkipReason::Reprojection)]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timeout_from_options() {
    let backend = Arc::new(CountingBackend::new(Duration::from_millis(400)));
    let mut options = EngineOptions::default();
    options.set("geolayer.query_timeout", "20ms").unwrap();
    let context = GeolayerContext::new(backend, options);

    let query = SpatialQuery::new(
        QueryGeometry::lnglat(make_geometry(SCENARIO_QUERY)).unwrap(),
        ["parks", "roads"],
    );
    let outcome = context.query(query).await.unwrap();
    assert_eq!(
        outcome.skipped().collect::<Vec<_>>(),
        vec![("parks", SkipReason::TimedOut), ("roads", SkipReason::TimedOut)]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_keeps_request_order() {
    let backend = Arc::new(CountingBackend::new(Duration::from_millis(400)));
    let context = GeolayerContext::new(backend, EngineOptions::default());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let query = SpatialQuery::new(
        QueryGeometry::lnglat(make_geometry(SCENARIO_QUERY)).unwrap(),
        ["missing", "parks"],
    );
    let outcome = context.query_with_cancellation(query, cancel).await.unwrap();
    assert_eq!(outcome.layers[0].layer, "missing");
    assert_eq!(
        outcome.layers[0].outcome,
        LayerOutcome::Skipped(SkipReason::NotFound)
    );
    assert_eq!(
        outcome.layers[1].outcome,
        LayerOutcome::Skipped(SkipReason::Cancelled)
    );
}

#[tokio::test]
async fn empty_and_missing_layers_contribute_nothing() {
    let roads = RawLayer::new("roads", Some(geolayer_schema::crs::lnglat()), vec![]);
    let backend = MemoryBackend::new(vec![parks_layer()]).with_layer(roads);
    let context = GeolayerContext::new(Arc::new(backend), EngineOptions::default());

    let query = SpatialQuery::new(
        QueryGeometry::lnglat(make_geometry(SCENARIO_QUERY)).unwrap(),
        ["parks", "roads", "nonexistent"],
    );
    let outcome = context.query(query).await.unwrap();
    assert_eq!(outcome.feature_count(), 1);
    assert_eq!(outcome.layers[1].outcome, LayerOutcome::Empty);
    assert_eq!(
        outcome.layers[2].outcome,
        LayerOutcome::Skipped(SkipReason::NotFound)
    );
}

#[tokio::test]
async fn empty_catalog_fails_every_operation() {
    let backend = Arc::new(CountingBackend::new(Duration::ZERO));
    let context = GeolayerContext::new(
        Arc::new(MemoryBackend::new(vec![])),
        EngineOptions::default(),
    );
    let geometry = || QueryGeometry::lnglat(make_geometry(SCENARIO_QUERY)).unwrap();

    let err = context
        .query(SpatialQuery::new(geometry(), ["parks"]))
        .await
        .unwrap_err();
    assert!(matches!(err, GeolayerError::CatalogUnavailable(_)), "{err}");
    assert!(err.is_retryable());

    let err = context.fetch_layer("parks").await.unwrap_err();
    assert!(matches!(err, GeolayerError::CatalogUnavailable(_)), "{err}");
    let err = context
        .query_layer("parks", geometry(), PredicateKind::Intersects)
        .await
        .unwrap_err();
    assert!(matches!(err, GeolayerError::CatalogUnavailable(_)), "{err}");
    let err = context.describe_layer("parks").await.unwrap_err();
    assert!(matches!(err, GeolayerError::CatalogUnavailable(_)), "{err}");

    // A populated catalog still reports unknown names as skipped
    let context = GeolayerContext::new(backend, EngineOptions::default());
    let outcome = context
        .query(SpatialQuery::new(geometry(), ["nope"]))
        .await
        .unwrap();
    assert_eq!(
        outcome.skipped().collect::<Vec<_>>(),
        vec![("nope", SkipReason::NotFound)]
    );
}

#[tokio::test]
async fn disjoint_complements_intersects() {
    // Covers both valid parks
    let everything = "POLYGON ((-123 37, -121 37, -121 38, -123 38, -123 37))";
    let context = scenario_context();
    let run = |predicate| {
        let context = context.clone();
        async move {
            let query = SpatialQuery::new(
                QueryGeometry::lnglat(make_geometry(everything)).unwrap(),
                ["parks"],
            )
            .with_predicate(predicate);
            context.query(query).await.unwrap().feature_count()
        }
    };

    assert_eq!(run(PredicateKind::Intersects).await, 2);
    assert_eq!(run(PredicateKind::Disjoint).await, 0);
}
