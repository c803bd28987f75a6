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
use std::fmt;
use std::str::FromStr;

use geo::{BoundingRect, Intersects, Relate};
use geo_types::Geometry;
use geolayer_schema::{feature::Feature, layer::Layer};
use serde::{Deserialize, Serialize};

use crate::error::GeolayerError;
use crate::query_geometry::QueryGeometry;

/// Spatial relation between a layer feature and the query geometry
///
/// Relations read as `feature <relation> query`: [PredicateKind::Within] selects
/// features lying within the query geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredicateKind {
    #[default]
    Intersects,
    Within,
    Contains,
    Touches,
    Crosses,
    Overlaps,
    Equals,
    Disjoint,
}

impl PredicateKind {
    pub const ALL: [PredicateKind; 8] = [
        PredicateKind::Intersects,
        PredicateKind::Within,
        PredicateKind::Contains,
        PredicateKind::Touches,
        PredicateKind::Crosses,
        PredicateKind::Overlaps,
        PredicateKind::Equals,
        PredicateKind::Disjoint,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "intersects" => Some(PredicateKind::Intersects),
            "within" => Some(PredicateKind::Within),
            "contains" => Some(PredicateKind::Contains),
            "touches" => Some(PredicateKind::Touches),
            "crosses" => Some(PredicateKind::Crosses),
            "overlaps" => Some(PredicateKind::Overlaps),
            "equals" => Some(PredicateKind::Equals),
            "disjoint" => Some(PredicateKind::Disjoint),
            _ => None,
        }
    }

    /// Parse an optional predicate name, defaulting to [PredicateKind::Intersects]
    pub fn parse_or_default(name: Option<&str>) -> Result<Self, GeolayerError> {
        name.map(str::parse).unwrap_or(Ok(PredicateKind::default()))
    }

    /// Whether features whose bounding rectangle misses the query's can satisfy the
    /// relation
    pub fn holds_when_apart(&self) -> bool {
        matches!(self, PredicateKind::Disjoint)
    }

    pub fn evaluator(&self) -> &'static dyn RelationEvaluator {
        match self {
            PredicateKind::Intersects => &IntersectsEvaluator,
            PredicateKind::Within => &WithinEvaluator,
            PredicateKind::Contains => &ContainsEvaluator,
            PredicateKind::Touches => &TouchesEvaluator,
            PredicateKind::Crosses => &CrossesEvaluator,
            PredicateKind::Overlaps => &OverlapsEvaluator,
            PredicateKind::Equals => &EqualsEvaluator,
            PredicateKind::Disjoint => &DisjointEvaluator,
        }
    }
}

impl FromStr for PredicateKind {
    type Err = GeolayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| GeolayerError::InvalidPredicate(s.to_string()))
    }
}

impl fmt::Display for PredicateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicateKind::Intersects => write!(f, "intersects"),
            PredicateKind::Within => write!(f, "within"),
            PredicateKind::Contains => write!(f, "contains"),
            PredicateKind::Touches => write!(f, "touches"),
            PredicateKind::Crosses => write!(f, "crosses"),
            PredicateKind::Overlaps => write!(f, "overlaps"),
            PredicateKind::Equals => write!(f, "equals"),
            PredicateKind::Disjoint => write!(f, "disjoint"),
        }
    }
}

pub trait RelationEvaluator: fmt::Debug + Send + Sync {
    fn predicate_type(&self) -> PredicateKind;

    /// Evaluate `feature <relation> query`
    fn evaluate(&self, feature: &Geometry, query: &Geometry) -> bool;
}

/// Macro to generate relation evaluators that use the relate() method
macro_rules! impl_relate_evaluator {
    ($struct_name:ident, $relation_type:path, $method:ident) => {
        #[derive(Debug)]
        pub struct $struct_name;

        impl RelationEvaluator for $struct_name {
            fn predicate_type(&self) -> PredicateKind {
                $relation_type
            }

            fn evaluate(&self, feature: &Geometry, query: &Geometry) -> bool {
                feature.relate(query).$method()
            }
        }
    };
}

impl_relate_evaluator!(IntersectsEvaluator, PredicateKind::Intersects, is_intersects);
impl_relate_evaluator!(WithinEvaluator, PredicateKind::Within, is_within);
impl_relate_evaluator!(ContainsEvaluator, PredicateKind::Contains, is_contains);
impl_relate_evaluator!(TouchesEvaluator, PredicateKind::Touches, is_touches);
impl_relate_evaluator!(CrossesEvaluator, PredicateKind::Crosses, is_crosses);
impl_relate_evaluator!(OverlapsEvaluator, PredicateKind::Overlaps, is_overlaps);
impl_relate_evaluator!(EqualsEvaluator, PredicateKind::Equals, is_equal_topo);
impl_relate_evaluator!(DisjointEvaluator, PredicateKind::Disjoint, is_disjoint);

/// Evaluate `kind` for every feature of `layer`, in feature order
///
/// Features whose bounding rectangle does not meet the query's are answered without
/// computing the full intersection matrix.
pub fn evaluate(query: &QueryGeometry, layer: &Layer, kind: PredicateKind) -> Vec<bool> {
    let evaluator = kind.evaluator();
    let query_bounds = query.bounds();
    layer
        .iter()
        .map(|feature| {
            let apart = match (query_bounds, feature.geometry.bounding_rect()) {
                (Some(query_rect), Some(feature_rect)) => !query_rect.intersects(&feature_rect),
                _ => false,
            };
            if apart {
                kind.holds_when_apart()
            } else {
                evaluator.evaluate(&feature.geometry, query.geometry())
            }
        })
        .collect()
}

/// The features of `layer` satisfying `kind`, in feature order
pub fn select(query: &QueryGeometry, layer: Layer, kind: PredicateKind) -> Vec<Feature> {
    let mask = evaluate(query, &layer, kind);
    layer
        .features
        .into_iter()
        .zip(mask)
        .filter_map(|(feature, matched)| matched.then_some(feature))
        .collect()
}

#[cfg(test)]
mod tests {
    use geolayer_schema::{crs::lnglat, feature::AttributeValue};
    use geolayer_testing::create::{make_feature, make_geometry};
    use rstest::rstest;

    use super::*;

    const QUERY: &str = "POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))";

    fn query() -> QueryGeometry {
        QueryGeometry::from_wkt(QUERY, lnglat()).unwrap()
    }

    fn layer(wkt_values: &[&str]) -> Layer {
        Layer::new(
            "test",
            Some(lnglat()),
            wkt_values
                .iter()
                .enumerate()
                .map(|(i, wkt_value)| make_feature(wkt_value, &[("id", (i as i64).into())]))
                .collect(),
        )
    }

    #[rstest]
    #[case("intersects", PredicateKind::Intersects)]
    #[case("Within", PredicateKind::Within)]
    #[case(" CONTAINS ", PredicateKind::Contains)]
    #[case("touches", PredicateKind::Touches)]
    #[case("crosses", PredicateKind::Crosses)]
    #[case("overlaps", PredicateKind::Overlaps)]
    #[case("equals", PredicateKind::Equals)]
    #[case("disjoint", PredicateKind::Disjoint)]
    fn parse(#[case] name: &str, #[case] expected: PredicateKind) {
        let parsed: PredicateKind = name.parse().unwrap();
        assert_eq!(parsed, expected);
        assert_eq!(parsed.to_string().parse::<PredicateKind>().unwrap(), parsed);
        assert_eq!(parsed.evaluator().predicate_type(), parsed);
    }

    #[rstest]
    #[case("near")]
    #[case("")]
    #[case("st_intersects")]
    fn parse_invalid(#[case] name: &str) {
        let err = name.parse::<PredicateKind>().unwrap_err();
        assert!(matches!(err, GeolayerError::InvalidPredicate(n) if n == name));
    }

    #[test]
    fn default_and_optional() {
        assert_eq!(
            PredicateKind::parse_or_default(None).unwrap(),
            PredicateKind::Intersects
        );
        assert_eq!(
            PredicateKind::parse_or_default(Some("within")).unwrap(),
            PredicateKind::Within
        );
        assert!(PredicateKind::parse_or_default(Some("beside")).is_err());
    }

    #[test]
    fn serde_names() {
        assert_eq!(
            serde_json::to_string(&PredicateKind::Disjoint).unwrap(),
            "\"disjoint\""
        );
        let kind: PredicateKind = serde_json::from_str("\"overlaps\"").unwrap();
        assert_eq!(kind, PredicateKind::Overlaps);
    }

    #[rstest]
    // inside, crossing the boundary, sharing an edge, far away, equal to the query
    #[case(PredicateKind::Intersects, vec![true, true, true, false, true])]
    #[case(PredicateKind::Within, vec![true, false, false, false, true])]
    #[case(PredicateKind::Contains, vec![false, false, false, false, true])]
    #[case(PredicateKind::Touches, vec![false, false, true, false, false])]
    #[case(PredicateKind::Overlaps, vec![false, true, false, false, false])]
    #[case(PredicateKind::Equals, vec![false, false, false, false, true])]
    #[case(PredicateKind::Disjoint, vec![false, false, false, true, false])]
    fn polygon_relations(#[case] kind: PredicateKind, #[case] expected: Vec<bool>) {
        let layer = layer(&[
            "POLYGON ((2 2, 4 2, 4 4, 2 4, 2 2))",
            "POLYGON ((8 8, 12 8, 12 12, 8 12, 8 8))",
            "POLYGON ((10 0, 12 0, 12 2, 10 2, 10 0))",
            "POLYGON ((50 50, 51 50, 51 51, 50 51, 50 50))",
            QUERY,
        ]);
        assert_eq!(evaluate(&query(), &layer, kind), expected);
    }

    #[test]
    fn crossing_line() {
        let layer = layer(&["LINESTRING (-5 5, 15 5)", "LINESTRING (2 2, 3 3)"]);
        assert_eq!(
            evaluate(&query(), &layer, PredicateKind::Crosses),
            vec![true, false]
        );
    }

    #[test]
    fn query_inside_feature() {
        let layer = layer(&["POLYGON ((-10 -10, 20 -10, 20 20, -10 20, -10 -10))"]);
        assert_eq!(
            evaluate(&query(), &layer, PredicateKind::Contains),
            vec![true]
        );
        assert_eq!(
            evaluate(&query(), &layer, PredicateKind::Within),
            vec![false]
        );
    }

    #[test]
    fn prefilter_agrees_with_relate() {
        let layer = layer(&[
            "POINT (20 20)",
            "LINESTRING (11 -5, 11 15)",
            "POLYGON ((-3 -3, -1 -3, -1 -1, -3 -1, -3 -3))",
        ]);
        let query = query();
        for kind in PredicateKind::ALL {
            let expected = layer
                .iter()
                .map(|feature| kind.evaluator().evaluate(&feature.geometry, query.geometry()))
                .collect::<Vec<_>>();
            assert_eq!(evaluate(&query, &layer, kind), expected, "{kind}");
        }
    }

    #[test]
    fn disjoint_and_intersects_partition() {
        let layer = layer(&[
            "POINT (5 5)",
            "POINT (10 10)",
            "POINT (11 11)",
            "LINESTRING (-1 5, 1 5)",
            "MULTIPOINT ((20 20), (30 30))",
        ]);
        let query = query();
        let intersects = evaluate(&query, &layer, PredicateKind::Intersects);
        let disjoint = evaluate(&query, &layer, PredicateKind::Disjoint);
        for (i, d) in intersects.iter().zip(disjoint.iter()) {
            assert_ne!(i, d);
        }
    }

    #[test]
    fn select_preserves_order() {
        let layer = layer(&[
            "POINT (1 1)",
            "POINT (20 20)",
            "POINT (2 2)",
            "POINT (3 3)",
        ]);
        let selected = select(&query(), layer, PredicateKind::Intersects);
        let ids = selected
            .iter()
            .map(|feature| feature.attributes.get("id").cloned())
            .collect::<Vec<_>>();
        assert_eq!(
            ids,
            vec![
                Some(AttributeValue::from(0_i64)),
                Some(AttributeValue::from(2_i64)),
                Some(AttributeValue::from(3_i64))
            ]
        );
        assert_eq!(selected[0].geometry, make_geometry("POINT (1 1)"));
    }
}
