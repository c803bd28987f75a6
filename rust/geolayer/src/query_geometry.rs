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
use geo::BoundingRect;
use geo_types::{Geometry, Rect};
use geojson::GeoJson;
use geolayer_geometry::validity::participation_error;
use geolayer_schema::crs::{lnglat, Crs};
use serde_json::Value;
use wkt::TryFromWkt;

use crate::error::{GeolayerError, Result};
use crate::normalize::CrsNormalizer;

/// A caller supplied geometry that layers are compared against
///
/// Construction guarantees a non-empty, finite and topologically valid geometry, so a
/// [QueryGeometry] can never reach the catalog or the store in an unusable state.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryGeometry {
    geometry: Geometry,
    crs: Crs,
    bounds: Option<Rect>,
}

impl QueryGeometry {
    pub fn new(geometry: Geometry, crs: Crs) -> Result<Self> {
        if let Some(reason) = participation_error(&geometry) {
            return Err(GeolayerError::InvalidGeometry(reason));
        }

        let bounds = geometry.bounding_rect();
        Ok(Self {
            geometry,
            crs,
            bounds,
        })
    }

    /// A geometry in longitude/latitude
    pub fn lnglat(geometry: Geometry) -> Result<Self> {
        Self::new(geometry, lnglat())
    }

    pub fn from_wkt(wkt_value: &str, crs: Crs) -> Result<Self> {
        let geometry = Geometry::<f64>::try_from_wkt_str(wkt_value.trim())
            .map_err(|err| GeolayerError::InvalidGeometry(format!("Can't parse WKT: {err}")))?;
        Self::new(geometry, crs)
    }

    /// A GeoJSON Feature or geometry object, always longitude/latitude
    ///
    /// A JSON string is read as WKT.
    pub fn from_geojson(value: &Value) -> Result<Self> {
        if let Value::String(wkt_value) = value {
            return Self::from_wkt(wkt_value, lnglat());
        }

        let geojson = GeoJson::from_json_value(value.clone())
            .map_err(|err| GeolayerError::InvalidGeometry(format!("Can't parse GeoJSON: {err}")))?;
        let geojson_geometry = match geojson {
            GeoJson::Geometry(geometry) => geometry,
            GeoJson::Feature(feature) => feature.geometry.ok_or_else(|| {
                GeolayerError::InvalidGeometry("GeoJSON Feature has no geometry".to_string())
            })?,
            GeoJson::FeatureCollection(_) => {
                return Err(GeolayerError::InvalidGeometry(
                    "Expected a single GeoJSON Feature or geometry, not a FeatureCollection"
                        .to_string(),
                ))
            }
        };

        let geometry = Geometry::<f64>::try_from(geojson_geometry).map_err(|err| {
            GeolayerError::InvalidGeometry(format!("Unsupported GeoJSON geometry: {err}"))
        })?;
        Self::lnglat(geometry)
    }

    /// GeoJSON text when it looks like a JSON object, WKT otherwise
    pub fn parse(text: &str, crs: Option<Crs>) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.starts_with('{') {
            let value: Value = serde_json::from_str(trimmed)
                .map_err(|err| GeolayerError::InvalidGeometry(format!("Can't parse JSON: {err}")))?;
            let geometry = Self::from_geojson(&value)?;
            match crs {
                Some(crs) => Self::new(geometry.geometry, crs),
                None => Ok(geometry),
            }
        } else {
            Self::from_wkt(trimmed, crs.unwrap_or_else(lnglat))
        }
    }

    /// Declare the reference system of the coordinates, leaving them untouched
    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = crs;
        self
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Bounding rectangle of the geometry
    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    /// Reproject into the normalizer's target CRS
    ///
    /// A geometry that cannot be reprojected, or that is no longer valid afterwards,
    /// is an invalid query geometry.
    pub fn normalized(self, normalizer: &CrsNormalizer) -> Result<Self> {
        if self.crs == *normalizer.target() {
            return Ok(self);
        }

        let geometry = normalizer
            .normalize_geometry(self.geometry, &self.crs)
            .map_err(|err| {
                GeolayerError::InvalidGeometry(format!(
                    "Can't reproject query geometry from {} to {}: {err}",
                    self.crs,
                    normalizer.target()
                ))
            })?;
        Self::new(geometry, normalizer.target().clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use geolayer_proj::transform::ProjCrsEngine;
    use geolayer_testing::create::make_geometry;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[test]
    fn geojson_feature_and_geometry() {
        let feature = json!({
            "type": "Feature",
            "properties": {},
            "geometry": {"type": "Point", "coordinates": [-122.4, 37.8]}
        });
        let from_feature = QueryGeometry::from_geojson(&feature).unwrap();
        assert_eq!(from_feature.geometry(), &make_geometry("POINT (-122.4 37.8)"));
        assert_eq!(from_feature.crs(), &lnglat());

        let geometry = json!({"type": "Point", "coordinates": [-122.4, 37.8]});
        assert_eq!(QueryGeometry::from_geojson(&geometry).unwrap(), from_feature);

        let wkt_value = json!("POINT (-122.4 37.8)");
        assert_eq!(QueryGeometry::from_geojson(&wkt_value).unwrap(), from_feature);
    }

    #[rstest]
    #[case(json!({"type": "Feature", "properties": {}, "geometry": null}))]
    #[case(json!({"type": "FeatureCollection", "features": []}))]
    #[case(json!({"type": "Polygon", "coordinates": [[[0, 0], [1, 1], [1, 0], [0, 1], [0, 0]]]}))]
    #[case(json!({"type": "Pentagon", "coordinates": []}))]
    #[case(json!({"type": "Point"}))]
    #[case(json!(42))]
    #[case(json!("POLYGON ((0 0, 1 0"))]
    #[case(json!("POLYGON EMPTY"))]
    fn invalid(#[case] value: Value) {
        let err = QueryGeometry::from_geojson(&value).unwrap_err();
        assert!(matches!(err, GeolayerError::InvalidGeometry(_)), "{value}");
    }

    #[test]
    fn parse_text() {
        let from_json = QueryGeometry::parse(r#"{"type": "Point", "coordinates": [1, 2]}"#, None).unwrap();
        let from_wkt = QueryGeometry::parse(" POINT (1 2) ", None).unwrap();
        assert_eq!(from_json, from_wkt);

        let projected = QueryGeometry::parse("POINT (1 2)", Some(Crs::from_srid(3857))).unwrap();
        assert_eq!(projected.crs(), &Crs::from_srid(3857));

        assert!(QueryGeometry::parse("{not json", None).is_err());
    }

    #[test]
    fn bounds() {
        let query = QueryGeometry::from_wkt("LINESTRING (0 0, 2 3)", lnglat()).unwrap();
        let bounds = query.bounds().unwrap();
        assert_eq!(bounds.min(), geo_types::coord! { x: 0.0, y: 0.0 });
        assert_eq!(bounds.max(), geo_types::coord! { x: 2.0, y: 3.0 });
    }

    #[test]
    fn normalized() {
        let normalizer = CrsNormalizer::new(Arc::new(ProjCrsEngine), lnglat());
        let query = QueryGeometry::from_wkt("POINT (0 0)", lnglat()).unwrap();
        assert_eq!(query.clone().normalized(&normalizer).unwrap(), query);

        let projected = QueryGeometry::from_wkt("POINT (0 -4000000)", Crs::from_srid(3310))
            .unwrap()
            .normalized(&normalizer)
            .unwrap();
        assert_eq!(projected.crs(), &lnglat());
        let Geometry::Point(point) = projected.geometry() else {
            panic!("expected a point");
        };
        assert!((point.x() + 120.0).abs() < 1e-5);
        assert!(point.y().abs() < 1e-5);

        let unsupported = QueryGeometry::from_wkt("POINT (0 0)", Crs::from_srid(999999))
            .unwrap()
            .normalized(&normalizer);
        assert!(matches!(unsupported, Err(GeolayerError::InvalidGeometry(_))));
    }
}
