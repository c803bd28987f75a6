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
use geo_traits::{
    to_geo::{
        ToGeoLineString, ToGeoMultiLineString, ToGeoMultiPoint, ToGeoMultiPolygon, ToGeoPoint,
        ToGeoPolygon,
    },
    GeometryCollectionTrait, GeometryTrait,
    GeometryType::*,
};
use geo_types::Geometry;

use crate::error::GeolayerGeometryError;

/// Parse a well-known binary blob into a [Geometry]
pub fn read_wkb_geometry(wkb_bytes: &[u8]) -> Result<Geometry, GeolayerGeometryError> {
    let wkb = wkb::reader::read_wkb(wkb_bytes)
        .map_err(|e| GeolayerGeometryError::External(Box::new(e)))?;
    item_to_geometry(wkb)
}

/// Convert a [GeometryTrait] into a [Geometry]
///
/// Note that [Geometry] does not support all valid [GeometryTrait] objects (notably: the
/// empty point and a multipoint with an empty child). Those are reported as errors so that
/// callers can treat the feature as having no usable geometry.
pub fn item_to_geometry(geo: impl GeometryTrait<T = f64>) -> Result<Geometry, GeolayerGeometryError> {
    if let Some(geo) = to_geometry(geo) {
        Ok(geo)
    } else {
        Err(GeolayerGeometryError::Invalid(format!(
            "Conversion of {}, {}, or {} not supported",
            "MULTIPOINT with EMPTY child", "POINT EMPTY", "nested GEOMETRYCOLLECTION with EMPTY"
        )))
    }
}

// GeometryCollection has a recursive definition that some compiler versions fail to
// resolve through the trait helpers, so collections go through a free function.
fn to_geometry(item: impl GeometryTrait<T = f64>) -> Option<Geometry> {
    match item.as_type() {
        Point(geom) => geom.try_to_point().map(Geometry::Point),
        LineString(geom) => Some(Geometry::LineString(geom.to_line_string())),
        Polygon(geom) => Some(Geometry::Polygon(geom.to_polygon())),
        MultiPoint(geom) => geom.try_to_multi_point().map(Geometry::MultiPoint),
        MultiLineString(geom) => Some(Geometry::MultiLineString(geom.to_multi_line_string())),
        MultiPolygon(geom) => Some(Geometry::MultiPolygon(geom.to_multi_polygon())),
        GeometryCollection(geom) => geometry_collection_to_geometry(geom),
        _ => None,
    }
}

fn geometry_collection_to_geometry<GC: GeometryCollectionTrait<T = f64>>(
    geom: &GC,
) -> Option<Geometry> {
    let geometries = geom
        .geometries()
        .filter_map(|child| match child.as_type() {
            Point(geom) => geom.try_to_point().map(Geometry::Point),
            LineString(geom) => Some(Geometry::LineString(geom.to_line_string())),
            Polygon(geom) => Some(Geometry::Polygon(geom.to_polygon())),
            MultiPoint(geom) => geom.try_to_multi_point().map(Geometry::MultiPoint),
            MultiLineString(geom) => Some(Geometry::MultiLineString(geom.to_multi_line_string())),
            MultiPolygon(geom) => Some(Geometry::MultiPolygon(geom.to_multi_polygon())),
            GeometryCollection(geom) => geometry_collection_to_geometry(geom),
            _ => None,
        })
        .collect::<Vec<_>>();

    // A failed child fails the whole collection
    if geometries.len() != geom.num_geometries() {
        return None;
    }

    Some(Geometry::GeometryCollection(geo_types::GeometryCollection(
        geometries,
    )))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use std::str::FromStr;
    use wkb::{writer::WriteOptions, Endianness};
    use wkt::{TryFromWkt, Wkt};

    use super::*;

    fn make_wkb(wkt_value: &str) -> Vec<u8> {
        let geom = Wkt::<f64>::from_str(wkt_value).unwrap();
        let mut out: Vec<u8> = vec![];
        wkb::writer::write_geometry(
            &mut out,
            &geom,
            &WriteOptions {
                endianness: Endianness::LittleEndian,
            },
        )
        .unwrap();
        out
    }

    #[test]
    fn unsupported() {
        let unsupported = Wkt::from_str("POINT EMPTY").unwrap();
        let err = item_to_geometry(unsupported).unwrap_err();
        assert!(err.to_string().starts_with("Conversion of"));

        let unsupported = Wkt::from_str("GEOMETRYCOLLECTION (POINT EMPTY)").unwrap();
        assert!(item_to_geometry(unsupported).is_err());
    }

    #[test]
    fn garbage_wkb() {
        assert!(read_wkb_geometry(&[0x01, 0x02, 0x03]).is_err());
        assert!(read_wkb_geometry(&[]).is_err());
    }

    #[rstest]
    fn wkb_to_geometry(
        #[values(
            "POINT (0 1)",
            "LINESTRING (1 2, 3 4)",
            "POLYGON ((0 0, 1 0, 0 1, 0 0))",
            "MULTIPOINT ((0 0), (1 1))",
            "MULTILINESTRING ((1 2, 3 4), (5 6, 7 8))",
            "MULTIPOLYGON (((0 0, 1 0, 0 1, 0 0)), ((10 10, 11 10, 10 11, 10 10)))",
            "GEOMETRYCOLLECTION (POINT (0 1), LINESTRING (1 2, 3 4))"
        )]
        wkt_value: &str,
    ) {
        let expected = Geometry::<f64>::try_from_wkt_str(wkt_value).unwrap();
        let actual = read_wkb_geometry(&make_wkb(wkt_value)).unwrap();
        assert_eq!(actual, expected);
    }
}
