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
use std::str::FromStr;

use geo_types::Geometry;
use geolayer_geometry::transform::{transform_geometry, CrsEngine};
use geolayer_proj::transform::ProjCrsEngine;
use geolayer_schema::feature::{AttributeValue, Attributes, Feature, RawFeature};
use wkb::{writer::WriteOptions, Endianness};
use wkt::{TryFromWkt, Wkt};

/// Create a WKB from a WKT string.
///
/// Panics on invalid WKT.
pub fn make_wkb(wkt_value: &str) -> Vec<u8> {
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

/// Create a [Geometry] from a WKT string.
///
/// Panics on invalid WKT.
pub fn make_geometry(wkt_value: &str) -> Geometry {
    Geometry::try_from_wkt_str(wkt_value).unwrap()
}

/// Create a [Feature] from a WKT string and attribute pairs
pub fn make_feature(wkt_value: &str, attributes: &[(&str, AttributeValue)]) -> Feature {
    Feature::new(make_geometry(wkt_value), make_attributes(attributes))
}

/// Create a [RawFeature] from an optional WKT string and attribute pairs
pub fn make_raw_feature(
    wkt_value: Option<&str>,
    attributes: &[(&str, AttributeValue)],
) -> RawFeature {
    RawFeature::new(wkt_value.map(make_geometry), make_attributes(attributes))
}

pub fn make_attributes(attributes: &[(&str, AttributeValue)]) -> Attributes {
    attributes
        .iter()
        .map(|(name, value)| (*name, value.clone()))
        .collect()
}

/// Reproject a longitude/latitude WKT geometry into `to` with the default engine
///
/// Panics if the engine has no definition for `to`.
pub fn project_lnglat(wkt_value: &str, to: &str) -> Geometry {
    let transform = ProjCrsEngine
        .get_transform_crs_to_crs("EPSG:4326", to)
        .unwrap();
    transform_geometry(&make_geometry(wkt_value), transform.as_ref()).unwrap()
}
