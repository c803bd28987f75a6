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
use geo::{HasDimensions, Validation};
use geo_types::Geometry;

/// Whether a geometry may participate in a spatial predicate
///
/// A participating geometry is non-empty, has only finite coordinates, and is
/// topologically valid (closed, non self-intersecting rings and so on).
pub fn is_participating(geom: &Geometry) -> bool {
    !geom.is_empty() && has_finite_coords(geom) && geom.is_valid()
}

/// Why a geometry may not participate in a spatial predicate, if it may not
pub fn participation_error(geom: &Geometry) -> Option<String> {
    let type_name = geometry_type_name(geom);
    if geom.is_empty() {
        return Some(format!("{type_name} is empty"));
    }
    if !has_finite_coords(geom) {
        return Some(format!("{type_name} has non-finite coordinates"));
    }

    geom.validation_errors()
        .first()
        .map(|err| format!("{type_name} is not valid: {err}"))
}

fn has_finite_coords(geom: &Geometry) -> bool {
    use geo::CoordsIter;
    geom.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite())
}

/// Human readable name of a geometry's type, matching the OGC spelling
pub fn geometry_type_name(geom: &Geometry) -> &'static str {
    match geom {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "LineString",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Polygon",
        Geometry::Triangle(_) => "Polygon",
    }
}
