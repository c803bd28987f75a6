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

//! Scenario layers and on-disk GeoPackage files for tests
//!
//! The scenario is a query polygon over central San Francisco, a `parks` layer
//! with one park inside it and one in San Jose, and a `roads` layer stored in
//! California Albers (EPSG:3310) whose only road lies near Sacramento.

use std::path::{Path, PathBuf};

use geo_types::Geometry;
use geolayer_geopackage::blob::write_blob;
use geolayer_schema::{
    crs::{lnglat, Crs},
    feature::{AttributeValue, RawFeature},
    layer::RawLayer,
};
use rusqlite::{params_from_iter, types::Value, Connection};
use tempfile::TempDir;
use wkb::{writer::WriteOptions, Endianness};

use crate::create::{make_attributes, make_geometry, make_raw_feature, make_wkb, project_lnglat};

/// Query polygon covering central San Francisco
pub const SCENARIO_QUERY: &str =
    "POLYGON ((-122.5 37.7, -122.3 37.7, -122.3 37.85, -122.5 37.85, -122.5 37.7))";

/// Park inside [SCENARIO_QUERY]
pub const PARK_INSIDE: &str =
    "POLYGON ((-122.48 37.76, -122.45 37.76, -122.45 37.78, -122.48 37.78, -122.48 37.76))";

/// Park outside [SCENARIO_QUERY]
pub const PARK_OUTSIDE: &str =
    "POLYGON ((-121.9 37.3, -121.85 37.3, -121.85 37.35, -121.9 37.35, -121.9 37.3))";

/// Self-intersecting polygon that never survives validity filtering
pub const BOWTIE: &str = "POLYGON ((0 0, 1 1, 1 0, 0 1, 0 0))";

/// Road near Sacramento, as longitude/latitude
pub const ROAD: &str = "LINESTRING (-121.5 38.5, -121.45 38.55, -121.4 38.6)";

pub const ROADS_CRS: &str = "EPSG:3310";

/// GeoPackage `srs_id` under which [ROADS_CRS] is registered
pub const ROADS_SRS_ID: i32 = 3310;

/// The `parks` layer: two valid parks, one null geometry and one invalid geometry
pub fn parks_layer() -> RawLayer {
    RawLayer::new(
        "parks",
        Some(lnglat()),
        vec![
            make_raw_feature(
                Some(PARK_INSIDE),
                &[("name", "Golden Gate Park".into()), ("acres", 1017.0.into())],
            ),
            make_raw_feature(
                Some(PARK_OUTSIDE),
                &[("name", "Alum Rock Park".into()), ("acres", 720.0.into())],
            ),
            make_raw_feature(
                None,
                &[("name", "Unmapped Park".into()), ("acres", AttributeValue::Null)],
            ),
            make_raw_feature(
                Some(BOWTIE),
                &[("name", "Bowtie Park".into()), ("acres", 1.0.into())],
            ),
        ],
    )
}

/// The `roads` layer, stored in [ROADS_CRS]
pub fn roads_layer() -> RawLayer {
    RawLayer::new(
        "roads",
        Some(ROADS_CRS.parse::<Crs>().unwrap()),
        vec![RawFeature::new(
            Some(project_lnglat(ROAD, ROADS_CRS)),
            make_attributes(&[("name", "Capital Loop".into()), ("lanes", 4_i64.into())]),
        )],
    )
}

/// Every layer of the scenario
pub fn scenario_layers() -> Vec<RawLayer> {
    vec![parks_layer(), roads_layer()]
}

/// Write the scenario to a GeoPackage in a fresh temporary directory
///
/// Besides `parks` and `roads` the file holds `A_Clean_Historic_Sites` (srs_id 0),
/// `vacant` (only null geometries) and a `layer_metadata` table.
pub fn scenario_geopackage() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scenario.gpkg");
    write_scenario_geopackage(&path);
    (dir, path)
}

pub fn write_scenario_geopackage(path: &Path) {
    GeoPackageBuilder::create(path)
        .with_srs(ROADS_SRS_ID, "EPSG", 3310)
        .with_raw_layer(&parks_layer(), 4326)
        .with_raw_layer(&roads_layer(), ROADS_SRS_ID)
        .with_layer(
            "A_Clean_Historic_Sites",
            0,
            "POINT",
            &[("site", "TEXT")],
            vec![(
                Some(gpkg_geometry(0, "POINT (-122.4194 37.7749)")),
                vec!["Mission Dolores".into()],
            )],
        )
        .with_layer(
            "vacant",
            4326,
            "POLYGON",
            &[("lot", "INTEGER")],
            vec![(None, vec![1_i64.into()]), (None, vec![2_i64.into()])],
        )
        .with_metadata("Historic Sites", "<metadata>Registered historic sites</metadata>")
        .with_metadata(" PARKS ", "<metadata>City and county parks</metadata>")
        .finish();
}

/// Wrap the WKB of a WKT geometry in a GeoPackage blob header
pub fn gpkg_geometry(srs_id: i32, wkt_value: &str) -> Vec<u8> {
    write_blob(srs_id, &make_wkb(wkt_value))
}

fn gpkg_geometry_from(srs_id: i32, geometry: &Geometry) -> Vec<u8> {
    let mut wkb_bytes: Vec<u8> = vec![];
    wkb::writer::write_geometry(
        &mut wkb_bytes,
        geometry,
        &WriteOptions {
            endianness: Endianness::LittleEndian,
        },
    )
    .unwrap();
    write_blob(srs_id, &wkb_bytes)
}

/// A geometry cell and attribute values for one row of a fixture table
pub type FixtureRow = (Option<Vec<u8>>, Vec<AttributeValue>);

/// Writes minimal GeoPackage files
///
/// Only the tables a reader needs are created: `gpkg_spatial_ref_sys`,
/// `gpkg_contents`, `gpkg_geometry_columns` and the feature tables themselves.
/// Panics on any SQLite error.
pub struct GeoPackageBuilder {
    conn: Connection,
}

impl GeoPackageBuilder {
    pub fn create(path: &Path) -> Self {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE gpkg_spatial_ref_sys (
                srs_name TEXT NOT NULL,
                srs_id INTEGER PRIMARY KEY,
                organization TEXT NOT NULL,
                organization_coordsys_id INTEGER NOT NULL,
                definition TEXT NOT NULL,
                description TEXT
            );
            CREATE TABLE gpkg_contents (
                table_name TEXT NOT NULL PRIMARY KEY,
                data_type TEXT NOT NULL,
                identifier TEXT UNIQUE,
                description TEXT DEFAULT '',
                min_x DOUBLE,
                min_y DOUBLE,
                max_x DOUBLE,
                max_y DOUBLE,
                srs_id INTEGER
            );
            CREATE TABLE gpkg_geometry_columns (
                table_name TEXT NOT NULL,
                column_name TEXT NOT NULL,
                geometry_type_name TEXT NOT NULL,
                srs_id INTEGER NOT NULL,
                z TINYINT NOT NULL,
                m TINYINT NOT NULL,
                PRIMARY KEY (table_name, column_name)
            );
            INSERT INTO gpkg_spatial_ref_sys VALUES
                ('Undefined cartesian SRS', -1, 'NONE', -1, 'undefined', NULL),
                ('Undefined geographic SRS', 0, 'NONE', 0, 'undefined', NULL),
                ('WGS 84 geodetic', 4326, 'EPSG', 4326, 'undefined', NULL);",
        )
        .unwrap();
        Self { conn }
    }

    /// Register a spatial reference system
    pub fn with_srs(self, srs_id: i32, organization: &str, code: i64) -> Self {
        self.conn
            .execute(
                "INSERT INTO gpkg_spatial_ref_sys VALUES (?1, ?2, ?3, ?4, 'undefined', NULL)",
                rusqlite::params![
                    format!("{organization}:{code}"),
                    srs_id,
                    organization,
                    code
                ],
            )
            .unwrap();
        self
    }

    /// Add a feature table with a `fid` primary key and a `geom` geometry column
    pub fn with_layer(
        self,
        name: &str,
        srs_id: i32,
        geometry_type: &str,
        columns: &[(&str, &str)],
        rows: Vec<FixtureRow>,
    ) -> Self {
        let table = quote(name);
        let column_defs = columns
            .iter()
            .map(|(column, declared_type)| format!(", {} {declared_type}", quote(column)))
            .collect::<String>();
        self.conn
            .execute_batch(&format!(
                "CREATE TABLE {table} (fid INTEGER PRIMARY KEY AUTOINCREMENT, geom BLOB{column_defs});"
            ))
            .unwrap();
        self.conn
            .execute(
                "INSERT INTO gpkg_contents (table_name, data_type, identifier, srs_id) \
                 VALUES (?1, 'features', ?1, ?2)",
                rusqlite::params![name, srs_id],
            )
            .unwrap();
        self.conn
            .execute(
                "INSERT INTO gpkg_geometry_columns VALUES (?1, 'geom', ?2, ?3, 0, 0)",
                rusqlite::params![name, geometry_type, srs_id],
            )
            .unwrap();

        let column_list = std::iter::once("geom".to_string())
            .chain(columns.iter().map(|(column, _)| quote(column)))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len() + 1)
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("INSERT INTO {table} ({column_list}) VALUES ({placeholders})");
        for (geometry, values) in rows {
            let cells = std::iter::once(geometry.map(Value::Blob).unwrap_or(Value::Null))
                .chain(values.into_iter().map(sql_value));
            self.conn.execute(&sql, params_from_iter(cells)).unwrap();
        }

        self
    }

    /// Add a feature table holding the features of a [RawLayer]
    ///
    /// Attribute columns and their types are taken from the first feature.
    pub fn with_raw_layer(self, layer: &RawLayer, srs_id: i32) -> Self {
        let columns = layer
            .features
            .first()
            .map(|feature| {
                feature
                    .attributes
                    .iter()
                    .map(|(name, value)| (name.to_string(), declared_type(value)))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let column_refs = columns
            .iter()
            .map(|(name, declared)| (name.as_str(), *declared))
            .collect::<Vec<_>>();

        let rows = layer
            .features
            .iter()
            .map(|feature| {
                let geometry = feature
                    .geometry
                    .as_ref()
                    .map(|geometry| gpkg_geometry_from(srs_id, geometry));
                let values = feature
                    .attributes
                    .iter()
                    .map(|(_, value)| value.clone())
                    .collect();
                (geometry, values)
            })
            .collect();

        self.with_layer(&layer.name, srs_id, "GEOMETRY", &column_refs, rows)
    }

    /// Add a row to the `layer_metadata` table, creating it on first use
    pub fn with_metadata(self, layer_name: &str, text: &str) -> Self {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS layer_metadata (
                    layer_name TEXT,
                    xml_metadata TEXT
                );",
            )
            .unwrap();
        self.conn
            .execute(
                "INSERT INTO layer_metadata VALUES (?1, ?2)",
                rusqlite::params![layer_name, text],
            )
            .unwrap();
        self
    }

    /// Run arbitrary SQL against the file being built
    pub fn with_sql(self, sql: &str) -> Self {
        self.conn.execute_batch(sql).unwrap();
        self
    }

    pub fn finish(self) {
        self.conn.close().map_err(|(_, err)| err).unwrap();
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn sql_value(value: AttributeValue) -> Value {
    match value {
        AttributeValue::Null => Value::Null,
        AttributeValue::Integer(value) => Value::Integer(value),
        AttributeValue::Real(value) => Value::Real(value),
        AttributeValue::Text(value) => Value::Text(value),
    }
}

fn declared_type(value: &AttributeValue) -> &'static str {
    match value {
        AttributeValue::Integer(_) => "INTEGER",
        AttributeValue::Real(_) | AttributeValue::Null => "REAL",
        AttributeValue::Text(_) => "TEXT",
    }
}

/// [SCENARIO_QUERY] as a geometry
pub fn scenario_query_geometry() -> Geometry {
    make_geometry(SCENARIO_QUERY)
}
