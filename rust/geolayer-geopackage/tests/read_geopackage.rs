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
use geolayer_geopackage::{blob::write_blob, GeoPackage, GpkgError};
use geolayer_schema::{
    crs::{lnglat, Crs},
    feature::AttributeValue,
};
use geolayer_testing::{
    create::make_wkb,
    fixtures::{scenario_geopackage, GeoPackageBuilder, PARK_INSIDE},
};
use rstest::rstest;
use tempfile::TempDir;

#[test]
fn list_layers() {
    let (_dir, path) = scenario_geopackage();
    let gpkg = GeoPackage::open(&path).unwrap();
    assert_eq!(
        gpkg.list_layers().unwrap(),
        vec!["A_Clean_Historic_Sites", "parks", "roads", "vacant"]
    );
}

#[test]
fn read_parks() {
    let (_dir, path) = scenario_geopackage();
    let gpkg = GeoPackage::open(&path).unwrap();
    let layer = gpkg.read_layer("parks").unwrap();

    assert_eq!(layer.name, "parks");
    assert_eq!(layer.crs, Some(lnglat()));
    assert_eq!(layer.features.len(), 4);

    let first = &layer.features[0];
    assert_eq!(
        first.attributes.names().collect::<Vec<_>>(),
        vec!["name", "acres"]
    );
    assert_eq!(
        first.attributes.get("name"),
        Some(&AttributeValue::from("Golden Gate Park"))
    );
    assert_eq!(
        first.geometry,
        Some(geolayer_testing::create::make_geometry(PARK_INSIDE))
    );

    // Null geometry survives reading; filtering happens in the engine
    assert!(layer.features[2].geometry.is_none());
    assert_eq!(layer.features[2].attributes.get("acres"), Some(&AttributeValue::Null));
    assert!(layer.features[3].geometry.is_some());
}

#[rstest]
#[case("roads", Some(Crs::from_srid(3310)))]
#[case("A_Clean_Historic_Sites", Some(lnglat()))]
#[case("PARKS", Some(lnglat()))]
fn layer_crs(#[case] name: &str, #[case] expected: Option<Crs>) {
    let (_dir, path) = scenario_geopackage();
    let gpkg = GeoPackage::open(&path).unwrap();
    assert_eq!(gpkg.read_layer(name).unwrap().crs, expected);
}

#[test]
fn describe() {
    let (_dir, path) = scenario_geopackage();
    let gpkg = GeoPackage::open(&path).unwrap();
    let info = gpkg.describe_layer("roads").unwrap();
    assert_eq!(info.name, "roads");
    assert_eq!(info.driver, "GPKG");
    assert_eq!(info.crs, Some(Crs::from_srid(3310)));
    assert_eq!(info.geometry_column.as_deref(), Some("geom"));
    assert_eq!(info.feature_count, 1);
    assert_eq!(
        info.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        vec!["name", "lanes"]
    );

    let vacant = gpkg.describe_layer("vacant").unwrap();
    assert_eq!(vacant.feature_count, 2);
    assert_eq!(vacant.geometry_type.as_deref(), Some("POLYGON"));
}

#[test]
fn missing_layer() {
    let (_dir, path) = scenario_geopackage();
    let gpkg = GeoPackage::open(&path).unwrap();
    assert!(matches!(
        gpkg.read_layer("nonexistent"),
        Err(GpkgError::LayerNotFound(name)) if name == "nonexistent"
    ));
    assert!(matches!(
        gpkg.describe_layer("nonexistent"),
        Err(GpkgError::LayerNotFound(_))
    ));
}

#[test]
fn undecodable_geometry_is_none() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.gpkg");
    GeoPackageBuilder::create(&path)
        .with_layer(
            "broken",
            -1,
            "POINT",
            &[("id", "INTEGER")],
            vec![
                (Some(vec![0x47, 0x50, 0x00]), vec![1_i64.into()]),
                (Some(write_blob(-1, &make_wkb("POINT (1 2)"))), vec![2_i64.into()]),
            ],
        )
        .finish();

    let gpkg = GeoPackage::open(&path).unwrap();
    let layer = gpkg.read_layer("broken").unwrap();
    assert_eq!(layer.crs, None);
    assert!(layer.features[0].geometry.is_none());
    assert!(layer.features[1].geometry.is_some());
}

#[test]
fn missing_geometry_column() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("no_geom.gpkg");
    GeoPackageBuilder::create(&path)
        .with_sql(
            "CREATE TABLE plain (fid INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO gpkg_contents (table_name, data_type) VALUES ('plain', 'features');",
        )
        .finish();

    let gpkg = GeoPackage::open(&path).unwrap();
    assert!(matches!(
        gpkg.read_layer("plain"),
        Err(GpkgError::MissingGeometryColumn(_))
    ));
}

#[test]
fn not_a_geopackage() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plain.sqlite");
    rusqlite::Connection::open(&path)
        .unwrap()
        .execute_batch("CREATE TABLE t (x INTEGER);")
        .unwrap();
    assert!(GeoPackage::open(&path).is_err());
}

#[test]
fn metadata_entries() {
    let (_dir, path) = scenario_geopackage();
    let gpkg = GeoPackage::open(&path).unwrap();
    let entries = gpkg.metadata_entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].layer_name, "Historic Sites");
    assert_eq!(
        entries[1].text.as_deref(),
        Some("<metadata>City and county parks</metadata>")
    );

    let dir = TempDir::new().unwrap();
    let bare = dir.path().join("bare.gpkg");
    GeoPackageBuilder::create(&bare).finish();
    assert!(GeoPackage::open(&bare)
        .unwrap()
        .metadata_entries()
        .unwrap()
        .is_empty());
}
