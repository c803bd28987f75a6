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
use std::path::{Path, PathBuf};

use geolayer_schema::{
    crs::{lnglat, Crs},
    feature::{AttributeValue, Attributes, RawFeature},
    layer::{ColumnInfo, LayerInfo, RawLayer},
};
use rusqlite::{types::ValueRef, Connection, OpenFlags, OptionalExtension};

use crate::blob::read_geometry;
use crate::error::{GpkgError, Result};

/// Name reported as the storage driver of GeoPackage layers
pub const GPKG_DRIVER: &str = "GPKG";

/// A read-only GeoPackage file
///
/// A fresh read-only connection is opened for every operation so that one
/// [GeoPackage] can be shared between threads while SQLite connections cannot.
#[derive(Debug, Clone)]
pub struct GeoPackage {
    path: PathBuf,
}

/// Where a feature table keeps its geometry and which columns it exposes
#[derive(Debug, Clone)]
struct TableLayout {
    table_name: String,
    geometry_column: String,
    geometry_type: String,
    srs_id: i32,
    primary_key: Option<String>,
    columns: Vec<ColumnInfo>,
}

impl GeoPackage {
    /// Open a GeoPackage, checking that the file is readable and carries the
    /// `gpkg_contents` table
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let out = Self {
            path: path.as_ref().to_path_buf(),
        };
        let conn = out.connect()?;
        conn.query_row("SELECT COUNT(*) FROM gpkg_contents", [], |row| {
            row.get::<_, i64>(0)
        })?;
        Ok(out)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn connect(&self) -> Result<Connection> {
        Ok(Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?)
    }

    /// Names of all feature tables, sorted
    pub fn list_layers(&self) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT table_name FROM gpkg_contents WHERE data_type = 'features' ORDER BY table_name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Read every row of a feature table
    ///
    /// Rows whose geometry blob is null, flagged empty, or cannot be decoded are
    /// returned with a `None` geometry rather than failing the layer.
    pub fn read_layer(&self, name: &str) -> Result<RawLayer> {
        let conn = self.connect()?;
        let layout = table_layout(&conn, name)?;
        let crs = resolve_srs(&conn, layout.srs_id)?;

        let mut select_list = vec![quote_identifier(&layout.geometry_column)];
        select_list.extend(layout.columns.iter().map(|c| quote_identifier(&c.name)));
        let mut sql = format!(
            "SELECT {} FROM {}",
            select_list.join(", "),
            quote_identifier(&layout.table_name)
        );
        if let Some(pk) = &layout.primary_key {
            sql.push_str(&format!(" ORDER BY {}", quote_identifier(pk)));
        }

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut features = Vec::new();
        let mut undecodable = 0usize;
        while let Some(row) = rows.next()? {
            let geometry = match row.get_ref(0)? {
                ValueRef::Blob(bytes) => match read_geometry(bytes) {
                    Ok(geometry) => geometry,
                    Err(err) => {
                        undecodable += 1;
                        log::trace!("Undecodable geometry in '{}': {err}", layout.table_name);
                        None
                    }
                },
                _ => None,
            };

            let mut attributes = Attributes::new();
            for (i, column) in layout.columns.iter().enumerate() {
                attributes.insert(column.name.as_str(), attribute_value(row.get_ref(i + 1)?));
            }

            features.push(RawFeature::new(geometry, attributes));
        }

        if undecodable > 0 {
            log::debug!(
                "{undecodable} geometries in '{}' could not be decoded",
                layout.table_name
            );
        }

        Ok(RawLayer::new(layout.table_name, crs, features))
    }

    /// Describe a feature table without reading its rows
    pub fn describe_layer(&self, name: &str) -> Result<LayerInfo> {
        let conn = self.connect()?;
        let layout = table_layout(&conn, name)?;
        let crs = resolve_srs(&conn, layout.srs_id)?;
        let feature_count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {}",
                quote_identifier(&layout.table_name)
            ),
            [],
            |row| row.get(0),
        )?;

        Ok(LayerInfo {
            name: layout.table_name,
            driver: GPKG_DRIVER.to_string(),
            crs,
            geometry_column: Some(layout.geometry_column),
            geometry_type: Some(layout.geometry_type),
            columns: layout.columns,
            feature_count: usize::try_from(feature_count).unwrap_or(0),
        })
    }
}

fn table_layout(conn: &Connection, name: &str) -> Result<TableLayout> {
    let table_name: Option<String> = conn
        .query_row(
            "SELECT table_name FROM gpkg_contents \
             WHERE data_type = 'features' AND table_name = ?1 COLLATE NOCASE",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    let table_name = table_name.ok_or_else(|| GpkgError::LayerNotFound(name.to_string()))?;

    let geometry: Option<(String, String, i32)> = conn
        .query_row(
            "SELECT column_name, geometry_type_name, srs_id FROM gpkg_geometry_columns \
             WHERE table_name = ?1",
            [&table_name],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;
    let (geometry_column, geometry_type, srs_id) =
        geometry.ok_or_else(|| GpkgError::MissingGeometryColumn(table_name.clone()))?;

    let mut stmt = conn.prepare(&format!(
        "PRAGMA table_info({})",
        quote_identifier(&table_name)
    ))?;
    // (name, declared type, pk position)
    let table_columns = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(5)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut primary_key = None;
    let mut columns = Vec::new();
    for (column_name, declared_type, pk) in table_columns {
        if column_name.eq_ignore_ascii_case(&geometry_column) {
            continue;
        }
        if pk > 0 && declared_type.eq_ignore_ascii_case("INTEGER") {
            primary_key = Some(column_name);
            continue;
        }
        columns.push(ColumnInfo::new(column_name, declared_type));
    }

    Ok(TableLayout {
        table_name,
        geometry_column,
        geometry_type,
        srs_id,
        primary_key,
        columns,
    })
}

/// Map a GeoPackage `srs_id` onto a [Crs]
///
/// The reserved id 0 is undefined geographic and is read as longitude/latitude;
/// -1 (undefined cartesian) and organizations of "NONE" have no usable CRS.
fn resolve_srs(conn: &Connection, srs_id: i32) -> Result<Option<Crs>> {
    match srs_id {
        0 => return Ok(Some(lnglat())),
        -1 => return Ok(None),
        _ => {}
    }

    let organization: Option<(String, i64)> = conn
        .query_row(
            "SELECT organization, organization_coordsys_id FROM gpkg_spatial_ref_sys \
             WHERE srs_id = ?1",
            [srs_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match organization {
        Some((organization, _)) if organization.eq_ignore_ascii_case("NONE") => Ok(None),
        Some((organization, code)) => match Crs::try_new(&organization, &code.to_string()) {
            Ok(crs) => Ok(Some(crs)),
            Err(err) => {
                log::warn!("Ignoring unusable spatial reference system {srs_id}: {err}");
                Ok(None)
            }
        },
        None => {
            log::warn!("srs_id {srs_id} is missing from gpkg_spatial_ref_sys");
            Ok(None)
        }
    }
}

fn attribute_value(value: ValueRef<'_>) -> AttributeValue {
    match value {
        ValueRef::Null => AttributeValue::Null,
        ValueRef::Integer(value) => AttributeValue::Integer(value),
        ValueRef::Real(value) => AttributeValue::Real(value),
        ValueRef::Text(bytes) => AttributeValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        // Binary attributes have no JSON representation
        ValueRef::Blob(_) => AttributeValue::Null,
    }
}

pub(crate) fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn quoting() {
        assert_eq!(quote_identifier("parks"), "\"parks\"");
        assert_eq!(quote_identifier("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn attribute_values() {
        assert_eq!(attribute_value(ValueRef::Null), AttributeValue::Null);
        assert_eq!(attribute_value(ValueRef::Integer(3)), AttributeValue::Integer(3));
        assert_eq!(attribute_value(ValueRef::Real(1.5)), AttributeValue::Real(1.5));
        assert_eq!(
            attribute_value(ValueRef::Text(b"Golden Gate")),
            AttributeValue::from("Golden Gate")
        );
        assert_eq!(attribute_value(ValueRef::Blob(&[1, 2])), AttributeValue::Null);
    }

    #[test]
    fn missing_file() {
        let err = GeoPackage::open("/nonexistent/dir/layers.gpkg").unwrap_err();
        assert!(matches!(err, GpkgError::Sqlite(_)));
    }
}
