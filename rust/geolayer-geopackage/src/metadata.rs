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

//! Descriptive text stored next to the layers in a `layer_metadata` table with
//! `layer_name` and `xml_metadata` columns.

use crate::error::Result;
use crate::reader::GeoPackage;

/// Name of the table holding per-layer descriptive text
pub const METADATA_TABLE: &str = "layer_metadata";

/// One row of the metadata table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub layer_name: String,
    pub text: Option<String>,
}

impl GeoPackage {
    /// Every row of the metadata table, or nothing when the file has no such table
    pub fn metadata_entries(&self) -> Result<Vec<MetadataEntry>> {
        let conn = self.connect()?;
        let table_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [METADATA_TABLE],
            |row| row.get(0),
        )?;
        if table_count == 0 {
            log::debug!("{} has no {METADATA_TABLE} table", self.path().display());
            return Ok(vec![]);
        }

        let mut stmt = conn.prepare(
            "SELECT layer_name, xml_metadata FROM layer_metadata WHERE layer_name IS NOT NULL",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(MetadataEntry {
                    layer_name: row.get(0)?,
                    text: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
