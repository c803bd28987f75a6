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
use geolayer_geometry::error::GeolayerGeometryError;
use thiserror::Error;

pub type Result<T, E = GpkgError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum GpkgError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeolayerGeometryError),
    #[error("Invalid GeoPackage geometry blob: {0}")]
    InvalidBlob(String),
    #[error("Layer '{0}' not found in GeoPackage")]
    LayerNotFound(String),
    #[error("Layer '{0}' has no geometry column")]
    MissingGeometryColumn(String),
}
