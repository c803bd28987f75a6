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
use std::fmt::Display;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use geolayer_geometry::error::GeolayerGeometryError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Deserialize a "crs" value as found in layer metadata or request bodies
///
/// Supported forms are authority:code strings (`"EPSG:3310"`, `"OGC:CRS84"`), bare
/// numeric SRIDs (`3310` or `"3310"`), and PROJJSON objects carrying an `id` member.
/// A JSON null means the CRS is unspecified.
pub fn deserialize_crs(crs: &Value) -> Result<Option<Crs>, GeolayerGeometryError> {
    match crs {
        Value::Null => Ok(None),
        Value::String(string_value) => string_value.parse().map(Some),
        Value::Number(number) => match number.as_u64().and_then(|n| u32::try_from(n).ok()) {
            Some(srid) => Ok(Some(Crs::from_srid(srid))),
            None => Err(GeolayerGeometryError::Invalid(format!(
                "Can't create Crs from non-integer SRID {number}"
            ))),
        },
        Value::Object(_) => projjson_authority_code(crs).map(Some),
        other => Err(GeolayerGeometryError::Invalid(format!(
            "Can't create Crs from {other}"
        ))),
    }
}

fn projjson_authority_code(value: &Value) -> Result<Crs, GeolayerGeometryError> {
    if let Some(identifier) = value.get("id") {
        let maybe_authority = identifier.get("authority").and_then(|v| v.as_str());
        let maybe_code = identifier.get("code").and_then(|v| {
            if let Some(string) = v.as_str() {
                Some(string.to_string())
            } else {
                v.as_number().map(|number| number.to_string())
            }
        });
        if let (Some(authority), Some(code)) = (maybe_authority, maybe_code) {
            return Crs::try_new(authority, &code);
        }
    }

    Err(GeolayerGeometryError::Invalid(
        "PROJJSON Crs without an authority identifier is not supported".to_string(),
    ))
}

/// Longitude/latitude CRS (WGS84)
///
/// Every externally visible geometry is expressed in this CRS.
pub fn lnglat() -> Crs {
    Crs {
        authority: "EPSG".to_string(),
        code: "4326".to_string(),
    }
}

/// A coordinate reference system identified by an authority and a code
///
/// Authorities are stored upper case. Equality treats the two spellings of WGS84
/// longitude/latitude (`EPSG:4326` and `OGC:CRS84`) as the same system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Crs {
    authority: String,
    code: String,
}

impl Crs {
    /// Create a Crs from its parts, validating both
    pub fn try_new(authority: &str, code: &str) -> Result<Self, GeolayerGeometryError> {
        let authority = authority.trim().to_uppercase();
        let code = code.trim().to_string();
        if !validate_authority(&authority) {
            return Err(GeolayerGeometryError::Invalid(format!(
                "Invalid CRS authority '{authority}'"
            )));
        }
        if !validate_code(&code) {
            return Err(GeolayerGeometryError::Invalid(format!(
                "Invalid CRS code '{code}'"
            )));
        }

        Ok(Self { authority, code })
    }

    /// Create an EPSG Crs from a numeric SRID
    pub fn from_srid(srid: u32) -> Self {
        Self {
            authority: "EPSG".to_string(),
            code: srid.to_string(),
        }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// The authority:code string, e.g. `EPSG:4326`
    pub fn to_authority_code(&self) -> String {
        format!("{}:{}", self.authority, self.code)
    }

    /// Whether this is WGS84 longitude/latitude
    pub fn is_lnglat(&self) -> bool {
        is_authority_code_lnglat(&self.authority, &self.code)
    }

    /// Get the SRID if authority is EPSG (or if this is longitude/latitude)
    pub fn srid(&self) -> Option<u32> {
        if self.is_lnglat() {
            Some(4326)
        } else if self.authority == "EPSG" {
            self.code.parse::<u32>().ok()
        } else {
            None
        }
    }
}

fn is_authority_code_lnglat(authority: &str, code: &str) -> bool {
    matches!((authority, code), ("EPSG", "4326") | ("OGC", "CRS84"))
}

/// Authorities are short alphanumeric identifiers (EPSG, OGC, ESRI, IAU_2015, ...)
fn validate_authority(authority: &str) -> bool {
    !authority.is_empty() && authority.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_code(code: &str) -> bool {
    !code.is_empty() && code.chars().all(|c| c.is_alphanumeric())
}

/// Validate that a code is likely to be an EPSG code (all numbers and not too long)
fn validate_epsg_code(code: &str) -> bool {
    !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) && code.len() <= 9
}

impl FromStr for Crs {
    type Err = GeolayerGeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [authority, code] => Self::try_new(authority, code),
            [code] if validate_epsg_code(code) => Self::try_new("EPSG", code),
            _ => Err(GeolayerGeometryError::Invalid(format!(
                "Can't parse Crs from '{s}'"
            ))),
        }
    }
}

impl TryFrom<String> for Crs {
    type Error = GeolayerGeometryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(value: Crs) -> Self {
        value.to_authority_code()
    }
}

impl Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.authority, self.code)
    }
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        if self.is_lnglat() && other.is_lnglat() {
            true
        } else {
            self.authority == other.authority && self.code == other.code
        }
    }
}

impl Eq for Crs {}

impl Hash for Crs {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Must agree with PartialEq: every lnglat spelling hashes alike
        if self.is_lnglat() {
            "lnglat".hash(state);
        } else {
            self.authority.hash(state);
            self.code.hash(state);
        }
    }
}
