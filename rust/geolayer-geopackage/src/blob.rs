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

//! GeoPackage geometry blobs: a `GP` header (version, flags, SRS id, optional
//! envelope) followed by standard WKB.

use geo_types::Geometry;
use geolayer_geometry::to_geo::read_wkb_geometry;

use crate::error::{GpkgError, Result};

const MAGIC: [u8; 2] = *b"GP";
const FLAG_LITTLE_ENDIAN: u8 = 0b0000_0001;
const FLAG_EMPTY: u8 = 0b0001_0000;
const FLAG_EXTENDED: u8 = 0b0010_0000;

/// Decoded header of a GeoPackage geometry blob
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpkgHeader {
    pub version: u8,
    pub srs_id: i32,
    pub empty: bool,
    /// Envelope as (min x, max x, min y, max y) when present
    pub envelope: Option<[f64; 4]>,
    /// Offset of the WKB payload
    pub wkb_offset: usize,
}

/// Parse the header of a GeoPackage geometry blob
pub fn read_header(blob: &[u8]) -> Result<GpkgHeader> {
    if blob.len() < 8 {
        return Err(GpkgError::InvalidBlob(format!(
            "blob of {} bytes is shorter than the header",
            blob.len()
        )));
    }
    if blob[0..2] != MAGIC {
        return Err(GpkgError::InvalidBlob("missing 'GP' magic".to_string()));
    }

    let version = blob[2];
    let flags = blob[3];
    if flags & FLAG_EXTENDED != 0 {
        return Err(GpkgError::InvalidBlob(
            "extended GeoPackage geometry types are not supported".to_string(),
        ));
    }

    let little_endian = flags & FLAG_LITTLE_ENDIAN != 0;
    let read_i32 = |bytes: [u8; 4]| {
        if little_endian {
            i32::from_le_bytes(bytes)
        } else {
            i32::from_be_bytes(bytes)
        }
    };
    let read_f64 = |bytes: [u8; 8]| {
        if little_endian {
            f64::from_le_bytes(bytes)
        } else {
            f64::from_be_bytes(bytes)
        }
    };

    let srs_id = read_i32([blob[4], blob[5], blob[6], blob[7]]);

    let envelope_doubles = match (flags >> 1) & 0b111 {
        0 => 0,
        1 => 4,
        2 | 3 => 6,
        4 => 8,
        other => {
            return Err(GpkgError::InvalidBlob(format!(
                "invalid envelope contents indicator {other}"
            )))
        }
    };

    let wkb_offset = 8 + envelope_doubles * 8;
    if blob.len() < wkb_offset {
        return Err(GpkgError::InvalidBlob(format!(
            "blob of {} bytes is shorter than its envelope",
            blob.len()
        )));
    }

    let envelope = if envelope_doubles > 0 {
        let mut values = [0.0; 4];
        for (i, value) in values.iter_mut().enumerate() {
            let start = 8 + i * 8;
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&blob[start..start + 8]);
            *value = read_f64(bytes);
        }
        Some(values)
    } else {
        None
    };

    Ok(GpkgHeader {
        version,
        srs_id,
        empty: flags & FLAG_EMPTY != 0,
        envelope,
        wkb_offset,
    })
}

/// Decode a GeoPackage geometry blob
///
/// Returns `Ok(None)` for blobs flagged as empty.
pub fn read_geometry(blob: &[u8]) -> Result<Option<Geometry>> {
    let header = read_header(blob)?;
    if header.empty {
        return Ok(None);
    }

    Ok(Some(read_wkb_geometry(&blob[header.wkb_offset..])?))
}

/// Wrap a WKB payload in a little endian GeoPackage header without an envelope
pub fn write_blob(srs_id: i32, wkb: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + wkb.len());
    out.extend_from_slice(&MAGIC);
    out.push(0);
    out.push(FLAG_LITTLE_ENDIAN);
    out.extend_from_slice(&srs_id.to_le_bytes());
    out.extend_from_slice(wkb);
    out
}
