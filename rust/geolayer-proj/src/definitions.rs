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
//! Projection definitions for authority codes
//!
//! Maps `AUTHORITY:CODE` identifiers to proj4 definition strings understood by
//! [proj4rs]. Universal Transverse Mercator zones are derived from their code;
//! everything else comes from [NAMED].
use std::borrow::Cow;

const WGS84_LNGLAT: &str = "+proj=longlat +datum=WGS84 +no_defs";
const NAD83_LNGLAT: &str = "+proj=longlat +datum=NAD83 +no_defs";

/// Fixed definitions, keyed by upper case `AUTHORITY:CODE`
#[rustfmt::skip]
pub const NAMED: &[(&str, &str)] = &[
    ("EPSG:4326", WGS84_LNGLAT),
    ("OGC:CRS84", WGS84_LNGLAT),
    ("EPSG:4269", NAD83_LNGLAT),
    ("EPSG:4258", "+proj=longlat +ellps=GRS80 +towgs84=0,0,0 +no_defs"),
    ("EPSG:3857", "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +no_defs"),
    ("EPSG:900913", "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +no_defs"),
    ("EPSG:3395", "+proj=merc +lon_0=0 +k=1 +x_0=0 +y_0=0 +datum=WGS84 +units=m +no_defs"),
    // NAD83 Albers equal area: California and the contiguous United States
    ("EPSG:3310", "+proj=aea +lat_0=0 +lon_0=-120 +lat_1=34 +lat_2=40.5 +x_0=0 +y_0=-4000000 +datum=NAD83 +units=m +no_defs"),
    ("EPSG:5070", "+proj=aea +lat_0=23 +lon_0=-96 +lat_1=29.5 +lat_2=45.5 +x_0=0 +y_0=0 +datum=NAD83 +units=m +no_defs"),
    // California State Plane, US survey feet
    ("EPSG:2225", "+proj=lcc +lat_0=39.3333333333333 +lon_0=-122 +lat_1=41.6666666666667 +lat_2=40 +x_0=2000000.0001016 +y_0=500000.0001016 +datum=NAD83 +units=us-ft +no_defs"),
    ("EPSG:2226", "+proj=lcc +lat_0=37.6666666666667 +lon_0=-122 +lat_1=39.8333333333333 +lat_2=38.3333333333333 +x_0=2000000.0001016 +y_0=500000.0001016 +datum=NAD83 +units=us-ft +no_defs"),
    ("EPSG:2227", "+proj=lcc +lat_0=36.5 +lon_0=-120.5 +lat_1=38.4333333333333 +lat_2=37.0666666666667 +x_0=2000000.0001016 +y_0=500000.0001016 +datum=NAD83 +units=us-ft +no_defs"),
    ("EPSG:2228", "+proj=lcc +lat_0=35.3333333333333 +lon_0=-119 +lat_1=37.25 +lat_2=36 +x_0=2000000.0001016 +y_0=500000.0001016 +datum=NAD83 +units=us-ft +no_defs"),
    ("EPSG:2229", "+proj=lcc +lat_0=33.5 +lon_0=-118 +lat_1=35.4666666666667 +lat_2=34.0333333333333 +x_0=2000000.0001016 +y_0=500000.0001016 +datum=NAD83 +units=us-ft +no_defs"),
    ("EPSG:2230", "+proj=lcc +lat_0=32.1666666666667 +lon_0=-116.25 +lat_1=33.8833333333333 +lat_2=32.7833333333333 +x_0=2000000.0001016 +y_0=500000.0001016 +datum=NAD83 +units=us-ft +no_defs"),
    // California State Plane, meters
    ("EPSG:26941", "+proj=lcc +lat_0=39.3333333333333 +lon_0=-122 +lat_1=41.6666666666667 +lat_2=40 +x_0=2000000 +y_0=500000 +datum=NAD83 +units=m +no_defs"),
    ("EPSG:26942", "+proj=lcc +lat_0=37.6666666666667 +lon_0=-122 +lat_1=39.8333333333333 +lat_2=38.3333333333333 +x_0=2000000 +y_0=500000 +datum=NAD83 +units=m +no_defs"),
    ("EPSG:26943", "+proj=lcc +lat_0=36.5 +lon_0=-120.5 +lat_1=38.4333333333333 +lat_2=37.0666666666667 +x_0=2000000 +y_0=500000 +datum=NAD83 +units=m +no_defs"),
    ("EPSG:26944", "+proj=lcc +lat_0=35.3333333333333 +lon_0=-119 +lat_1=37.25 +lat_2=36 +x_0=2000000 +y_0=500000 +datum=NAD83 +units=m +no_defs"),
    ("EPSG:26945", "+proj=lcc +lat_0=33.5 +lon_0=-118 +lat_1=35.4666666666667 +lat_2=34.0333333333333 +x_0=2000000 +y_0=500000 +datum=NAD83 +units=m +no_defs"),
    ("EPSG:26946", "+proj=lcc +lat_0=32.1666666666667 +lon_0=-116.25 +lat_1=33.8833333333333 +lat_2=32.7833333333333 +x_0=2000000 +y_0=500000 +datum=NAD83 +units=m +no_defs"),
];

/// The proj4 definition of a reference system
///
/// `crs` is either `AUTHORITY:CODE` (authority matched ignoring case) or a proj4
/// string starting with `+proj=`, which is returned as is.
pub fn find_definition(crs: &str) -> Option<Cow<'static, str>> {
    let crs = crs.trim();
    if crs.starts_with("+proj=") {
        return Some(Cow::Owned(crs.to_string()));
    }

    let (authority, code) = crs.split_once(':')?;
    let key = format!("{}:{}", authority.to_ascii_uppercase(), code.trim());
    if let Some((_, definition)) = NAMED.iter().find(|(name, _)| *name == key) {
        return Some(Cow::Borrowed(definition));
    }

    if !authority.eq_ignore_ascii_case("EPSG") {
        return None;
    }
    utm_definition(code.trim().parse().ok()?).map(Cow::Owned)
}

/// UTM zones on WGS84 (326xx north, 327xx south), NAD83 (269xx, zones 1 to 23)
/// and ETRS89 (258xx, zones 28 to 38)
fn utm_definition(code: u32) -> Option<String> {
    let (zone, datum, south) = match code {
        32601..=32660 => (code - 32600, "+datum=WGS84", false),
        32701..=32760 => (code - 32700, "+datum=WGS84", true),
        26901..=26923 => (code - 26900, "+datum=NAD83", false),
        25828..=25838 => (code - 25800, "+ellps=GRS80 +towgs84=0,0,0", false),
        _ => return None,
    };
    let south = if south { " +south" } else { "" };
    Some(format!(
        "+proj=utm +zone={zone}{south} {datum} +units=m +no_defs"
    ))
}
