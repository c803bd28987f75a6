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
use std::fmt::Debug;
use std::num::NonZeroUsize;
use std::sync::Arc;

use geo::MapCoords;
use geo_types::{Coord, Geometry};
use lru::LruCache;
use parking_lot::Mutex;

use crate::error::GeolayerGeometryError;

/// Represents a coordinate reference system (CRS) transformation engine.
///
/// Engines are shared between concurrently running queries, so both the engine and the
/// transforms it hands out must be thread safe.
pub trait CrsEngine: Debug + Send + Sync {
    fn get_transform_crs_to_crs(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Arc<dyn CrsTransform>, GeolayerGeometryError>;
}

/// Trait for transforming coordinates in a geometry from one CRS to another.
pub trait CrsTransform: Debug + Send + Sync {
    fn transform_coord(&self, coord: &mut (f64, f64)) -> Result<(), GeolayerGeometryError>;
}

/// A boxed trait object for dynamic dispatch of CRS transformations.
impl CrsTransform for Box<dyn CrsTransform> {
    fn transform_coord(&self, coord: &mut (f64, f64)) -> Result<(), GeolayerGeometryError> {
        self.as_ref().transform_coord(coord)
    }
}

impl<T: CrsEngine + ?Sized> CrsEngine for Arc<T> {
    fn get_transform_crs_to_crs(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Arc<dyn CrsTransform>, GeolayerGeometryError> {
        self.as_ref().get_transform_crs_to_crs(from, to)
    }
}

/// A caching wrapper around any CRS transformation engine.
///
/// Building a transform (parsing definitions, deriving projection constants) is far more
/// expensive than applying it, and a multi-layer query asks for the same handful of
/// transforms over and over. Uses LRU (Least Recently Used) eviction when the cache
/// reaches its capacity. Failed lookups are not cached.
///
/// # Example
///
/// ```rust,ignore
/// use geolayer_geometry::transform::{CachingCrsEngine, CrsEngine};
///
/// let engine = CachingCrsEngine::new(SomeCrsEngine::new());
/// let t1 = engine.get_transform_crs_to_crs("EPSG:3310", "EPSG:4326")?;
/// // retrieved from cache
/// let t2 = engine.get_transform_crs_to_crs("EPSG:3310", "EPSG:4326")?;
/// ```
#[derive(Debug)]
pub struct CachingCrsEngine<T: CrsEngine> {
    engine: T,
    crs_to_crs_cache: Mutex<LruCache<CrsToCrsCacheKey, Arc<dyn CrsTransform>>>,
}

/// Cache key for CRS to CRS transforms
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct CrsToCrsCacheKey {
    from: String,
    to: String,
}

/// Default cache size for transform objects
pub const DEFAULT_TRANSFORM_CACHE_SIZE: usize = 100;

impl<T: CrsEngine> CachingCrsEngine<T> {
    /// Creates a new caching engine wrapper with the default cache size.
    pub fn new(engine: T) -> Self {
        Self::with_cache_size(engine, DEFAULT_TRANSFORM_CACHE_SIZE)
    }

    /// Creates a new caching engine wrapper with a specified cache size.
    ///
    /// A `cache_size` of zero is treated as one.
    pub fn with_cache_size(engine: T, cache_size: usize) -> Self {
        let cache_size = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            engine,
            crs_to_crs_cache: Mutex::new(LruCache::new(cache_size)),
        }
    }

    /// The wrapped engine
    pub fn inner(&self) -> &T {
        &self.engine
    }

    /// Number of transforms currently cached
    pub fn cached_len(&self) -> usize {
        self.crs_to_crs_cache.lock().len()
    }
}

impl<T: CrsEngine> CrsEngine for CachingCrsEngine<T> {
    fn get_transform_crs_to_crs(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Arc<dyn CrsTransform>, GeolayerGeometryError> {
        let cache_key = CrsToCrsCacheKey {
            from: from.to_string(),
            to: to.to_string(),
        };

        if let Some(cached) = self.crs_to_crs_cache.lock().get(&cache_key) {
            return Ok(cached.clone());
        }

        // Build outside the lock; two racing callers may both build, which is harmless
        let transform = self.engine.get_transform_crs_to_crs(from, to)?;
        self.crs_to_crs_cache
            .lock()
            .put(cache_key, transform.clone());
        Ok(transform)
    }
}

/// Transforms a geometry from one CRS to another using the provided transformation.
///
/// Only x and y are transformed; the output is a new geometry of the same type and
/// structure as the input.
pub fn transform_geometry(
    geom: &Geometry,
    trans: &dyn CrsTransform,
) -> Result<Geometry, GeolayerGeometryError> {
    geom.try_map_coords(|coord: Coord| {
        let mut xy = (coord.x, coord.y);
        trans.transform_coord(&mut xy)?;
        if !(xy.0.is_finite() && xy.1.is_finite()) {
            return Err(GeolayerGeometryError::Invalid(format!(
                "Transform of ({}, {}) produced a non-finite coordinate",
                coord.x, coord.y
            )));
        }
        Ok(Coord { x: xy.0, y: xy.1 })
    })
}
