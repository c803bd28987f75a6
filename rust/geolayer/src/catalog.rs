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
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::backend::LayerBackend;
use crate::error::{GeolayerError, Result};

/// The set of layer names a backend offers
///
/// Listings are cached for `refresh_interval` so that bursts of requests do not
/// each enumerate the backend; a zero interval asks the backend every time. A
/// backend that lists no layers is treated as unavailable and is never cached.
#[derive(Debug)]
pub struct LayerCatalog {
    backend: Arc<dyn LayerBackend>,
    refresh_interval: Duration,
    cached: RwLock<Option<CachedListing>>,
}

#[derive(Debug, Clone)]
struct CachedListing {
    names: Arc<Vec<String>>,
    fetched_at: Instant,
}

impl LayerCatalog {
    pub fn new(backend: Arc<dyn LayerBackend>, refresh_interval: Duration) -> Self {
        Self {
            backend,
            refresh_interval,
            cached: RwLock::new(None),
        }
    }

    /// Every layer name, in the backend's spelling and order
    pub fn list_layers(&self) -> Result<Vec<String>> {
        Ok(self.listing()?.as_ref().clone())
    }

    /// Whether a layer exists, ignoring case
    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.resolve(name)?.is_some())
    }

    /// The stored spelling of `name`, matched exactly first and then ignoring case
    pub fn resolve(&self, name: &str) -> Result<Option<String>> {
        Ok(resolve_in(&self.listing()?, name).map(str::to_string))
    }

    /// Forget the cached listing
    pub fn invalidate(&self) {
        *self.cached.write() = None;
    }

    /// A snapshot of the listing, refreshed when older than the refresh interval
    pub fn listing(&self) -> Result<Arc<Vec<String>>> {
        if !self.refresh_interval.is_zero() {
            if let Some(cached) = self.cached.read().as_ref() {
                if cached.fetched_at.elapsed() < self.refresh_interval {
                    return Ok(cached.names.clone());
                }
            }
        }

        let names = match self.backend.list_layers() {
            Ok(names) => Arc::new(names),
            Err(err) => {
                log::warn!("Listing layers failed: {err}");
                return Err(match err {
                    GeolayerError::CatalogUnavailable(_) => err,
                    other => GeolayerError::CatalogUnavailable(other.to_string()),
                });
            }
        };
        if names.is_empty() {
            log::warn!("Listing layers returned nothing");
            return Err(GeolayerError::CatalogUnavailable(
                "The catalog contains no layers".to_string(),
            ));
        }
        log::debug!("Catalog lists {} layers", names.len());

        if !self.refresh_interval.is_zero() {
            *self.cached.write() = Some(CachedListing {
                names: names.clone(),
                fetched_at: Instant::now(),
            });
        }

        Ok(names)
    }
}

/// Find `name` in a listing, exactly first and then ignoring case
pub fn resolve_in<'a>(listing: &'a [String], name: &str) -> Option<&'a str> {
    let name = name.trim();
    if let Some(exact) = listing.iter().find(|candidate| candidate.as_str() == name) {
        return Some(exact);
    }

    let folded = name.to_lowercase();
    listing
        .iter()
        .find(|candidate| candidate.to_lowercase() == folded)
        .map(|candidate| candidate.as_str())
}
