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
use std::path::Path;
use std::sync::Arc;

use geolayer_geometry::transform::{CachingCrsEngine, CrsEngine};
use geolayer_proj::default_crs_engine;
use geolayer_schema::{feature::Feature, layer::LayerInfo};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::backend::{GeoPackageBackend, LayerBackend};
use crate::catalog::LayerCatalog;
use crate::error::{GeolayerError, Result};
use crate::geojson::{
    layer_feature_collection, FlatQueryRequest, GroupedQueryRequest, GroupedQueryResponse,
};
use crate::metadata::{GeoPackageMetadata, LayerKeyNormalizer, MetadataResolver, NoMetadata};
use crate::normalize::CrsNormalizer;
use crate::options::EngineOptions;
use crate::predicate::{select, PredicateKind};
use crate::query::{run_query, LayerPipeline, QueryLimits, QueryOutcome, SpatialQuery};
use crate::query_geometry::QueryGeometry;
use crate::store::{LayerLoad, LayerStore};

/// A whole layer, filtered and in the target reference system
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDocument {
    /// Stored spelling of the layer name
    pub name: String,
    pub features: Vec<Feature>,
    pub metadata: Option<String>,
}

/// Features of one layer satisfying a predicate
#[derive(Debug, Clone, PartialEq)]
pub struct LayerMatches {
    pub name: String,
    pub predicate: PredicateKind,
    pub features: Vec<Feature>,
}

impl LayerMatches {
    pub fn count(&self) -> usize {
        self.features.len()
    }
}

/// Layer description with any metadata text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerDescription {
    #[serde(flatten)]
    pub info: LayerInfo,
    pub metadata: Option<String>,
}

/// Entry point of the layer query engine
///
/// A context is cheap to clone and every clone shares the same catalog cache and
/// transform cache. Options are fixed at construction.
#[derive(Debug, Clone)]
pub struct GeolayerContext {
    options: Arc<EngineOptions>,
    catalog: Arc<LayerCatalog>,
    pipeline: Arc<LayerPipeline>,
    metadata: Arc<dyn MetadataResolver>,
}

impl GeolayerContext {
    /// A context over `backend` using the default CRS engine and no metadata
    pub fn new(backend: Arc<dyn LayerBackend>, options: EngineOptions) -> Self {
        Self::new_with_crs_engine(backend, options, default_crs_engine())
    }

    pub fn new_with_crs_engine(
        backend: Arc<dyn LayerBackend>,
        options: EngineOptions,
        engine: Arc<dyn CrsEngine>,
    ) -> Self {
        let engine: Arc<dyn CrsEngine> = Arc::new(CachingCrsEngine::with_cache_size(
            engine,
            options.transform_cache_size,
        ));
        let normalizer = CrsNormalizer::new(engine, options.target_crs.clone());
        let catalog = LayerCatalog::new(backend.clone(), options.catalog_refresh_interval);

        Self {
            options: Arc::new(options),
            catalog: Arc::new(catalog),
            pipeline: Arc::new(LayerPipeline::new(LayerStore::new(backend), normalizer)),
            metadata: Arc::new(NoMetadata),
        }
    }

    /// A context over a GeoPackage file, reading metadata from its `layer_metadata`
    /// table
    pub fn open_geopackage(path: impl AsRef<Path>, options: EngineOptions) -> Result<Self> {
        let backend = GeoPackageBackend::open(path)?;
        let metadata = GeoPackageMetadata::new(
            backend.geopackage().clone(),
            LayerKeyNormalizer::new(options.metadata_prefixes.clone()),
        );
        log::info!(
            "Opened GeoPackage {}",
            backend.geopackage().path().display()
        );
        Ok(Self::new(Arc::new(backend), options).with_metadata_resolver(Arc::new(metadata)))
    }

    pub fn with_metadata_resolver(mut self, resolver: Arc<dyn MetadataResolver>) -> Self {
        self.metadata = resolver;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn catalog(&self) -> &LayerCatalog {
        &self.catalog
    }

    /// Every layer name; a catalog without layers is reported as unavailable
    pub async fn list_layers(&self) -> Result<Vec<String>> {
        let catalog = self.catalog.clone();
        blocking(move || catalog.list_layers()).await
    }

    /// Compare one geometry against several layers
    pub async fn query(&self, query: SpatialQuery) -> Result<QueryOutcome> {
        self.query_with_cancellation(query, CancellationToken::new())
            .await
    }

    /// [Self::query], stopping early when `cancel` fires
    pub async fn query_with_cancellation(
        &self,
        mut query: SpatialQuery,
        cancel: CancellationToken,
    ) -> Result<QueryOutcome> {
        query.geometry = query.geometry.normalized(&self.pipeline.normalizer)?;
        log::info!(
            "Querying {} layers with {}",
            query.layers.len(),
            query.predicate
        );

        let limits = QueryLimits {
            max_concurrent_layers: self.options.layer_parallelism(),
            timeout: self.options.query_timeout,
        };
        run_query(
            self.catalog.clone(),
            self.pipeline.clone(),
            query,
            &limits,
            cancel,
        )
        .await
    }

    /// The flat wire shape: every match in one FeatureCollection
    pub async fn query_flat(
        &self,
        request: &FlatQueryRequest,
    ) -> Result<::geojson::FeatureCollection> {
        let outcome = self.query(request.to_spatial_query()?).await?;
        Ok(layer_feature_collection(outcome.features()))
    }

    /// The grouped wire shape: matches and counts per layer, plus skipped layers
    pub async fn query_grouped(&self, request: &GroupedQueryRequest) -> Result<GroupedQueryResponse> {
        let outcome = self.query(request.to_spatial_query()?).await?;
        GroupedQueryResponse::try_from_outcome(&outcome)
    }

    /// A whole layer in the target reference system, with its metadata
    pub async fn fetch_layer(&self, name: &str) -> Result<LayerDocument> {
        let catalog = self.catalog.clone();
        let pipeline = self.pipeline.clone();
        let requested = name.to_string();
        let (stored, features) = blocking(move || {
            let stored = resolve_required(&catalog, &requested)?;
            let features = match pipeline.store.load_layer(&stored)? {
                LayerLoad::Loaded(layer) => pipeline.normalizer.normalize(layer)?.features,
                LayerLoad::Empty { .. } => vec![],
            };
            Ok((stored, features))
        })
        .await?;

        log::info!("Fetched {} features of '{stored}'", features.len());
        let metadata = self.layer_metadata(&stored).await;
        Ok(LayerDocument {
            name: stored,
            features,
            metadata,
        })
    }

    /// Features of a single layer satisfying `predicate`
    ///
    /// Unlike [Self::query], a missing or unreadable layer fails the request.
    pub async fn query_layer(
        &self,
        name: &str,
        geometry: QueryGeometry,
        predicate: PredicateKind,
    ) -> Result<LayerMatches> {
        let geometry = geometry.normalized(&self.pipeline.normalizer)?;
        let catalog = self.catalog.clone();
        let pipeline = self.pipeline.clone();
        let requested = name.to_string();
        blocking(move || {
            let stored = resolve_required(&catalog, &requested)?;
            let features = match pipeline.store.load_layer(&stored)? {
                LayerLoad::Loaded(layer) => {
                    select(&geometry, pipeline.normalizer.normalize(layer)?, predicate)
                }
                LayerLoad::Empty { .. } => vec![],
            };
            Ok(LayerMatches {
                name: stored,
                predicate,
                features,
            })
        })
        .await
    }

    /// Reference system, columns and feature count of a layer
    pub async fn describe_layer(&self, name: &str) -> Result<LayerDescription> {
        let catalog = self.catalog.clone();
        let backend = self.pipeline.store.backend().clone();
        let requested = name.to_string();
        let info = blocking(move || {
            let stored = resolve_required(&catalog, &requested)?;
            backend.describe_layer(&stored)
        })
        .await?;

        let metadata = self.layer_metadata(&info.name).await;
        Ok(LayerDescription { info, metadata })
    }

    /// Descriptive text of a layer
    ///
    /// Lookup failures are logged and reported as no metadata.
    pub async fn layer_metadata(&self, name: &str) -> Option<String> {
        let resolver = self.metadata.clone();
        let requested = name.to_string();
        match blocking(move || resolver.resolve(&requested)).await {
            Ok(metadata) => metadata,
            Err(err) => {
                log::warn!("Metadata lookup for '{name}' failed: {err}");
                None
            }
        }
    }
}

fn resolve_required(catalog: &LayerCatalog, name: &str) -> Result<String> {
    catalog
        .resolve(name)?
        .ok_or_else(|| GeolayerError::LayerNotFound(name.to_string()))
}

/// Run blocking backend work off the async worker threads
async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| GeolayerError::Internal(format!("Blocking task failed: {err}")))?
}
