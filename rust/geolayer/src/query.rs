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
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use geolayer_schema::feature::Feature;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::catalog::{resolve_in, LayerCatalog};
use crate::error::{GeolayerError, Result};
use crate::geolayer_internal_err;
use crate::normalize::CrsNormalizer;
use crate::predicate::{select, PredicateKind};
use crate::query_geometry::QueryGeometry;
use crate::store::{LayerLoad, LayerStore};

/// One geometry compared against an ordered list of layers
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialQuery {
    pub geometry: QueryGeometry,
    pub layers: Vec<String>,
    pub predicate: PredicateKind,
}

impl SpatialQuery {
    /// An `intersects` query
    pub fn new(geometry: QueryGeometry, layers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            geometry,
            layers: layers.into_iter().map(Into::into).collect(),
            predicate: PredicateKind::default(),
        }
    }

    pub fn with_predicate(mut self, predicate: PredicateKind) -> Self {
        self.predicate = predicate;
        self
    }
}

/// Why a requested layer contributed nothing to a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No layer of that name exists
    NotFound,
    /// The layer exists but could not be read
    LoadFailed,
    /// The layer could not be brought into the target reference system
    Reprojection,
    /// The query was cancelled before the layer finished
    Cancelled,
    /// The query ran out of time before the layer finished
    TimedOut,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotFound => write!(f, "not_found"),
            SkipReason::LoadFailed => write!(f, "load_failed"),
            SkipReason::Reprojection => write!(f, "reprojection"),
            SkipReason::Cancelled => write!(f, "cancelled"),
            SkipReason::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// What one requested layer contributed to a query
#[derive(Debug, Clone, PartialEq)]
pub enum LayerOutcome {
    /// Matching features (possibly none), tagged with the requested layer name
    Matched(Vec<Feature>),
    /// The layer has no feature with usable geometry
    Empty,
    Skipped(SkipReason),
}

impl LayerOutcome {
    pub fn features(&self) -> &[Feature] {
        match self {
            LayerOutcome::Matched(features) => features,
            _ => &[],
        }
    }
}

/// The outcome of one requested layer, under the name the caller used
#[derive(Debug, Clone, PartialEq)]
pub struct LayerResult {
    pub layer: String,
    pub outcome: LayerOutcome,
}

/// Results of a multi-layer query, one entry per requested layer in request order
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub predicate: PredicateKind,
    pub layers: Vec<LayerResult>,
}

impl QueryOutcome {
    /// Every requested layer skipped for the same reason
    fn interrupted(predicate: PredicateKind, requested: Vec<String>, reason: SkipReason) -> Self {
        let layers = requested
            .into_iter()
            .map(|layer| LayerResult {
                layer,
                outcome: LayerOutcome::Skipped(reason),
            })
            .collect();
        Self { predicate, layers }
    }

    /// Every matched feature, layer by layer in request order
    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.layers
            .iter()
            .flat_map(|result| result.outcome.features().iter())
    }

    pub fn feature_count(&self) -> usize {
        self.layers
            .iter()
            .map(|result| result.outcome.features().len())
            .sum()
    }

    /// Layers that were skipped and why
    pub fn skipped(&self) -> impl Iterator<Item = (&str, SkipReason)> {
        self.layers.iter().filter_map(|result| match result.outcome {
            LayerOutcome::Skipped(reason) => Some((result.layer.as_str(), reason)),
            _ => None,
        })
    }
}

/// Load, filter, normalize and evaluate a single layer
#[derive(Debug, Clone)]
pub struct LayerPipeline {
    pub(crate) store: LayerStore,
    pub(crate) normalizer: CrsNormalizer,
}

impl LayerPipeline {
    pub fn new(store: LayerStore, normalizer: CrsNormalizer) -> Self {
        Self { store, normalizer }
    }

    /// Run one layer of a multi-layer query. Blocks on backend I/O.
    ///
    /// Per-layer failures become skip reasons; nothing here fails the whole query.
    /// `cancel` is checked between stages.
    pub fn run(
        &self,
        stored_name: &str,
        requested_name: &str,
        query: &QueryGeometry,
        predicate: PredicateKind,
        cancel: &CancellationToken,
    ) -> LayerOutcome {
        if cancel.is_cancelled() {
            return LayerOutcome::Skipped(SkipReason::Cancelled);
        }

        let layer = match self.store.load_layer(stored_name) {
            Ok(LayerLoad::Loaded(layer)) => layer,
            Ok(LayerLoad::Empty { .. }) => {
                log::debug!("Layer '{stored_name}' has no valid geometry");
                return LayerOutcome::Empty;
            }
            Err(GeolayerError::LayerNotFound(_)) => {
                log::info!("Layer '{stored_name}' disappeared after catalog lookup");
                return LayerOutcome::Skipped(SkipReason::NotFound);
            }
            Err(err) => {
                log::warn!("Skipping layer '{stored_name}': {err}");
                return LayerOutcome::Skipped(SkipReason::LoadFailed);
            }
        };

        if cancel.is_cancelled() {
            log::debug!("Layer '{stored_name}' cancelled after loading");
            return LayerOutcome::Skipped(SkipReason::Cancelled);
        }

        let layer = match self.normalizer.normalize(layer) {
            Ok(layer) => layer,
            Err(err) => {
                log::warn!("Skipping layer '{stored_name}', reprojection failed: {err}");
                return LayerOutcome::Skipped(SkipReason::Reprojection);
            }
        };

        if cancel.is_cancelled() {
            log::debug!("Layer '{stored_name}' cancelled after reprojection");
            return LayerOutcome::Skipped(SkipReason::Cancelled);
        }

        let candidates = layer.len();
        let matched = select(query, layer, predicate)
            .into_iter()
            .map(|feature| feature.with_layer_name(requested_name))
            .collect::<Vec<_>>();
        log::debug!(
            "{} of {candidates} features of '{stored_name}' satisfy {predicate}",
            matched.len()
        );
        LayerOutcome::Matched(matched)
    }
}

/// Limits applied to one multi-layer query
#[derive(Debug, Clone)]
pub struct QueryLimits {
    pub max_concurrent_layers: usize,
    pub timeout: Option<Duration>,
}

/// Run a multi-layer query
///
/// The query geometry must already be in the pipeline's target reference system.
/// Layers run concurrently, at most `limits.max_concurrent_layers` at a time. When
/// `cancel` fires or the timeout elapses, finished layers are kept and the rest are
/// reported as cancelled or timed out. The deadline also covers the catalog lookup.
pub async fn run_query(
    catalog: Arc<LayerCatalog>,
    pipeline: Arc<LayerPipeline>,
    query: SpatialQuery,
    limits: &QueryLimits,
    cancel: CancellationToken,
) -> Result<QueryOutcome> {
    let SpatialQuery {
        geometry,
        layers: requested,
        predicate,
    } = query;

    let deadline = limits
        .timeout
        .map(|timeout| tokio::time::Instant::now() + timeout);
    let timeout = async move {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(timeout);

    // One listing serves every requested layer
    let lookup = tokio::task::spawn_blocking(move || catalog.listing());
    let listing = tokio::select! {
        joined = lookup => joined.map_err(|err| {
            GeolayerError::Internal(format!("Catalog lookup task failed: {err}"))
        })??,
        _ = cancel.cancelled() => {
            log::info!("Query cancelled during catalog lookup");
            return Ok(QueryOutcome::interrupted(predicate, requested, SkipReason::Cancelled));
        }
        _ = &mut timeout => {
            log::info!("Query timed out during catalog lookup");
            return Ok(QueryOutcome::interrupted(predicate, requested, SkipReason::TimedOut));
        }
    };
    let geometry = Arc::new(geometry);
    let semaphore = Arc::new(Semaphore::new(limits.max_concurrent_layers.max(1)));
    let worker_cancel = cancel.child_token();

    let mut slots: Vec<Option<LayerOutcome>> = vec![None; requested.len()];
    let mut join_set = JoinSet::new();

    for (index, requested_name) in requested.iter().enumerate() {
        let Some(stored_name) = resolve_in(&listing, requested_name).map(str::to_string) else {
            log::info!("Layer '{requested_name}' not found");
            slots[index] = Some(LayerOutcome::Skipped(SkipReason::NotFound));
            continue;
        };

        let requested_name = requested_name.clone();
        let pipeline = pipeline.clone();
        let geometry = geometry.clone();
        let semaphore = semaphore.clone();
        let cancel = worker_cancel.clone();

        join_set.spawn(async move {
            let _permit = tokio::select! {
                permit = semaphore.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return (index, LayerOutcome::Skipped(SkipReason::Cancelled)),
                },
                _ = cancel.cancelled() => {
                    return (index, LayerOutcome::Skipped(SkipReason::Cancelled))
                }
            };

            let outcome = tokio::task::spawn_blocking(move || {
                pipeline.run(&stored_name, &requested_name, &geometry, predicate, &cancel)
            })
            .await
            .unwrap_or_else(|err| {
                log::error!("Layer worker failed: {err}");
                LayerOutcome::Skipped(SkipReason::LoadFailed)
            });

            (index, outcome)
        });
    }

    let interrupted = loop {
        tokio::select! {
            joined = join_set.join_next() => match joined {
                Some(Ok((index, outcome))) => slots[index] = Some(outcome),
                Some(Err(err)) => log::error!("Layer task failed: {err}"),
                None => break None,
            },
            _ = cancel.cancelled() => break Some(SkipReason::Cancelled),
            _ = &mut timeout => break Some(SkipReason::TimedOut),
        }
    };

    if let Some(reason) = interrupted {
        drain_finished(&mut join_set, &mut slots);
        log::info!(
            "Query interrupted ({reason}) with {} of {} layers finished",
            slots.iter().filter(|slot| slot.is_some()).count(),
            slots.len()
        );
        worker_cancel.cancel();
        join_set.abort_all();
    }

    let mut layers = Vec::with_capacity(requested.len());
    for (requested_name, slot) in requested.into_iter().zip(slots) {
        let outcome = match (slot, interrupted) {
            (Some(outcome), _) => outcome,
            (None, Some(reason)) => LayerOutcome::Skipped(reason),
            (None, None) => {
                return geolayer_internal_err!("No outcome recorded for layer '{}'", requested_name)
            }
        };
        layers.push(LayerResult {
            layer: requested_name,
            outcome,
        });
    }

    Ok(QueryOutcome { predicate, layers })
}

/// Record layers that completed but were not yet collected when the query was
/// interrupted
fn drain_finished(
    join_set: &mut JoinSet<(usize, LayerOutcome)>,
    slots: &mut [Option<LayerOutcome>],
) {
    while let Some(joined) = join_set.try_join_next() {
        match joined {
            Ok((index, outcome)) => slots[index] = Some(outcome),
            Err(err) => log::error!("Layer task failed: {err}"),
        }
    }
}
