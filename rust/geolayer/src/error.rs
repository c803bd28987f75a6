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

pub type Result<T, E = GeolayerError> = std::result::Result<T, E>;

/// Errors raised by the layer query engine
///
/// Only request-level faults surface as errors. Conditions that affect a single
/// layer of a multi-layer query are reported as [SkipReason](crate::query::SkipReason)
/// data instead.
#[derive(Error, Debug)]
pub enum GeolayerError {
    #[error("Invalid query geometry: {0}")]
    InvalidGeometry(String),
    #[error(
        "Invalid spatial predicate '{0}': expected one of intersects, within, contains, \
         touches, crosses, overlaps, equals, disjoint"
    )]
    InvalidPredicate(String),
    #[error("Layer catalog unavailable: {0}")]
    CatalogUnavailable(String),
    #[error("Layer '{0}' not found")]
    LayerNotFound(String),
    #[error("Failed to load layer '{layer}': {message}")]
    LayerLoad { layer: String, message: String },
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Geometry(#[from] GeolayerGeometryError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Internal(String),
}

impl GeolayerError {
    /// Whether the caller supplied something unusable (a 400-class fault)
    pub fn is_request_fault(&self) -> bool {
        matches!(
            self,
            GeolayerError::InvalidGeometry(_)
                | GeolayerError::InvalidPredicate(_)
                | GeolayerError::Configuration(_)
                | GeolayerError::Json(_)
        )
    }

    /// Whether the requested thing does not exist (a 404-class fault)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GeolayerError::LayerNotFound(_) | GeolayerError::CatalogUnavailable(_)
        )
    }

    /// Whether repeating the request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, GeolayerError::CatalogUnavailable(_))
    }
}

/// Macro to create a geolayer internal error for violated invariants
#[macro_export]
macro_rules! geolayer_internal_err {
    ($($args:expr),*) => {{
        let msg = std::format!(
            "Geolayer internal error: {}.\nThis issue was likely caused by a bug in geolayer's code. \
            Please help us to resolve this by filing a bug report.",
            std::format!($($args),*),
        );
        Err($crate::error::GeolayerError::Internal(msg))
    }};
}
