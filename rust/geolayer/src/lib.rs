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
pub mod backend;
pub mod catalog;
pub mod context;
pub mod error;
pub mod geojson;
pub mod metadata;
pub mod normalize;
pub mod options;
pub mod predicate;
pub mod query;
pub mod query_geometry;
pub mod store;

pub use context::GeolayerContext;
pub use error::GeolayerError;
pub use options::EngineOptions;
pub use predicate::PredicateKind;
pub use query::{QueryOutcome, SpatialQuery};
pub use query_geometry::QueryGeometry;
