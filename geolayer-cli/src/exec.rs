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

//! Execution of parsed subcommands

use geolayer::{
    error::Result,
    geojson::{
        layer_feature_collection, GroupedQueryResponse, LayerDocumentResponse, LayerListResponse,
    },
    EngineOptions, GeolayerContext, GeolayerError, PredicateKind, QueryGeometry, SpatialQuery,
};
use geolayer_schema::crs::Crs;
use serde_json::{json, Value};

use crate::{Command, Shape};

/// Run one subcommand against a context, returning its JSON output
pub(crate) async fn exec_command(ctx: &GeolayerContext, command: Command) -> Result<Value> {
    match command {
        Command::Layers => {
            let layers = ctx.list_layers().await?;
            Ok(serde_json::to_value(LayerListResponse { layers })?)
        }
        Command::Layer { name } => {
            let document = ctx.fetch_layer(&name).await?;
            Ok(serde_json::to_value(LayerDocumentResponse::from(&document))?)
        }
        Command::Describe { name } => Ok(serde_json::to_value(ctx.describe_layer(&name).await?)?),
        Command::Metadata { name } => {
            let metadata = ctx.layer_metadata(&name).await;
            Ok(json!({ "layer": name, "metadata": metadata }))
        }
        Command::Query {
            geometry,
            layers,
            predicate,
            crs,
            shape,
            ..
        } => {
            let crs = crs
                .map(|crs| crs.parse::<Crs>())
                .transpose()
                .map_err(|err| GeolayerError::InvalidGeometry(format!("Invalid crs: {err}")))?;
            let geometry = QueryGeometry::parse(&geometry, crs)?;
            let predicate = PredicateKind::parse_or_default(predicate.as_deref())?;
            let query = SpatialQuery::new(geometry, layers).with_predicate(predicate);

            let outcome = ctx.query(query).await?;
            for (layer, reason) in outcome.skipped() {
                log::info!("Skipped '{layer}': {reason}");
            }
            match shape {
                Shape::Grouped => Ok(serde_json::to_value(
                    GroupedQueryResponse::try_from_outcome(&outcome)?,
                )?),
                Shape::Flat => Ok(serde_json::to_value(layer_feature_collection(
                    outcome.features(),
                ))?),
            }
        }
        Command::Options => Ok(options_json(ctx.options())),
    }
}

/// `{key: {"value", "description"}}` for every engine option
pub(crate) fn options_json(options: &EngineOptions) -> Value {
    let entries = options
        .entries()
        .into_iter()
        .map(|entry| {
            (
                entry.key,
                json!({ "value": entry.value, "description": entry.description }),
            )
        })
        .collect::<serde_json::Map<_, _>>();
    Value::Object(entries)
}

pub(crate) fn print_json(value: &Value, compact: bool) -> Result<()> {
    let text = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{text}");
    Ok(())
}
