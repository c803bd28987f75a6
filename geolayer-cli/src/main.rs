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
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use geolayer::{EngineOptions, GeolayerContext, GeolayerError};

mod exec;

#[derive(Debug, Parser, PartialEq)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(
        short = 'd',
        long,
        global = true,
        env = "GEOLAYER_DATABASE",
        help = "GeoPackage holding the layers"
    )]
    database: Option<PathBuf>,

    #[clap(long, global = true, help = "Print JSON on a single line")]
    compact: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand, PartialEq)]
pub(crate) enum Command {
    /// List every layer
    Layers,
    /// Print a whole layer as GeoJSON with its metadata
    Layer { name: String },
    /// Describe the reference system, columns and size of a layer
    Describe { name: String },
    /// Print the metadata text of a layer
    Metadata { name: String },
    /// Compare a geometry against one or more layers
    Query {
        #[clap(
            short,
            long,
            help = "Query geometry as GeoJSON or WKT",
            value_parser(parse_non_empty)
        )]
        geometry: String,

        #[clap(short, long, value_delimiter = ',', num_args = 1.., required = true)]
        layers: Vec<String>,

        #[clap(short, long, help = "intersects, within, contains, touches, crosses, overlaps, equals or disjoint")]
        predicate: Option<String>,

        #[clap(long, help = "Reference system of the query geometry, e.g. EPSG:3310")]
        crs: Option<String>,

        #[clap(long, value_enum, default_value_t = Shape::Grouped)]
        shape: Shape,

        #[clap(long, help = "Give up on layers still running after this many milliseconds")]
        timeout_ms: Option<u64>,
    },
    /// Print the effective engine options
    Options,
}

/// Output shape of a multi-layer query
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Shape {
    /// Matches and counts per layer, plus skipped layers
    Grouped,
    /// One FeatureCollection tagged with `layer_name`
    Flat,
}

#[tokio::main]
/// Calls [`main_inner`], then handles printing errors and returning the correct exit code
pub async fn main() -> ExitCode {
    if let Err(e) = main_inner().await {
        eprintln!("Error: {e}");
        return if e.is_request_fault() || e.is_not_found() {
            ExitCode::from(2)
        } else {
            ExitCode::FAILURE
        };
    }

    ExitCode::SUCCESS
}

async fn main_inner() -> Result<(), GeolayerError> {
    env_logger::init();

    let args = Args::parse();
    let mut options = EngineOptions::from_env()?;
    if let Command::Query {
        timeout_ms: Some(timeout_ms),
        ..
    } = &args.command
    {
        options.query_timeout = Some(Duration::from_millis(*timeout_ms));
    }

    if args.command == Command::Options {
        return exec::print_json(&exec::options_json(&options), args.compact);
    }

    let Some(database) = &args.database else {
        return Err(GeolayerError::Configuration(
            "No database given; pass --database or set GEOLAYER_DATABASE".to_string(),
        ));
    };
    log::debug!("Using database {}", database.display());

    let ctx = GeolayerContext::open_geopackage(database, options)?;
    let output = exec::exec_command(&ctx, args.command).await?;
    exec::print_json(&output, args.compact)
}

fn parse_non_empty(value: &str) -> Result<String, String> {
    if !value.trim().is_empty() {
        Ok(value.to_string())
    } else {
        Err("expected a non empty value".to_string())
    }
}
