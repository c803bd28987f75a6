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
use std::fmt::Display;
use std::sync::LazyLock;
use std::time::Duration;

use geolayer_schema::crs::{lnglat, Crs};
use regex::Regex;

use crate::error::{GeolayerError, Result};

/// Default number of layers processed at the same time by one query
pub const DEFAULT_MAX_CONCURRENT_LAYERS: usize = 4;

/// Default time a cached catalog listing is trusted
pub const DEFAULT_CATALOG_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Default prefixes stripped from layer names when looking up metadata
pub const DEFAULT_METADATA_PREFIXES: [&str; 2] = ["A_Clean_", "Clean_"];

/// Environment variables read by [EngineOptions::from_env] start with this
pub const ENV_PREFIX: &str = "GEOLAYER_";

/// A key, current value, and description of one option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionEntry {
    pub key: String,
    pub value: Option<String>,
    pub description: &'static str,
}

/// Receives every option of a namespace with its current value
pub trait Visit {
    fn some<V: Display>(&mut self, key: &str, value: V, description: &'static str);

    fn none(&mut self, key: &str, description: &'static str);
}

/// A value that can be listed and set from strings
pub trait OptionField {
    fn visit<V: Visit>(&self, v: &mut V, key: &str, description: &'static str);

    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Declare a struct of options with defaults, string setters and a visitor
///
/// Field docs become the descriptions reported by `entries()`.
macro_rules! options_namespace {
    (
        $(#[doc = $struct_d:tt])*
        $vis:vis struct $struct_name:ident {
            $(
                $(#[doc = $d:tt])*
                $field_vis:vis $field_name:ident : $field_type:ty, default = $default:expr,
            )*
        }
    ) => {
        $(#[doc = $struct_d])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $struct_name {
            $(
                $(#[doc = $d])*
                $field_vis $field_name: $field_type,
            )*
        }

        impl OptionField for $struct_name {
            fn set(&mut self, key: &str, value: &str) -> Result<()> {
                let (key, rem) = key.split_once('.').unwrap_or((key, ""));
                match key {
                    $(
                        stringify!($field_name) => self.$field_name.set(rem, value),
                    )*
                    _ => Err(GeolayerError::Configuration(format!(
                        "Config value \"{}\" not found on {}",
                        key,
                        stringify!($struct_name)
                    ))),
                }
            }

            fn visit<V: Visit>(&self, v: &mut V, key_prefix: &str, _description: &'static str) {
                $(
                    let key = format!(concat!("{}.", stringify!($field_name)), key_prefix);
                    let description = concat!($($d),*).trim();
                    self.$field_name.visit(v, key.as_str(), description);
                )*
            }
        }

        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field_name: $default),*
                }
            }
        }
    };
}

options_namespace! {
    /// Configuration of the layer query engine
    ///
    /// Built once, then shared immutably by every request.
    pub struct EngineOptions {
        /// Reference system of every geometry the engine returns
        pub target_crs: Crs, default = lnglat(),

        /// Maximum number of layers loaded and evaluated at the same time by one query
        pub max_concurrent_layers: usize, default = DEFAULT_MAX_CONCURRENT_LAYERS,

        /// Time budget of a multi-layer query; layers unfinished when it elapses are
        /// reported as timed out
        pub query_timeout: Option<Duration>, default = None,

        /// How long a catalog listing is reused before the backend is asked again
        /// (0s disables caching)
        pub catalog_refresh_interval: Duration, default = DEFAULT_CATALOG_REFRESH_INTERVAL,

        /// Number of coordinate transforms kept by the transform cache
        pub transform_cache_size: usize, default = geolayer_geometry::transform::DEFAULT_TRANSFORM_CACHE_SIZE,

        /// Comma separated layer name prefixes ignored when matching metadata
        pub metadata_prefixes: Vec<String>, default = DEFAULT_METADATA_PREFIXES.iter().map(|p| p.to_string()).collect(),
    }
}

impl EngineOptions {
    pub const PREFIX: &'static str = "geolayer";

    /// Set an option from its string key, e.g. `geolayer.max_concurrent_layers`
    ///
    /// The `geolayer.` prefix is optional.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let key = key
            .strip_prefix(Self::PREFIX)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(key);
        <Self as OptionField>::set(self, key, value)
    }

    /// Every option with its current value and description
    pub fn entries(&self) -> Vec<OptionEntry> {
        struct Visitor(Vec<OptionEntry>);

        impl Visit for Visitor {
            fn some<V: Display>(&mut self, key: &str, value: V, description: &'static str) {
                self.0.push(OptionEntry {
                    key: key.to_string(),
                    value: Some(value.to_string()),
                    description,
                })
            }

            fn none(&mut self, key: &str, description: &'static str) {
                self.0.push(OptionEntry {
                    key: key.to_string(),
                    value: None,
                    description,
                })
            }
        }

        let mut v = Visitor(vec![]);
        self.visit(&mut v, Self::PREFIX, "");
        v.0
    }

    /// Defaults overridden by `GEOLAYER_<OPTION>` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Defaults overridden by `GEOLAYER_<OPTION>` entries of `vars`
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let mut options = Self::default();
        let keys = options
            .entries()
            .into_iter()
            .map(|entry| entry.key)
            .collect::<Vec<_>>();

        for (name, value) in vars {
            let Some(option) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let option = option.to_lowercase();
            let key = format!("{}.{option}", Self::PREFIX);
            if keys.contains(&key) {
                log::debug!("Setting {key} from {name}");
                options.set(&key, &value)?;
            }
        }

        Ok(options)
    }

    /// [Self::max_concurrent_layers], never less than one
    pub fn layer_parallelism(&self) -> usize {
        self.max_concurrent_layers.max(1)
    }
}

fn configuration_err<T>(key: &str, value: &str, expected: &str) -> Result<T> {
    Err(GeolayerError::Configuration(format!(
        "Invalid value '{value}' for {key}: expected {expected}"
    )))
}

impl OptionField for usize {
    fn visit<V: Visit>(&self, v: &mut V, key: &str, description: &'static str) {
        v.some(key, self, description);
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match value.trim().parse() {
            Ok(parsed) => {
                *self = parsed;
                Ok(())
            }
            Err(_) => configuration_err(key, value, "a non-negative integer"),
        }
    }
}

impl OptionField for Crs {
    fn visit<V: Visit>(&self, v: &mut V, key: &str, description: &'static str) {
        v.some(key, self, description);
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match value.parse() {
            Ok(parsed) => {
                *self = parsed;
                Ok(())
            }
            Err(_) => configuration_err(key, value, "an authority:code such as EPSG:4326"),
        }
    }
}

static DURATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*(ms|s|m)?$").unwrap());

/// Parse `250ms`, `30s`, `5m` or a bare number of seconds
pub fn parse_duration(value: &str) -> Option<Duration> {
    let captures = DURATION_REGEX.captures(value.trim())?;
    let amount = captures.get(1)?.as_str().parse::<u64>().ok()?;
    match captures.get(2).map(|unit| unit.as_str()) {
        Some("ms") => Some(Duration::from_millis(amount)),
        Some("m") => amount.checked_mul(60).map(Duration::from_secs),
        _ => Some(Duration::from_secs(amount)),
    }
}

fn format_duration(value: &Duration) -> String {
    if value.subsec_millis() == 0 {
        format!("{}s", value.as_secs())
    } else {
        format!("{}ms", value.as_millis())
    }
}

impl OptionField for Duration {
    fn visit<V: Visit>(&self, v: &mut V, key: &str, description: &'static str) {
        v.some(key, format_duration(self), description);
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match parse_duration(value) {
            Some(parsed) => {
                *self = parsed;
                Ok(())
            }
            None => configuration_err(key, value, "a duration such as 250ms, 30s or 5m"),
        }
    }
}

impl OptionField for Option<Duration> {
    fn visit<V: Visit>(&self, v: &mut V, key: &str, description: &'static str) {
        match self {
            Some(value) => v.some(key, format_duration(value), description),
            None => v.none(key, description),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            *self = None;
            return Ok(());
        }

        let mut parsed = Duration::ZERO;
        parsed.set(key, trimmed)?;
        *self = Some(parsed);
        Ok(())
    }
}

impl OptionField for Vec<String> {
    fn visit<V: Visit>(&self, v: &mut V, key: &str, description: &'static str) {
        v.some(key, self.join(","), description);
    }

    fn set(&mut self, _key: &str, value: &str) -> Result<()> {
        *self = value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect();
        Ok(())
    }
}
