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
use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::sync::LazyLock;

use geolayer_geopackage::GeoPackage;
use regex::Regex;

use crate::error::{GeolayerError, Result};
use crate::options::DEFAULT_METADATA_PREFIXES;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Canonical form of a layer name used to match descriptive metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a layer name with the default prefixes
///
/// `A_Clean_Historic_Sites` and `Historic Sites` both become `historic_sites`.
pub fn normalize_layer_key(raw: &str) -> NormalizedKey {
    LayerKeyNormalizer::default().normalize(raw)
}

/// Turns layer names into [NormalizedKey]s
///
/// Normalization trims the name, strips at most one known prefix (ignoring case,
/// longest prefix first), lowercases, and replaces each run of whitespace by `_`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerKeyNormalizer {
    prefixes: Vec<String>,
}

impl LayerKeyNormalizer {
    pub fn new(prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut prefixes = prefixes
            .into_iter()
            .map(Into::into)
            .filter(|prefix: &String| !prefix.is_empty())
            .collect::<Vec<_>>();
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()));
        Self { prefixes }
    }

    pub fn normalize(&self, raw: &str) -> NormalizedKey {
        let trimmed = raw.trim();
        let stripped = self
            .prefixes
            .iter()
            .find_map(|prefix| {
                trimmed
                    .get(..prefix.len())
                    .filter(|head| head.eq_ignore_ascii_case(prefix))
                    .map(|_| &trimmed[prefix.len()..])
            })
            .unwrap_or(trimmed);

        let folded = stripped.trim().to_lowercase();
        NormalizedKey(WHITESPACE.replace_all(&folded, "_").into_owned())
    }
}

impl Default for LayerKeyNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_METADATA_PREFIXES)
    }
}

/// Looks up descriptive text for a layer
pub trait MetadataResolver: Debug + Send + Sync {
    /// Text describing `raw_name`, if any is known
    fn resolve(&self, raw_name: &str) -> Result<Option<String>>;
}

/// A resolver that knows nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetadata;

impl MetadataResolver for NoMetadata {
    fn resolve(&self, _raw_name: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Metadata held in memory, keyed by normalized layer name
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadata {
    normalizer: LayerKeyNormalizer,
    entries: HashMap<NormalizedKey, String>,
}

impl InMemoryMetadata {
    pub fn new(normalizer: LayerKeyNormalizer) -> Self {
        Self {
            normalizer,
            entries: HashMap::new(),
        }
    }

    /// Add text for a layer; a later entry with the same key replaces the earlier one
    pub fn insert(&mut self, raw_name: &str, text: impl Into<String>) {
        self.entries
            .insert(self.normalizer.normalize(raw_name), text.into());
    }

    pub fn with_entry(mut self, raw_name: &str, text: impl Into<String>) -> Self {
        self.insert(raw_name, text);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MetadataResolver for InMemoryMetadata {
    fn resolve(&self, raw_name: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .get(&self.normalizer.normalize(raw_name))
            .cloned())
    }
}

/// Metadata read from the `layer_metadata` table of a GeoPackage
///
/// The table is read on every lookup so that edits to the file show up without a
/// restart. The first row whose normalized name matches wins.
#[derive(Debug, Clone)]
pub struct GeoPackageMetadata {
    gpkg: GeoPackage,
    normalizer: LayerKeyNormalizer,
}

impl GeoPackageMetadata {
    pub fn new(gpkg: GeoPackage, normalizer: LayerKeyNormalizer) -> Self {
        Self { gpkg, normalizer }
    }
}

impl MetadataResolver for GeoPackageMetadata {
    fn resolve(&self, raw_name: &str) -> Result<Option<String>> {
        let key = self.normalizer.normalize(raw_name);
        let entries = self.gpkg.metadata_entries().map_err(|err| GeolayerError::LayerLoad {
            layer: raw_name.to_string(),
            message: format!("Can't read layer metadata: {err}"),
        })?;

        Ok(entries
            .into_iter()
            .find(|entry| self.normalizer.normalize(&entry.layer_name) == key)
            .and_then(|entry| entry.text))
    }
}

#[cfg(test)]
mod tests {
    use geolayer_testing::fixtures::scenario_geopackage;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("A_Clean_Historic_Sites", "historic_sites")]
    #[case("Historic Sites", "historic_sites")]
    #[case("  Historic \t  Sites ", "historic_sites")]
    #[case("clean_Parks", "parks")]
    #[case("a_clean_parks", "parks")]
    #[case("Clean_A_Clean_Parks", "a_clean_parks")]
    #[case("Parks", "parks")]
    #[case("A_Clean_", "")]
    #[case("Ünïcode Layer", "ünïcode_layer")]
    fn default_keys(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_layer_key(raw).as_str(), expected);
    }

    #[test]
    fn custom_prefixes() {
        let normalizer = LayerKeyNormalizer::new(["Final_", "Final_Final_", ""]);
        assert_eq!(normalizer.normalize("Final_Final_Roads").as_str(), "roads");
        assert_eq!(normalizer.normalize("A_Clean_Roads").as_str(), "a_clean_roads");
    }

    #[test]
    fn in_memory() {
        let metadata = InMemoryMetadata::default()
            .with_entry("Historic Sites", "<metadata>sites</metadata>")
            .with_entry("PARKS", "<metadata>parks</metadata>");
        assert_eq!(metadata.len(), 2);
        assert_eq!(
            metadata.resolve("A_Clean_Historic_Sites").unwrap().as_deref(),
            Some("<metadata>sites</metadata>")
        );
        assert_eq!(
            metadata.resolve("parks").unwrap().as_deref(),
            Some("<metadata>parks</metadata>")
        );
        assert_eq!(metadata.resolve("roads").unwrap(), None);
        assert_eq!(NoMetadata.resolve("parks").unwrap(), None);
    }

    #[test]
    fn geopackage() {
        let (_dir, path) = scenario_geopackage();
        let metadata = GeoPackageMetadata::new(
            GeoPackage::open(&path).unwrap(),
            LayerKeyNormalizer::default(),
        );
        assert_eq!(
            metadata.resolve("A_Clean_Historic_Sites").unwrap().as_deref(),
            Some("<metadata>Registered historic sites</metadata>")
        );
        assert_eq!(
            metadata.resolve("parks").unwrap().as_deref(),
            Some("<metadata>City and county parks</metadata>")
        );
        assert_eq!(metadata.resolve("roads").unwrap(), None);
    }
}
