// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tunable settings for a dataset.

use serde::{Deserialize, Serialize};

/// Settings that influence how a dataset allocates and reports.
///
/// Every field has a default, so a settings file only needs to list the values
/// it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSettings {
    /// Number of entity slots pre-allocated in the occupancy tables and in
    /// every component array.
    pub initial_entity_capacity: usize,
    /// If `true`, removing a component that is not present logs a warning.
    pub warn_on_missing_component: bool,
    /// If `true`, a failing observer or event callback is logged. Failures are
    /// never propagated to the caller either way.
    pub log_callback_errors: bool,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            initial_entity_capacity: 64,
            warn_on_missing_component: true,
            log_callback_errors: true,
        }
    }
}

/// An error raised while reading or writing settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings source is not valid RON.
    #[error("failed to parse dataset settings: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// The settings could not be serialized.
    #[error("failed to serialize dataset settings: {0}")]
    Serialize(#[from] ron::Error),
}

impl DatasetSettings {
    /// Parses settings from a RON document.
    pub fn from_ron(source: &str) -> Result<Self, SettingsError> {
        let settings = ron::from_str(source)?;
        log::debug!("Loaded dataset settings: {settings:?}");
        Ok(settings)
    }

    /// Serializes these settings into a pretty-printed RON document.
    pub fn to_ron(&self) -> Result<String, SettingsError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }
}
