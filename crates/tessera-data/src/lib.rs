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

//! # Tessera Data
//!
//! The in-memory entity-component dataset: occupancy bitsets, per-type sparse
//! component arrays, live schema remapping, observers and the per-entity event
//! bus. Everything here is single-threaded and re-entrant: callbacks run inline
//! and may mutate the dataset that invoked them.

#![warn(missing_docs)]

pub mod dataset;

pub use dataset::{
    CallbackResult, ComponentHook, ComponentRef, Dataset, DatasetHooks, EntityEvent, EntityHook,
    EventHandler, ListenerId, Observer, ObserverCallback, ObserverId, COMPONENT_ADDED,
    COMPONENT_REMOVED, ENTITY_REMOVED,
};
pub use tessera_core::{
    Bitset, Component, ComponentType, DatasetError, DatasetSettings, Entity, Result,
};
