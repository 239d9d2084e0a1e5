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

//! # Tessera Core
//!
//! Foundational leaf types shared by the Tessera dataset: the growable
//! [`Bitset`] behind every occupancy table, the [`Entity`] handle, the
//! [`ComponentType`] schema tag, the [`DatasetError`] taxonomy and the
//! [`DatasetSettings`] loaded at startup.

#![warn(missing_docs)]

pub mod bitset;
pub mod component;
pub mod entity;
pub mod error;
pub mod settings;

pub use bitset::Bitset;
pub use component::{Component, ComponentType};
pub use entity::Entity;
pub use error::{DatasetError, Result};
pub use settings::{DatasetSettings, SettingsError};
