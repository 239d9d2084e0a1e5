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

//! Defines the entity handle used to address rows of the dataset.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A handle to an entity stored in a dataset.
///
/// An entity carries no data of its own; it is the row index shared by every
/// occupancy table and component array. Indices are dense: a dataset always
/// hands out the lowest index that is not currently alive, so a handle may be
/// reused once the entity it named has been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Entity(u32);

impl Entity {
    /// Creates a handle for a caller-chosen index.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index of this entity.
    #[inline]
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Returns the index of this entity as a `usize`, for array addressing.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for Entity {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}
