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

//! Defines the error taxonomy shared by every dataset operation.

use crate::{ComponentType, Entity};

/// A precondition violation reported synchronously by a dataset operation.
///
/// None of these are retried internally. A failed operation leaves the dataset
/// exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatasetError {
    /// The entity does not exist in the dataset.
    #[error("{entity} does not exist")]
    NotFound {
        /// The missing entity.
        entity: Entity,
    },
    /// An explicit-id entity creation collided with a live entity.
    #[error("{entity} is already in use")]
    AlreadyInUse {
        /// The entity that already exists.
        entity: Entity,
    },
    /// The entity already holds an instance of the component type.
    #[error("{entity} already has a {component} component")]
    DuplicateComponent {
        /// The target entity.
        entity: Entity,
        /// The component type that is already present.
        component: ComponentType,
    },
    /// The component type is not part of the current schema.
    #[error("component type {component} is not registered")]
    UnregisteredType {
        /// The unknown component type.
        component: ComponentType,
    },
    /// A schema change would drop a component type that still has live instances.
    #[error("cannot remove component type {component}: {entity} still holds an instance")]
    LiveComponentsPresent {
        /// The component type that was about to be removed.
        component: ComponentType,
        /// The first entity found holding an instance.
        entity: Entity,
    },
    /// A component index is outside the current schema.
    #[error("component index {index} is out of range (schema has {count} types)")]
    InvalidIndex {
        /// The offending index.
        index: usize,
        /// The number of registered component types.
        count: usize,
    },
    /// An instance was added under a schema slot of a different type.
    #[error("expected a {expected} instance, got a value of another type")]
    ComponentTypeMismatch {
        /// The component type of the target schema slot.
        expected: ComponentType,
    },
    /// A schema change would drop a component type a registered observer requires.
    #[error("cannot remove component type {component}: a registered observer requires it")]
    ObservedTypeRemoved {
        /// The component type that was about to be removed.
        component: ComponentType,
    },
    /// A type map listed the same component type twice.
    #[error("component type {component} appears more than once in the type map")]
    DuplicateType {
        /// The repeated component type.
        component: ComponentType,
    },
}

/// A specialized `Result` type for dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;
