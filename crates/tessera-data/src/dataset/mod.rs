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

//! Implements Tessera's **entity-component dataset**.
//!
//! The dataset is a columnar store: entity occupancy and (entity, component)
//! occupancy are tracked in [`Bitset`](tessera_core::Bitset)s, and every
//! registered component type owns a sparse array indexed directly by entity.
//! The set and order of registered types (the *schema*) can change at runtime
//! while data and observers stay valid.
//!
//! Three reactive layers sit on top of the store:
//! - **hooks** ([`DatasetHooks`]), invoked on every entity and component
//!   creation and removal;
//! - **observers** ([`Observer`]), standing queries notified exactly once when
//!   an entity starts or stops holding every component they require;
//! - the per-entity **event bus** ([`EntityEvent`]), carrying structural
//!   notifications and user-defined events to per-entity listeners.
//!
//! All callbacks run inline and receive `&mut Dataset`, so they may mutate the
//! dataset that is notifying them.
//!
//! The primary entry point is the [`Dataset`] struct.

use std::any::Any;
use std::rc::Rc;

mod dispatch;
mod events;
mod hooks;
mod observer;
mod remap;
mod store;
mod traverse;

pub use events::{
    EntityEvent, EventHandler, ListenerId, COMPONENT_ADDED, COMPONENT_REMOVED, ENTITY_REMOVED,
};
pub use hooks::{ComponentHook, DatasetHooks, EntityHook};
pub use observer::{Observer, ObserverCallback, ObserverId};
pub use store::Dataset;

/// A shared, type-erased handle to a stored component instance.
///
/// Reads hand out clones of this handle. Holding one does not keep the
/// component attached to its entity: callers must not assume the instance is
/// still stored after the next removal of that component or entity.
pub type ComponentRef = Rc<dyn Any>;

/// The result returned by every user-supplied callback.
///
/// An `Err` is logged at the dispatch boundary and never aborts the rest of the
/// dispatch.
pub type CallbackResult = anyhow::Result<()>;
