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

//! The per-entity event bus.
//!
//! Every entity can carry listeners keyed by event name. The dataset itself
//! emits [`COMPONENT_ADDED`], [`COMPONENT_REMOVED`] and [`ENTITY_REMOVED`];
//! callers may send any other name with an [`EntityEvent::Custom`] payload.
//!
//! Dispatch snapshots the listener list into a scratch stack shared by the
//! whole dataset. Each dispatch owns the region between the stack length at its
//! start and the end of its snapshot, and truncates back to its start when it
//! finishes, so a handler may add or remove listeners, or send further events,
//! without disturbing the dispatch it runs in.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tessera_core::{ComponentType, Entity, Result};

use super::{CallbackResult, ComponentRef, Dataset};

/// Sent after a component has been added to the entity.
pub const COMPONENT_ADDED: &str = "ComponentAdded";
/// Sent after a component has been removed from the entity.
pub const COMPONENT_REMOVED: &str = "ComponentRemoved";
/// Sent once when the entity is removed, after all its components are gone.
pub const ENTITY_REMOVED: &str = "EntityRemoved";

/// The payload delivered to entity event listeners.
#[derive(Clone)]
pub enum EntityEvent {
    /// A component was added.
    ComponentAdded {
        /// The type of the added component.
        component_type: ComponentType,
        /// The added instance.
        instance: ComponentRef,
    },
    /// A component was removed.
    ComponentRemoved {
        /// The type of the removed component.
        component_type: ComponentType,
        /// The departing instance.
        instance: ComponentRef,
    },
    /// The entity was removed.
    EntityRemoved,
    /// A user-defined event.
    Custom(Rc<dyn Any>),
}

impl EntityEvent {
    /// Wraps a user value into a custom event payload.
    pub fn custom<T: Any>(value: T) -> Self {
        Self::Custom(Rc::new(value))
    }

    /// Returns the custom payload as a `T`, if this is a custom event carrying one.
    pub fn downcast_custom<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Custom(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Returns the component type carried by structural component events.
    pub fn component_type(&self) -> Option<ComponentType> {
        match self {
            Self::ComponentAdded { component_type, .. }
            | Self::ComponentRemoved { component_type, .. } => Some(*component_type),
            _ => None,
        }
    }
}

impl fmt::Debug for EntityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ComponentAdded { component_type, .. } => {
                write!(f, "ComponentAdded({component_type})")
            }
            Self::ComponentRemoved { component_type, .. } => {
                write!(f, "ComponentRemoved({component_type})")
            }
            Self::EntityRemoved => f.write_str("EntityRemoved"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// The signature of an entity event listener.
pub type EventHandler = Rc<dyn Fn(&mut Dataset, Entity, &EntityEvent) -> CallbackResult>;

/// Identifies a registered listener, for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener #{}", self.0)
    }
}

/// The listeners of a single entity, by event name, in registration order.
#[derive(Default)]
pub(super) struct ListenerTable {
    by_name: HashMap<String, Vec<(ListenerId, EventHandler)>>,
}

impl Dataset {
    /// Registers a listener for `name` events sent to `entity`.
    ///
    /// Fails with [`NotFound`](tessera_core::DatasetError::NotFound) if the
    /// entity does not exist. The listener table of the entity is dropped when
    /// the entity is removed.
    pub fn add_entity_event_listener(
        &mut self,
        entity: Entity,
        name: impl Into<String>,
        handler: impl Fn(&mut Dataset, Entity, &EntityEvent) -> CallbackResult + 'static,
    ) -> Result<ListenerId> {
        self.ensure_entity(entity)?;

        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;

        self.listeners
            .entry(entity)
            .or_default()
            .by_name
            .entry(name.into())
            .or_default()
            .push((id, Rc::new(handler)));
        Ok(id)
    }

    /// Unregisters a listener. Returns `false` if it was not registered.
    pub fn remove_entity_event_listener(
        &mut self,
        entity: Entity,
        name: &str,
        id: ListenerId,
    ) -> bool {
        let Some(list) = self
            .listeners
            .get_mut(&entity)
            .and_then(|table| table.by_name.get_mut(name))
        else {
            log::debug!("No '{name}' listeners on {entity}; cannot remove {id}");
            return false;
        };

        let before = list.len();
        list.retain(|(candidate, _)| *candidate != id);
        if list.len() == before {
            log::debug!("{id} is not listening to '{name}' on {entity}");
            return false;
        }
        true
    }

    /// Returns the number of listeners registered for `name` on `entity`.
    pub fn listener_count(&self, entity: Entity, name: &str) -> usize {
        self.listeners
            .get(&entity)
            .and_then(|table| table.by_name.get(name))
            .map_or(0, Vec::len)
    }

    /// Sends an event to every listener of `name` on `entity`.
    ///
    /// Listeners registered while the dispatch is running are not called by it,
    /// and listeners removed while it is running still are. Dispatch stops early
    /// if a handler removes the entity. Returns the number of handlers invoked.
    pub fn send_event(&mut self, entity: Entity, name: &str, event: EntityEvent) -> usize {
        let start = self.dispatch_stack.len();
        match self
            .listeners
            .get(&entity)
            .and_then(|table| table.by_name.get(name))
        {
            Some(list) if !list.is_empty() => {
                self.dispatch_stack.extend(list.iter().cloned());
            }
            _ => return 0,
        }
        let end = self.dispatch_stack.len();
        log::trace!("Sending '{name}' to {entity} ({} listeners)", end - start);

        let mut invoked = 0;
        for slot in start..end {
            if !self.entity_exists(entity) {
                break;
            }
            let (id, handler) = self.dispatch_stack[slot].clone();
            invoked += 1;
            if let Err(err) = handler(self, entity, &event) {
                self.report_callback_error(&format!("{id} for '{name}'"), entity, &err);
            }
        }

        self.dispatch_stack.truncate(start);
        invoked
    }
}
