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

//! Structural hooks invoked on entity and component creation and removal.

use std::fmt;
use std::rc::Rc;

use tessera_core::{ComponentType, Entity};

use super::{CallbackResult, ComponentRef, Dataset};

/// A hook invoked with the entity that was just created or removed.
pub type EntityHook = Rc<dyn Fn(&mut Dataset, Entity) -> CallbackResult>;

/// A hook invoked with the component that was just added or removed.
///
/// For removals the instance has already left the store; the hook receives the
/// last handle to it.
pub type ComponentHook =
    Rc<dyn Fn(&mut Dataset, Entity, ComponentType, &ComponentRef) -> CallbackResult>;

/// The set of optional structural hooks of a [`Dataset`].
///
/// Hooks run before observers and entity events for additions, and after
/// observers for removals.
#[derive(Clone, Default)]
pub struct DatasetHooks {
    /// Called after an entity has been created.
    pub on_entity_created: Option<EntityHook>,
    /// Called after an entity has been removed and freed.
    pub on_entity_removed: Option<EntityHook>,
    /// Called after a component has been stored.
    pub on_component_added: Option<ComponentHook>,
    /// Called after a component has been cleared from the store.
    pub on_component_removed: Option<ComponentHook>,
}

impl DatasetHooks {
    /// Sets the entity creation hook.
    pub fn on_entity_created(
        mut self,
        hook: impl Fn(&mut Dataset, Entity) -> CallbackResult + 'static,
    ) -> Self {
        self.on_entity_created = Some(Rc::new(hook));
        self
    }

    /// Sets the entity removal hook.
    pub fn on_entity_removed(
        mut self,
        hook: impl Fn(&mut Dataset, Entity) -> CallbackResult + 'static,
    ) -> Self {
        self.on_entity_removed = Some(Rc::new(hook));
        self
    }

    /// Sets the component addition hook.
    pub fn on_component_added(
        mut self,
        hook: impl Fn(&mut Dataset, Entity, ComponentType, &ComponentRef) -> CallbackResult + 'static,
    ) -> Self {
        self.on_component_added = Some(Rc::new(hook));
        self
    }

    /// Sets the component removal hook.
    pub fn on_component_removed(
        mut self,
        hook: impl Fn(&mut Dataset, Entity, ComponentType, &ComponentRef) -> CallbackResult + 'static,
    ) -> Self {
        self.on_component_removed = Some(Rc::new(hook));
        self
    }
}

impl fmt::Debug for DatasetHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetHooks")
            .field("on_entity_created", &self.on_entity_created.is_some())
            .field("on_entity_removed", &self.on_entity_removed.is_some())
            .field("on_component_added", &self.on_component_added.is_some())
            .field("on_component_removed", &self.on_component_removed.is_some())
            .finish()
    }
}
