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

//! The component store: entity and component occupancy, per-type arrays and
//! the create/add/remove primitives.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tessera_core::{
    Bitset, Component, ComponentType, DatasetError, DatasetSettings, Entity, Result,
};

use super::dispatch::ObserverFrame;
use super::events::{EntityEvent, ListenerTable, COMPONENT_ADDED, COMPONENT_REMOVED, ENTITY_REMOVED};
use super::hooks::DatasetHooks;
use super::observer::ObserverRegistry;
use super::{ComponentRef, EventHandler, ListenerId};

/// The central container of the entity-component dataset.
///
/// The `Dataset` exclusively owns every occupancy table and every stored
/// component. Component instances live in `components[component_index][entity]`,
/// and a slot holds a value iff bit `entity * component_type_count +
/// component_index` of the component occupancy is set. Every primitive updates
/// both sides before any callback can observe the state.
pub struct Dataset {
    pub(super) settings: DatasetSettings,

    /// Bit `e` is set iff entity `e` exists.
    pub(super) entity_occupancy: Bitset,
    /// Number of live entities.
    pub(super) entity_count: usize,
    /// Entities whose removal cascade is currently running.
    pub(super) entities_being_removed: Bitset,

    /// Row-major (entity, component index) occupancy.
    pub(super) component_occupancy: Bitset,
    /// The ordered schema. A type's position is its component index.
    pub(super) component_type_map: Vec<ComponentType>,
    /// Reverse lookup from a type to its component index.
    pub(super) type_indices: HashMap<TypeId, usize>,
    /// One sparse array per component index, indexed by entity.
    pub(super) components: Vec<Vec<Option<ComponentRef>>>,
    /// Bumped by every schema change; used to detect stale indices after callbacks.
    pub(super) schema_epoch: u64,

    pub(super) observers: ObserverRegistry,
    /// Observer dispatches currently in flight, innermost last.
    pub(super) observer_frames: Vec<ObserverFrame>,

    /// Per-entity listener tables, created on first registration.
    pub(super) listeners: HashMap<Entity, ListenerTable>,
    /// Shared scratch stack holding the listener snapshots of in-flight dispatches.
    pub(super) dispatch_stack: Vec<(ListenerId, EventHandler)>,
    pub(super) next_listener_id: u64,

    pub(super) hooks: DatasetHooks,
}

impl Default for Dataset {
    fn default() -> Self {
        Self::with_settings(DatasetSettings::default())
    }
}

impl Dataset {
    /// Creates an empty dataset with default settings and an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty dataset using the given settings.
    pub fn with_settings(settings: DatasetSettings) -> Self {
        let capacity = settings.initial_entity_capacity;
        Self {
            entity_occupancy: Bitset::with_capacity(capacity),
            entity_count: 0,
            entities_being_removed: Bitset::new(),
            component_occupancy: Bitset::new(),
            component_type_map: Vec::new(),
            type_indices: HashMap::new(),
            components: Vec::new(),
            schema_epoch: 0,
            observers: ObserverRegistry::default(),
            observer_frames: Vec::new(),
            listeners: HashMap::new(),
            dispatch_stack: Vec::new(),
            next_listener_id: 0,
            hooks: DatasetHooks::default(),
            settings,
        }
    }

    /// Creates an empty dataset and registers `types` as its initial schema.
    pub fn with_component_types(types: impl IntoIterator<Item = ComponentType>) -> Result<Self> {
        let mut dataset = Self::default();
        let types: Vec<ComponentType> = types.into_iter().collect();
        dataset.set_component_type_map(&types)?;
        Ok(dataset)
    }

    /// Returns the settings this dataset was created with.
    pub fn settings(&self) -> &DatasetSettings {
        &self.settings
    }

    /// Installs the structural hooks, replacing any previous ones.
    pub fn set_hooks(&mut self, hooks: DatasetHooks) {
        self.hooks = hooks;
    }

    // --- Schema introspection ---

    /// The ordered list of registered component types.
    pub fn component_type_map(&self) -> &[ComponentType] {
        &self.component_type_map
    }

    /// The number of registered component types.
    #[inline]
    pub fn component_type_count(&self) -> usize {
        self.component_type_map.len()
    }

    /// Returns the current component index of `component_type`.
    ///
    /// Indices are only stable until the next schema change.
    #[inline]
    pub fn component_index_of(&self, component_type: ComponentType) -> Option<usize> {
        self.type_indices.get(&component_type.type_id()).copied()
    }

    /// Returns true if `component_type` is part of the schema.
    pub fn is_registered(&self, component_type: ComponentType) -> bool {
        self.component_index_of(component_type).is_some()
    }

    pub(super) fn resolve_index(&self, component_type: ComponentType) -> Result<usize> {
        self.component_index_of(component_type)
            .ok_or(DatasetError::UnregisteredType {
                component: component_type,
            })
    }

    pub(super) fn resolve_indices(&self, types: &[ComponentType]) -> Result<Vec<usize>> {
        types.iter().map(|t| self.resolve_index(*t)).collect()
    }

    pub(super) fn component_type_at(&self, component_index: usize) -> Result<ComponentType> {
        self.component_type_map
            .get(component_index)
            .copied()
            .ok_or(DatasetError::InvalidIndex {
                index: component_index,
                count: self.component_type_count(),
            })
    }

    #[inline]
    pub(super) fn occupancy_address(&self, entity: Entity, component_index: usize) -> usize {
        entity.index() * self.component_type_count() + component_index
    }

    // --- Entities ---

    /// Creates a new entity at the lowest unused index.
    pub fn create_entity(&mut self) -> Entity {
        let index = self.entity_occupancy.next_clear_bit(0);
        let entity = Entity::new(index as u32);
        self.insert_entity(entity);
        entity
    }

    /// Creates an entity with a caller-chosen index.
    ///
    /// Fails with [`DatasetError::AlreadyInUse`] if the entity already exists.
    pub fn create_entity_specific(&mut self, entity: Entity) -> Result<Entity> {
        if self.entity_exists(entity) {
            return Err(DatasetError::AlreadyInUse { entity });
        }
        self.insert_entity(entity);
        Ok(entity)
    }

    fn insert_entity(&mut self, entity: Entity) {
        self.entity_occupancy.set(entity.index(), true);
        self.entity_count += 1;
        log::trace!("Created {entity}");

        if let Some(hook) = self.hooks.on_entity_created.clone() {
            if let Err(err) = hook(self, entity) {
                self.report_callback_error("on_entity_created hook", entity, &err);
            }
        }
    }

    /// Returns true if the entity currently exists.
    #[inline]
    pub fn entity_exists(&self, entity: Entity) -> bool {
        self.entity_occupancy.get(entity.index())
    }

    /// Returns the number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entity_count
    }

    /// Returns an iterator over all live entities, in ascending order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entity_occupancy
            .iter_ones()
            .map(|index| Entity::new(index as u32))
    }

    pub(super) fn ensure_entity(&self, entity: Entity) -> Result<()> {
        if self.entity_exists(entity) {
            Ok(())
        } else {
            Err(DatasetError::NotFound { entity })
        }
    }

    /// Removes an entity and everything attached to it.
    ///
    /// Every component the entity holds is removed through the regular removal
    /// primitive, in ascending component index order, so each one emits its
    /// observer notifications and a `ComponentRemoved` event. Then
    /// `EntityRemoved` is sent, the entity's listeners are dropped, and the
    /// entity is freed.
    pub fn remove_entity(&mut self, entity: Entity) -> Result<()> {
        self.ensure_entity(entity)?;

        if self.entities_being_removed.get(entity.index()) {
            log::debug!("{entity} is already being removed");
            return Ok(());
        }
        self.entities_being_removed.set(entity.index(), true);

        let mut cursor = 0;
        let mut epoch = self.schema_epoch;
        loop {
            if !self.entity_exists(entity) {
                break;
            }
            if epoch != self.schema_epoch {
                // A callback changed the schema; restart the row scan under the new layout.
                epoch = self.schema_epoch;
                cursor = 0;
            }

            let count = self.component_type_count();
            let base = entity.index() * count;
            let next = self
                .component_occupancy
                .next_set_bit(base + cursor)
                .filter(|bit| *bit < base + count);
            let Some(bit) = next else {
                break;
            };

            let component_index = bit - base;
            self.remove_component_by_index(entity, component_index)?;
            cursor = component_index + 1;
        }

        if self.entity_exists(entity) {
            self.send_event(entity, ENTITY_REMOVED, EntityEvent::EntityRemoved);
        }

        self.entities_being_removed.clear(entity.index());
        if !self.entity_exists(entity) {
            return Ok(());
        }

        // An `EntityRemoved` listener may have attached new components.
        self.purge_row(entity);
        self.listeners.remove(&entity);
        self.entity_occupancy.clear(entity.index());
        self.entity_count -= 1;
        log::trace!("Removed {entity}");

        if let Some(hook) = self.hooks.on_entity_removed.clone() {
            if let Err(err) = hook(self, entity) {
                self.report_callback_error("on_entity_removed hook", entity, &err);
            }
        }
        Ok(())
    }

    /// Drops whatever is left in an entity's row without notifications.
    fn purge_row(&mut self, entity: Entity) {
        let count = self.component_type_count();
        let base = entity.index() * count;
        while let Some(bit) = self
            .component_occupancy
            .next_set_bit(base)
            .filter(|bit| *bit < base + count)
        {
            let component_index = bit - base;
            let component_type = self.component_type_map[component_index];
            log::warn!("{entity} still held {component_type} after its removal was announced; dropping it");
            self.component_occupancy.clear(bit);
            if let Some(slot) = self.components[component_index].get_mut(entity.index()) {
                *slot = None;
            }
            self.settle_observer_frames(entity, component_type);
        }
    }

    /// Removes every entity through [`Dataset::remove_entity`], so all cascades,
    /// events and observer notifications fire.
    pub fn clear(&mut self) -> Result<()> {
        let mut cursor = 0;
        while let Some(index) = self.entity_occupancy.next_set_bit(cursor) {
            let entity = Entity::new(index as u32);
            self.remove_entity(entity)?;
            cursor = if self.entity_exists(entity) { index + 1 } else { index };
        }
        Ok(())
    }

    /// Drops every entity, component and listener without notifying anyone.
    ///
    /// The schema, hooks and registered observers are kept. Use this only when
    /// no consumer needs cleanup notifications.
    pub fn drop_data(&mut self) {
        self.entity_occupancy.reset();
        self.entities_being_removed.reset();
        self.component_occupancy.reset();
        for slots in &mut self.components {
            slots.clear();
        }
        self.listeners.clear();
        self.settle_all_observer_frames();
        self.entity_count = 0;
        log::debug!("Dropped all dataset contents");
    }

    // --- Components ---

    /// Attaches a component value to an entity.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> Result<()> {
        let component_index = self.resolve_index(ComponentType::of::<T>())?;
        self.add_component_by_index(entity, component_index, Rc::new(value))
    }

    /// Attaches a type-erased instance of `component_type` to an entity.
    pub fn add_component_instance(
        &mut self,
        entity: Entity,
        component_type: ComponentType,
        instance: ComponentRef,
    ) -> Result<()> {
        let component_index = self.resolve_index(component_type)?;
        self.add_component_by_index(entity, component_index, instance)
    }

    /// Attaches a type-erased instance under an explicit component index.
    ///
    /// The entity must exist, the index must be in the schema, the instance
    /// must be of the indexed type, and the entity must not already hold that
    /// type. The occupancy bit and the storage slot are set first, then the
    /// `on_component_added` hook runs, then observers registered on this index
    /// are evaluated, and finally `ComponentAdded` is sent to the entity.
    pub fn add_component_by_index(
        &mut self,
        entity: Entity,
        component_index: usize,
        instance: ComponentRef,
    ) -> Result<()> {
        self.ensure_entity(entity)?;
        let component_type = self.component_type_at(component_index)?;
        if !component_type.is_instance(&*instance) {
            return Err(DatasetError::ComponentTypeMismatch {
                expected: component_type,
            });
        }

        let address = self.occupancy_address(entity, component_index);
        if self.component_occupancy.get(address) {
            return Err(DatasetError::DuplicateComponent {
                entity,
                component: component_type,
            });
        }

        self.component_occupancy.set(address, true);
        let slots = &mut self.components[component_index];
        if slots.len() <= entity.index() {
            let len = (entity.index() + 1).max(self.settings.initial_entity_capacity);
            slots.resize(len, None);
        }
        slots[entity.index()] = Some(instance.clone());
        log::trace!("Added {component_type} to {entity}");

        // Captures which observers the new bit completes before any callback runs.
        let frame = self.open_added_frame(entity, component_index, component_type);

        if let Some(hook) = self.hooks.on_component_added.clone() {
            if let Err(err) = hook(self, entity, component_type, &instance) {
                self.report_callback_error("on_component_added hook", entity, &err);
            }
        }

        self.run_observer_frame(frame);

        if self.entity_exists(entity) {
            self.send_event(
                entity,
                COMPONENT_ADDED,
                EntityEvent::ComponentAdded {
                    component_type,
                    instance,
                },
            );
        }
        Ok(())
    }

    /// Removes the component of type `T` from an entity.
    ///
    /// Removing a component the entity does not hold is a logged no-op.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<()> {
        self.remove_component_of_type(entity, ComponentType::of::<T>())
    }

    /// Removes the component of `component_type` from an entity.
    pub fn remove_component_of_type(
        &mut self,
        entity: Entity,
        component_type: ComponentType,
    ) -> Result<()> {
        let component_index = self.resolve_index(component_type)?;
        self.remove_component_by_index(entity, component_index)
    }

    /// Removes the component stored under `component_index` from an entity.
    ///
    /// Observers are evaluated first, while the departing instance is still
    /// readable. Then the occupancy bit and the slot are cleared, the
    /// `on_component_removed` hook runs and `ComponentRemoved` is sent.
    /// If an observer callback removes the same component first, that nested
    /// removal does the work and this call returns without effect.
    /// A missing component is not an error: cascading removal paths may race
    /// against explicit ones, so the call logs a warning and returns.
    pub fn remove_component_by_index(
        &mut self,
        entity: Entity,
        component_index: usize,
    ) -> Result<()> {
        let component_type = self.component_type_at(component_index)?;
        if !self.has_component_at(entity, component_index) {
            if self.settings.warn_on_missing_component {
                log::warn!("Tried to remove {component_type} from {entity}, which does not hold it");
            }
            return Ok(());
        }

        let frame = self.open_removing_frame(entity, component_index, component_type);
        if !self.run_observer_frame(frame) {
            // An observer callback already removed it.
            return Ok(());
        }

        // Callbacks may have changed the schema.
        let Some(component_index) = self.live_index_of(entity, component_type) else {
            return Ok(());
        };

        let address = self.occupancy_address(entity, component_index);
        self.component_occupancy.clear(address);
        let taken = self.components[component_index]
            .get_mut(entity.index())
            .and_then(Option::take);
        self.settle_observer_frames(entity, component_type);
        let Some(instance) = taken else {
            log::error!("Occupancy of {component_type} on {entity} had no stored instance");
            return Ok(());
        };
        log::trace!("Removed {component_type} from {entity}");

        if let Some(hook) = self.hooks.on_component_removed.clone() {
            if let Err(err) = hook(self, entity, component_type, &instance) {
                self.report_callback_error("on_component_removed hook", entity, &err);
            }
        }

        if self.entity_exists(entity) {
            self.send_event(
                entity,
                COMPONENT_REMOVED,
                EntityEvent::ComponentRemoved {
                    component_type,
                    instance,
                },
            );
        }
        Ok(())
    }

    /// Returns the component index of `component_type` if `entity` currently holds it.
    pub(super) fn live_index_of(
        &self,
        entity: Entity,
        component_type: ComponentType,
    ) -> Option<usize> {
        let component_index = self.component_index_of(component_type)?;
        self.has_component_at(entity, component_index)
            .then_some(component_index)
    }

    #[inline]
    pub(super) fn has_component_at(&self, entity: Entity, component_index: usize) -> bool {
        self.entity_exists(entity)
            && component_index < self.component_type_count()
            && self
                .component_occupancy
                .get(self.occupancy_address(entity, component_index))
    }

    #[inline]
    pub(super) fn instance_at(&self, entity: Entity, component_index: usize) -> Option<ComponentRef> {
        if !self.has_component_at(entity, component_index) {
            return None;
        }
        self.components[component_index]
            .get(entity.index())
            .and_then(Clone::clone)
    }

    /// Returns true if the entity holds a component of type `T`.
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.component_index_of(ComponentType::of::<T>())
            .is_some_and(|component_index| self.has_component_at(entity, component_index))
    }

    /// Returns the component of type `T` attached to an entity.
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<Rc<T>> {
        self.get_component_of_type(entity, ComponentType::of::<T>())?
            .downcast::<T>()
            .ok()
    }

    /// Returns the type-erased component of `component_type` attached to an entity.
    pub fn get_component_of_type(
        &self,
        entity: Entity,
        component_type: ComponentType,
    ) -> Option<ComponentRef> {
        self.instance_at(entity, self.component_index_of(component_type)?)
    }

    /// Returns the type-erased component stored under `component_index`.
    pub fn get_component_by_index(
        &self,
        entity: Entity,
        component_index: usize,
    ) -> Option<ComponentRef> {
        self.instance_at(entity, component_index)
    }

    /// Returns the requested components of an entity, positionally.
    ///
    /// Fails if any of the types is not registered.
    pub fn get_components(
        &self,
        entity: Entity,
        types: &[ComponentType],
    ) -> Result<Vec<Option<ComponentRef>>> {
        let indices = self.resolve_indices(types)?;
        Ok(indices
            .into_iter()
            .map(|component_index| self.instance_at(entity, component_index))
            .collect())
    }

    /// Returns every component slot of an entity, indexed by component index.
    pub fn get_all_components(&self, entity: Entity) -> Vec<Option<ComponentRef>> {
        (0..self.component_type_count())
            .map(|component_index| self.instance_at(entity, component_index))
            .collect()
    }

    // --- Diagnostics ---

    pub(super) fn report_callback_error(&self, source: &str, entity: Entity, err: &anyhow::Error) {
        if self.settings.log_callback_errors {
            log::error!("{source} failed for {entity}: {err:#}");
        }
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("entity_count", &self.entity_count)
            .field("component_type_map", &self.component_type_map)
            .field("observer_count", &self.observers.len())
            .field("listener_tables", &self.listeners.len())
            .finish()
    }
}
