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

//! Live schema changes: registering, unregistering and reordering component types.

use std::any::TypeId;
use std::collections::HashMap;

use tessera_core::{Bitset, ComponentType, DatasetError, Entity, Result};

use super::{ComponentRef, Dataset};

impl Dataset {
    /// Appends `component_type` to the schema.
    ///
    /// Returns `false` if it is already registered.
    pub fn register_component_type(&mut self, component_type: ComponentType) -> Result<bool> {
        if self.is_registered(component_type) {
            return Ok(false);
        }
        let mut new_map = self.component_type_map.clone();
        new_map.push(component_type);
        self.set_component_type_map(&new_map)?;
        Ok(true)
    }

    /// Removes `component_type` from the schema.
    ///
    /// Returns `false` if it is not registered. Fails with
    /// [`DatasetError::LiveComponentsPresent`] while any entity still holds an
    /// instance of it, and with [`DatasetError::ObservedTypeRemoved`] while a
    /// registered observer requires it. Remove such observers first.
    pub fn unregister_component_type(&mut self, component_type: ComponentType) -> Result<bool> {
        if !self.is_registered(component_type) {
            return Ok(false);
        }
        let new_map: Vec<ComponentType> = self
            .component_type_map
            .iter()
            .copied()
            .filter(|t| *t != component_type)
            .collect();
        self.set_component_type_map(&new_map)?;
        Ok(true)
    }

    /// Replaces the schema with `new_map`, relocating all live data.
    ///
    /// Types only in the current schema are dropped, types only in `new_map`
    /// get empty storage, and common types keep their data under their new
    /// index. Observers keep their identity and registration; only their index
    /// wiring is rebuilt.
    ///
    /// The call fails without any effect if `new_map` repeats a type, if a
    /// dropped type still has live instances, or if a registered observer
    /// requires a dropped type. The new occupancy, storage and observer wiring
    /// are built completely before being installed together.
    pub fn set_component_type_map(&mut self, new_map: &[ComponentType]) -> Result<()> {
        let new_count = new_map.len();
        let mut new_indices: HashMap<TypeId, usize> = HashMap::with_capacity(new_count);
        for (component_index, component_type) in new_map.iter().enumerate() {
            if new_indices
                .insert(component_type.type_id(), component_index)
                .is_some()
            {
                return Err(DatasetError::DuplicateType {
                    component: *component_type,
                });
            }
        }

        // (a) old index -> new index, `None` for dropped types.
        let remap: Vec<Option<usize>> = self
            .component_type_map
            .iter()
            .map(|t| new_indices.get(&t.type_id()).copied())
            .collect();

        for (old_index, new_index) in remap.iter().enumerate() {
            if new_index.is_some() {
                continue;
            }
            let component_type = self.component_type_map[old_index];
            if let Some(entity) = self.first_holder(old_index) {
                return Err(DatasetError::LiveComponentsPresent {
                    component: component_type,
                    entity,
                });
            }
            if self.observers.find_requiring(component_type).is_some() {
                return Err(DatasetError::ObservedTypeRemoved {
                    component: component_type,
                });
            }
        }

        // (d) Observer wiring against the new schema. Cannot fail once the
        // checks above passed, but nothing is installed until it succeeds.
        let bindings = self.observers.rebind(&new_indices, new_count)?;

        // (b) Relocate each occupancy bit, walking set bits only.
        let old_count = self.component_type_count();
        let mut occupancy = Bitset::with_capacity(self.entity_occupancy.capacity() * new_count);
        if old_count > 0 {
            for bit in self.component_occupancy.iter_ones() {
                let (entity_index, old_index) = (bit / old_count, bit % old_count);
                if let Some(new_index) = remap[old_index] {
                    occupancy.set(entity_index * new_count + new_index, true);
                }
            }
        }

        // (c) Move common arrays to their new slot; added types start empty.
        let mut old_components: Vec<Option<Vec<Option<ComponentRef>>>> =
            std::mem::take(&mut self.components)
                .into_iter()
                .map(Some)
                .collect();
        let mut components: Vec<Vec<Option<ComponentRef>>> = (0..new_count).map(|_| Vec::new()).collect();
        for (old_index, new_index) in remap.iter().enumerate() {
            if let Some(new_index) = new_index {
                if let Some(slots) = old_components[old_index].take() {
                    components[*new_index] = slots;
                }
            }
        }

        let added: Vec<ComponentType> = new_map
            .iter()
            .copied()
            .filter(|t| !self.is_registered(*t))
            .collect();
        let removed: Vec<ComponentType> = remap
            .iter()
            .enumerate()
            .filter(|(_, new_index)| new_index.is_none())
            .map(|(old_index, _)| self.component_type_map[old_index])
            .collect();

        // (e) Install everything at once.
        self.component_occupancy = occupancy;
        self.components = components;
        self.observers.install(bindings, new_count);
        self.component_type_map = new_map.to_vec();
        self.type_indices = new_indices;
        self.schema_epoch += 1;

        log::debug!(
            "Schema changed to {:?} (added {added:?}, removed {removed:?})",
            self.component_type_map
        );
        Ok(())
    }

    /// Scans a component array for the first entity holding a live instance.
    fn first_holder(&self, component_index: usize) -> Option<Entity> {
        self.components
            .get(component_index)?
            .iter()
            .position(Option::is_some)
            .map(|index| Entity::new(index as u32))
    }
}
