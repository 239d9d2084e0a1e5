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

//! Traversal primitives over entities and components.
//!
//! Every traversal walks the set bits of the entity occupancy, fetching the next
//! entity afresh after each visit, so structural changes made by a visitor are
//! observed by the rest of the traversal. A visitor may remove the entity it is
//! visiting: the traversal simply moves on to the next live entity.

use tessera_core::{Component, ComponentType, Entity, Result};

use super::{ComponentRef, Dataset};

impl Dataset {
    /// Visits every entity holding at least all of `types`.
    ///
    /// The visitor receives the components in the order of `types`, then the
    /// entity. Returning `false` stops the traversal. Entities may hold any
    /// other components as well.
    pub fn traverse_entities<F>(&mut self, types: &[ComponentType], mut visitor: F) -> Result<()>
    where
        F: FnMut(&mut Dataset, &[ComponentRef], Entity) -> bool,
    {
        let mut indices = self.resolve_indices(types)?;
        let mut epoch = self.schema_epoch;

        let mut cursor = 0;
        while let Some(index) = self.entity_occupancy.next_set_bit(cursor) {
            cursor = index + 1;
            if epoch != self.schema_epoch {
                indices = self.resolve_indices(types)?;
                epoch = self.schema_epoch;
            }

            let entity = Entity::new(index as u32);
            let Some(arguments) = self.collect_row(entity, &indices) else {
                continue;
            };
            if !visitor(self, &arguments, entity) {
                break;
            }
        }
        Ok(())
    }

    /// Visits every entity holding exactly `types` and nothing else.
    ///
    /// The visitor receives the components in the order of `types`, then the
    /// entity. Returning `false` stops the traversal.
    pub fn traverse_entities_exact<F>(&mut self, types: &[ComponentType], mut visitor: F) -> Result<()>
    where
        F: FnMut(&mut Dataset, &[ComponentRef], Entity) -> bool,
    {
        let mut indices = self.resolve_indices(types)?;
        let mut sorted = sorted_unique(&indices);
        let mut epoch = self.schema_epoch;

        let mut cursor = 0;
        while let Some(index) = self.entity_occupancy.next_set_bit(cursor) {
            cursor = index + 1;
            if epoch != self.schema_epoch {
                indices = self.resolve_indices(types)?;
                sorted = sorted_unique(&indices);
                epoch = self.schema_epoch;
            }

            let entity = Entity::new(index as u32);
            if !self.row_is_exactly(entity, &sorted) {
                continue;
            }
            let Some(arguments) = self.collect_row(entity, &indices) else {
                continue;
            };
            if !visitor(self, &arguments, entity) {
                break;
            }
        }
        Ok(())
    }

    /// Visits every instance of `component_type`, in ascending entity order.
    ///
    /// Returning `false` from the visitor stops the traversal.
    pub fn traverse_components<F>(&self, component_type: ComponentType, mut visitor: F) -> Result<()>
    where
        F: FnMut(&ComponentRef, Entity) -> bool,
    {
        let component_index = self.resolve_index(component_type)?;
        let count = self.component_type_count();
        let slots = &self.components[component_index];

        for index in self.entity_occupancy.iter_ones() {
            if !self.component_occupancy.get(index * count + component_index) {
                continue;
            }
            if let Some(instance) = slots.get(index).and_then(Option::as_ref) {
                if !visitor(instance, Entity::new(index as u32)) {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Typed variant of [`Dataset::traverse_components`].
    pub fn traverse_components_of<T, F>(&self, mut visitor: F) -> Result<()>
    where
        T: Component,
        F: FnMut(&T, Entity) -> bool,
    {
        self.traverse_components(ComponentType::of::<T>(), |instance, entity| {
            match instance.downcast_ref::<T>() {
                Some(value) => visitor(value, entity),
                None => true,
            }
        })
    }

    /// Returns the entity's components at `indices`, or `None` if any is missing.
    fn collect_row(&self, entity: Entity, indices: &[usize]) -> Option<Vec<ComponentRef>> {
        if !self.entity_exists(entity) {
            return None;
        }
        let base = entity.index() * self.component_type_count();
        if !indices
            .iter()
            .all(|component_index| self.component_occupancy.get(base + component_index))
        {
            return None;
        }
        indices
            .iter()
            .map(|component_index| self.instance_at(entity, *component_index))
            .collect()
    }

    /// Returns true if the entity's row holds exactly the indices in `sorted`.
    fn row_is_exactly(&self, entity: Entity, sorted: &[usize]) -> bool {
        let count = self.component_type_count();
        let base = entity.index() * count;
        let end = base + count;

        let mut expected = sorted.iter();
        let mut cursor = base;
        while let Some(bit) = self.component_occupancy.next_set_bit(cursor) {
            if bit >= end {
                break;
            }
            if expected.next() != Some(&(bit - base)) {
                return false;
            }
            cursor = bit + 1;
        }
        expected.next().is_none()
    }
}

fn sorted_unique(indices: &[usize]) -> Vec<usize> {
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
}
