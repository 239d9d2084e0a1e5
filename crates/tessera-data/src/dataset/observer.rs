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

//! Observers: standing queries over a fixed set of component types.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use tessera_core::{Bitset, ComponentType, DatasetError, Entity, Result};

use super::{CallbackResult, ComponentRef, Dataset};

/// The callback signature of an observer.
///
/// The components are passed positionally, in the order the observer declared
/// its required types, followed by the entity.
pub type ObserverCallback = Rc<dyn Fn(&mut Dataset, &[ComponentRef], Entity) -> CallbackResult>;

/// Identifies an observer registered in a [`Dataset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer #{}", self.0)
    }
}

/// A standing query notified when an entity starts or stops holding every one
/// of its required component types.
///
/// An observer does not track which entities currently match: matching is
/// recomputed from the dataset's occupancy whenever a relevant component is
/// added or removed. `on_complete` fires exactly once when an entity becomes
/// fully matched, `on_broken` exactly once when a fully matched entity loses one
/// of the required components (while that component is still readable).
#[derive(Clone)]
pub struct Observer {
    required: Vec<ComponentType>,
    on_complete: ObserverCallback,
    on_broken: ObserverCallback,
    label: Option<String>,
}

impl Observer {
    /// Creates an observer over `required`.
    ///
    /// Repeated types are collapsed to their first occurrence.
    pub fn new(
        required: impl IntoIterator<Item = ComponentType>,
        on_complete: impl Fn(&mut Dataset, &[ComponentRef], Entity) -> CallbackResult + 'static,
        on_broken: impl Fn(&mut Dataset, &[ComponentRef], Entity) -> CallbackResult + 'static,
    ) -> Self {
        let mut types: Vec<ComponentType> = Vec::new();
        for component_type in required {
            if !types.contains(&component_type) {
                types.push(component_type);
            }
        }

        Self {
            required: types,
            on_complete: Rc::new(on_complete),
            on_broken: Rc::new(on_broken),
            label: None,
        }
    }

    /// Attaches a name used when reporting callback failures.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The required component types, in callback argument order.
    pub fn required_types(&self) -> &[ComponentType] {
        &self.required
    }

    /// The label given with [`Observer::with_label`], if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub(super) fn on_complete(&self) -> ObserverCallback {
        Rc::clone(&self.on_complete)
    }

    pub(super) fn on_broken(&self) -> ObserverCallback {
        Rc::clone(&self.on_broken)
    }

    pub(super) fn requires(&self, component_type: ComponentType) -> bool {
        self.required.contains(&component_type)
    }

    pub(super) fn describe(&self, id: ObserverId) -> String {
        match &self.label {
            Some(label) => format!("{id} '{label}'"),
            None => format!("{id} {:?}", self.required),
        }
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("required", &self.required)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// The schema-dependent wiring of an observer: which component indices it
/// requires, and which argument slot each of them fills.
#[derive(Debug, Clone, Default)]
pub(super) struct ObserverBinding {
    /// Bit `i` is set iff component index `i` is required.
    pub(super) mask: Bitset,
    /// Component index to callback argument slot.
    pub(super) component_index_mapping: Vec<Option<usize>>,
    /// Number of argument slots.
    pub(super) slot_count: usize,
}

impl ObserverBinding {
    /// Wires `required` against a schema described by its reverse lookup table.
    pub(super) fn build(
        required: &[ComponentType],
        type_indices: &HashMap<TypeId, usize>,
        component_type_count: usize,
    ) -> Result<Self> {
        let mut mask = Bitset::with_capacity(component_type_count);
        let mut component_index_mapping = vec![None; component_type_count];

        for (slot, component_type) in required.iter().enumerate() {
            let component_index = *type_indices.get(&component_type.type_id()).ok_or(
                DatasetError::UnregisteredType {
                    component: *component_type,
                },
            )?;
            mask.set(component_index, true);
            component_index_mapping[component_index] = Some(slot);
        }

        Ok(Self {
            mask,
            component_index_mapping,
            slot_count: required.len(),
        })
    }

    pub(super) fn is_empty(&self) -> bool {
        self.slot_count == 0
    }
}

pub(super) struct RegisteredObserver {
    pub(super) observer: Observer,
    pub(super) binding: ObserverBinding,
}

/// Every observer registered in a dataset, plus the per-component-index lists
/// used to find the candidates of a mutation.
#[derive(Default)]
pub(super) struct ObserverRegistry {
    entries: BTreeMap<ObserverId, RegisteredObserver>,
    by_component: Vec<Vec<ObserverId>>,
    next_id: u64,
}

impl ObserverRegistry {
    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(super) fn get(&self, id: ObserverId) -> Option<&RegisteredObserver> {
        self.entries.get(&id)
    }

    pub(super) fn insert(&mut self, observer: Observer, binding: ObserverBinding) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;

        for component_index in binding.mask.iter_ones() {
            if self.by_component.len() <= component_index {
                self.by_component.resize_with(component_index + 1, Vec::new);
            }
            self.by_component[component_index].push(id);
        }

        self.entries
            .insert(id, RegisteredObserver { observer, binding });
        id
    }

    pub(super) fn remove(&mut self, id: ObserverId) -> Option<RegisteredObserver> {
        let entry = self.entries.remove(&id)?;
        for component_index in entry.binding.mask.iter_ones() {
            if let Some(list) = self.by_component.get_mut(component_index) {
                list.retain(|candidate| *candidate != id);
            }
        }
        Some(entry)
    }

    /// Snapshot of the observers registered on `component_index`.
    pub(super) fn candidates(&self, component_index: usize) -> Vec<ObserverId> {
        self.by_component
            .get(component_index)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the first registered observer requiring `component_type`.
    pub(super) fn find_requiring(&self, component_type: ComponentType) -> Option<ObserverId> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.observer.requires(component_type))
            .map(|(id, _)| *id)
    }

    /// Builds the bindings of every observer against a new schema, without
    /// installing them.
    pub(super) fn rebind(
        &self,
        type_indices: &HashMap<TypeId, usize>,
        component_type_count: usize,
    ) -> Result<Vec<(ObserverId, ObserverBinding)>> {
        self.entries
            .iter()
            .map(|(id, entry)| {
                let binding = ObserverBinding::build(
                    &entry.observer.required,
                    type_indices,
                    component_type_count,
                )?;
                Ok((*id, binding))
            })
            .collect()
    }

    /// Installs bindings produced by [`ObserverRegistry::rebind`] and rebuilds
    /// the per-index lists, keeping registration order.
    pub(super) fn install(
        &mut self,
        bindings: Vec<(ObserverId, ObserverBinding)>,
        component_type_count: usize,
    ) {
        let mut by_component = vec![Vec::new(); component_type_count];
        for (id, binding) in bindings {
            for component_index in binding.mask.iter_ones() {
                by_component[component_index].push(id);
            }
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.binding = binding;
            }
        }
        self.by_component = by_component;
    }
}
