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

//! Observer registration and the match/unmatch dispatch protocol.
//!
//! Observers keep no per-entity state: whether an observer considers an entity
//! matched is read from the occupancy row. While a mutation is dispatched its
//! bit is in flight, and callbacks may mutate the same entity again. Each
//! dispatch therefore opens an [`ObserverFrame`] listing the candidates it has
//! not notified yet. Nested dispatches hide an arriving bit from observers
//! still waiting for `on_complete`, and show a departing bit only to observers
//! still waiting for `on_broken`. Every observer then sees a row consistent
//! with the calls it has already received, however deeply callbacks nest.

use std::collections::VecDeque;

use tessera_core::{Bitset, ComponentType, Entity, Result};

use super::observer::{ObserverBinding, ObserverCallback};
use super::{ComponentRef, Dataset, Observer, ObserverId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Complete,
    Broken,
}

/// An in-flight observer dispatch for one component of one entity.
#[derive(Debug)]
pub(super) struct ObserverFrame {
    entity: Entity,
    component_type: ComponentType,
    transition: Transition,
    /// Candidates that matched when the frame opened and are not notified yet.
    pending: VecDeque<ObserverId>,
    /// Set once the component has left the store, whoever removed it.
    settled: bool,
}

impl Dataset {
    /// Registers an observer under every component index it requires.
    ///
    /// With `seed_existing`, `on_complete` is invoked once for every entity that
    /// already holds all the required components. Fails with
    /// [`UnregisteredType`](tessera_core::DatasetError::UnregisteredType) if a
    /// required type is not in the schema.
    pub fn add_observer(&mut self, observer: Observer, seed_existing: bool) -> Result<ObserverId> {
        let binding = ObserverBinding::build(
            observer.required_types(),
            &self.type_indices,
            self.component_type_count(),
        )?;
        let id = self.observers.insert(observer, binding);
        log::debug!("Registered {id}");

        if seed_existing {
            self.notify_all_matches(id, Transition::Complete, None);
        }
        Ok(id)
    }

    /// Unregisters an observer.
    ///
    /// With `break_existing`, `on_broken` is invoked once for every entity that
    /// currently matches. Returns `false` if the observer was not registered.
    pub fn remove_observer(&mut self, id: ObserverId, break_existing: bool) -> bool {
        let Some(entry) = self.observers.remove(id) else {
            log::debug!("Tried to remove {id}, which is not registered");
            return false;
        };
        log::debug!("Unregistered {id}");

        if break_existing {
            self.notify_all_matches(id, Transition::Broken, Some((entry.observer, entry.binding)));
        }
        for frame in &mut self.observer_frames {
            frame.pending.retain(|candidate| *candidate != id);
        }
        true
    }

    /// Returns the number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Returns the observer registered under `id`.
    pub fn observer(&self, id: ObserverId) -> Option<&Observer> {
        self.observers.get(id).map(|entry| &entry.observer)
    }

    /// Walks every live entity and notifies one observer of each full match.
    ///
    /// `detached` carries the observer when it has already been unregistered.
    fn notify_all_matches(
        &mut self,
        id: ObserverId,
        transition: Transition,
        detached: Option<(Observer, ObserverBinding)>,
    ) {
        let (observer, binding) = match detached {
            Some(pair) => pair,
            None => match self.observers.get(id) {
                Some(entry) => (entry.observer.clone(), entry.binding.clone()),
                None => return,
            },
        };
        if binding.is_empty() {
            return;
        }

        let callback = match transition {
            Transition::Complete => observer.on_complete(),
            Transition::Broken => observer.on_broken(),
        };
        let epoch = self.schema_epoch;

        let mut cursor = 0;
        while let Some(index) = self.entity_occupancy.next_set_bit(cursor) {
            cursor = index + 1;
            if self.schema_epoch != epoch {
                log::debug!("Schema changed while notifying {id}; stopping");
                break;
            }
            if transition == Transition::Complete && self.observers.get(id).is_none() {
                break;
            }

            let entity = Entity::new(index as u32);
            if !self.observer_sees_match(entity, id, &binding.mask, None) {
                continue;
            }
            if let Some(arguments) = self.gather_arguments(entity, &binding) {
                self.forget_pending(entity, id);
                self.invoke_observer(&callback, &arguments, entity, id, Some(&observer));
            }
        }
    }

    /// Opens the frame evaluating the observers of a component that was just
    /// stored. Must be called before anything else can run.
    pub(super) fn open_added_frame(
        &mut self,
        entity: Entity,
        component_index: usize,
        component_type: ComponentType,
    ) -> usize {
        self.open_frame(entity, component_index, component_type, Transition::Complete)
    }

    /// Opens the frame evaluating the observers of a component about to be
    /// cleared. The component must still be stored.
    pub(super) fn open_removing_frame(
        &mut self,
        entity: Entity,
        component_index: usize,
        component_type: ComponentType,
    ) -> usize {
        self.open_frame(entity, component_index, component_type, Transition::Broken)
    }

    fn open_frame(
        &mut self,
        entity: Entity,
        component_index: usize,
        component_type: ComponentType,
        transition: Transition,
    ) -> usize {
        let pending: VecDeque<ObserverId> = self
            .observers
            .candidates(component_index)
            .into_iter()
            .filter(|id| {
                self.observers.get(*id).is_some_and(|entry| {
                    self.observer_sees_match(entity, *id, &entry.binding.mask, None)
                })
            })
            .collect();

        self.observer_frames.push(ObserverFrame {
            entity,
            component_type,
            transition,
            pending,
            settled: false,
        });
        self.observer_frames.len() - 1
    }

    /// Notifies the pending observers of a frame, then closes it.
    ///
    /// Stops early once the component has left the store. Returns `false` if a
    /// nested removal already took the component out.
    pub(super) fn run_observer_frame(&mut self, frame: usize) -> bool {
        let Some((entity, component_type, transition)) = self
            .observer_frames
            .get(frame)
            .map(|current| (current.entity, current.component_type, current.transition))
        else {
            return false;
        };

        loop {
            if self.live_index_of(entity, component_type).is_none() {
                break;
            }
            let Some(id) = self
                .observer_frames
                .get_mut(frame)
                .filter(|current| !current.settled)
                .and_then(|current| current.pending.pop_front())
            else {
                break;
            };

            let Some(entry) = self.observers.get(id) else {
                // Unregistered by an earlier callback of this dispatch.
                continue;
            };
            if !self.observer_sees_match(entity, id, &entry.binding.mask, Some(frame)) {
                continue;
            }
            let Some(arguments) = self.gather_arguments(entity, &entry.binding) else {
                continue;
            };

            let callback = match transition {
                Transition::Complete => entry.observer.on_complete(),
                Transition::Broken => entry.observer.on_broken(),
            };
            self.forget_pending(entity, id);
            self.invoke_observer(&callback, &arguments, entity, id, None);
        }

        let live = self
            .observer_frames
            .get(frame)
            .is_some_and(|current| !current.settled);
        self.observer_frames.truncate(frame);
        live
    }

    /// Marks the open frames of a component as settled once it has been cleared.
    pub(super) fn settle_observer_frames(&mut self, entity: Entity, component_type: ComponentType) {
        for frame in &mut self.observer_frames {
            if frame.entity == entity && frame.component_type == component_type {
                frame.settled = true;
            }
        }
    }

    /// Marks every open frame as settled, after a bulk reset.
    pub(super) fn settle_all_observer_frames(&mut self) {
        for frame in &mut self.observer_frames {
            frame.settled = true;
        }
    }

    /// An observer notified for an entity is no longer pending for it anywhere.
    fn forget_pending(&mut self, entity: Entity, id: ObserverId) {
        for frame in &mut self.observer_frames {
            if frame.entity == entity {
                frame.pending.retain(|candidate| *candidate != id);
            }
        }
    }

    fn invoke_observer(
        &mut self,
        callback: &ObserverCallback,
        arguments: &[ComponentRef],
        entity: Entity,
        id: ObserverId,
        detached: Option<&Observer>,
    ) {
        if let Err(err) = callback(self, arguments, entity) {
            let source = detached
                .or_else(|| self.observers.get(id).map(|entry| &entry.observer))
                .map_or_else(|| id.to_string(), |observer| observer.describe(id));
            self.report_callback_error(&source, entity, &err);
        }
    }

    /// Returns true if `observer` sees every component index of `mask` on the
    /// entity. Frames other than `skip` decide whether their in-flight bit is
    /// visible to it.
    fn observer_sees_match(
        &self,
        entity: Entity,
        observer: ObserverId,
        mask: &Bitset,
        skip: Option<usize>,
    ) -> bool {
        if !self.entity_exists(entity) {
            return false;
        }
        let base = entity.index() * self.component_type_count();
        mask.iter_ones().all(|component_index| {
            self.component_occupancy.get(base + component_index)
                && self.in_flight_bit_visible(entity, component_index, observer, skip)
        })
    }

    fn in_flight_bit_visible(
        &self,
        entity: Entity,
        component_index: usize,
        observer: ObserverId,
        skip: Option<usize>,
    ) -> bool {
        self.observer_frames
            .iter()
            .enumerate()
            .filter(|(position, frame)| {
                Some(*position) != skip
                    && !frame.settled
                    && frame.entity == entity
                    && self.component_index_of(frame.component_type) == Some(component_index)
            })
            .all(|(_, frame)| {
                let waiting = frame.pending.contains(&observer);
                match frame.transition {
                    Transition::Complete => !waiting,
                    Transition::Broken => waiting,
                }
            })
    }

    /// Collects the components selected by a binding into their argument slots.
    fn gather_arguments(&self, entity: Entity, binding: &ObserverBinding) -> Option<Vec<ComponentRef>> {
        let mut slots: Vec<Option<ComponentRef>> = vec![None; binding.slot_count];
        for component_index in binding.mask.iter_ones() {
            let slot = binding.component_index_mapping.get(component_index).copied().flatten()?;
            slots[slot] = self.instance_at(entity, component_index);
        }
        slots.into_iter().collect()
    }
}
