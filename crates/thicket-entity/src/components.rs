//! Component bag: typed data slots and per-tick regeneration.
//!
//! A [`ComponentBag`] holds the components attached to one entity, keyed
//! by [`ComponentKind`]. The bag is pure data -- it is owned exclusively
//! by the entity's actor and mutated only through that actor's mailbox.
//!
//! # Regeneration
//!
//! Each tick, every *vital* kind (health, mana, stamina) regenerates:
//! if `current < max`, it gains `min(regen_rate, max - current)`, so
//! `current` never passes `max`. Custom kinds are left untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use thicket_types::{Component, ComponentField, ComponentKind};

use crate::error::EntityError;

/// The set of components attached to one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentBag {
    /// Component slots keyed by kind.
    slots: BTreeMap<ComponentKind, Component>,
}

impl ComponentBag {
    /// Create an empty bag.
    pub const fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }

    /// Create a bag from an initial set of components.
    pub fn from_components(slots: BTreeMap<ComponentKind, Component>) -> Self {
        Self { slots }
    }

    /// Attach a component, replacing any existing slot of the same kind.
    pub fn add(&mut self, kind: ComponentKind, component: Component) {
        self.slots.insert(kind, component);
    }

    /// Update one field of an existing component.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::ComponentNotFound`] if no component of the
    /// given kind is attached.
    pub fn update(
        &mut self,
        kind: &ComponentKind,
        field: ComponentField,
        value: u32,
    ) -> Result<(), EntityError> {
        let slot = self
            .slots
            .get_mut(kind)
            .ok_or_else(|| EntityError::ComponentNotFound(kind.clone()))?;
        match field {
            ComponentField::Current => slot.current = value,
            ComponentField::Max => slot.max = value,
            ComponentField::RegenRate => slot.regen_rate = value,
        }
        Ok(())
    }

    /// Detach a component and return it.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::ComponentNotFound`] if no component of the
    /// given kind is attached.
    pub fn remove(&mut self, kind: &ComponentKind) -> Result<Component, EntityError> {
        self.slots
            .remove(kind)
            .ok_or_else(|| EntityError::ComponentNotFound(kind.clone()))
    }

    /// Look up a component by kind.
    pub fn get(&self, kind: &ComponentKind) -> Option<&Component> {
        self.slots.get(kind)
    }

    /// The kinds currently attached, in order.
    pub fn kinds(&self) -> std::collections::BTreeSet<ComponentKind> {
        self.slots.keys().cloned().collect()
    }

    /// Number of attached components.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterate over all slots.
    pub fn iter(&self) -> impl Iterator<Item = (&ComponentKind, &Component)> {
        self.slots.iter()
    }

    /// Apply one tick of regeneration to every vital component.
    ///
    /// Returns the kinds whose `current` value changed. Components already
    /// at (or above) `max` and non-vital kinds are left unchanged, and
    /// their `last_regen` timestamp is not touched.
    pub fn apply_tick(&mut self, now: DateTime<Utc>) -> Vec<ComponentKind> {
        let mut changed = Vec::new();
        for (kind, slot) in &mut self.slots {
            if !kind.is_vital() {
                continue;
            }
            if slot.current >= slot.max {
                continue;
            }
            let headroom = slot.max.saturating_sub(slot.current);
            let delta = slot.regen_rate.min(headroom);
            if delta == 0 {
                continue;
            }
            slot.current = slot.current.saturating_add(delta);
            slot.last_regen = now;
            changed.push(kind.clone());
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health(current: u32, max: u32, regen: u32) -> Component {
        Component::with_current(current, max, regen)
    }

    #[test]
    fn regen_caps_at_max() {
        let mut bag = ComponentBag::new();
        bag.add(ComponentKind::Health, health(80, 100, 15));

        // 80 -> 95
        let changed = bag.apply_tick(Utc::now());
        assert_eq!(changed, vec![ComponentKind::Health]);
        assert_eq!(bag.get(&ComponentKind::Health).map(|c| c.current), Some(95));

        // 95 -> 100 (capped, not 110)
        let changed = bag.apply_tick(Utc::now());
        assert_eq!(changed, vec![ComponentKind::Health]);
        assert_eq!(bag.get(&ComponentKind::Health).map(|c| c.current), Some(100));

        // Already full: no change reported.
        let changed = bag.apply_tick(Utc::now());
        assert!(changed.is_empty());
        assert_eq!(bag.get(&ComponentKind::Health).map(|c| c.current), Some(100));
    }

    #[test]
    fn regen_skips_custom_kinds() {
        let mut bag = ComponentBag::new();
        bag.add(
            ComponentKind::Custom("hunger".to_owned()),
            health(10, 100, 5),
        );

        let changed = bag.apply_tick(Utc::now());
        assert!(changed.is_empty());
        assert_eq!(
            bag.get(&ComponentKind::Custom("hunger".to_owned()))
                .map(|c| c.current),
            Some(10)
        );
    }

    #[test]
    fn regen_leaves_overfull_components_alone() {
        // `current` above `max` (via an explicit max decrease) must not be
        // clamped down by regeneration.
        let mut bag = ComponentBag::new();
        bag.add(ComponentKind::Mana, health(120, 100, 5));

        let changed = bag.apply_tick(Utc::now());
        assert!(changed.is_empty());
        assert_eq!(bag.get(&ComponentKind::Mana).map(|c| c.current), Some(120));
    }

    #[test]
    fn update_unknown_component_fails() {
        let mut bag = ComponentBag::new();
        let result = bag.update(&ComponentKind::Mana, ComponentField::Current, 5);
        assert_eq!(
            result,
            Err(EntityError::ComponentNotFound(ComponentKind::Mana))
        );
    }

    #[test]
    fn update_fields() {
        let mut bag = ComponentBag::new();
        bag.add(ComponentKind::Stamina, health(50, 50, 2));

        assert!(bag.update(&ComponentKind::Stamina, ComponentField::Max, 80).is_ok());
        assert!(bag.update(&ComponentKind::Stamina, ComponentField::RegenRate, 10).is_ok());

        let slot = bag.get(&ComponentKind::Stamina).cloned();
        assert_eq!(slot.as_ref().map(|c| c.max), Some(80));
        assert_eq!(slot.as_ref().map(|c| c.regen_rate), Some(10));

        // 50 -> 60 with the raised cap.
        let _ = bag.apply_tick(Utc::now());
        assert_eq!(bag.get(&ComponentKind::Stamina).map(|c| c.current), Some(60));
    }

    #[test]
    fn remove_then_get_is_absent() {
        let mut bag = ComponentBag::new();
        bag.add(ComponentKind::Health, health(10, 10, 1));
        assert!(bag.remove(&ComponentKind::Health).is_ok());
        assert!(bag.get(&ComponentKind::Health).is_none());
        assert_eq!(
            bag.remove(&ComponentKind::Health),
            Err(EntityError::ComponentNotFound(ComponentKind::Health))
        );
    }

    #[test]
    fn kinds_lists_attached_components() {
        let mut bag = ComponentBag::new();
        bag.add(ComponentKind::Health, health(10, 10, 1));
        bag.add(ComponentKind::Mana, health(5, 5, 1));
        let kinds = bag.kinds();
        assert!(kinds.contains(&ComponentKind::Health));
        assert!(kinds.contains(&ComponentKind::Mana));
        assert_eq!(kinds.len(), 2);
    }
}
