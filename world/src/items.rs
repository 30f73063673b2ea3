use learninator_core::{ItemId, ItemKind, ItemSnapshot, Occupant, Vec2};

use crate::eye::SenseTarget;

/// Consumable item resting in the world.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Item {
    id: ItemId,
    kind: ItemKind,
    position: Vec2,
    radius: f32,
    age: u64,
    clean_up: bool,
}

impl Item {
    pub(crate) const fn new(id: ItemId, kind: ItemKind, position: Vec2, radius: f32) -> Self {
        Self {
            id,
            kind,
            position,
            radius,
            age: 0,
            clean_up: false,
        }
    }

    pub(crate) const fn id(&self) -> ItemId {
        self.id
    }

    pub(crate) const fn kind(&self) -> ItemKind {
        self.kind
    }

    pub(crate) const fn position(&self) -> Vec2 {
        self.position
    }

    pub(crate) const fn radius(&self) -> f32 {
        self.radius
    }

    pub(crate) const fn is_flagged(&self) -> bool {
        self.clean_up
    }

    /// Flags the item for the sweep; returns `false` if it was already flagged.
    pub(crate) fn flag(&mut self) -> bool {
        !std::mem::replace(&mut self.clean_up, true)
    }

    pub(crate) fn grow_older(&mut self) {
        self.age = self.age.saturating_add(1);
    }

    pub(crate) fn as_target(&self) -> SenseTarget {
        SenseTarget {
            source: Occupant::Item(self.id),
            kind: self.kind.entity(),
            position: self.position,
            radius: self.radius,
            velocity: Vec2::ZERO,
        }
    }

    pub(crate) const fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            id: self.id,
            kind: self.kind,
            position: self.position,
            radius: self.radius,
            age: self.age,
            clean_up: self.clean_up,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learninator_core::EntityKind;

    #[test]
    fn flagging_is_reported_once() {
        let mut item = Item::new(ItemId::new(1), ItemKind::Food, Vec2::ZERO, 10.0);
        assert!(item.flag());
        assert!(!item.flag());
        assert!(item.snapshot().clean_up);
    }

    #[test]
    fn target_carries_item_classification() {
        let item = Item::new(ItemId::new(2), ItemKind::Poison, Vec2::new(3.0, 4.0), 5.0);
        let target = item.as_target();
        assert_eq!(target.kind, EntityKind::Poison);
        assert_eq!(target.source, Occupant::Item(ItemId::new(2)));
    }
}
