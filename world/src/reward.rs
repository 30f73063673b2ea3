//! Reward shaping applied after every move.

use learninator_core::{EntityKind, ItemKind};
use serde::{Deserialize, Serialize};

use crate::eye::Eye;

/// Tunable reward shaping constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Digestion signal added when an agent eats food.
    pub food: f32,
    /// Digestion signal added when an agent eats poison.
    pub poison: f32,
    /// Multiplier applied to the averaged wall clearance before capping at 1.
    pub proximity_weight: f32,
    /// Clearance above which moving straight earns a bonus.
    pub straight_threshold: f32,
    /// Fraction of the clearance paid as the straight-line bonus.
    pub straight_bonus: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            food: 5.0,
            poison: -6.0,
            proximity_weight: 2.0,
            straight_threshold: 0.75,
            straight_bonus: 0.1,
        }
    }
}

impl RewardConfig {
    /// Digestion signal for eating an item of `kind`.
    #[must_use]
    pub fn digestion(&self, kind: ItemKind) -> f32 {
        match kind {
            ItemKind::Food => self.food,
            ItemKind::Poison => self.poison,
        }
    }
}

/// Averaged wall clearance over all eyes, in `[0, 1]`.
///
/// Eyes that see a wall contribute their normalised distance; every other eye
/// counts as fully clear. An agent without eyes is fully clear.
#[must_use]
pub fn clearance(eyes: &[Eye], proximity_weight: f32) -> f32 {
    if eyes.is_empty() {
        return 1.0;
    }
    let total: f32 = eyes
        .iter()
        .map(|eye| match eye.sensed() {
            Some(EntityKind::Wall) if eye.max_range() > 0.0 => {
                eye.sensed_proximity() / eye.max_range()
            }
            _ => 1.0,
        })
        .sum();
    (total / eyes.len() as f32 * proximity_weight).clamp(0.0, 1.0)
}

/// Combines clearance, the straight-line bonus and digestion into one reward.
#[must_use]
pub fn shaped(
    config: &RewardConfig,
    eyes: &[Eye],
    include_proximity: bool,
    moved_straight: bool,
    digestion: f32,
) -> f32 {
    let clear = clearance(eyes, config.proximity_weight);
    let proximity = if include_proximity { clear } else { 0.0 };
    let straight = if moved_straight && clear > config.straight_threshold {
        config.straight_bonus * clear
    } else {
        0.0
    };
    proximity + straight + digestion
}

#[cfg(test)]
mod tests {
    use super::*;
    use learninator_core::{AgentId, Occupant, Vec2, Wall};

    fn eye_seeing_wall_at(distance: f32) -> Eye {
        let mut eye = Eye::new(0.0, 100.0);
        let wall = Wall::new(Vec2::new(distance, -10.0), Vec2::new(distance, 10.0));
        eye.sense(
            Vec2::ZERO,
            0.0,
            &[wall],
            &[],
            Occupant::Agent(AgentId::new(0)),
        );
        eye
    }

    #[test]
    fn clearance_drops_near_walls() {
        let near = clearance(&[eye_seeing_wall_at(10.0)], 1.0);
        let far = clearance(&[eye_seeing_wall_at(90.0)], 1.0);
        assert!(near < far);
        assert!((near - 0.1).abs() < 1e-4);
    }

    #[test]
    fn clearance_is_capped_at_one() {
        assert_eq!(clearance(&[eye_seeing_wall_at(90.0)], 2.0), 1.0);
        assert_eq!(clearance(&[], 2.0), 1.0);
    }

    #[test]
    fn straight_bonus_requires_clear_view() {
        let config = RewardConfig::default();
        let clear_eyes = [Eye::new(0.0, 100.0)];
        let blocked_eyes = [eye_seeing_wall_at(10.0)];
        let bonus = shaped(&config, &clear_eyes, true, true, 0.0)
            - shaped(&config, &clear_eyes, true, false, 0.0);
        assert!((bonus - 0.1).abs() < 1e-5);
        let none = shaped(&config, &blocked_eyes, true, true, 0.0)
            - shaped(&config, &blocked_eyes, true, false, 0.0);
        assert_eq!(none, 0.0);
    }

    #[test]
    fn digestion_is_added_verbatim() {
        let config = RewardConfig::default();
        assert_eq!(shaped(&config, &[], false, false, -6.0), -6.0);
        assert_eq!(config.digestion(ItemKind::Food), 5.0);
    }
}
