//! Ray sensors attached to agents.

use learninator_core::{
    geometry::{self, Hit},
    EntityKind, EyeSnapshot, Occupant, Vec2, Wall,
};

/// Something an eye can see besides walls.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SenseTarget {
    /// Entity the target stands for; lets an agent ignore its own body.
    pub source: Occupant,
    /// Classification reported on a hit.
    pub kind: EntityKind,
    /// Centre of the target.
    pub position: Vec2,
    /// Radius of the target.
    pub radius: f32,
    /// Velocity reported on a hit.
    pub velocity: Vec2,
}

/// Fixed-angle ray sensor.
///
/// Readings are derived state: they are recomputed from scratch by every call
/// to [`Eye::sense`].
#[derive(Clone, Debug, PartialEq)]
pub struct Eye {
    angle: f32,
    max_range: f32,
    sensed_proximity: f32,
    sensed: Option<EntityKind>,
    sensed_velocity: Vec2,
}

impl Eye {
    /// Creates an eye looking `angle` radians off the agent's heading.
    #[must_use]
    pub fn new(angle: f32, max_range: f32) -> Self {
        Self {
            angle,
            max_range,
            sensed_proximity: max_range,
            sensed: None,
            sensed_velocity: Vec2::ZERO,
        }
    }

    /// Spreads `count` eyes evenly across the half circle in front of the agent.
    #[must_use]
    pub fn fan(count: usize, max_range: f32) -> Vec<Eye> {
        let step = std::f32::consts::PI / count.max(1) as f32;
        (0..count)
            .map(|index| {
                let angle = -std::f32::consts::FRAC_PI_2 + step * (index as f32 + 0.5);
                Eye::new(angle, max_range)
            })
            .collect()
    }

    /// Angle relative to the agent's heading.
    #[must_use]
    pub const fn angle(&self) -> f32 {
        self.angle
    }

    /// Length of the ray.
    #[must_use]
    pub const fn max_range(&self) -> f32 {
        self.max_range
    }

    /// Distance to the nearest hit, or [`Eye::max_range`] when nothing was hit.
    #[must_use]
    pub const fn sensed_proximity(&self) -> f32 {
        self.sensed_proximity
    }

    /// Classification of the nearest hit.
    #[must_use]
    pub const fn sensed(&self) -> Option<EntityKind> {
        self.sensed
    }

    /// Velocity of the nearest hit; zero for walls and misses.
    #[must_use]
    pub const fn sensed_velocity(&self) -> Vec2 {
        self.sensed_velocity
    }

    /// Casts the ray from `origin` along `heading + angle`.
    ///
    /// Targets whose `source` equals `observer` are ignored. The nearest hit
    /// wins; on equal distance the earlier candidate (walls before targets)
    /// is kept.
    pub fn sense(
        &mut self,
        origin: Vec2,
        heading: f32,
        walls: &[Wall],
        targets: &[SenseTarget],
        observer: Occupant,
    ) {
        let end = origin + geometry::direction(heading + self.angle) * self.max_range;
        let mut nearest: Option<(Hit, EntityKind, Vec2)> = None;

        let wall_hits = walls
            .iter()
            .filter_map(|wall| wall.intersect(origin, end).map(|hit| (hit, wall.kind(), Vec2::ZERO)));
        let target_hits = targets
            .iter()
            .filter(|target| target.source != observer)
            .filter_map(|target| {
                geometry::line_point_intersect(origin, end, target.position, target.radius)
                    .map(|hit| (hit, target.kind, target.velocity))
            });

        for candidate in wall_hits.chain(target_hits) {
            nearest = match nearest {
                Some(best) if best.0.distance <= candidate.0.distance => Some(best),
                _ => Some(candidate),
            };
        }

        match nearest {
            Some((hit, kind, velocity)) => {
                self.sensed_proximity = hit.distance.min(self.max_range);
                self.sensed = Some(kind);
                self.sensed_velocity = velocity;
            }
            None => {
                self.sensed_proximity = self.max_range;
                self.sensed = None;
                self.sensed_velocity = Vec2::ZERO;
            }
        }
    }

    /// Read-only reading for renderers.
    #[must_use]
    pub fn snapshot(&self) -> EyeSnapshot {
        EyeSnapshot {
            angle: self.angle,
            proximity: self.sensed_proximity,
            sensed: self.sensed,
        }
    }
}
