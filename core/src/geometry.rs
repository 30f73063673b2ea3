//! Geometry kernel shared by sensing, movement and maze wall materialization.
//!
//! Positions and velocities are [`glam::Vec2`] values. All intersection
//! routines are total: degenerate input (zero-length segments, parallel
//! lines, coincident points) yields `None` instead of panicking.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Position and velocity of a moving body.
///
/// The value is immutable by convention; every mutation returns a new value so
/// that a snapshot handed to one consumer can never be changed by another.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    position: Vec2,
    velocity: Vec2,
}

impl Motion {
    /// Creates a motion value from explicit position and velocity.
    #[must_use]
    pub const fn new(position: Vec2, velocity: Vec2) -> Self {
        Self { position, velocity }
    }

    /// Creates a motion value resting at the provided position.
    #[must_use]
    pub const fn at(position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
        }
    }

    /// Current position in world units.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }

    /// Current velocity in world units per tick.
    #[must_use]
    pub const fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Returns a copy placed at `position`, keeping the velocity.
    #[must_use]
    pub const fn with_position(self, position: Vec2) -> Self {
        Self { position, ..self }
    }

    /// Returns a copy moving with `velocity`, keeping the position.
    #[must_use]
    pub const fn with_velocity(self, velocity: Vec2) -> Self {
        Self { velocity, ..self }
    }

    /// Returns a copy whose position advanced by one tick of velocity.
    #[must_use]
    pub fn integrated(self) -> Self {
        Self {
            position: self.position + self.velocity,
            velocity: self.velocity,
        }
    }

    /// Returns a copy whose velocity was scaled by `factor`.
    #[must_use]
    pub fn damped(self, factor: f32) -> Self {
        Self {
            position: self.position,
            velocity: self.velocity * factor,
        }
    }

    /// Returns a copy with both position components rounded to whole units.
    #[must_use]
    pub fn rounded(self) -> Self {
        Self {
            position: self.position.round(),
            velocity: self.velocity,
        }
    }

    /// Euclidean distance between the positions of two bodies.
    #[must_use]
    pub fn distance_to(&self, other: &Motion) -> f32 {
        self.position.distance(other.position)
    }
}

/// Intersection found along a query segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    /// Point where the query segment meets the target.
    pub point: Vec2,
    /// Distance from the query segment's start to [`Hit::point`].
    pub distance: f32,
}

impl Hit {
    /// Keeps the nearer of two hits; on equal distance the receiver wins.
    #[must_use]
    pub fn nearer(self, other: Hit) -> Hit {
        if other.distance < self.distance {
            other
        } else {
            self
        }
    }
}

/// Rotates `vector` counter-clockwise by `angle` radians.
#[must_use]
pub fn rotate(vector: Vec2, angle: f32) -> Vec2 {
    Vec2::from_angle(angle).rotate(vector)
}

/// Unit vector pointing along `angle` radians.
#[must_use]
pub fn direction(angle: f32) -> Vec2 {
    Vec2::from_angle(angle)
}

/// Intersects segment `p1..p2` with segment `p3..p4`.
///
/// Returns the crossing point and its distance from `p1`. A crossing exactly
/// at `p1` is not reported, so a body resting on a wall can still leave it.
#[must_use]
pub fn line_intersect(p1: Vec2, p2: Vec2, p3: Vec2, p4: Vec2) -> Option<Hit> {
    let ray = p2 - p1;
    let edge = p4 - p3;
    let denominator = edge.y * ray.x - edge.x * ray.y;
    if denominator == 0.0 || !denominator.is_finite() {
        return None;
    }

    let offset = p1 - p3;
    let ua = (edge.x * offset.y - edge.y * offset.x) / denominator;
    let ub = (ray.x * offset.y - ray.y * offset.x) / denominator;

    if ua > 0.0 && ua <= 1.0 && (0.0..=1.0).contains(&ub) {
        Some(Hit {
            point: p1 + ray * ua,
            distance: ray.length() * ua,
        })
    } else {
        None
    }
}

/// Intersects segment `p1..p2` with the circle at `center` of `radius`.
///
/// The reported point is the foot of the perpendicular from `center` onto the
/// segment; it lies strictly between the endpoints.
#[must_use]
pub fn line_point_intersect(p1: Vec2, p2: Vec2, center: Vec2, radius: f32) -> Option<Hit> {
    let ray = p2 - p1;
    let length_squared = ray.length_squared();
    if length_squared == 0.0 || !length_squared.is_finite() {
        return None;
    }

    let along = (center - p1).dot(ray) / length_squared;
    if along <= 0.0 || along >= 1.0 {
        return None;
    }

    let foot = p1 + ray * along;
    if foot.distance(center) > radius {
        return None;
    }

    Some(Hit {
        point: foot,
        distance: length_squared.sqrt() * along,
    })
}

/// Shortest distance between `point` and the segment `start..end`.
#[must_use]
pub fn point_segment_distance(point: Vec2, start: Vec2, end: Vec2) -> f32 {
    let edge = end - start;
    let length_squared = edge.length_squared();
    if length_squared == 0.0 {
        return point.distance(start);
    }
    let along = ((point - start).dot(edge) / length_squared).clamp(0.0, 1.0);
    point.distance(start + edge * along)
}
