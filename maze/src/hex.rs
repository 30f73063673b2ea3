//! Cube-coordinate hexagon math and pixel layouts.

use std::ops::{Add, Sub};

use learninator_core::Vec2;
use serde::{Deserialize, Serialize};

const SQRT_3: f32 = 1.732_050_8;

/// Hexagon addressed by cube coordinates; `q + r + s == 0` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hex {
    q: i32,
    r: i32,
    s: i32,
}

/// Offsets of the six neighbours, counter-clockwise starting east.
const DIRECTIONS: [Hex; 6] = [
    Hex { q: 1, r: 0, s: -1 },
    Hex { q: 1, r: -1, s: 0 },
    Hex { q: 0, r: -1, s: 1 },
    Hex { q: -1, r: 0, s: 1 },
    Hex { q: -1, r: 1, s: 0 },
    Hex { q: 0, r: 1, s: -1 },
];

impl Hex {
    /// Creates a hex from axial coordinates, deriving `s`.
    #[must_use]
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r, s: -q - r }
    }

    /// Column-like cube coordinate.
    #[must_use]
    pub const fn q(&self) -> i32 {
        self.q
    }

    /// Row-like cube coordinate.
    #[must_use]
    pub const fn r(&self) -> i32 {
        self.r
    }

    /// Third cube coordinate.
    #[must_use]
    pub const fn s(&self) -> i32 {
        self.s
    }

    /// Multiplies every coordinate by `factor`.
    #[must_use]
    pub const fn scale(self, factor: i32) -> Self {
        Self {
            q: self.q * factor,
            r: self.r * factor,
            s: self.s * factor,
        }
    }

    /// Neighbour in direction `direction` (taken modulo six).
    #[must_use]
    pub fn neighbor(self, direction: usize) -> Self {
        self + DIRECTIONS[direction % DIRECTIONS.len()]
    }

    /// All six neighbours in direction order.
    #[must_use]
    pub fn neighbors(self) -> [Hex; 6] {
        DIRECTIONS.map(|offset| self + offset)
    }

    /// Number of steps between two hexes.
    #[must_use]
    pub fn distance(self, other: Hex) -> u32 {
        let delta = self - other;
        (delta.q.unsigned_abs() + delta.r.unsigned_abs() + delta.s.unsigned_abs()) / 2
    }

    /// Rotates 60 degrees counter-clockwise around the origin.
    #[must_use]
    pub const fn rotate_left(self) -> Self {
        Self {
            q: -self.s,
            r: -self.q,
            s: -self.r,
        }
    }

    /// Rotates 60 degrees clockwise around the origin.
    #[must_use]
    pub const fn rotate_right(self) -> Self {
        Self {
            q: -self.r,
            r: -self.s,
            s: -self.q,
        }
    }

    /// Hexes crossed by a straight line from `self` to `other`, inclusive.
    #[must_use]
    pub fn line_to(self, other: Hex) -> Vec<Hex> {
        let steps = self.distance(other);
        if steps == 0 {
            return vec![self];
        }
        // Nudge so points on an edge round consistently.
        let start = FractionalHex::new(
            self.q as f32 + 1e-6,
            self.r as f32 + 1e-6,
            self.s as f32 - 2e-6,
        );
        let end = FractionalHex::new(
            other.q as f32 + 1e-6,
            other.r as f32 + 1e-6,
            other.s as f32 - 2e-6,
        );
        (0..=steps)
            .map(|step| start.lerp(end, step as f32 / steps as f32).round())
            .collect()
    }
}

impl Add for Hex {
    type Output = Hex;

    fn add(self, rhs: Hex) -> Hex {
        Hex {
            q: self.q + rhs.q,
            r: self.r + rhs.r,
            s: self.s + rhs.s,
        }
    }
}

impl Sub for Hex {
    type Output = Hex;

    fn sub(self, rhs: Hex) -> Hex {
        Hex {
            q: self.q - rhs.q,
            r: self.r - rhs.r,
            s: self.s - rhs.s,
        }
    }
}

/// Cube coordinates before rounding to a whole hex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FractionalHex {
    q: f32,
    r: f32,
    s: f32,
}

impl FractionalHex {
    /// Creates a fractional hex from raw cube coordinates.
    #[must_use]
    pub const fn new(q: f32, r: f32, s: f32) -> Self {
        Self { q, r, s }
    }

    /// Linear interpolation towards `other`.
    #[must_use]
    pub fn lerp(self, other: FractionalHex, t: f32) -> Self {
        Self {
            q: self.q + (other.q - self.q) * t,
            r: self.r + (other.r - self.r) * t,
            s: self.s + (other.s - self.s) * t,
        }
    }

    /// Rounds to the containing hex, repairing the coordinate with the largest error.
    #[must_use]
    pub fn round(self) -> Hex {
        let mut q = self.q.round();
        let mut r = self.r.round();
        let mut s = self.s.round();
        let q_diff = (q - self.q).abs();
        let r_diff = (r - self.r).abs();
        let s_diff = (s - self.s).abs();

        if q_diff > r_diff && q_diff > s_diff {
            q = -r - s;
        } else if r_diff > s_diff {
            r = -q - s;
        } else {
            s = -q - r;
        }

        Hex {
            q: q as i32,
            r: r as i32,
            s: s as i32,
        }
    }
}

/// Orientation of the hexagons on screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// A corner points up; rows are horizontal.
    Pointy,
    /// A flat side faces up; columns are vertical.
    Flat,
}

/// Maps hexes to pixel space and back.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HexLayout {
    orientation: Orientation,
    size: f32,
    origin: Vec2,
}

impl HexLayout {
    /// Creates a layout with hexes of circumradius `size` centred around `origin`.
    #[must_use]
    pub const fn new(orientation: Orientation, size: f32, origin: Vec2) -> Self {
        Self {
            orientation,
            size,
            origin,
        }
    }

    /// Orientation of the layout.
    #[must_use]
    pub const fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Circumradius of a single hex.
    #[must_use]
    pub const fn size(&self) -> f32 {
        self.size
    }

    /// Centre of `hex` in pixel space.
    #[must_use]
    pub fn to_pixel(&self, hex: Hex) -> Vec2 {
        let (q, r) = (hex.q as f32, hex.r as f32);
        let local = match self.orientation {
            Orientation::Pointy => Vec2::new(SQRT_3 * q + SQRT_3 / 2.0 * r, 1.5 * r),
            Orientation::Flat => Vec2::new(1.5 * q, SQRT_3 / 2.0 * q + SQRT_3 * r),
        };
        self.origin + local * self.size
    }

    /// Fractional hex containing `point`.
    #[must_use]
    pub fn from_pixel(&self, point: Vec2) -> FractionalHex {
        let local = (point - self.origin) / self.size;
        let (q, r) = match self.orientation {
            Orientation::Pointy => (
                SQRT_3 / 3.0 * local.x - local.y / 3.0,
                2.0 / 3.0 * local.y,
            ),
            Orientation::Flat => (
                2.0 / 3.0 * local.x,
                -local.x / 3.0 + SQRT_3 / 3.0 * local.y,
            ),
        };
        FractionalHex::new(q, r, -q - r)
    }

    /// Six corners of `hex`, in counter-clockwise order.
    #[must_use]
    pub fn corners(&self, hex: Hex) -> [Vec2; 6] {
        let center = self.to_pixel(hex);
        let start = match self.orientation {
            Orientation::Pointy => 0.5,
            Orientation::Flat => 0.0,
        };
        std::array::from_fn(|corner| {
            let angle = std::f32::consts::TAU * (start + corner as f32) / 6.0;
            center + Vec2::new(angle.cos(), angle.sin()) * self.size
        })
    }
}
