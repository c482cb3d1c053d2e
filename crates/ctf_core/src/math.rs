//! Fixed-point math utilities for deterministic simulation.
//!
//! Field geometry, headings and distances all use fixed-point arithmetic so
//! that the same action stream produces the same match on every platform.
//! Floats only appear at the edges: configuration is converted once at setup
//! and observations/rewards are exported as `f32` for the learner.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// π in `I32F32` (round(π · 2³²)).
pub const PI: Fixed = Fixed::from_bits(13_493_037_705);

/// Fixed-point 2D vector on the ground plane.
///
/// `x` is the world x axis and `y` is the world z axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y (world z) coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Unit vector along +z, the default agent heading.
    pub const FORWARD: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ONE,
    };

    /// Convert a configuration point into fixed-point.
    #[must_use]
    pub fn from_f32(x: f32, y: f32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Export as `(x, z)` floats for observations.
    #[must_use]
    pub fn to_f32(self) -> (f32, f32) {
        (self.x.to_num(), self.y.to_num())
    }

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Vector length.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.dot(self))
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// 2D cross product (z component of the 3D cross product).
    ///
    /// Positive when `other` lies counter-clockwise of `self`.
    #[must_use]
    pub fn cross(self, other: Self) -> Fixed {
        self.x * other.y - self.y * other.x
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len_sq = self.dot(self);

        if len_sq == Fixed::ZERO {
            return Self::ZERO;
        }

        let len = fixed_sqrt(len_sq);
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(self.x / len, self.y / len)
    }

    /// Rotate by a precomputed rotation.
    #[must_use]
    pub fn rotate(self, rotation: Rotation) -> Self {
        Self::new(
            self.x * rotation.cos - self.y * rotation.sin,
            self.x * rotation.sin + self.y * rotation.cos,
        )
    }
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Neg for Vec2Fixed {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

/// A planar rotation stored as its cosine and sine.
///
/// Turning uses the same angle every tick, so the trigonometry is evaluated
/// once at setup and the per-tick work is four multiplications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    /// Cosine of the angle.
    pub cos: Fixed,
    /// Sine of the angle.
    pub sin: Fixed,
}

impl Rotation {
    /// The identity rotation.
    pub const IDENTITY: Self = Self {
        cos: Fixed::ONE,
        sin: Fixed::ZERO,
    };

    /// Build a rotation from an angle in degrees.
    ///
    /// Positive angles turn clockwise when viewed from above (+x towards -z),
    /// matching a left-handed, y-up world where "turn right" is positive.
    #[must_use]
    pub fn from_degrees(degrees: Fixed) -> Self {
        let radians = -(degrees * PI / Fixed::from_num(180));
        let (sin, cos) = fixed_sin_cos(radians);
        Self { cos, sin }
    }
}

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::from_num(1) {
        value
    } else {
        Fixed::from_num(1)
    };

    for _ in 0..64 {
        let mid = (low + high) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

/// Sine and cosine via Taylor series after reducing into `[-π, π]`.
fn fixed_sin_cos(radians: Fixed) -> (Fixed, Fixed) {
    let two_pi = PI * Fixed::from_num(2);
    let mut x = radians % two_pi;
    if x > PI {
        x -= two_pi;
    } else if x < -PI {
        x += two_pi;
    }

    let x2 = x * x;
    let mut sin_term = x;
    let mut cos_term = Fixed::ONE;
    let mut sin = sin_term;
    let mut cos = cos_term;
    for n in 1..14_i32 {
        sin_term = -sin_term * x2 / Fixed::from_num((2 * n) * (2 * n + 1));
        cos_term = -cos_term * x2 / Fixed::from_num((2 * n - 1) * (2 * n));
        sin += sin_term;
        cos += cos_term;
    }
    (sin, cos)
}

/// Linear falloff: `1` at distance zero, `0` at and beyond `radius`.
#[must_use]
pub fn linear_falloff(distance: Fixed, radius: Fixed) -> Fixed {
    if radius <= Fixed::ZERO || distance >= radius {
        return Fixed::ZERO;
    }
    Fixed::ONE - distance / radius
}
