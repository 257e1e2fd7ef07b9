//! Fixed-point world coordinates.
//!
//! Unit positions and directive targets are fixed-point so that two
//! directives aimed at the same point compare (and hash) exactly equal,
//! which the action cache relies on. Grid fields themselves are `f64`.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for world coordinates.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Fixed-point 2D world position. One world unit spans one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
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

    /// Build a position from float coordinates (host-side convenience).
    #[must_use]
    pub fn from_f64(x: f64, y: f64) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Build a position from integer coordinates.
    #[must_use]
    pub fn from_int(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Coordinates rounded to the nearest integer.
    #[must_use]
    pub fn rounded(self) -> (i64, i64) {
        (
            self.x.round().to_num::<i64>(),
            self.y.round().to_num::<i64>(),
        )
    }

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_distance_squared() {
        let a = Vec2Fixed::from_int(3, 0);
        let b = Vec2Fixed::from_int(0, 4);
        assert_eq!(a.distance_squared(b), Fixed::from_num(25));
    }

    #[test]
    fn test_rounding_to_nearest() {
        assert_eq!(Vec2Fixed::from_f64(2.4, 7.6).rounded(), (2, 8));
        assert_eq!(Vec2Fixed::from_f64(0.0, 3.0).rounded(), (0, 3));
    }

    #[test]
    fn test_equal_points_hash_equal() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let hash = |v: Vec2Fixed| {
            let mut h = DefaultHasher::new();
            v.hash(&mut h);
            h.finish()
        };
        let a = Vec2Fixed::from_f64(12.0, 10.0);
        let b = Vec2Fixed::from_int(12, 10);
        assert_eq!(a, b);
        assert_eq!(hash(a), hash(b));
    }
}
