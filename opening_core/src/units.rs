//! # Unit Types
//!
//! Newtype wrappers for the metric units used by the intake forms and the
//! load estimate. They serialize as bare numbers.
//!
//! ## Units
//!
//! - Length: centimeters (form input, template field length), meters (calculation)
//! - Force: kilonewtons (kN)
//!
//! Surface and volume loads (kN/m², kN/m³) stay plain `f64` constants inside
//! the calculation, since they never cross the API boundary.
//!
//! ## Example
//!
//! ```rust
//! use opening_core::units::{Centimeters, Meters};
//!
//! let depth = Centimeters(30.0);
//! let depth_m: Meters = depth.into();
//! assert_eq!(depth_m.0, 0.3);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Sub};

// ============================================================================
// Length Units
// ============================================================================

/// Length in centimeters
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Centimeters(pub f64);

/// Length in meters
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Meters(pub f64);

impl From<Centimeters> for Meters {
    fn from(cm: Centimeters) -> Self {
        Meters(cm.0 / 100.0)
    }
}

impl From<Meters> for Centimeters {
    fn from(m: Meters) -> Self {
        Centimeters(m.0 * 100.0)
    }
}

// ============================================================================
// Force Units
// ============================================================================

/// Force in kilonewtons
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KiloNewtons(pub f64);

// ============================================================================
// Arithmetic Implementations
// ============================================================================

macro_rules! impl_arithmetic {
    ($type:ty) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl $type {
            /// Get the raw f64 value
            pub fn value(self) -> f64 {
                self.0
            }

            /// Create from raw f64 value
            pub fn new(value: f64) -> Self {
                Self(value)
            }
        }
    };
}

impl_arithmetic!(Centimeters);
impl_arithmetic!(Meters);
impl_arithmetic!(KiloNewtons);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centimeters_to_meters() {
        let m: Meters = Centimeters(250.0).into();
        assert_eq!(m.0, 2.5);
        let m: Meters = Centimeters(22.0).into();
        assert_eq!(m.0, 22.0 / 100.0);
    }

    #[test]
    fn test_arithmetic() {
        let a = Centimeters(120.0);
        let b = Centimeters(30.0);
        assert_eq!((a + b).0, 150.0);
        assert_eq!((a - b).0, 90.0);
        assert_eq!((KiloNewtons(12.5) / 100.0).0, 0.125);
    }

    #[test]
    fn test_serialization() {
        let cm = Centimeters(12.5);
        let json = serde_json::to_string(&cm).unwrap();
        assert_eq!(json, "12.5");
        let roundtrip: Centimeters = serde_json::from_str(&json).unwrap();
        assert_eq!(cm, roundtrip);
    }
}
