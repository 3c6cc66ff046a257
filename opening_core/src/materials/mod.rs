//! # Wall Materials
//!
//! Material classifications from the wall-opening form and the unit weights
//! the load estimate derives from them.
//!
//! ## Example
//!
//! ```rust
//! use opening_core::materials::{PlasterType, WallMaterial};
//!
//! let wall = WallMaterial::from_form("Mauerwerk");
//! assert_eq!(wall.density_kn_m3(), 20.0);
//!
//! // Unknown materials fall back to reinforced-concrete density
//! assert_eq!(WallMaterial::from_form("Holz").density_kn_m3(), 25.0);
//!
//! assert_eq!(PlasterType::from_form("beidseitig").self_weight_kn_m2(), 0.5);
//! ```

use serde::{Deserialize, Serialize};

/// Unit weight of reinforced concrete (kN/m³), also the fallback density
pub const DEFAULT_DENSITY_KN_M3: f64 = 25.0;

/// Unit weight of masonry (kN/m³)
pub const MASONRY_DENSITY_KN_M3: f64 = 20.0;

/// Wall building material (`wandbaustoff`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WallMaterial {
    /// Reinforced concrete
    Stahlbeton,
    /// Masonry
    Mauerwerk,
    /// Any other material, kept verbatim for reports
    Other(String),
}

impl WallMaterial {
    /// Classify the raw form value (case-insensitive)
    pub fn from_form(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "stahlbeton" => WallMaterial::Stahlbeton,
            "mauerwerk" => WallMaterial::Mauerwerk,
            _ => WallMaterial::Other(raw.trim().to_string()),
        }
    }

    /// Unit weight in kN/m³. Unknown materials use [`DEFAULT_DENSITY_KN_M3`].
    pub fn density_kn_m3(&self) -> f64 {
        match self {
            WallMaterial::Stahlbeton => DEFAULT_DENSITY_KN_M3,
            WallMaterial::Mauerwerk => MASONRY_DENSITY_KN_M3,
            WallMaterial::Other(_) => DEFAULT_DENSITY_KN_M3,
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &str {
        match self {
            WallMaterial::Stahlbeton => "Stahlbeton",
            WallMaterial::Mauerwerk => "Mauerwerk",
            WallMaterial::Other(name) => name,
        }
    }
}

impl std::fmt::Display for WallMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Wall plaster coverage (`wandputzType`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlasterType {
    /// No plaster, or a value the form does not define
    #[default]
    None,
    /// Plastered on one side
    Einseitig,
    /// Plastered on both sides
    Beidseitig,
}

impl PlasterType {
    /// Classify the raw form value. Empty and unknown values mean no plaster.
    pub fn from_form(raw: &str) -> Self {
        match raw.trim() {
            "einseitig" => PlasterType::Einseitig,
            "beidseitig" => PlasterType::Beidseitig,
            _ => PlasterType::None,
        }
    }

    /// Plaster self weight per square meter of wall face (kN/m²)
    pub fn self_weight_kn_m2(&self) -> f64 {
        match self {
            PlasterType::None => 0.0,
            PlasterType::Einseitig => 0.25,
            PlasterType::Beidseitig => 0.5,
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            PlasterType::None => "ohne",
            PlasterType::Einseitig => "einseitig",
            PlasterType::Beidseitig => "beidseitig",
        }
    }
}
