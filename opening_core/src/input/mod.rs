//! # Form Input
//!
//! The wall-opening form arrives as a flat map of field names to strings
//! ([`FormFields`]). [`WallOpeningInput::from_form`] is the single place
//! where those strings become typed values; everything downstream works on
//! the parsed input.
//!
//! ## Example
//!
//! ```rust
//! use opening_core::input::{FormFields, WallOpeningInput, RoofType};
//!
//! let fields = FormFields::from_pairs([
//!     ("tiefe", "30"), ("d3", "20"), ("hoehe", "250"), ("deckentiefe", "0"),
//!     ("t1", "300"), ("t2", "0"), ("breite", "120"),
//!     ("wandbaustoff", "Stahlbeton"), ("betroffeneWand", "Außenwand"),
//!     ("wandputzType", ""), ("obergeschosse", "3"), ("betroffenesGeschoss", "1"),
//!     ("dachkonstruktion", "Stahlbeton-Flachdach"),
//! ]);
//!
//! let input = WallOpeningInput::from_form(&fields).unwrap();
//! assert_eq!(input.dachkonstruktion, RoofType::StahlbetonFlachdach);
//! assert_eq!(input.tiefe.0, 30.0);
//! ```

mod decimal;

pub use decimal::{parse_decimal, parse_story_count};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult};
use crate::materials::{PlasterType, WallMaterial};
use crate::units::Centimeters;

/// Name of the affected-story field as sent by the form
pub const AFFECTED_STORY_FIELD: &str = "betroffenesGeschoss";

/// Older spelling of [`AFFECTED_STORY_FIELD`], still accepted
pub const AFFECTED_STORY_ALIAS: &str = "betroffengeschoss";

// ============================================================================
// Raw form fields
// ============================================================================

/// Raw form submission: field name to the value exactly as typed.
///
/// Ordered so that reports and stored records list fields deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormFields(BTreeMap<String, String>);

impl FormFields {
    /// Create an empty field map
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        FormFields(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Build from a JSON object.
    ///
    /// Strings are kept verbatim, numbers and booleans are converted to their
    /// text form, `null` entries are dropped. Arrays and nested objects are
    /// rejected, since a form field is always a scalar.
    pub fn from_json(value: &serde_json::Value) -> CalcResult<Self> {
        let object = value.as_object().ok_or_else(|| {
            CalcError::invalid_input("form", value.to_string(), "Form data must be a JSON object")
        })?;

        let mut fields = BTreeMap::new();
        for (name, value) in object {
            let text = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                other => {
                    return Err(CalcError::invalid_input(
                        name.as_str(),
                        other.to_string(),
                        "Form values must be scalars",
                    ))
                }
            };
            fields.insert(name.clone(), text);
        }
        Ok(FormFields(fields))
    }

    /// Insert or replace a field
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Get a field value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Get a field value or fail with `MissingField`
    pub fn require(&self, name: &str) -> CalcResult<&str> {
        self.get(name).ok_or_else(|| CalcError::missing_field(name))
    }

    /// Parse a required decimal field
    pub fn decimal(&self, name: &str) -> CalcResult<f64> {
        parse_decimal(name, self.require(name)?)
    }

    /// Iterate over `(name, value)` in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no fields are present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Classifications
// ============================================================================

/// Which wall the opening is cut into (`betroffeneWand`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WallPosition {
    /// Interior wall, carries slab from both sides
    Innenwand,
    /// Exterior wall, carries slab from one side
    #[serde(rename = "Außenwand")]
    Aussenwand,
}

impl WallPosition {
    /// Parse the form value
    pub fn from_form(raw: &str) -> CalcResult<Self> {
        match raw.trim() {
            "Innenwand" => Ok(WallPosition::Innenwand),
            "Außenwand" | "Aussenwand" => Ok(WallPosition::Aussenwand),
            _ => Err(CalcError::invalid_input(
                "betroffeneWand",
                raw,
                "Expected 'Innenwand' or 'Außenwand'",
            )),
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            WallPosition::Innenwand => "Innenwand",
            WallPosition::Aussenwand => "Außenwand",
        }
    }
}

/// Roof construction (`dachkonstruktion`), normalized by dropping hyphens
/// and lower-casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoofType {
    /// Reinforced-concrete flat roof ("Stahlbeton-Flachdach")
    StahlbetonFlachdach,
    /// Pitched timber roof ("Classic-Dach"); no load formula exists yet
    ClassicDach,
    /// Anything else, kept verbatim
    Other(String),
}

impl RoofType {
    /// Classify the raw form value
    pub fn parse(raw: &str) -> Self {
        let normalized: String = raw.chars().filter(|c| *c != '-').collect::<String>().to_lowercase();
        match normalized.as_str() {
            "stahlbetonflachdach" => RoofType::StahlbetonFlachdach,
            "classicdach" => RoofType::ClassicDach,
            _ => RoofType::Other(raw.to_string()),
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &str {
        match self {
            RoofType::StahlbetonFlachdach => "Stahlbeton-Flachdach",
            RoofType::ClassicDach => "Classic-Dach",
            RoofType::Other(raw) => raw,
        }
    }
}

// ============================================================================
// Parsed input
// ============================================================================

/// Parsed wall-opening request.
///
/// Geometry is kept in centimeters as entered; the estimator converts to
/// meters itself.
///
/// ## JSON Example
///
/// ```json
/// {
///   "tiefe": 30.0, "d3": 20.0, "hoehe": 250.0, "deckentiefe": 0.0,
///   "t1": 300.0, "t2": 0.0, "breite": 120.0,
///   "wandbaustoff": "Stahlbeton",
///   "betroffene_wand": "Außenwand",
///   "wandputz_type": "None",
///   "dachkonstruktion": "StahlbetonFlachdach",
///   "obergeschosse": 3,
///   "betroffenes_geschoss": 1
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallOpeningInput {
    /// Wall thickness
    pub tiefe: Centimeters,
    /// Wall height between the opening's top edge and the slab above
    pub d3: Centimeters,
    /// Story height (clear wall height of one floor)
    pub hoehe: Centimeters,
    /// Slab thickness, 0 if unknown
    pub deckentiefe: Centimeters,
    /// Slab span on the first side of the wall
    pub t1: Centimeters,
    /// Slab span on the second side (interior walls only)
    pub t2: Centimeters,
    /// Opening width
    pub breite: Centimeters,
    /// Wall building material
    pub wandbaustoff: WallMaterial,
    /// Interior or exterior wall
    pub betroffene_wand: WallPosition,
    /// Plaster coverage
    pub wandputz_type: PlasterType,
    /// Roof construction
    pub dachkonstruktion: RoofType,
    /// Upper stories including the roof story
    pub obergeschosse: u32,
    /// Index of the story containing the opening
    pub betroffenes_geschoss: u32,
}

impl WallOpeningInput {
    /// Parse the raw form. Fails on the first missing or malformed field.
    pub fn from_form(fields: &FormFields) -> CalcResult<Self> {
        let affected_story_raw = fields
            .get(AFFECTED_STORY_FIELD)
            .or_else(|| fields.get(AFFECTED_STORY_ALIAS))
            .ok_or_else(|| CalcError::missing_field(AFFECTED_STORY_FIELD))?;

        Ok(WallOpeningInput {
            tiefe: Centimeters(fields.decimal("tiefe")?),
            d3: Centimeters(fields.decimal("d3")?),
            hoehe: Centimeters(fields.decimal("hoehe")?),
            deckentiefe: Centimeters(fields.decimal("deckentiefe")?),
            t1: Centimeters(fields.decimal("t1")?),
            t2: Centimeters(fields.decimal("t2")?),
            breite: Centimeters(fields.decimal("breite")?),
            wandbaustoff: WallMaterial::from_form(fields.require("wandbaustoff")?),
            betroffene_wand: WallPosition::from_form(fields.require("betroffeneWand")?)?,
            wandputz_type: PlasterType::from_form(fields.get("wandputzType").unwrap_or("")),
            dachkonstruktion: RoofType::parse(fields.require("dachkonstruktion")?),
            obergeschosse: parse_story_count("obergeschosse", fields.require("obergeschosse")?)?,
            betroffenes_geschoss: parse_story_count(AFFECTED_STORY_FIELD, affected_story_raw)?,
        })
    }

    /// Validate geometry (needed when the input was built or deserialized
    /// directly rather than parsed from a form).
    pub fn validate(&self) -> CalcResult<()> {
        let geometry = [
            ("tiefe", self.tiefe),
            ("d3", self.d3),
            ("hoehe", self.hoehe),
            ("deckentiefe", self.deckentiefe),
            ("t1", self.t1),
            ("t2", self.t2),
            ("breite", self.breite),
        ];
        for (field, value) in geometry {
            if !value.0.is_finite() {
                return Err(CalcError::invalid_input(field, value.0.to_string(), "Value must be finite"));
            }
            if value.0 < 0.0 {
                return Err(CalcError::invalid_input(field, value.0.to_string(), "Value cannot be negative"));
            }
        }
        Ok(())
    }
}
