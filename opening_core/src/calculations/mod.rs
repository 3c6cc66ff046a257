//! # Load Estimation
//!
//! Entry point for the preliminary lintel load estimate. The roof
//! construction selects the formula:
//!
//! - [`flat_roof`] - reinforced-concrete flat roof
//! - Classic roof - no formula yet, reported as [`SkipReason::NotImplemented`]
//! - anything else - [`SkipReason::UnrecognizedRoof`]
//!
//! A skipped estimate is not an error, but it is a distinct value: callers
//! have to match on [`LoadEstimate`] and decide what to do without load data.
//!
//! ## Example
//!
//! ```rust
//! use opening_core::calculations::{estimate_form, LoadEstimate};
//! use opening_core::input::FormFields;
//!
//! let fields = FormFields::from_pairs([
//!     ("tiefe", "30"), ("d3", "20"), ("hoehe", "250"), ("deckentiefe", "0"),
//!     ("t1", "300"), ("t2", "0"), ("breite", "120"),
//!     ("wandbaustoff", "Stahlbeton"), ("betroffeneWand", "Außenwand"),
//!     ("wandputzType", ""), ("obergeschosse", "3"), ("betroffenesGeschoss", "1"),
//!     ("dachkonstruktion", "Stahlbeton-Flachdach"),
//! ]);
//!
//! match estimate_form(&fields).unwrap() {
//!     LoadEstimate::Computed(result) => assert_eq!(result.total_dead_load.0, 72.75),
//!     LoadEstimate::Skipped(reason) => panic!("skipped: {reason}"),
//! }
//! ```

pub mod flat_roof;

use serde::{Deserialize, Serialize};

use crate::errors::CalcResult;
use crate::input::{FormFields, RoofType, WallOpeningInput};

pub use flat_roof::{round2, FlatRoofBreakdown, LoadEstimateResult};

/// Why no estimate was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason")]
pub enum SkipReason {
    /// The roof type has no load model
    UnrecognizedRoof { roof_type: String },
    /// The roof type is known but its load model is not implemented
    NotImplemented { roof_type: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::UnrecognizedRoof { roof_type } => {
                write!(f, "unrecognized roof type '{}'", roof_type)
            }
            SkipReason::NotImplemented { roof_type } => {
                write!(f, "no load model implemented for roof type '{}'", roof_type)
            }
        }
    }
}

/// Outcome of a load estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum LoadEstimate {
    /// Loads were computed
    Computed(LoadEstimateResult),
    /// No load model applies; no loads are available
    Skipped(SkipReason),
}

impl LoadEstimate {
    /// The computed result, if any
    pub fn computed(&self) -> Option<&LoadEstimateResult> {
        match self {
            LoadEstimate::Computed(result) => Some(result),
            LoadEstimate::Skipped(_) => None,
        }
    }

    /// True if loads were computed
    pub fn is_computed(&self) -> bool {
        matches!(self, LoadEstimate::Computed(_))
    }
}

/// Estimate lintel loads for a parsed request.
///
/// # Returns
///
/// * `Ok(LoadEstimate::Computed)` - flat-roof estimate
/// * `Ok(LoadEstimate::Skipped)` - roof type without a load model
/// * `Err(CalcError::InvalidInput)` - geometry is negative or not finite
pub fn estimate(input: &WallOpeningInput) -> CalcResult<LoadEstimate> {
    input.validate()?;

    let outcome = match &input.dachkonstruktion {
        RoofType::StahlbetonFlachdach => LoadEstimate::Computed(flat_roof::calculate(input)),
        RoofType::ClassicDach => LoadEstimate::Skipped(SkipReason::NotImplemented {
            roof_type: input.dachkonstruktion.display_name().to_string(),
        }),
        RoofType::Other(raw) => LoadEstimate::Skipped(SkipReason::UnrecognizedRoof {
            roof_type: raw.clone(),
        }),
    };

    match &outcome {
        LoadEstimate::Computed(result) => tracing::info!(
            dead_load_kn = result.total_dead_load.0,
            live_load_kn = result.total_live_load.0,
            "Load estimate computed"
        ),
        LoadEstimate::Skipped(reason) => {
            tracing::warn!(%reason, "Proceeding without load calculation")
        }
    }

    Ok(outcome)
}

/// Parse a raw form and estimate. Parse errors abort before any calculation.
pub fn estimate_form(fields: &FormFields) -> CalcResult<LoadEstimate> {
    let input = WallOpeningInput::from_form(fields)?;
    estimate(&input)
}
