//! # Reinforced-Concrete Flat Roof Load Estimate
//!
//! Approximates the dead and live load (kN) acting on the lintel over a wall
//! opening, for buildings whose roof is a reinforced-concrete flat slab.
//!
//! ## Model
//!
//! - The wall strip directly above the opening (`d3`) and one full wall
//!   height (`d3 + hoehe`) per story above contribute wall self weight.
//! - Each story above contributes a slab (self weight + 1.0 kN/m² fixtures)
//!   over the tributary width; the roof contributes one more slab with
//!   2.0 kN/m² roof build-up instead of fixtures.
//! - Live load is 2.0 kN/m² per floor plus 1.5 kN/m² on the roof, over the
//!   same tributary width.
//!
//! Tributary width: interior walls carry half of both adjacent spans
//! (`(t1 + t2) / 2`), exterior walls half of the single span (`t1 / 2`).

use serde::{Deserialize, Serialize};

use crate::input::{WallOpeningInput, WallPosition};
use crate::units::{KiloNewtons, Meters};

/// Floor fixtures and finishes (kN/m²)
pub const FLOOR_FIXTURES_KN_M2: f64 = 1.0;

/// Roof build-up replacing floor fixtures on the top slab (kN/m²)
pub const ROOF_DEAD_LOAD_KN_M2: f64 = 2.0;

/// Slab thickness assumed when the form leaves it at zero (m)
pub const MIN_SLAB_DEPTH_M: f64 = 0.22;

/// Occupancy live load per floor (kN/m²)
pub const FLOOR_LIVE_LOAD_KN_M2: f64 = 2.0;

/// Live load on the roof (kN/m²)
pub const ROOF_LIVE_LOAD_KN_M2: f64 = 1.5;

/// Intermediate values of the flat-roof estimate, kept for audit and reports.
///
/// All lengths in meters, all loads in kN. Only `total_wall_load` is rounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRoofBreakdown {
    pub tiefe: Meters,
    pub d3: Meters,
    pub hoehe: Meters,
    /// `d3 + hoehe`
    pub wand_hoehe: Meters,
    /// Slab depth actually used (form value or [`MIN_SLAB_DEPTH_M`])
    pub deckentiefe: Meters,
    pub t1: Meters,
    pub t2: Meters,
    /// Wall unit weight (kN/m³)
    pub density: f64,
    /// Stories loading the lintel, at least 1
    pub stories: u32,
    /// Plaster weight per m² of wall (kN/m²)
    pub wandputz_self_weight: f64,
    /// Tributary slab width used for slab and live loads
    pub tributary_width: Meters,
    /// Full span sum used for fixture and roof build-up loads
    pub span_width: Meters,
    pub slab_self_weight: KiloNewtons,
    pub roof_self_weight: KiloNewtons,
    pub wall_just_above: KiloNewtons,
    pub walls_from_above_floors: KiloNewtons,
    /// Rounded to two decimals
    pub total_wall_load: KiloNewtons,
    pub slabs_from_above_floors: KiloNewtons,
    pub total_slab_load: KiloNewtons,
}

/// Result of a computed load estimate.
///
/// ## JSON Example
///
/// ```json
/// {
///   "total_dead_load": 72.75,
///   "total_live_load": 8.25,
///   "breakdown": { "stories": 2, "density": 25.0, "...": "..." }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadEstimateResult {
    /// Total dead load, rounded to two decimals (kN)
    pub total_dead_load: KiloNewtons,
    /// Total live load, unrounded (kN)
    pub total_live_load: KiloNewtons,
    /// Every intermediate value
    pub breakdown: FlatRoofBreakdown,
}

/// Round half-up to two decimals.
///
/// `f64::round` rounds half away from zero, which is half-up for the
/// non-negative loads this is applied to.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Weight of a wall or slab strip: thickness × length × unit weight
fn strip_weight(thickness: f64, length: f64, density: f64) -> f64 {
    thickness * length * density
}

/// Estimate lintel loads for a reinforced-concrete flat roof.
///
/// The input must already be validated; this function does not fail.
pub fn calculate(input: &WallOpeningInput) -> LoadEstimateResult {
    let tiefe: Meters = input.tiefe.into();
    let d3: Meters = input.d3.into();
    let hoehe: Meters = input.hoehe.into();
    let deckentiefe: Meters = input.deckentiefe.into();
    let t1: Meters = input.t1.into();
    let t2: Meters = input.t2.into();

    let wand_hoehe = d3 + hoehe;
    let density = input.wandbaustoff.density_kn_m3();
    let slab_depth = if deckentiefe.0 == 0.0 {
        Meters(MIN_SLAB_DEPTH_M)
    } else {
        deckentiefe
    };
    let stories = input.obergeschosse.abs_diff(input.betroffenes_geschoss).max(1);
    let story_factor = f64::from(stories);
    let wandputz_self_weight = input.wandputz_type.self_weight_kn_m2();

    let (tributary_width, span_width) = match input.betroffene_wand {
        WallPosition::Innenwand => ((t1 + t2) / 2.0, t1 + t2),
        WallPosition::Aussenwand => (t1 / 2.0, t1),
    };

    let slab_self_weight = strip_weight(slab_depth.0, tributary_width.0, density)
        + FLOOR_FIXTURES_KN_M2 * span_width.0 / 2.0;
    let roof_self_weight = strip_weight(slab_depth.0, tributary_width.0, density)
        + ROOF_DEAD_LOAD_KN_M2 * span_width.0 / 2.0;

    let wall_just_above = strip_weight(tiefe.0, d3.0, density) + d3.0 * wandputz_self_weight;
    let walls_from_above_floors = (strip_weight(tiefe.0, wand_hoehe.0, density)
        + wand_hoehe.0 * wandputz_self_weight)
        * story_factor;
    let total_wall_load = round2(wall_just_above + walls_from_above_floors);

    let slabs_from_above_floors = slab_self_weight * story_factor;
    let total_slab_load = slabs_from_above_floors + roof_self_weight;

    let total_dead_load = round2(total_slab_load + total_wall_load);
    let total_live_load =
        (FLOOR_LIVE_LOAD_KN_M2 * story_factor + ROOF_LIVE_LOAD_KN_M2) * tributary_width.0;

    tracing::debug!(
        stories,
        density,
        total_wall_load,
        total_slab_load,
        "Flat roof load breakdown"
    );

    LoadEstimateResult {
        total_dead_load: KiloNewtons(total_dead_load),
        total_live_load: KiloNewtons(total_live_load),
        breakdown: FlatRoofBreakdown {
            tiefe,
            d3,
            hoehe,
            wand_hoehe,
            deckentiefe: slab_depth,
            t1,
            t2,
            density,
            stories,
            wandputz_self_weight,
            tributary_width,
            span_width,
            slab_self_weight: KiloNewtons(slab_self_weight),
            roof_self_weight: KiloNewtons(roof_self_weight),
            wall_just_above: KiloNewtons(wall_just_above),
            walls_from_above_floors: KiloNewtons(walls_from_above_floors),
            total_wall_load: KiloNewtons(total_wall_load),
            slabs_from_above_floors: KiloNewtons(slabs_from_above_floors),
            total_slab_load: KiloNewtons(total_slab_load),
        },
    }
}
