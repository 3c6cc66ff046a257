//! # Structural Template Mutation
//!
//! Loads a Frilo DLT+ input file (`.flx`, XML), rewrites the beam span and
//! the two additional line loads, and serializes the result for upload.
//!
//! ## Template Layout
//!
//! ```text
//! Root
//! ├── System/Felder/Feld[0]/Laenge      field length (cm)
//! ├── System/Auflagerliste/Auflager*    supports
//! ├── Belastung/Zusatzlasten/Last[0]    dead load case: W1, W2
//! ├── Belastung/Zusatzlasten/Last[1]    live load case: W1, W2
//! └── Konfiguration/Querschnittsbezeichnungen/Bezeichnung*
//! ```
//!
//! Templates exist in several variants, so a missing branch is not an
//! error: the mutation is skipped, a warning is logged, and the returned
//! [`MutationOutcome`] says what was missing.
//!
//! Everything the mutations do not touch is written back exactly as read.
//! The downstream analysis software is strict about the file layout.
//!
//! ## Example
//!
//! ```rust
//! use opening_core::template::{MutationOutcome, TemplateDocument};
//!
//! let xml = "<Root><System><Felder><Feld><Laenge>100</Laenge></Feld></Felder></System></Root>";
//! let mut doc = TemplateDocument::parse("beam.flx", xml).unwrap();
//!
//! assert_eq!(doc.modify_length(150.0), MutationOutcome::Applied);
//! let out = doc.serialize().unwrap();
//! assert_eq!(out.name, "beam.flx");
//!
//! let reloaded = TemplateDocument::parse("beam.flx", std::str::from_utf8(&out.buffer).unwrap()).unwrap();
//! assert_eq!(reloaded.length(), Some(150.0));
//! ```

mod path;
mod tree;

pub use path::{ElementPath, PathMissing};
pub use tree::{Element, Node};

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::calculations::LoadEstimateResult;
use crate::errors::{CalcError, CalcResult};
use crate::payload::NamedBuffer;
use crate::units::{Centimeters, KiloNewtons};

/// Result of a single template mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum MutationOutcome {
    /// The value was written
    Applied,
    /// The target is absent in this template; nothing changed
    Skipped(PathMissing),
}

impl MutationOutcome {
    /// True if the mutation was written
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied)
    }

    fn skipped(missing: PathMissing, operation: &str) -> Self {
        tracing::warn!(%missing, operation, "Template path missing, mutation skipped");
        MutationOutcome::Skipped(missing)
    }
}

/// Outcome of [`TemplateDocument::modify_load_values`], one per load record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadValuesOutcome {
    /// Record 0 (dead load case)
    pub dead_load: MutationOutcome,
    /// Record 1 (live load case)
    pub live_load: MutationOutcome,
}

impl LoadValuesOutcome {
    /// True if both records were written
    pub fn is_applied(&self) -> bool {
        self.dead_load.is_applied() && self.live_load.is_applied()
    }
}

/// Outcome of [`TemplateDocument::collapse_to_single_span`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleSpanOutcome {
    /// Second field removed from `Felder`
    pub fields: MutationOutcome,
    /// First support removed from `Auflagerliste`
    pub supports: MutationOutcome,
    /// Cross-section labels reduced to first and last
    pub cross_sections: MutationOutcome,
}

/// Conversion from an estimate to template values.
///
/// The template expects the field length in centimeters including a
/// clearance on top of the clear opening width, and load values divided by
/// the storage scale: the intake system keeps loads scaled by 100 and the
/// template receives them rescaled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemplateScaling {
    /// Added to the opening width to get the beam field length (cm)
    pub clearance_margin_cm: f64,
    /// Loads are divided by this before being written
    pub load_storage_scale: f64,
}

impl Default for TemplateScaling {
    fn default() -> Self {
        TemplateScaling {
            clearance_margin_cm: 30.0,
            load_storage_scale: 100.0,
        }
    }
}

/// What [`apply_estimate`] wrote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateUpdate {
    /// Field length written (cm)
    pub length_cm: f64,
    /// Dead load written (already divided by the storage scale)
    pub dead_load: f64,
    /// Live load written (already divided by the storage scale)
    pub live_load: f64,
    pub length: MutationOutcome,
    pub loads: LoadValuesOutcome,
}

fn laenge_path() -> ElementPath {
    ElementPath::root("Root")
        .child("System")
        .child("Felder")
        .nth("Feld", 0)
        .child("Laenge")
}

fn zusatzlasten_path() -> ElementPath {
    ElementPath::root("Root").child("Belastung").child("Zusatzlasten")
}

/// Shortest decimal text that parses back to the same value (`150`, `0.1234`)
fn format_number(value: f64) -> String {
    value.to_string()
}

/// A parsed template, owned by one request.
#[derive(Debug, Clone)]
pub struct TemplateDocument {
    name: String,
    nodes: Vec<Node>,
}

impl TemplateDocument {
    /// Read and parse a template file. The file itself is never modified.
    ///
    /// # Errors
    ///
    /// `CalcError::TemplateLoad` if the file cannot be read or is not
    /// well-formed XML with a document element.
    pub fn load(path: &Path) -> CalcResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CalcError::template_load(path.display().to_string(), e.to_string()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "template.flx".to_string());

        tracing::debug!(path = %path.display(), "Loading template");
        Self::parse(name, &text)
            .map_err(|e| match e {
                CalcError::TemplateLoad { reason, .. } => {
                    CalcError::template_load(path.display().to_string(), reason)
                }
                other => other,
            })
    }

    /// Parse template text held in memory
    pub fn parse(name: impl Into<String>, xml: &str) -> CalcResult<Self> {
        let name = name.into();
        let nodes = tree::parse(xml).map_err(|reason| CalcError::template_load(name.as_str(), reason))?;
        let doc = TemplateDocument { name, nodes };
        if doc.root().is_none() {
            return Err(CalcError::template_load(doc.name, "document has no root element"));
        }
        Ok(doc)
    }

    /// File name used for the serialized payload
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The document element
    pub fn root(&self) -> Option<&Element> {
        self.nodes.iter().find_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    fn root_mut(&mut self) -> Option<&mut Element> {
        self.nodes.iter_mut().find_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// Look up an element
    pub fn find(&self, path: &ElementPath) -> Result<&Element, PathMissing> {
        path.resolve(self.root())
    }

    /// Overwrite `Root/System/Felder/Feld[0]/Laenge`
    pub fn modify_length(&mut self, new_length: f64) -> MutationOutcome {
        let path = laenge_path();
        match path.resolve_mut(self.root_mut()) {
            Ok(laenge) => {
                laenge.set_text(&format_number(new_length));
                MutationOutcome::Applied
            }
            Err(missing) => MutationOutcome::skipped(missing, "modify_length"),
        }
    }

    /// Overwrite W1 and W2 of the two additional loads under
    /// `Root/Belastung/Zusatzlasten`: record 0 gets the dead load, record 1
    /// the live load. Each record is written only if it has both W1 and W2.
    pub fn modify_load_values(&mut self, dead_load: f64, live_load: f64) -> LoadValuesOutcome {
        let path = zusatzlasten_path();
        let zusatzlasten = match path.resolve_mut(self.root_mut()) {
            Ok(el) if el.count_elements("Last") > 0 => el,
            Ok(_) => {
                let missing = path.clone().child("Last");
                let missing = PathMissing {
                    path: missing.to_string(),
                    missing: missing.to_string(),
                };
                return LoadValuesOutcome {
                    dead_load: MutationOutcome::skipped(missing.clone(), "modify_load_values"),
                    live_load: MutationOutcome::Skipped(missing),
                };
            }
            Err(missing) => {
                return LoadValuesOutcome {
                    dead_load: MutationOutcome::skipped(missing.clone(), "modify_load_values"),
                    live_load: MutationOutcome::Skipped(missing),
                };
            }
        };

        LoadValuesOutcome {
            dead_load: set_load_pair(zusatzlasten, 0, dead_load),
            live_load: set_load_pair(zusatzlasten, 1, live_load),
        }
    }

    /// Reduce a two-span template to a single span: drop the second field,
    /// the first support, and every cross-section label but the first and
    /// last.
    pub fn collapse_to_single_span(&mut self) -> SingleSpanOutcome {
        let felder = ElementPath::root("Root").child("System").child("Felder");
        let fields = match felder.resolve_mut(self.root_mut()) {
            Ok(el) => {
                el.remove_element("Feld", 1);
                MutationOutcome::Applied
            }
            Err(missing) => MutationOutcome::skipped(missing, "collapse_to_single_span"),
        };

        let auflagerliste = ElementPath::root("Root").child("System").child("Auflagerliste");
        let supports = match auflagerliste.resolve_mut(self.root_mut()) {
            Ok(el) => {
                el.remove_element("Auflager", 0);
                MutationOutcome::Applied
            }
            Err(missing) => MutationOutcome::skipped(missing, "collapse_to_single_span"),
        };

        let labels = ElementPath::root("Root")
            .child("Konfiguration")
            .child("Querschnittsbezeichnungen");
        let cross_sections = match labels.resolve_mut(self.root_mut()) {
            Ok(el) => {
                let count = el.count_elements("Bezeichnung");
                // Remove from the back so indices stay valid
                for index in (1..count.saturating_sub(1)).rev() {
                    el.remove_element("Bezeichnung", index);
                }
                MutationOutcome::Applied
            }
            Err(missing) => MutationOutcome::skipped(missing, "collapse_to_single_span"),
        };

        SingleSpanOutcome {
            fields,
            supports,
            cross_sections,
        }
    }

    /// Current `Laenge` value, if present and numeric
    pub fn length(&self) -> Option<f64> {
        let laenge = self.find(&laenge_path()).ok()?;
        laenge.text().trim().parse().ok()
    }

    /// Current `(W1, W2)` of load record `index`, if present and numeric
    pub fn load_pair(&self, index: usize) -> Option<(f64, f64)> {
        let last = self.find(&zusatzlasten_path().nth("Last", index)).ok()?;
        let w1 = last.nth_element("W1", 0)?.text().trim().parse().ok()?;
        let w2 = last.nth_element("W2", 0)?.text().trim().parse().ok()?;
        Some((w1, w2))
    }

    /// Render to bytes under the template's file name
    pub fn serialize(&self) -> CalcResult<NamedBuffer> {
        let bytes = tree::write(&self.nodes).map_err(|reason| CalcError::Internal {
            message: format!("Failed to serialize template '{}': {}", self.name, reason),
        })?;
        Ok(NamedBuffer::new(self.name.clone(), bytes))
    }
}

fn set_load_pair(zusatzlasten: &mut Element, index: usize, value: f64) -> MutationOutcome {
    let record = zusatzlasten_path().nth("Last", index);
    let Some(last) = zusatzlasten.nth_element_mut("Last", index) else {
        let missing = PathMissing {
            path: record.to_string(),
            missing: record.to_string(),
        };
        return MutationOutcome::skipped(missing, "modify_load_values");
    };

    for component in ["W1", "W2"] {
        if last.nth_element(component, 0).is_none() {
            let path = record.clone().child(component).to_string();
            let missing = PathMissing {
                path: path.clone(),
                missing: path,
            };
            return MutationOutcome::skipped(missing, "modify_load_values");
        }
    }

    let text = format_number(value);
    for component in ["W1", "W2"] {
        if let Some(el) = last.nth_element_mut(component, 0) {
            el.set_text(&text);
        }
    }
    MutationOutcome::Applied
}

/// Write an estimate into a template.
///
/// * field length = `breite + clearance_margin_cm`
/// * record 0 W1/W2 = `total_dead_load / load_storage_scale`
/// * record 1 W1/W2 = `total_live_load / load_storage_scale`
pub fn apply_estimate(
    doc: &mut TemplateDocument,
    breite: Centimeters,
    result: &LoadEstimateResult,
    scaling: &TemplateScaling,
) -> TemplateUpdate {
    apply_loads(doc, breite, result.total_dead_load, result.total_live_load, scaling)
}

/// [`apply_estimate`] for loads that did not come from an estimate
pub fn apply_loads(
    doc: &mut TemplateDocument,
    breite: Centimeters,
    dead: KiloNewtons,
    live: KiloNewtons,
    scaling: &TemplateScaling,
) -> TemplateUpdate {
    let length_cm = breite.0 + scaling.clearance_margin_cm;
    let dead_load = dead.0 / scaling.load_storage_scale;
    let live_load = live.0 / scaling.load_storage_scale;

    let length = doc.modify_length(length_cm);
    let loads = doc.modify_load_values(dead_load, live_load);

    tracing::info!(
        template = doc.name(),
        length_cm,
        dead_load,
        live_load,
        "Template updated"
    );

    TemplateUpdate {
        length_cm,
        dead_load,
        live_load,
        length,
        loads,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SINGLE_SPAN: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Root Version="2024.1">
  <System>
    <Felder>
      <Feld Nr="1">
        <Laenge>100</Laenge>
        <Querschnitt>HEA 160</Querschnitt>
      </Feld>
    </Felder>
    <Auflagerliste>
      <Auflager Typ="gelenkig"/>
      <Auflager Typ="verschieblich"/>
    </Auflagerliste>
  </System>
  <Belastung>
    <Zusatzlasten>
      <Last Lastfall="G">
        <Typ>Streckenlast</Typ>
        <W1>0</W1>
        <W2>0</W2>
      </Last>
      <Last Lastfall="Q">
        <Typ>Streckenlast</Typ>
        <W1>0</W1>
        <W2>0</W2>
      </Last>
    </Zusatzlasten>
  </Belastung>
  <!-- Bemessung nach EC3 -->
  <Konfiguration>
    <Querschnittsbezeichnungen>
      <Bezeichnung>A</Bezeichnung>
    </Querschnittsbezeichnungen>
  </Konfiguration>
</Root>
"#;

    fn doc() -> TemplateDocument {
        TemplateDocument::parse("DLTplusSinglespanSteel.flx", SINGLE_SPAN).unwrap()
    }

    fn render(doc: &TemplateDocument) -> String {
        String::from_utf8(doc.serialize().unwrap().buffer).unwrap()
    }

    #[test]
    fn test_unmodified_roundtrip_is_identical() {
        assert_eq!(render(&doc()), SINGLE_SPAN);
    }

    #[test]
    fn test_modify_length_roundtrip() {
        let mut doc = doc();
        assert_eq!(doc.modify_length(150.0), MutationOutcome::Applied);
        let out = doc.serialize().unwrap();
        assert_eq!(out.size, out.buffer.len());

        let reloaded =
            TemplateDocument::parse(out.name.clone(), std::str::from_utf8(&out.buffer).unwrap()).unwrap();
        assert_eq!(reloaded.length(), Some(150.0));

        let mut fractional = reloaded;
        fractional.modify_length(131.25);
        let text = render(&fractional);
        let again = TemplateDocument::parse("x.flx", &text).unwrap();
        assert_eq!(again.length(), Some(131.25));
    }

    #[test]
    fn test_modify_load_values_touches_only_w1_w2() {
        let mut doc = doc();
        let outcome = doc.modify_load_values(5.0, 3.0);
        assert!(outcome.is_applied());
        assert_eq!(doc.load_pair(0), Some((5.0, 5.0)));
        assert_eq!(doc.load_pair(1), Some((3.0, 3.0)));

        let expected = SINGLE_SPAN
            .replacen("<W1>0</W1>\n        <W2>0</W2>", "<W1>5</W1>\n        <W2>5</W2>", 1)
            .replacen("<W1>0</W1>\n        <W2>0</W2>", "<W1>3</W1>\n        <W2>3</W2>", 1);
        assert_eq!(render(&doc), expected);
    }

    #[test]
    fn test_missing_felder_is_a_noop() {
        let xml = "<Root><System><Auflagerliste/></System></Root>";
        let mut doc = TemplateDocument::parse("t.flx", xml).unwrap();
        let outcome = doc.modify_length(150.0);
        match outcome {
            MutationOutcome::Skipped(missing) => assert_eq!(missing.missing, "Root/System/Felder"),
            MutationOutcome::Applied => panic!("nothing to apply"),
        }
        assert_eq!(render(&doc), xml);
    }

    #[test]
    fn test_load_record_without_w2_is_skipped_alone() {
        let xml = "<Root><Belastung><Zusatzlasten>\
                   <Last><W1>0</W1></Last>\
                   <Last><W1>0</W1><W2>0</W2></Last>\
                   </Zusatzlasten></Belastung></Root>";
        let mut doc = TemplateDocument::parse("t.flx", xml).unwrap();
        let outcome = doc.modify_load_values(5.0, 3.0);
        assert!(!outcome.dead_load.is_applied());
        assert!(outcome.live_load.is_applied());
        assert_eq!(doc.load_pair(1), Some((3.0, 3.0)));
        assert!(render(&doc).contains("<Last><W1>0</W1></Last>"));
    }

    #[test]
    fn test_missing_belastung_skips_both_records() {
        let mut doc = TemplateDocument::parse("t.flx", "<Root/>").unwrap();
        let outcome = doc.modify_load_values(5.0, 3.0);
        assert!(!outcome.dead_load.is_applied());
        assert!(!outcome.live_load.is_applied());
        assert_eq!(render(&doc), "<Root/>");
    }

    #[test]
    fn test_collapse_to_single_span() {
        let xml = "<Root><System>\
                   <Felder><Feld>1</Feld><Feld>2</Feld><Feld>3</Feld></Felder>\
                   <Auflagerliste><Auflager>a</Auflager><Auflager>b</Auflager></Auflagerliste>\
                   </System><Konfiguration><Querschnittsbezeichnungen>\
                   <Bezeichnung>A</Bezeichnung><Bezeichnung>B</Bezeichnung><Bezeichnung>C</Bezeichnung>\
                   </Querschnittsbezeichnungen></Konfiguration></Root>";
        let mut doc = TemplateDocument::parse("t.flx", xml).unwrap();
        let outcome = doc.collapse_to_single_span();
        assert!(outcome.fields.is_applied());
        assert!(outcome.supports.is_applied());
        assert!(outcome.cross_sections.is_applied());

        let text = render(&doc);
        assert!(text.contains("<Felder><Feld>1</Feld><Feld>3</Feld></Felder>"));
        assert!(text.contains("<Auflagerliste><Auflager>b</Auflager></Auflagerliste>"));
        assert!(text.contains("<Bezeichnung>A</Bezeichnung><Bezeichnung>C</Bezeichnung></Q"));
    }

    #[test]
    fn test_collapse_on_single_span_template_keeps_only_field() {
        let mut doc = doc();
        let outcome = doc.collapse_to_single_span();
        assert!(outcome.fields.is_applied());
        assert!(outcome.cross_sections.is_applied());
        // Single-span template keeps its only field
        assert_eq!(doc.length(), Some(100.0));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".flx").tempfile().unwrap();
        file.write_all(SINGLE_SPAN.as_bytes()).unwrap();

        let doc = TemplateDocument::load(file.path()).unwrap();
        assert!(doc.name().ends_with(".flx"));
        assert_eq!(doc.length(), Some(100.0));
    }

    #[test]
    fn test_load_errors() {
        let missing = TemplateDocument::load(Path::new("/nonexistent/template.flx")).unwrap_err();
        assert_eq!(missing.error_code(), "TEMPLATE_LOAD");

        let malformed = TemplateDocument::parse("t.flx", "<Root><System></Root>").unwrap_err();
        assert_eq!(malformed.error_code(), "TEMPLATE_LOAD");

        let empty = TemplateDocument::parse("t.flx", "<!-- nothing -->").unwrap_err();
        assert_eq!(empty.error_code(), "TEMPLATE_LOAD");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn length_survives_serialization(length in 0.0..10_000.0f64) {
                let mut doc = doc();
                prop_assert!(doc.modify_length(length).is_applied());
                let text = render(&doc);
                let reloaded = TemplateDocument::parse("t.flx", &text).unwrap();
                prop_assert_eq!(reloaded.length(), Some(length));
            }

            #[test]
            fn load_values_leave_the_rest_untouched(dead in 0.0..50.0f64, live in 0.0..50.0f64) {
                let mut doc = doc();
                prop_assert!(doc.modify_load_values(dead, live).is_applied());
                let text = render(&doc);
                let reloaded = TemplateDocument::parse("t.flx", &text).unwrap();
                prop_assert_eq!(reloaded.load_pair(0), Some((dead, dead)));
                prop_assert_eq!(reloaded.load_pair(1), Some((live, live)));
                prop_assert_eq!(reloaded.length(), Some(100.0));
                prop_assert!(text.contains("<!-- Bemessung nach EC3 -->"));
            }
        }
    }
}
