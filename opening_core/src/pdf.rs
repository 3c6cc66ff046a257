//! # PDF Reports
//!
//! Renders the two documents that accompany a wall-opening request using
//! Typst:
//!
//! - [`render_load_report`] - the load calculation with every intermediate
//!   value, for the engineer
//! - [`render_submission_report`] - everything the user entered, sent back
//!   as confirmation
//!
//! ## Architecture
//!
//! - Typst templates are embedded as string constants
//! - Data is injected by placeholder replacement; user text is escaped
//! - Only the fonts bundled with `typst-assets` are used
//! - Output is a [`NamedBuffer`] holding the PDF bytes
//!
//! ## Example
//!
//! ```rust,no_run
//! use opening_core::input::FormFields;
//! use opening_core::pdf::render_submission_report;
//!
//! let fields = FormFields::from_pairs([("breite", "101"), ("wandbaustoff", "Mauerwerk")]);
//! let pdf = render_submission_report(42, &fields).unwrap();
//! std::fs::write(&pdf.name, &pdf.buffer).unwrap();
//! ```

use chrono::Utc;
use typst::diag::{FileError, FileResult};
use typst::foundations::{Bytes, Datetime};
use typst::syntax::{FileId, Source};
use typst::text::{Font, FontBook};
use typst::utils::LazyHash;
use typst::{Library, LibraryExt, World};
use typst_pdf::PdfOptions;

use crate::calculations::LoadEstimateResult;
use crate::errors::{CalcError, CalcResult};
use crate::input::{FormFields, WallOpeningInput};
use crate::payload::NamedBuffer;
use crate::services::RequestId;

/// File name of the load calculation report
pub const LOAD_REPORT_NAME: &str = "LoadCalculation.pdf";

/// File name of the submission report
pub const SUBMISSION_REPORT_NAME: &str = "UserEnteredData.pdf";

// ============================================================================
// Typst World Implementation
// ============================================================================

/// A minimal Typst world for compiling documents without external files.
struct PdfWorld {
    main: Source,
    book: LazyHash<FontBook>,
    fonts: Vec<Font>,
    library: LazyHash<Library>,
}

impl PdfWorld {
    fn new(source: String) -> Self {
        let fonts = Self::load_fonts();
        let book = FontBook::from_fonts(&fonts);

        PdfWorld {
            main: Source::detached(source),
            book: LazyHash::new(book),
            fonts,
            library: LazyHash::new(Library::default()),
        }
    }

    fn load_fonts() -> Vec<Font> {
        typst_assets::fonts()
            .flat_map(|font_bytes| Font::iter(Bytes::new(font_bytes.to_vec())))
            .collect()
    }
}

impl World for PdfWorld {
    fn library(&self) -> &LazyHash<Library> {
        &self.library
    }

    fn book(&self) -> &LazyHash<FontBook> {
        &self.book
    }

    fn main(&self) -> FileId {
        self.main.id()
    }

    fn source(&self, id: FileId) -> FileResult<Source> {
        if id == self.main.id() {
            Ok(self.main.clone())
        } else {
            Err(FileError::NotFound(id.vpath().as_rootless_path().into()))
        }
    }

    fn file(&self, id: FileId) -> FileResult<Bytes> {
        Err(FileError::NotFound(id.vpath().as_rootless_path().into()))
    }

    fn font(&self, index: usize) -> Option<Font> {
        self.fonts.get(index).cloned()
    }

    fn today(&self, _offset: Option<i64>) -> Option<Datetime> {
        let now = Utc::now();
        Datetime::from_ymd(
            now.format("%Y").to_string().parse().ok()?,
            now.format("%m").to_string().parse().ok()?,
            now.format("%d").to_string().parse().ok()?,
        )
    }
}

// ============================================================================
// PDF Templates
// ============================================================================

/// Shared page setup
const PAGE_SETUP: &str = r##"
#set page(
  paper: "a4",
  margin: (top: 2.5cm, bottom: 2.5cm, left: 2cm, right: 2cm),
  header: align(right)[
    #text(size: 9pt, fill: gray)[Wanddurchbruch - Anfrage {{REQUEST_ID}}]
  ],
  footer: context [
    #line(length: 100%, stroke: 0.5pt + gray)
    #v(4pt)
    #grid(
      columns: (1fr, 1fr),
      align(left)[#text(size: 9pt)[Seite #counter(page).display()]],
      align(right)[#text(size: 9pt)[{{DATE}}]],
    )
  ]
)

#set text(font: "Libertinus Serif", size: 10pt, lang: "de")
"##;

/// Typst template for the load calculation
const LOAD_REPORT_TEMPLATE: &str = r##"
#align(center)[
  #block(width: 100%, fill: rgb("#f0f0f0"), inset: 12pt, radius: 4pt)[
    #text(size: 16pt, weight: "bold")[Lastermittlung Sturz]
    #v(4pt)
    #text(size: 12pt)[{{ROOF}}]
  ]
]

#v(12pt)

== Eingaben

#table(
  columns: (1fr, auto, auto),
  inset: 6pt,
  stroke: 0.5pt,
  align: (left, right, left),
  table.header([*Parameter*], [*Wert*], [*Einheit*]),
  [Wanddicke (tiefe)], [{{TIEFE}}], [m],
  [Wand über Öffnung (d3)], [{{D3}}], [m],
  [Geschosshöhe (hoehe)], [{{HOEHE}}], [m],
  [Deckendicke], [{{DECKENTIEFE}}], [m],
  [Spannweite t1], [{{T1}}], [m],
  [Spannweite t2], [{{T2}}], [m],
  [Öffnungsbreite], [{{BREITE}}], [cm],
  [Wandbaustoff], [{{MATERIAL}}], [],
  [Wichte], [{{DENSITY}}], [kN/m#super[3]],
  [Lage der Wand], [{{POSITION}}], [],
  [Putz], [{{PLASTER}}], [kN/m#super[2]],
  [Geschosse über Öffnung], [{{STORIES}}], [],
)

== Zwischenwerte

#table(
  columns: (1fr, auto, auto),
  inset: 6pt,
  stroke: 0.5pt,
  align: (left, right, left),
  table.header([*Größe*], [*Wert*], [*Einheit*]),
  [Einzugsbreite], [{{TRIBUTARY}}], [m],
  [Spannweitensumme], [{{SPAN}}], [m],
  [Wandhöhe (d3 + hoehe)], [{{WAND_HOEHE}}], [m],
  [Decke je Geschoss], [{{SLAB}}], [kN],
  [Dach], [{{ROOF_WEIGHT}}], [kN],
  [Wand direkt über Öffnung], [{{WALL_ABOVE}}], [kN],
  [Wände aus Obergeschossen], [{{WALLS_FLOORS}}], [kN],
  [Decken aus Obergeschossen], [{{SLABS_FLOORS}}], [kN],
  [Wandlast gesamt], [{{WALL_TOTAL}}], [kN],
  [Deckenlast gesamt], [{{SLAB_TOTAL}}], [kN],
)

== Ergebnis

#table(
  columns: (1fr, auto, auto),
  inset: 8pt,
  stroke: 0.5pt,
  align: (left, right, left),
  [*Ständige Last (g)*], [*{{DEAD}}*], [kN],
  [*Veränderliche Last (q)*], [*{{LIVE}}*], [kN],
)

#v(8pt)
#text(size: 9pt, fill: gray)[
  Überschlägige Lastermittlung. Die Bemessung des Sturzes erfolgt durch den Tragwerksplaner.
]
"##;

/// Typst template for the submission confirmation
const SUBMISSION_TEMPLATE: &str = r##"
#align(center)[
  #text(size: 16pt, weight: "bold")[Ihre Angaben]
]

#v(12pt)

#table(
  columns: (auto, 1fr),
  inset: 6pt,
  stroke: 0.5pt,
  table.header([*Feld*], [*Eingabe*]),
{{ROWS}}
)
"##;

/// Render the load calculation report (`LoadCalculation.pdf`).
///
/// # Returns
///
/// * `Ok(NamedBuffer)` - PDF bytes
/// * `Err(CalcError::Internal)` - Typst compilation or PDF export failed
pub fn render_load_report(
    request_id: RequestId,
    input: &WallOpeningInput,
    result: &LoadEstimateResult,
) -> CalcResult<NamedBuffer> {
    let b = &result.breakdown;
    let body = LOAD_REPORT_TEMPLATE
        .replace("{{ROOF}}", &escape_typst(input.dachkonstruktion.display_name()))
        .replace("{{TIEFE}}", &format!("{:.2}", b.tiefe.0))
        .replace("{{D3}}", &format!("{:.2}", b.d3.0))
        .replace("{{HOEHE}}", &format!("{:.2}", b.hoehe.0))
        .replace("{{DECKENTIEFE}}", &format!("{:.2}", b.deckentiefe.0))
        .replace("{{T1}}", &format!("{:.2}", b.t1.0))
        .replace("{{T2}}", &format!("{:.2}", b.t2.0))
        .replace("{{BREITE}}", &format!("{:.0}", input.breite.0))
        .replace("{{MATERIAL}}", &escape_typst(input.wandbaustoff.display_name()))
        .replace("{{DENSITY}}", &format!("{:.0}", b.density))
        .replace("{{POSITION}}", input.betroffene_wand.display_name())
        .replace("{{PLASTER}}", &format!("{:.2}", b.wandputz_self_weight))
        .replace("{{STORIES}}", &b.stories.to_string())
        .replace("{{TRIBUTARY}}", &format!("{:.2}", b.tributary_width.0))
        .replace("{{SPAN}}", &format!("{:.2}", b.span_width.0))
        .replace("{{WAND_HOEHE}}", &format!("{:.2}", b.wand_hoehe.0))
        .replace("{{SLAB}}", &format!("{:.2}", b.slab_self_weight.0))
        .replace("{{ROOF_WEIGHT}}", &format!("{:.2}", b.roof_self_weight.0))
        .replace("{{WALL_ABOVE}}", &format!("{:.2}", b.wall_just_above.0))
        .replace("{{WALLS_FLOORS}}", &format!("{:.2}", b.walls_from_above_floors.0))
        .replace("{{SLABS_FLOORS}}", &format!("{:.2}", b.slabs_from_above_floors.0))
        .replace("{{WALL_TOTAL}}", &format!("{:.2}", b.total_wall_load.0))
        .replace("{{SLAB_TOTAL}}", &format!("{:.2}", b.total_slab_load.0))
        .replace("{{DEAD}}", &format!("{:.2}", result.total_dead_load.0))
        .replace("{{LIVE}}", &format!("{:.2}", result.total_live_load.0));

    let bytes = compile(&page_setup(request_id), &body)?;
    tracing::debug!(request_id, size = bytes.len(), "Load report rendered");
    Ok(NamedBuffer::new(LOAD_REPORT_NAME, bytes))
}

/// Render the user's own entries (`UserEnteredData.pdf`), one row per
/// form field in name order.
pub fn render_submission_report(request_id: RequestId, fields: &FormFields) -> CalcResult<NamedBuffer> {
    let rows: String = fields
        .iter()
        .map(|(name, value)| format!("  [{}], [{}],\n", escape_typst(name), escape_typst(value)))
        .collect();
    let body = SUBMISSION_TEMPLATE.replace("{{ROWS}}", &rows);

    let bytes = compile(&page_setup(request_id), &body)?;
    tracing::debug!(request_id, fields = fields.len(), "Submission report rendered");
    Ok(NamedBuffer::new(SUBMISSION_REPORT_NAME, bytes))
}

fn page_setup(request_id: RequestId) -> String {
    PAGE_SETUP
        .replace("{{REQUEST_ID}}", &request_id.to_string())
        .replace("{{DATE}}", &Utc::now().format("%d.%m.%Y").to_string())
}

/// Compile Typst markup to PDF bytes
fn compile(setup: &str, body: &str) -> CalcResult<Vec<u8>> {
    let world = PdfWorld::new(format!("{}\n{}", setup, body));

    let warned = typst::compile(&world);

    let document = warned.output.map_err(|errors| {
        let error_msgs: Vec<String> = errors.iter().map(|e| e.message.to_string()).collect();
        CalcError::Internal {
            message: format!("Typst compilation failed: {}", error_msgs.join("; ")),
        }
    })?;

    typst_pdf::pdf(&document, &PdfOptions::default()).map_err(|errors| {
        let error_msgs: Vec<String> = errors.iter().map(|e| e.message.to_string()).collect();
        CalcError::Internal {
            message: format!("PDF rendering failed: {}", error_msgs.join("; ")),
        }
    })
}

/// Escape user text for Typst markup
fn escape_typst(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '*' | '_' | '#' | '$' | '@' | '<' | '>' | '\\' | '`' | '[' | ']' | '/' | '~' => {
                format!("\\{}", c)
            }
            '\n' | '\r' => " ".to_string(),
            _ => c.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::flat_roof::calculate;

    fn reference_fields() -> FormFields {
        FormFields::from_pairs([
            ("tiefe", "30"),
            ("d3", "20"),
            ("hoehe", "250"),
            ("deckentiefe", "0"),
            ("t1", "300"),
            ("t2", "0"),
            ("breite", "120"),
            ("wandbaustoff", "Stahlbeton"),
            ("betroffeneWand", "Außenwand"),
            ("wandputzType", ""),
            ("obergeschosse", "3"),
            ("betroffenesGeschoss", "1"),
            ("dachkonstruktion", "Stahlbeton-Flachdach"),
        ])
    }

    #[test]
    fn test_escape_typst() {
        assert_eq!(escape_typst("a*b_c"), "a\\*b\\_c");
        assert_eq!(escape_typst("#[x]"), "\\#\\[x\\]");
        assert_eq!(escape_typst("http://x"), "http:\\/\\/x");
        assert_eq!(escape_typst("zwei\nZeilen"), "zwei Zeilen");
    }

    #[test]
    fn test_load_report_generation() {
        let input = WallOpeningInput::from_form(&reference_fields()).unwrap();
        let result = calculate(&input);

        let pdf = render_load_report(7, &input, &result);
        assert!(pdf.is_ok(), "PDF generation failed: {:?}", pdf.err());

        let pdf = pdf.unwrap();
        assert_eq!(pdf.name, LOAD_REPORT_NAME);
        assert!(pdf.buffer.starts_with(b"%PDF"), "Output is not a valid PDF");
        assert!(pdf.size > 1000, "PDF seems too small");
    }

    #[test]
    fn test_submission_report_with_markup_in_values() {
        let mut fields = reference_fields();
        fields.insert("bemerkung", "Achse *B* / #3 [links] $5 <tür>");

        let pdf = render_submission_report(7, &fields).unwrap();
        assert_eq!(pdf.name, SUBMISSION_REPORT_NAME);
        assert!(pdf.buffer.starts_with(b"%PDF"));
    }
}
