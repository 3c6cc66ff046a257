//! # opening_core - Wall-Opening Intake Engine
//!
//! `opening_core` handles requests to cut an opening into a load-bearing
//! wall: it parses the submitted form, estimates the load on the lintel,
//! prepares the structural-analysis template for the engineer, and moves
//! the request through storage, reporting and notification. All inputs and
//! outputs are JSON-serializable.
//!
//! ## Design Philosophy
//!
//! - **Pure core**: parsing, estimation and template mutation are plain
//!   functions without I/O
//! - **Explicit outcomes**: a skipped estimate or a missing template branch
//!   is a value the caller matches on, not a silent no-op
//! - **Rich Errors**: Structured error types, not just strings
//! - **Injected services**: storage, mail, PDF merging and the request
//!   database are traits
//!
//! ## Quick Start
//!
//! ```rust
//! use opening_core::calculations::estimate_form;
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
//! let estimate = estimate_form(&fields).unwrap();
//! let json = serde_json::to_string_pretty(&estimate).unwrap();
//! ```
//!
//! ## Modules
//!
//! - [`input`] - Form fields, decimal parsing, typed request
//! - [`calculations`] - Load estimate dispatch and the flat-roof model
//! - [`template`] - Structural template loading and mutation
//! - [`materials`] - Wall materials and plaster
//! - [`units`] - Type-safe unit wrappers
//! - [`pdf`] - Load and submission reports
//! - [`services`] - Collaborator traits and local implementations
//! - [`file_io`] - JSON request ledger shared by concurrent writers
//! - [`config`] - Workflow configuration
//! - [`workflow`] - The request intake workflow
//! - [`errors`] - Structured error types

pub mod calculations;
pub mod config;
pub mod errors;
pub mod file_io;
pub mod input;
pub mod materials;
pub mod payload;
pub mod pdf;
pub mod services;
pub mod template;
pub mod units;
pub mod workflow;

// Re-export commonly used types at crate root for convenience
pub use calculations::{estimate, estimate_form, LoadEstimate, LoadEstimateResult, SkipReason};
pub use config::WorkflowConfig;
pub use errors::{CalcError, CalcResult};
pub use file_io::{LedgerLock, RequestLedger};
pub use input::{FormFields, WallOpeningInput};
pub use payload::NamedBuffer;
pub use template::{apply_estimate, MutationOutcome, TemplateDocument, TemplateScaling};
pub use workflow::{IntakeWorkflow, SubmissionOutcome};
