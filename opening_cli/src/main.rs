//! # Wall-Opening Intake CLI
//!
//! Command-line access to the intake engine:
//!
//! - `estimate` - load estimate for a form stored as JSON
//! - `template` - write loads and span into a structural template
//! - `single-span` - reduce a two-span template to one span
//! - `submit` - run a full submission against a local directory
//!
//! Set `RUST_LOG` or pass `-v` for more log output.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use opening_core::calculations::{estimate_form, LoadEstimate, LoadEstimateResult};
use opening_core::config::WorkflowConfig;
use opening_core::errors::{CalcError, CalcResult};
use opening_core::file_io::RequestLedger;
use opening_core::input::FormFields;
use opening_core::payload::NamedBuffer;
use opening_core::services::local::{LocalPdfMerger, LocalStorage, LogMailer};
use opening_core::template::{apply_loads, MutationOutcome, TemplateDocument};
use opening_core::units::{Centimeters, KiloNewtons};
use opening_core::workflow::{IntakeWorkflow, WALL_OPENING_MODULE};

#[derive(Parser)]
#[command(name = "opening_cli")]
#[command(about = "Wall-opening load estimates and structural template preparation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate lintel loads for a form
    Estimate {
        /// Form fields as a JSON object
        #[arg(short, long)]
        form: PathBuf,

        /// Also print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write span and loads into a template
    Template {
        #[arg(short, long)]
        template: PathBuf,

        /// Opening width (cm)
        #[arg(long)]
        breite: f64,

        /// Dead load (kN)
        #[arg(long)]
        dead: f64,

        /// Live load (kN)
        #[arg(long)]
        live: f64,

        #[arg(short, long)]
        out: PathBuf,

        /// Workflow config with clearance and load scale
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Reduce a two-span template to a single span
    SingleSpan {
        #[arg(short, long)]
        template: PathBuf,

        #[arg(short, long)]
        out: PathBuf,
    },

    /// Submit a form against a local storage directory
    Submit {
        #[arg(short, long)]
        form: PathBuf,

        #[arg(short, long)]
        config: PathBuf,

        /// Directory used as file storage
        #[arg(short, long)]
        storage: PathBuf,

        /// Email of the requesting user
        #[arg(short, long)]
        email: String,

        /// Files to attach to the request
        #[arg(short, long)]
        attach: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let outcome = match cli.command {
        Commands::Estimate { form, json } => run_estimate(&form, json),
        Commands::Template {
            template,
            breite,
            dead,
            live,
            out,
            config,
        } => run_template(&template, breite, dead, live, &out, config.as_deref()),
        Commands::SingleSpan { template, out } => run_single_span(&template, &out),
        Commands::Submit {
            form,
            config,
            storage,
            email,
            attach,
        } => run_submit(&form, &config, &storage, &email, &attach),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Ok(json) = serde_json::to_string_pretty(&e) {
                eprintln!();
                eprintln!("Error JSON:");
                eprintln!("{}", json);
            }
            ExitCode::FAILURE
        }
    }
}

fn read_form(path: &Path) -> CalcResult<FormFields> {
    let raw = fs::read_to_string(path)
        .map_err(|e| CalcError::file_error("read form", path.display().to_string(), e.to_string()))?;
    let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| CalcError::SerializationError {
        reason: format!("Invalid JSON in {}: {}", path.display(), e),
    })?;
    FormFields::from_json(&value)
}

fn read_attachment(path: &Path) -> CalcResult<NamedBuffer> {
    let bytes = fs::read(path)
        .map_err(|e| CalcError::file_error("read attachment", path.display().to_string(), e.to_string()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CalcError::invalid_input("attach", path.display().to_string(), "Not a file"))?;
    Ok(NamedBuffer::new(name, bytes))
}

fn write_output(path: &Path, file: &NamedBuffer) -> CalcResult<()> {
    fs::write(path, &file.buffer)
        .map_err(|e| CalcError::file_error("write", path.display().to_string(), e.to_string()))
}

fn run_estimate(form: &Path, json: bool) -> CalcResult<()> {
    let fields = read_form(form)?;
    let estimate = estimate_form(&fields)?;

    match &estimate {
        LoadEstimate::Computed(result) => print_result(result),
        LoadEstimate::Skipped(reason) => {
            println!("No load estimate: {}", reason);
        }
    }

    if json {
        let json = to_json(&estimate)?;
        println!();
        println!("JSON Output:");
        println!("{}", json);
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> CalcResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| CalcError::SerializationError {
        reason: e.to_string(),
    })
}

fn print_result(result: &LoadEstimateResult) {
    let b = &result.breakdown;
    println!("═══════════════════════════════════════");
    println!("  LINTEL LOAD ESTIMATE");
    println!("═══════════════════════════════════════");
    println!();
    println!("Geometry:");
    println!("  Wall:        {:.2} m thick, {:.2} m above opening", b.tiefe.0, b.d3.0);
    println!("  Story:       {:.2} m, wall height {:.2} m", b.hoehe.0, b.wand_hoehe.0);
    println!("  Slab:        {:.2} m, spans {:.2} / {:.2} m", b.deckentiefe.0, b.t1.0, b.t2.0);
    println!("  Tributary:   {:.2} m", b.tributary_width.0);
    println!("  Stories:     {}", b.stories);
    println!();
    println!("Dead load:");
    println!("  Slab/story   = {:.2} kN", b.slab_self_weight.0);
    println!("  Roof         = {:.2} kN", b.roof_self_weight.0);
    println!("  Wall above   = {:.2} kN", b.wall_just_above.0);
    println!("  Walls floors = {:.2} kN", b.walls_from_above_floors.0);
    println!("  Wall total   = {:.2} kN", b.total_wall_load.0);
    println!("  Slab total   = {:.2} kN", b.total_slab_load.0);
    println!();
    println!("═══════════════════════════════════════");
    println!("  g = {:.2} kN   q = {:.2} kN", result.total_dead_load.0, result.total_live_load.0);
    println!("═══════════════════════════════════════");
}

fn run_template(
    template: &Path,
    breite: f64,
    dead: f64,
    live: f64,
    out: &Path,
    config: Option<&Path>,
) -> CalcResult<()> {
    let config = match config {
        Some(path) => WorkflowConfig::load(path)?,
        None => WorkflowConfig::default(),
    };

    let mut document = TemplateDocument::load(template)?;
    let update = apply_loads(
        &mut document,
        Centimeters(breite),
        KiloNewtons(dead),
        KiloNewtons(live),
        &config.template_scaling(),
    );

    println!("Laenge:       {} cm {}", update.length_cm, status(&update.length));
    println!("Last[0] W1/2: {} {}", update.dead_load, status(&update.loads.dead_load));
    println!("Last[1] W1/2: {} {}", update.live_load, status(&update.loads.live_load));

    write_output(out, &document.serialize()?)?;
    println!("Written to {}", out.display());
    Ok(())
}

fn run_single_span(template: &Path, out: &Path) -> CalcResult<()> {
    let mut document = TemplateDocument::load(template)?;
    let outcome = document.collapse_to_single_span();

    println!("Felder:                    {}", status(&outcome.fields));
    println!("Auflagerliste:             {}", status(&outcome.supports));
    println!("Querschnittsbezeichnungen: {}", status(&outcome.cross_sections));

    write_output(out, &document.serialize()?)?;
    println!("Written to {}", out.display());
    Ok(())
}

fn run_submit(form: &Path, config: &Path, storage: &Path, email: &str, attach: &[PathBuf]) -> CalcResult<()> {
    let config = WorkflowConfig::load(config)?;
    let fields = read_form(form)?;
    let attachments = attach
        .iter()
        .map(|path| read_attachment(path))
        .collect::<CalcResult<Vec<_>>>()?;

    let ledger = RequestLedger::open(&config.ledger_path, email)?;
    let storage = LocalStorage::new(storage, config.root_folder_id.as_str())?;
    let mailer = LogMailer::new();
    let merger = LocalPdfMerger;
    let workflow = IntakeWorkflow::new(&ledger, &storage, &mailer, &merger, config)?;

    let request_id = workflow.open_request(WALL_OPENING_MODULE, email)?;
    let outcome = workflow.submit_wall_opening(request_id, &fields, &attachments)?;

    println!("Request {} submitted", outcome.request_id);
    println!("  Folder:     {}", outcome.request_folder.web_url);
    match (&outcome.estimate, &outcome.template) {
        (LoadEstimate::Computed(result), Some(template)) => {
            println!(
                "  Loads:      g = {:.2} kN, q = {:.2} kN",
                result.total_dead_load.0, result.total_live_load.0
            );
            println!("  Template:   {}", template.file.web_url);
        }
        (LoadEstimate::Skipped(reason), _) => println!("  Loads:      skipped ({})", reason),
        (LoadEstimate::Computed(_), None) => {}
    }
    println!("  Attachments: {}", outcome.attachments.len());
    println!("  Notified:   {}", outcome.notified.join(", "));
    Ok(())
}

fn status(outcome: &MutationOutcome) -> String {
    match outcome {
        MutationOutcome::Applied => "[OK]".to_string(),
        MutationOutcome::Skipped(missing) => format!("[SKIPPED: {}]", missing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opening_core::calculations::SkipReason;
    use std::collections::BTreeMap;

    #[test]
    fn test_to_json_reports_serialization_failure() {
        // JSON object keys must be strings
        let value: BTreeMap<(u8, u8), u8> = [((1, 2), 3)].into_iter().collect();
        let err = to_json(&value).unwrap_err();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }

    #[test]
    fn test_to_json_of_skipped_estimate() {
        let estimate = LoadEstimate::Skipped(SkipReason::NotImplemented {
            roof_type: "Classic-Dach".to_string(),
        });
        assert!(to_json(&estimate).unwrap().contains("Classic-Dach"));
    }
}
