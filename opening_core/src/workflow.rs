//! # Intake Workflow
//!
//! Ties parsing, estimation, template mutation and reporting to the
//! collaborators for one request:
//!
//! ```text
//! open_request ──► submit_wall_opening ──► (engineer works) ──► deliver_final_report
//!                  │                                            │
//!                  ├ {id}_WO/User Inputs  ◄ attachments,        ├ upload reports
//!                  │                        UserEnteredData     ├ fetch as PDF, merge
//!                  ├ {id}_WO/Engineering Outputs                └ email {id}_final.pdf
//!                  │     ◄ LoadCalculation, mutated template
//!                  └ email engineer
//! ```
//!
//! Everything that can fail on the request itself (form parsing, input
//! validation, loading the template) happens before the first upload, so a
//! rejected request leaves nothing behind in storage.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::calculations::{self, LoadEstimate};
use crate::config::WorkflowConfig;
use crate::errors::{CalcError, CalcResult};
use crate::input::{FormFields, WallOpeningInput};
use crate::payload::NamedBuffer;
use crate::pdf::{render_load_report, render_submission_report};
use crate::services::{
    EmailMessage, FileStorage, Mailer, PdfMerger, RequestId, RequestStore, StorageDetails, StoredItem,
};
use crate::template::{apply_estimate, TemplateDocument, TemplateUpdate};

/// Module name under which wall-opening requests are opened
pub const WALL_OPENING_MODULE: &str = "wall-opening";

/// Where the mutated template went and what was written into it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplatePlacement {
    pub file: StoredItem,
    pub update: TemplateUpdate,
}

/// Result of [`IntakeWorkflow::submit_wall_opening`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub request_id: RequestId,
    pub estimate: LoadEstimate,
    pub request_folder: StoredItem,
    pub user_folder: StoredItem,
    pub output_folder: StoredItem,
    /// User attachments as stored
    pub attachments: Vec<StoredItem>,
    /// Absent when the estimate was skipped
    pub load_report: Option<StoredItem>,
    /// Absent when the estimate was skipped
    pub template: Option<TemplatePlacement>,
    pub submission_report_file: StoredItem,
    /// Returned to the user as confirmation
    pub submission_report: NamedBuffer,
    /// Addresses that were emailed about the request
    pub notified: Vec<String>,
}

/// Drives requests through the injected collaborators.
pub struct IntakeWorkflow<'a> {
    store: &'a dyn RequestStore,
    storage: &'a dyn FileStorage,
    mailer: &'a dyn Mailer,
    merger: &'a dyn PdfMerger,
    config: WorkflowConfig,
}

impl<'a> IntakeWorkflow<'a> {
    /// Fails if the configuration is invalid or names no notification
    /// recipient.
    pub fn new(
        store: &'a dyn RequestStore,
        storage: &'a dyn FileStorage,
        mailer: &'a dyn Mailer,
        merger: &'a dyn PdfMerger,
        config: WorkflowConfig,
    ) -> CalcResult<Self> {
        config.validate()?;
        if config.notification_recipient.trim().is_empty() {
            return Err(CalcError::missing_field("notification_recipient"));
        }
        Ok(IntakeWorkflow {
            store,
            storage,
            mailer,
            merger,
            config,
        })
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Register a request before its form is submitted
    pub fn open_request(&self, module: &str, email: &str) -> CalcResult<RequestId> {
        if email.trim().is_empty() {
            return Err(CalcError::missing_field("email"));
        }
        self.store.open_request(module, email)
    }

    /// Process a submitted wall-opening form.
    ///
    /// # Returns
    ///
    /// * `Ok(SubmissionOutcome)` - stored, reported and notified; check
    ///   `estimate` for whether loads were computed
    /// * `Err(CalcError::InvalidInput | MissingField)` - form rejected,
    ///   nothing stored
    /// * `Err(CalcError::TemplateLoad)` - template unreadable, nothing stored
    /// * `Err(CalcError::Collaborator | FileError)` - a later step failed
    pub fn submit_wall_opening(
        &self,
        request_id: RequestId,
        fields: &FormFields,
        attachments: &[NamedBuffer],
    ) -> CalcResult<SubmissionOutcome> {
        let input = WallOpeningInput::from_form(fields)?;
        let estimate = calculations::estimate(&input)?;

        let mutated = match &estimate {
            LoadEstimate::Computed(result) => {
                let mut template = TemplateDocument::load(&self.config.template_path)?;
                let update = apply_estimate(&mut template, input.breite, result, &self.config.template_scaling());
                Some((template, update))
            }
            LoadEstimate::Skipped(_) => None,
        };

        self.store.insert_request_record(request_id, fields)?;

        let prefix = request_id.to_string();
        let label = self.config.request_label(request_id);
        let request_folder = self.storage.create_folder(&self.config.root_folder_id, &label)?;
        let user_folder = self
            .storage
            .create_folder(&request_folder.id, &self.config.user_folder_name)?;
        let output_folder = self
            .storage
            .create_folder(&request_folder.id, &self.config.output_folder_name)?;
        tracing::info!(request_id, folder = %label, "Request folders created");

        let stored_attachments = attachments
            .iter()
            .map(|file| self.storage.upload_file(&user_folder.id, &file.with_prefix(&prefix)))
            .collect::<CalcResult<Vec<_>>>()?;

        let (load_report, template) = match (&estimate, mutated) {
            (LoadEstimate::Computed(result), Some((document, update))) => {
                let report = render_load_report(request_id, &input, result)?;
                let report_file = self
                    .storage
                    .upload_file(&output_folder.id, &report.with_prefix(&prefix))?;

                let serialized = document.serialize()?;
                let template_file = self
                    .storage
                    .upload_file(&output_folder.id, &serialized.with_prefix(&prefix))?;

                (
                    Some(report_file),
                    Some(TemplatePlacement {
                        file: template_file,
                        update,
                    }),
                )
            }
            _ => (None, None),
        };

        let submission_report = render_submission_report(request_id, fields)?;
        let submission_report_file = self
            .storage
            .upload_file(&user_folder.id, &submission_report.with_prefix(&prefix))?;

        let recipient = self.config.notification_recipient.clone();
        self.mailer.send_email(&EmailMessage {
            to: recipient.clone(),
            subject: label.clone(),
            body_html: notification_body(
                &label,
                &estimate,
                &user_folder,
                template.as_ref().map(|t| &t.file),
            ),
            attachments: Vec::new(),
        })?;

        self.store.insert_storage_details(&StorageDetails {
            request_id,
            root_folder: request_folder.clone(),
            user_folder: user_folder.clone(),
            output_folder: output_folder.clone(),
            template_file: template.as_ref().map(|t| t.file.clone()),
        })?;

        tracing::info!(
            request_id,
            computed = estimate.is_computed(),
            attachments = stored_attachments.len(),
            "Wall-opening request submitted"
        );

        Ok(SubmissionOutcome {
            request_id,
            estimate,
            request_folder,
            user_folder,
            output_folder,
            attachments: stored_attachments,
            load_report,
            template,
            submission_report_file,
            submission_report,
            notified: vec![recipient],
        })
    }

    /// Send the engineer's finished reports to the user.
    ///
    /// The delivery by `submitted_by` is recorded on the request once the
    /// inputs are accepted. Each file is stored in the request's output folder and fetched back
    /// as PDF (`.docx` converted, `.pdf` as is). The PDFs are merged in
    /// order, followed by the instruction PDF when configured. The result,
    /// `{id}_final.pdf`, is emailed to the user who opened the request.
    pub fn deliver_final_report(
        &self,
        request_id: RequestId,
        submitted_by: &str,
        files: &[NamedBuffer],
    ) -> CalcResult<NamedBuffer> {
        if submitted_by.trim().is_empty() {
            return Err(CalcError::missing_field("submitted_by"));
        }
        if files.is_empty() {
            return Err(CalcError::missing_field("files"));
        }
        let kinds = files
            .iter()
            .map(ReportKind::of)
            .collect::<CalcResult<Vec<_>>>()?;

        let output_folder = self.store.get_output_folder(request_id)?.ok_or_else(|| {
            CalcError::invalid_input(
                "request_id",
                request_id.to_string(),
                "No output folder recorded for this request",
            )
        })?;

        self.store.record_delivery(request_id, submitted_by)?;

        let mut merged: Option<Vec<u8>> = None;
        for (file, kind) in files.iter().zip(kinds) {
            let stored = self.storage.upload_file(&output_folder, file)?;
            let pdf = match kind {
                ReportKind::Pdf => self.storage.download(&stored.id)?,
                ReportKind::Docx => self.storage.convert_to_pdf(&stored.id)?,
            };
            merged = Some(match merged {
                None => pdf,
                Some(previous) => self.merger.merge_pdfs(&previous, &pdf)?,
            });
        }
        let mut report = merged.ok_or_else(|| CalcError::missing_field("files"))?;

        if let Some(path) = &self.config.instruction_pdf_path {
            let instructions = read_file(path)?;
            report = self.merger.merge_pdfs(&report, &instructions)?;
        }

        let final_report = NamedBuffer::new(format!("{}_final.pdf", request_id), report);
        let user = self.store.get_user_by_request_id(request_id)?;

        self.mailer.send_email(&EmailMessage {
            to: user.email.clone(),
            subject: format!("Ihr Ergebnis zur Anfrage {}", self.config.request_label(request_id)),
            body_html: format!(
                "<p>Hallo {},</p><p>anbei erhalten Sie die Ergebnisse zu Ihrer Anfrage.</p>",
                escape_html(&user.name)
            ),
            attachments: vec![final_report.clone()],
        })?;

        tracing::info!(request_id, submitted_by, size = final_report.size, "Final report delivered");
        Ok(final_report)
    }
}

/// Report formats accepted from the engineer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportKind {
    Pdf,
    Docx,
}

impl ReportKind {
    fn of(file: &NamedBuffer) -> CalcResult<Self> {
        match file.extension().as_deref() {
            Some("pdf") => Ok(ReportKind::Pdf),
            Some("docx") => Ok(ReportKind::Docx),
            _ => Err(CalcError::invalid_input(
                "files",
                file.name.as_str(),
                "Only .pdf and .docx reports are accepted",
            )),
        }
    }
}

fn read_file(path: &Path) -> CalcResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| CalcError::file_error("read", path.display().to_string(), e.to_string()))
}

fn notification_body(
    label: &str,
    estimate: &LoadEstimate,
    user_folder: &StoredItem,
    template: Option<&StoredItem>,
) -> String {
    let mut body = format!("<p>Neue Anfrage <b>{}</b>.</p>", escape_html(label));
    match (estimate, template) {
        (LoadEstimate::Computed(result), Some(template)) => {
            body.push_str(&format!(
                "<p>Lasten: g = {:.2} kN, q = {:.2} kN</p><p><a href=\"{}\">Frilo-Datei</a></p>",
                result.total_dead_load.0,
                result.total_live_load.0,
                escape_html(&template.web_url)
            ));
        }
        (LoadEstimate::Skipped(reason), _) => {
            body.push_str(&format!(
                "<p>Keine Lastermittlung: {}</p>",
                escape_html(&reason.to_string())
            ));
        }
        (LoadEstimate::Computed(_), None) => {}
    }
    body.push_str(&format!(
        "<p><a href=\"{}\">Benutzereingaben</a></p>",
        escape_html(&user_folder.web_url)
    ));
    body
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
