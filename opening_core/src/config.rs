//! Workflow configuration, read from TOML. Every field has a default.
//!
//! ```toml
//! template_path = "templates/DLTplusSinglespanSteel.flx"
//! notification_recipient = "statik@example.com"
//! root_folder_id = "root"
//! clearance_margin_cm = 30.0
//! load_storage_scale = 100.0
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult};
use crate::template::TemplateScaling;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowConfig {
    /// Structural template mutated for every computed request
    pub template_path: PathBuf,
    /// Added to the opening width for the beam field length (cm)
    pub clearance_margin_cm: f64,
    /// Loads are divided by this before being written to the template
    pub load_storage_scale: f64,
    /// Engineer who is notified about new requests
    pub notification_recipient: String,
    /// Storage folder under which request folders are created
    pub root_folder_id: String,
    /// Request folder name is `{id}_{request_suffix}`
    pub request_suffix: String,
    pub user_folder_name: String,
    pub output_folder_name: String,
    /// Appended to final reports when set
    pub instruction_pdf_path: Option<PathBuf>,
    /// JSON request ledger used by the local runner
    pub ledger_path: PathBuf,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        WorkflowConfig {
            template_path: PathBuf::from("templates/DLTplusSinglespanSteel.flx"),
            clearance_margin_cm: 30.0,
            load_storage_scale: 100.0,
            notification_recipient: String::new(),
            root_folder_id: "root".to_string(),
            request_suffix: "WO".to_string(),
            user_folder_name: "User Inputs".to_string(),
            output_folder_name: "Engineering Outputs".to_string(),
            instruction_pdf_path: None,
            ledger_path: PathBuf::from("requests.json"),
        }
    }
}

impl WorkflowConfig {
    /// Read and validate a TOML file
    pub fn load(path: &Path) -> CalcResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| CalcError::file_error("read config", path.display().to_string(), e.to_string()))?;
        let config = Self::from_toml_str(&raw).map_err(|e| match e {
            CalcError::SerializationError { reason } => CalcError::SerializationError {
                reason: format!("Invalid config {}: {}", path.display(), reason),
            },
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> CalcResult<Self> {
        let config: WorkflowConfig = toml::from_str(raw).map_err(|e| CalcError::SerializationError {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CalcResult<()> {
        if !(self.load_storage_scale.is_finite() && self.load_storage_scale > 0.0) {
            return Err(CalcError::invalid_input(
                "load_storage_scale",
                self.load_storage_scale.to_string(),
                "Must be greater than zero",
            ));
        }
        if !(self.clearance_margin_cm.is_finite() && self.clearance_margin_cm >= 0.0) {
            return Err(CalcError::invalid_input(
                "clearance_margin_cm",
                self.clearance_margin_cm.to_string(),
                "Value cannot be negative",
            ));
        }
        if self.request_suffix.trim().is_empty() {
            return Err(CalcError::missing_field("request_suffix"));
        }
        Ok(())
    }

    pub fn template_scaling(&self) -> TemplateScaling {
        TemplateScaling {
            clearance_margin_cm: self.clearance_margin_cm,
            load_storage_scale: self.load_storage_scale,
        }
    }

    /// `{id}_{suffix}`, used for the request folder and email subject
    pub fn request_label(&self, request_id: u64) -> String {
        format!("{}_{}", request_id, self.request_suffix)
    }
}
