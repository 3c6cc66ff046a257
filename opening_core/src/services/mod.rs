//! # Collaborator Interfaces
//!
//! The intake workflow talks to four outside systems: a request database,
//! a file store, a PDF merger and a mailer. Each is a trait so the workflow
//! can be driven by production clients, the local implementations in
//! [`local`], or in-memory fakes in tests.
//!
//! All methods take `&self`; implementations that hold state use interior
//! mutability or persist to disk.

pub mod local;

use serde::{Deserialize, Serialize};

use crate::errors::CalcResult;
use crate::input::FormFields;
use crate::payload::NamedBuffer;

/// Request identifier issued by the [`RequestStore`]
pub type RequestId = u64;

/// A folder or file held by [`FileStorage`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredItem {
    /// Storage-specific identifier
    pub id: String,
    /// Link that can be sent to a person
    pub web_url: String,
}

/// Name and email of the person who opened a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContact {
    pub name: String,
    pub email: String,
}

/// Where a request's files were put
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDetails {
    pub request_id: RequestId,
    /// The `{id}_{suffix}` folder
    pub root_folder: StoredItem,
    pub user_folder: StoredItem,
    pub output_folder: StoredItem,
    /// Uploaded structural template, absent when no estimate was computed
    pub template_file: Option<StoredItem>,
}

/// An outgoing email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_html: String,
    #[serde(default)]
    pub attachments: Vec<NamedBuffer>,
}

/// Request records and their storage locations
pub trait RequestStore {
    /// Register a new request for `module` by `email`
    fn open_request(&self, module: &str, email: &str) -> CalcResult<RequestId>;

    /// Store the submitted form under an open request
    fn insert_request_record(&self, request_id: RequestId, fields: &FormFields) -> CalcResult<RequestId>;

    /// Contact of the user who opened the request
    fn get_user_by_request_id(&self, request_id: RequestId) -> CalcResult<UserContact>;

    fn insert_storage_details(&self, details: &StorageDetails) -> CalcResult<()>;

    /// Id of the output folder recorded for a request
    fn get_output_folder(&self, request_id: RequestId) -> CalcResult<Option<String>>;

    /// Note that `submitted_by` handed in the final report for a request
    fn record_delivery(&self, request_id: RequestId, submitted_by: &str) -> CalcResult<()>;
}

/// Hierarchical file storage
pub trait FileStorage {
    /// Create `name` under `parent_id`
    fn create_folder(&self, parent_id: &str, name: &str) -> CalcResult<StoredItem>;

    /// Upload a file into a folder
    fn upload_file(&self, parent_id: &str, file: &NamedBuffer) -> CalcResult<StoredItem>;

    /// Content of a stored document rendered as PDF
    fn convert_to_pdf(&self, file_id: &str) -> CalcResult<Vec<u8>>;

    /// Raw content of a stored file
    fn download(&self, file_id: &str) -> CalcResult<Vec<u8>>;
}

/// Concatenates two PDF documents
pub trait PdfMerger {
    fn merge_pdfs(&self, first: &[u8], second: &[u8]) -> CalcResult<Vec<u8>>;
}

pub trait Mailer {
    fn send_email(&self, message: &EmailMessage) -> CalcResult<()>;
}
