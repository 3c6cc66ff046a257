//! Local stand-ins for the collaborators: a directory tree as file storage,
//! a mailer that logs and keeps what it sent, and a merger that refuses.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use uuid::Uuid;

use super::{EmailMessage, FileStorage, Mailer, PdfMerger, StoredItem};
use crate::errors::{CalcError, CalcResult};
use crate::payload::NamedBuffer;

/// File storage backed by a directory. Item ids are random UUIDs mapped to
/// paths for the lifetime of the value; the root directory is registered
/// under a caller-chosen id.
pub struct LocalStorage {
    items: Mutex<HashMap<String, PathBuf>>,
}

impl LocalStorage {
    /// Use `root` as the folder known as `root_id`. The directory is created
    /// if needed.
    pub fn new(root: &Path, root_id: impl Into<String>) -> CalcResult<Self> {
        fs::create_dir_all(root)
            .map_err(|e| CalcError::file_error("create storage root", root.display().to_string(), e.to_string()))?;
        let mut items = HashMap::new();
        items.insert(root_id.into(), root.to_path_buf());
        Ok(LocalStorage {
            items: Mutex::new(items),
        })
    }

    /// Filesystem path of a stored item
    pub fn path_of(&self, id: &str) -> CalcResult<PathBuf> {
        let items = self
            .items
            .lock()
            .map_err(|_| CalcError::collaborator("local storage", "item index poisoned"))?;
        items
            .get(id)
            .cloned()
            .ok_or_else(|| CalcError::collaborator("local storage", format!("unknown item id '{}'", id)))
    }

    fn register(&self, path: PathBuf) -> CalcResult<StoredItem> {
        let id = Uuid::new_v4().to_string();
        let web_url = format!("file://{}", path.display());
        self.items
            .lock()
            .map_err(|_| CalcError::collaborator("local storage", "item index poisoned"))?
            .insert(id.clone(), path);
        Ok(StoredItem { id, web_url })
    }
}

impl FileStorage for LocalStorage {
    fn create_folder(&self, parent_id: &str, name: &str) -> CalcResult<StoredItem> {
        let path = self.path_of(parent_id)?.join(name);
        fs::create_dir_all(&path)
            .map_err(|e| CalcError::file_error("create folder", path.display().to_string(), e.to_string()))?;
        tracing::debug!(path = %path.display(), "Folder created");
        self.register(path)
    }

    fn upload_file(&self, parent_id: &str, file: &NamedBuffer) -> CalcResult<StoredItem> {
        let path = self.path_of(parent_id)?.join(&file.name);
        fs::write(&path, &file.buffer)
            .map_err(|e| CalcError::file_error("upload", path.display().to_string(), e.to_string()))?;
        tracing::debug!(path = %path.display(), size = file.size, "File stored");
        self.register(path)
    }

    fn convert_to_pdf(&self, file_id: &str) -> CalcResult<Vec<u8>> {
        let path = self.path_of(file_id)?;
        let is_pdf = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if !is_pdf {
            return Err(CalcError::collaborator(
                "local storage",
                format!("cannot convert '{}' to PDF locally", path.display()),
            ));
        }
        self.download(file_id)
    }

    fn download(&self, file_id: &str) -> CalcResult<Vec<u8>> {
        let path = self.path_of(file_id)?;
        fs::read(&path).map_err(|e| CalcError::file_error("download", path.display().to_string(), e.to_string()))
    }
}

/// Mailer that logs each message and keeps a copy.
#[derive(Default)]
pub struct LogMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl Mailer for LogMailer {
    fn send_email(&self, message: &EmailMessage) -> CalcResult<()> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            attachments = message.attachments.len(),
            "Email queued"
        );
        self.sent
            .lock()
            .map_err(|_| CalcError::collaborator("mailer", "outbox poisoned"))?
            .push(message.clone());
        Ok(())
    }
}

/// Merger for setups without a PDF toolchain; every merge fails.
pub struct LocalPdfMerger;

impl PdfMerger for LocalPdfMerger {
    fn merge_pdfs(&self, _first: &[u8], _second: &[u8]) -> CalcResult<Vec<u8>> {
        Err(CalcError::collaborator(
            "pdf merger",
            "merging is not available locally; leave instruction_pdf_path unset",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folders_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "root").unwrap();

        let folder = storage.create_folder("root", "7_WO").unwrap();
        assert!(dir.path().join("7_WO").is_dir());
        assert!(folder.web_url.starts_with("file://"));

        let file = NamedBuffer::new("7_plan.pdf", b"%PDF-1.7".to_vec());
        let stored = storage.upload_file(&folder.id, &file).unwrap();
        assert_ne!(stored.id, folder.id);
        assert_eq!(storage.download(&stored.id).unwrap(), file.buffer);
        assert_eq!(storage.convert_to_pdf(&stored.id).unwrap(), file.buffer);
    }

    #[test]
    fn test_unknown_ids_and_unconvertible_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "root").unwrap();

        let err = storage.create_folder("missing", "x").unwrap_err();
        assert_eq!(err.error_code(), "COLLABORATOR_FAILED");

        let doc = storage
            .upload_file("root", &NamedBuffer::new("report.docx", vec![0x50, 0x4b]))
            .unwrap();
        assert!(storage.convert_to_pdf(&doc.id).is_err());
    }

    #[test]
    fn test_log_mailer_keeps_messages() {
        let mailer = LogMailer::new();
        mailer
            .send_email(&EmailMessage {
                to: "statik@example.com".to_string(),
                subject: "12_WO".to_string(),
                body_html: "<p>neu</p>".to_string(),
                attachments: Vec::new(),
            })
            .unwrap();
        assert_eq!(mailer.sent().len(), 1);
        assert_eq!(mailer.sent()[0].subject, "12_WO");
    }

    #[test]
    fn test_local_merger_refuses() {
        assert!(LocalPdfMerger.merge_pdfs(b"a", b"b").unwrap_err().is_recoverable());
    }
}
