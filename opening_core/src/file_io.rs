//! # Request Ledger
//!
//! A JSON file that stands in for the request database when the intake runs
//! locally. Several intake processes may share one ledger, so every
//! mutation runs as a locked read-modify-write:
//!
//! 1. wait for the exclusive OS lock on `requests.json.lock`
//! 2. read `requests.json` and check its schema version
//! 3. apply the change (new ids are allocated here, under the lock)
//! 4. write `.tmp`, fsync, rename over the ledger
//!
//! Writers queue on the lock for at most [`LOCK_TIMEOUT`] before failing
//! with `FileLocked`. Readers never lock; the rename guarantees they see a
//! complete file.
//!
//! The lock file also carries a [`LockHolder`] record while a writer is
//! inside step 3. It only feeds error messages. Whether the ledger is
//! locked is decided by the OS lock alone, so a crashed writer never
//! blocks anyone.
//!
//! ## Example
//!
//! ```rust,no_run
//! use opening_core::file_io::RequestLedger;
//! use opening_core::services::RequestStore;
//! use std::path::Path;
//!
//! let ledger = RequestLedger::open(Path::new("requests.json"), "intake@office").unwrap();
//! ledger.register_user("bauherr@example.com", "A. Bauherr").unwrap();
//! let id = ledger.open_request("wall-opening", "bauherr@example.com").unwrap();
//! ```

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult};
use crate::input::FormFields;
use crate::services::{RequestId, RequestStore, StorageDetails, UserContact};

/// Current ledger schema version
pub const LEDGER_SCHEMA_VERSION: &str = "0.2.0";

/// Default time a writer waits for the ledger lock
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(30);

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Who is writing the ledger right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
    pub user_id: String,
    pub pid: u32,
    pub locked_at: DateTime<Utc>,
}

impl LockHolder {
    fn current(user_id: &str) -> Self {
        LockHolder {
            user_id: user_id.to_string(),
            pid: std::process::id(),
            locked_at: Utc::now(),
        }
    }
}

/// Exclusive write access to a ledger, released on drop.
///
/// The lock file is never deleted. Removing it while another writer waits
/// on it would let a third writer lock a fresh inode next to them.
pub struct LedgerLock {
    file: File,
    pub holder: LockHolder,
}

impl LedgerLock {
    /// Wait up to `timeout` for the lock on `ledger_path`.
    ///
    /// # Returns
    ///
    /// * `Ok(LedgerLock)` - lock held until the guard is dropped
    /// * `Err(CalcError::FileLocked)` - still held by another writer after `timeout`
    /// * `Err(CalcError::FileError)` - lock file could not be opened
    pub fn acquire(ledger_path: &Path, user_id: &str, timeout: Duration) -> CalcResult<Self> {
        let lock_path = lock_path_for(ledger_path);
        let file = open_lock_file(&lock_path)?;

        let waiting_since = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if waiting_since.elapsed() >= timeout {
                        return Err(locked_error(ledger_path, read_holder(&lock_path)));
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(CalcError::file_error(
                        "lock",
                        lock_path.display().to_string(),
                        e.to_string(),
                    ))
                }
            }
        }

        let mut lock = LedgerLock {
            file,
            holder: LockHolder::current(user_id),
        };
        // Unlocks on error through Drop
        lock.write_holder()
            .map_err(|e| CalcError::file_error("write lock", lock_path.display().to_string(), e.to_string()))?;
        Ok(lock)
    }

    /// Current writer of a ledger, or `None` when nobody holds the lock.
    ///
    /// The holder record is `None` too if the writer has not written it yet.
    pub fn holder(ledger_path: &Path) -> Option<LockHolder> {
        let lock_path = lock_path_for(ledger_path);
        let file = open_lock_file(&lock_path).ok()?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = file.unlock();
                None
            }
            Err(_) => read_holder(&lock_path),
        }
    }

    fn write_holder(&mut self) -> std::io::Result<()> {
        let json = serde_json::to_vec(&self.holder).map_err(std::io::Error::other)?;
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&json)?;
        self.file.flush()
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        // An empty lock file means "not being written"
        let _ = self.file.set_len(0);
        let _ = self.file.unlock();
    }
}

fn lock_path_for(ledger_path: &Path) -> PathBuf {
    let mut name = ledger_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

fn open_lock_file(lock_path: &Path) -> CalcResult<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|e| CalcError::file_error("open lock", lock_path.display().to_string(), e.to_string()))
}

fn read_holder(lock_path: &Path) -> Option<LockHolder> {
    let mut contents = String::new();
    File::open(lock_path).ok()?.read_to_string(&mut contents).ok()?;
    serde_json::from_str(&contents).ok()
}

fn locked_error(ledger_path: &Path, holder: Option<LockHolder>) -> CalcError {
    let (locked_by, locked_at) = match holder {
        Some(h) => (format!("{} (pid {})", h.user_id, h.pid), h.locked_at.to_rfc3339()),
        None => ("another writer".to_string(), "unknown".to_string()),
    };
    CalcError::file_locked(ledger_path.display().to_string(), locked_by, locked_at)
}

/// One request as recorded in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Product module the request was opened for (`"wall-opening"`)
    pub module: String,
    pub email: String,
    pub opened_at: DateTime<Utc>,
    /// Submitted form, once received
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<FormFields>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// An engineer handing in the final report for a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub request_id: RequestId,
    pub submitted_by: String,
    pub delivered_at: DateTime<Utc>,
}

/// Ledger file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerData {
    pub version: String,
    pub next_id: RequestId,
    #[serde(default)]
    pub requests: BTreeMap<RequestId, RequestRecord>,
    /// Display names by email
    #[serde(default)]
    pub users: BTreeMap<String, String>,
    #[serde(default)]
    pub storage: BTreeMap<RequestId, StorageDetails>,
    /// In delivery order; a request may be delivered more than once
    #[serde(default)]
    pub deliveries: Vec<DeliveryRecord>,
}

impl Default for LedgerData {
    fn default() -> Self {
        LedgerData {
            version: LEDGER_SCHEMA_VERSION.to_string(),
            next_id: 1,
            requests: BTreeMap::new(),
            users: BTreeMap::new(),
            storage: BTreeMap::new(),
            deliveries: Vec::new(),
        }
    }
}

impl LedgerData {
    /// Read and version-check a ledger file
    pub fn read(path: &Path) -> CalcResult<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| CalcError::file_error("read", path.display().to_string(), e.to_string()))?;
        let data: LedgerData = serde_json::from_str(&contents).map_err(|e| CalcError::SerializationError {
            reason: format!("Invalid JSON in {}: {}", path.display(), e),
        })?;
        check_version(&data.version)?;
        Ok(data)
    }

    /// Replace the ledger file through a synced `.tmp` sibling and a rename.
    /// The caller must hold the [`LedgerLock`].
    pub fn write_atomic(&self, path: &Path) -> CalcResult<()> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| CalcError::SerializationError {
            reason: e.to_string(),
        })?;
        let tmp_path = tmp_path_for(path);
        let io_error = |step: &str, e: std::io::Error| CalcError::file_error(step, tmp_path.display().to_string(), e.to_string());

        let mut tmp = File::create(&tmp_path).map_err(|e| io_error("create", e))?;
        tmp.write_all(&json).map_err(|e| io_error("write", e))?;
        tmp.sync_all().map_err(|e| io_error("sync", e))?;
        drop(tmp);

        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            CalcError::file_error("replace", path.display().to_string(), e.to_string())
        })
    }

    /// Hand out the next request id
    fn allocate_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn request_mut(&mut self, request_id: RequestId) -> CalcResult<&mut RequestRecord> {
        self.requests
            .get_mut(&request_id)
            .ok_or_else(|| unknown_request(request_id))
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Ledgers from an older minor version load fine; the added fields default.
/// A newer minor or another major would lose data on the next save.
fn check_version(found: &str) -> CalcResult<()> {
    fn major_minor(version: &str) -> Option<(u32, u32)> {
        let mut parts = version.split('.');
        Some((parts.next()?.parse().ok()?, parts.next()?.parse().ok()?))
    }

    match (major_minor(found), major_minor(LEDGER_SCHEMA_VERSION)) {
        (Some((major, minor)), Some((our_major, our_minor))) if major == our_major && minor <= our_minor => Ok(()),
        _ => Err(CalcError::VersionMismatch {
            file_version: found.to_string(),
            expected_version: LEDGER_SCHEMA_VERSION.to_string(),
        }),
    }
}

fn unknown_request(request_id: RequestId) -> CalcError {
    CalcError::invalid_input("request_id", request_id.to_string(), "No request with this id")
}

/// JSON-file request store shared by any number of processes
pub struct RequestLedger {
    path: PathBuf,
    user_id: String,
    lock_timeout: Duration,
}

impl RequestLedger {
    /// Open a ledger, creating an empty one if the file does not exist.
    /// `user_id` is recorded as lock holder while this handle writes.
    pub fn open(path: &Path, user_id: impl Into<String>) -> CalcResult<Self> {
        let ledger = RequestLedger {
            path: path.to_path_buf(),
            user_id: user_id.into(),
            lock_timeout: LOCK_TIMEOUT,
        };

        // Checked under the lock so two first-time openers cannot both create it
        let _lock = ledger.lock()?;
        if path.exists() {
            LedgerData::read(path)?;
        } else {
            LedgerData::default().write_atomic(path)?;
            tracing::info!(path = %path.display(), "Created request ledger");
        }
        Ok(ledger)
    }

    /// How long writes wait for a busy ledger
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents
    pub fn snapshot(&self) -> CalcResult<LedgerData> {
        LedgerData::read(&self.path)
    }

    /// Record a display name for an email address
    pub fn register_user(&self, email: &str, name: &str) -> CalcResult<()> {
        self.update(|data| {
            data.users.insert(email.to_string(), name.to_string());
            Ok(())
        })
    }

    fn lock(&self) -> CalcResult<LedgerLock> {
        LedgerLock::acquire(&self.path, &self.user_id, self.lock_timeout)
    }

    fn update<T>(&self, mutate: impl FnOnce(&mut LedgerData) -> CalcResult<T>) -> CalcResult<T> {
        let _lock = self.lock()?;
        let mut data = LedgerData::read(&self.path)?;
        let value = mutate(&mut data)?;
        data.write_atomic(&self.path)?;
        Ok(value)
    }
}

impl RequestStore for RequestLedger {
    fn open_request(&self, module: &str, email: &str) -> CalcResult<RequestId> {
        let id = self.update(|data| {
            let id = data.allocate_id();
            data.requests.insert(
                id,
                RequestRecord {
                    module: module.to_string(),
                    email: email.to_string(),
                    opened_at: Utc::now(),
                    form: None,
                    submitted_at: None,
                },
            );
            Ok(id)
        })?;
        tracing::info!(request_id = id, module, "Request opened");
        Ok(id)
    }

    fn insert_request_record(&self, request_id: RequestId, fields: &FormFields) -> CalcResult<RequestId> {
        self.update(|data| {
            let record = data.request_mut(request_id)?;
            record.form = Some(fields.clone());
            record.submitted_at = Some(Utc::now());
            Ok(request_id)
        })
    }

    /// Users without a registered name get their email as name.
    fn get_user_by_request_id(&self, request_id: RequestId) -> CalcResult<UserContact> {
        let data = self.snapshot()?;
        let record = data
            .requests
            .get(&request_id)
            .ok_or_else(|| unknown_request(request_id))?;
        let name = data
            .users
            .get(&record.email)
            .cloned()
            .unwrap_or_else(|| record.email.clone());
        Ok(UserContact {
            name,
            email: record.email.clone(),
        })
    }

    fn insert_storage_details(&self, details: &StorageDetails) -> CalcResult<()> {
        self.update(|data| {
            data.request_mut(details.request_id)?;
            data.storage.insert(details.request_id, details.clone());
            Ok(())
        })
    }

    fn get_output_folder(&self, request_id: RequestId) -> CalcResult<Option<String>> {
        let data = self.snapshot()?;
        Ok(data
            .storage
            .get(&request_id)
            .map(|details| details.output_folder.id.clone()))
    }

    fn record_delivery(&self, request_id: RequestId, submitted_by: &str) -> CalcResult<()> {
        self.update(|data| {
            data.request_mut(request_id)?;
            data.deliveries.push(DeliveryRecord {
                request_id,
                submitted_by: submitted_by.to_string(),
                delivered_at: Utc::now(),
            });
            Ok(())
        })?;
        tracing::info!(request_id, submitted_by, "Delivery recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::StoredItem;

    fn item(id: &str) -> StoredItem {
        StoredItem {
            id: id.to_string(),
            web_url: format!("file:///storage/{}", id),
        }
    }

    #[test]
    fn test_lock_path_generation() {
        let lock_path = lock_path_for(Path::new("/path/to/requests.json"));
        assert_eq!(lock_path, Path::new("/path/to/requests.json.lock"));
    }

    #[test]
    fn test_write_and_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.json");

        let mut data = LedgerData::default();
        data.users.insert("a@example.com".to_string(), "A".to_string());
        data.write_atomic(&path).unwrap();

        assert!(!tmp_path_for(&path).exists());
        assert_eq!(LedgerData::read(&path).unwrap(), data);
    }

    // Windows locks also deny reads of the locked lock file
    #[cfg(unix)]
    #[test]
    fn test_lock_holder_is_visible_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.json");

        let lock = LedgerLock::acquire(&path, "intake@office", LOCK_TIMEOUT).unwrap();
        let holder = LedgerLock::holder(&path).unwrap();
        assert_eq!(holder.user_id, "intake@office");
        assert_eq!(holder.pid, std::process::id());

        drop(lock);
        assert!(LedgerLock::holder(&path).is_none());
        // Lock file stays, emptied
        assert_eq!(fs::read(lock_path_for(&path)).unwrap().len(), 0);
    }

    #[test]
    fn test_busy_lock_times_out_with_holder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.json");

        let _held = LedgerLock::acquire(&path, "first@office", LOCK_TIMEOUT).unwrap();
        let err = LedgerLock::acquire(&path, "second@office", Duration::from_millis(50))
            .err()
            .unwrap();
        assert_eq!(err.error_code(), "FILE_LOCKED");
        assert!(err.is_recoverable());
        if cfg!(unix) {
            assert!(err.to_string().contains("first@office"));
        }
    }

    #[test]
    fn test_leftover_holder_record_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.json");
        let ledger = RequestLedger::open(&path, "intake").unwrap();

        // A writer that died mid-update leaves its record but no OS lock
        let leftover = LockHolder {
            user_id: "crashed@office".to_string(),
            pid: u32::MAX,
            locked_at: Utc::now(),
        };
        fs::write(lock_path_for(&path), serde_json::to_vec(&leftover).unwrap()).unwrap();

        assert!(LedgerLock::holder(&path).is_none());
        let id = ledger.open_request("wall-opening", "a@example.com").unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn test_version_check() {
        assert!(check_version(LEDGER_SCHEMA_VERSION).is_ok());
        assert!(check_version("0.1.0").is_ok());
        assert!(check_version("0.2.7").is_ok());
        assert!(check_version("0.3.0").is_err());
        assert!(check_version("1.0.0").is_err());
        assert!(check_version("garbage").is_err());
    }

    #[test]
    fn test_older_ledger_gains_new_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.json");
        fs::write(&path, r#"{"version": "0.1.0", "next_id": 4, "requests": {}}"#).unwrap();

        let data = LedgerData::read(&path).unwrap();
        assert_eq!(data.next_id, 4);
        assert!(data.deliveries.is_empty());
    }

    #[test]
    fn test_request_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.json");
        let ledger = RequestLedger::open(&path, "intake").unwrap();

        ledger.register_user("bauherr@example.com", "A. Bauherr").unwrap();
        let first = ledger.open_request("wall-opening", "bauherr@example.com").unwrap();
        let second = ledger.open_request("wall-opening", "other@example.com").unwrap();
        assert_eq!(second, first + 1);

        let fields = FormFields::from_pairs([("breite", "101")]);
        assert_eq!(ledger.insert_request_record(first, &fields).unwrap(), first);

        let user = ledger.get_user_by_request_id(first).unwrap();
        assert_eq!(user.name, "A. Bauherr");
        let unnamed = ledger.get_user_by_request_id(second).unwrap();
        assert_eq!(unnamed.name, "other@example.com");

        assert_eq!(ledger.get_output_folder(first).unwrap(), None);
        ledger
            .insert_storage_details(&StorageDetails {
                request_id: first,
                root_folder: item("root"),
                user_folder: item("user"),
                output_folder: item("out"),
                template_file: None,
            })
            .unwrap();
        assert_eq!(ledger.get_output_folder(first).unwrap().as_deref(), Some("out"));

        ledger.record_delivery(first, "statiker@office").unwrap();

        // A second handle on the same file sees everything
        let reopened = RequestLedger::open(&path, "intake").unwrap();
        let snapshot = reopened.snapshot().unwrap();
        assert_eq!(snapshot.requests[&first].form.as_ref(), Some(&fields));
        assert_eq!(snapshot.deliveries.len(), 1);
        assert_eq!(snapshot.deliveries[0].request_id, first);
        assert_eq!(snapshot.deliveries[0].submitted_by, "statiker@office");
    }

    #[test]
    fn test_unknown_request_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = RequestLedger::open(&dir.path().join("requests.json"), "intake").unwrap();
        let err = ledger
            .insert_request_record(99, &FormFields::new())
            .unwrap_err();
        assert!(err.is_input_error());
        assert!(ledger.get_user_by_request_id(99).is_err());
        assert!(ledger.record_delivery(99, "statiker@office").unwrap_err().is_input_error());
    }

    #[test]
    fn test_newer_ledger_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.json");
        let data = LedgerData {
            version: "0.9.0".to_string(),
            ..LedgerData::default()
        };
        data.write_atomic(&path).unwrap();
        let err = RequestLedger::open(&path, "intake").err().unwrap();
        assert_eq!(err.error_code(), "VERSION_MISMATCH");
    }
}
