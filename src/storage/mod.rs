//! # Storage Module - Diary Document Persistence
//!
//! The whole diary (users, topics, homework, submissions, settings) lives in a
//! single JSON document, `db.json`, inside the configured data directory:
//!
//! ```text
//! data/
//! ├── db.json        ← the document
//! ├── db.json.lock   ← advisory lock shared by every writer
//! └── uploads/       ← homework media referenced from submissions
//! ```
//!
//! ## Consistency
//!
//! Every mutation is a read-modify-write performed while holding an exclusive
//! `fs2` lock on `db.json.lock`. The new document is written to a temp file
//! in the same directory, fsynced and renamed over `db.json`, so readers see
//! either the old or the new document and never a torn one. A closure that
//! fails leaves the document untouched. Whole-document imports use the
//! SHA-256 digest of the current file as an optimistic-concurrency token.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use classdiary::storage::{DocumentStore, UserStore};
//!
//! fn main() -> Result<(), classdiary::diary::DiaryError> {
//!     let store = DocumentStore::open("./data")?;
//!     let user = store.load_user("123456789")?;
//!     println!("found: {}", user.is_some());
//!     store.transact(|doc| {
//!         doc.settings.gift_threshold = 6;
//!         Ok(())
//!     })?;
//!     Ok(())
//! }
//! ```

pub mod memory;

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::{debug, warn};
use sha2::{Digest, Sha256};

use crate::diary::errors::DiaryError;
use crate::diary::types::{DiaryDocument, Settings, UserRecord, DOCUMENT_SCHEMA_VERSION};

pub use memory::MemoryStore;

const DOCUMENT_FILE: &str = "db.json";
const LOCK_FILE: &str = "db.json.lock";
const UPLOADS_DIR: &str = "uploads";

/// Access to user records, as needed by the diary service.
pub trait UserStore: Send + Sync {
    /// `Ok(None)` when no user has this id.
    fn load_user(&self, tg_id: &str) -> Result<Option<UserRecord>, DiaryError>;

    fn load_settings(&self) -> Result<Settings, DiaryError>;

    /// Applies `f` to the stored user atomically. Nothing is written when `f`
    /// fails or leaves the record unchanged. Unknown ids yield `NotFound`.
    fn update_user<T, F>(&self, tg_id: &str, f: F) -> Result<T, DiaryError>
    where
        F: FnOnce(&mut UserRecord) -> Result<T, DiaryError>;
}

/// File-backed store for the diary document.
pub struct DocumentStore {
    data_dir: PathBuf,
    document_path: PathBuf,
    lock_path: PathBuf,
}

impl DocumentStore {
    /// Open (or create) the store rooted at `data_dir`.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, DiaryError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;
        fs::create_dir_all(data_dir.join(UPLOADS_DIR))?;
        let store = Self {
            document_path: data_dir.join(DOCUMENT_FILE),
            lock_path: data_dir.join(LOCK_FILE),
            data_dir,
        };
        if !store.document_path.exists() {
            let lock = store.lock_exclusive()?;
            if !store.document_path.exists() {
                store.write_document(&DiaryDocument::default())?;
                debug!("created empty document at {}", store.document_path.display());
            }
            drop(lock);
        }
        Ok(store)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join(UPLOADS_DIR)
    }

    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    /// Read the current document under a shared lock.
    pub fn read(&self) -> Result<DiaryDocument, DiaryError> {
        let lock = self.lock_shared()?;
        let (doc, _) = self.read_document()?;
        drop(lock);
        Ok(doc)
    }

    /// The current document and the SHA-256 digest of its stored bytes.
    pub fn snapshot(&self) -> Result<(DiaryDocument, String), DiaryError> {
        let lock = self.lock_shared()?;
        let result = self.read_document();
        drop(lock);
        result
    }

    /// Atomic read-modify-write of the whole document.
    pub fn transact<T, F>(&self, f: F) -> Result<T, DiaryError>
    where
        F: FnOnce(&mut DiaryDocument) -> Result<T, DiaryError>,
    {
        let lock = self.lock_exclusive()?;
        let (mut doc, _) = self.read_document()?;
        let before = doc.clone();
        let value = f(&mut doc)?;
        if doc != before {
            doc.revision = before.revision + 1;
            self.write_document(&doc)?;
        }
        drop(lock);
        Ok(value)
    }

    /// Replace the whole document if nobody wrote since `expected_digest` was
    /// observed. Returns the new digest.
    pub fn replace(&self, mut doc: DiaryDocument, expected_digest: &str) -> Result<String, DiaryError> {
        let lock = self.lock_exclusive()?;
        let (current, digest) = self.read_document()?;
        if !digest.eq_ignore_ascii_case(expected_digest.trim_matches('"')) {
            warn!("rejected stale document replacement (revision {})", current.revision);
            return Err(DiaryError::Conflict(format!(
                "document changed since digest {}",
                expected_digest
            )));
        }
        check_schema(&doc)?;
        doc.revision = current.revision + 1;
        let new_digest = self.write_document(&doc)?;
        drop(lock);
        Ok(new_digest)
    }

    fn lock_file(&self) -> Result<File, DiaryError> {
        Ok(OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)?)
    }

    fn lock_exclusive(&self) -> Result<File, DiaryError> {
        let file = self.lock_file()?;
        file.lock_exclusive()?;
        Ok(file)
    }

    fn lock_shared(&self) -> Result<File, DiaryError> {
        let file = self.lock_file()?;
        file.lock_shared()?;
        Ok(file)
    }

    fn read_document(&self) -> Result<(DiaryDocument, String), DiaryError> {
        let mut raw = Vec::new();
        match File::open(&self.document_path) {
            Ok(mut file) => {
                file.read_to_end(&mut raw)?;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let digest = digest_hex(&raw);
        // Guard against leading NULs left behind by an interrupted write.
        let start = raw.iter().position(|b| *b != 0).unwrap_or(raw.len());
        let body = &raw[start..];
        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok((DiaryDocument::default(), digest));
        }
        let doc: DiaryDocument = serde_json::from_slice(body)?;
        check_schema(&doc)?;
        Ok((doc, digest))
    }

    /// Temp file + fsync + rename. Caller holds the exclusive lock.
    fn write_document(&self, doc: &DiaryDocument) -> Result<String, DiaryError> {
        let content = serde_json::to_vec_pretty(doc)?;
        let dir = self.document_path.parent().unwrap_or_else(|| Path::new("."));
        let mut counter = 0u32;
        let tmp_path = loop {
            let candidate = dir.join(format!(
                ".{}.tmp-{}-{}",
                DOCUMENT_FILE,
                std::process::id(),
                counter
            ));
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(mut tmp) => {
                    tmp.write_all(&content)?;
                    tmp.flush()?;
                    let _ = tmp.sync_all();
                    break candidate;
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    counter = counter.saturating_add(1);
                }
                Err(e) => return Err(e.into()),
            }
        };
        fs::rename(&tmp_path, &self.document_path)?;
        if let Ok(dir_file) = File::open(dir) {
            let _ = dir_file.sync_all();
        }
        Ok(digest_hex(&content))
    }
}

impl UserStore for DocumentStore {
    fn load_user(&self, tg_id: &str) -> Result<Option<UserRecord>, DiaryError> {
        Ok(self.read()?.user(tg_id).cloned())
    }

    fn load_settings(&self) -> Result<Settings, DiaryError> {
        Ok(self.read()?.settings)
    }

    fn update_user<T, F>(&self, tg_id: &str, f: F) -> Result<T, DiaryError>
    where
        F: FnOnce(&mut UserRecord) -> Result<T, DiaryError>,
    {
        self.transact(|doc| {
            let user = doc
                .user_mut(tg_id)
                .ok_or_else(|| DiaryError::NotFound(format!("user: {}", tg_id)))?;
            let mut working = user.clone();
            let value = f(&mut working)?;
            *user = working;
            Ok(value)
        })
    }
}

fn check_schema(doc: &DiaryDocument) -> Result<(), DiaryError> {
    if doc.schema_version != DOCUMENT_SCHEMA_VERSION {
        return Err(DiaryError::SchemaMismatch {
            expected: DOCUMENT_SCHEMA_VERSION,
            found: doc.schema_version,
        });
    }
    Ok(())
}

fn digest_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
