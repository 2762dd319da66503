//! Duplicate detection over a shared set of seen identifiers.
//!
//! The set is the only state shared between workers. Every store exposes a
//! single `insert_if_absent` so that check and insert happen atomically:
//! when N workers race on the same identifier exactly one of them wins.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::{QualityCheck, QualityFinding};
use crate::pipeline::error::{FileError, InvalidReason};
use crate::pipeline::extraction::DecodedImage;

// ═══════════════════════════════════════════════════════════
// Policy
// ═══════════════════════════════════════════════════════════

/// Lifetime of the seen-identifier set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeenScope {
    /// Fresh in-memory set per batch run.
    #[default]
    Batch,
    /// SQLite-backed set that survives across runs and processes.
    /// `None` uses `config::default_seen_store_path()`.
    ///
    /// Every quality check runs on every file, so a DICOM rejected for
    /// resolution or blankness still records its UID here. A corrected
    /// resubmission with the same UID is then reported as a duplicate
    /// until the store is cleared.
    Persistent { path: Option<PathBuf> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicatePolicy {
    pub scope: SeenScope,
    /// Also flag raster images whose decoded pixels were already seen.
    pub raster_content_hash: bool,
}

// ═══════════════════════════════════════════════════════════
// Stores
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub enum SeenStoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cannot create store directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Seen-identifier store lock poisoned")]
    LockPoisoned,
}

/// Set of previously observed unique identifiers.
pub trait SeenIdentifierStore: Send + Sync {
    /// Record `id`. Returns `true` when it was not present before.
    fn insert_if_absent(&self, id: &str) -> Result<bool, SeenStoreError>;

    /// Number of identifiers recorded.
    fn len(&self) -> Result<usize, SeenStoreError>;

    fn is_empty(&self) -> Result<bool, SeenStoreError> {
        Ok(self.len()? == 0)
    }
}

/// In-process set; one mutex critical section per insert.
#[derive(Debug, Default)]
pub struct InMemorySeenSet {
    seen: Mutex<HashSet<String>>,
}

impl InMemorySeenSet {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SeenIdentifierStore for InMemorySeenSet {
    fn insert_if_absent(&self, id: &str) -> Result<bool, SeenStoreError> {
        let mut seen = self.seen.lock().map_err(|_| SeenStoreError::LockPoisoned)?;
        Ok(seen.insert(id.to_string()))
    }

    fn len(&self) -> Result<usize, SeenStoreError> {
        let seen = self.seen.lock().map_err(|_| SeenStoreError::LockPoisoned)?;
        Ok(seen.len())
    }
}

/// SQLite-backed set. `INSERT OR IGNORE` is the set-if-absent primitive;
/// a changed-row count of one means the identifier is new.
pub struct SqliteSeenStore {
    conn: Mutex<Connection>,
}

impl SqliteSeenStore {
    pub fn open(path: &Path) -> Result<Self, SeenStoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SeenStoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, SeenStoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, SeenStoreError> {
        conn.execute_batch(
            "PRAGMA journal_mode=DELETE;
             CREATE TABLE IF NOT EXISTS seen_identifiers (
                 identifier TEXT PRIMARY KEY NOT NULL,
                 first_seen TEXT NOT NULL
             );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl SeenIdentifierStore for SqliteSeenStore {
    fn insert_if_absent(&self, id: &str) -> Result<bool, SeenStoreError> {
        let conn = self.conn.lock().map_err(|_| SeenStoreError::LockPoisoned)?;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO seen_identifiers (identifier, first_seen) VALUES (?1, ?2)",
            rusqlite::params![id, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(changed == 1)
    }

    fn len(&self) -> Result<usize, SeenStoreError> {
        let conn = self.conn.lock().map_err(|_| SeenStoreError::LockPoisoned)?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM seen_identifiers", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }
}

/// Build the store a policy asks for.
pub fn open_store(scope: &SeenScope) -> Result<Arc<dyn SeenIdentifierStore>, SeenStoreError> {
    match scope {
        SeenScope::Batch => Ok(Arc::new(InMemorySeenSet::new())),
        SeenScope::Persistent { path } => {
            let path = path
                .clone()
                .unwrap_or_else(crate::config::default_seen_store_path);
            debug!(path = %path.display(), "Opening persistent seen-identifier store");
            Ok(Arc::new(SqliteSeenStore::open(&path)?))
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Check
// ═══════════════════════════════════════════════════════════

/// Flags DICOM instances (and optionally raster content) seen before.
pub struct DuplicateCheck {
    store: Arc<dyn SeenIdentifierStore>,
    raster_content_hash: bool,
}

impl DuplicateCheck {
    pub fn new(store: Arc<dyn SeenIdentifierStore>, raster_content_hash: bool) -> Self {
        Self {
            store,
            raster_content_hash,
        }
    }

    fn key_for(&self, image: &DecodedImage) -> Option<(String, String)> {
        if let Some(uid) = image.instance_id() {
            return Some((
                format!("sop:{uid}"),
                format!("Duplicate DICOM file detected (SOP Instance UID {uid})"),
            ));
        }
        if self.raster_content_hash && image.format.is_raster() {
            return Some((
                format!("sha256:{}", image.content_digest),
                "Duplicate image content detected".to_string(),
            ));
        }
        None
    }
}

impl QualityCheck for DuplicateCheck {
    fn name(&self) -> &'static str {
        "duplicate"
    }

    fn check(&self, image: &DecodedImage) -> Option<QualityFinding> {
        let (key, message) = self.key_for(image)?;
        match self.store.insert_if_absent(&key) {
            Ok(true) => None,
            Ok(false) => Some(QualityFinding::Failure(FileError::new(
                InvalidReason::DuplicateDetected,
                message,
            ))),
            Err(e) => {
                warn!(file = %image.source, error = %e, "Duplicate check unavailable");
                Some(QualityFinding::Warning(format!(
                    "Duplicate check unavailable: {e}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::{pixel_digest, DicomMetadata, PixelBuffer};
    use crate::pipeline::validation::ImageFormat;
    use image::{GrayImage, Luma};

    fn dicom_image(uid: Option<&str>) -> DecodedImage {
        let pixels = PixelBuffer::Gray(GrayImage::from_pixel(4, 4, Luma([80])));
        DecodedImage {
            source: "x.dcm".into(),
            format: ImageFormat::Dicom,
            content_digest: pixel_digest(&pixels),
            pixels,
            dicom: Some(DicomMetadata {
                sop_instance_uid: uid.map(String::from),
                ..Default::default()
            }),
        }
    }

    fn raster_image(value: u8) -> DecodedImage {
        let pixels = PixelBuffer::Gray(GrayImage::from_pixel(4, 4, Luma([value])));
        DecodedImage {
            source: "x.png".into(),
            format: ImageFormat::Png,
            content_digest: pixel_digest(&pixels),
            pixels,
            dicom: None,
        }
    }

    #[test]
    fn in_memory_insert_if_absent() {
        let set = InMemorySeenSet::new();
        assert!(set.is_empty().unwrap());
        assert!(set.insert_if_absent("a").unwrap());
        assert!(!set.insert_if_absent("a").unwrap());
        assert!(set.insert_if_absent("b").unwrap());
        assert_eq!(set.len().unwrap(), 2);
    }

    #[test]
    fn concurrent_inserts_have_one_winner() {
        let set = Arc::new(InMemorySeenSet::new());
        let barrier = Arc::new(std::sync::Barrier::new(16));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let set = Arc::clone(&set);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    set.insert_if_absent("1.2.3").unwrap()
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn sqlite_insert_if_absent() {
        let store = SqliteSeenStore::open_in_memory().unwrap();
        assert!(store.insert_if_absent("sop:1").unwrap());
        assert!(!store.insert_if_absent("sop:1").unwrap());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn sqlite_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("seen.sqlite3");
        {
            let store = SqliteSeenStore::open(&path).unwrap();
            assert!(store.insert_if_absent("sop:9").unwrap());
        }
        let reopened = SqliteSeenStore::open(&path).unwrap();
        assert!(!reopened.insert_if_absent("sop:9").unwrap());
    }

    #[test]
    fn open_store_by_scope() {
        let batch = open_store(&SeenScope::Batch).unwrap();
        assert!(batch.is_empty().unwrap());

        let dir = tempfile::tempdir().unwrap();
        let scope = SeenScope::Persistent {
            path: Some(dir.path().join("seen.sqlite3")),
        };
        let persistent = open_store(&scope).unwrap();
        assert!(persistent.insert_if_absent("k").unwrap());
    }

    #[test]
    fn second_dicom_with_same_uid_is_duplicate() {
        let check = DuplicateCheck::new(Arc::new(InMemorySeenSet::new()), false);
        assert!(check.check(&dicom_image(Some("1.2.3"))).is_none());
        match check.check(&dicom_image(Some("1.2.3"))) {
            Some(QualityFinding::Failure(err)) => {
                assert_eq!(err.reason, InvalidReason::DuplicateDetected);
                assert!(err.message.contains("1.2.3"));
            }
            other => panic!("expected duplicate failure, got {other:?}"),
        }
    }

    #[test]
    fn dicom_without_uid_is_not_checked() {
        let check = DuplicateCheck::new(Arc::new(InMemorySeenSet::new()), true);
        assert!(check.check(&dicom_image(None)).is_none());
        assert!(check.check(&dicom_image(None)).is_none());
    }

    #[test]
    fn raster_hashing_is_opt_in() {
        let off = DuplicateCheck::new(Arc::new(InMemorySeenSet::new()), false);
        assert!(off.check(&raster_image(5)).is_none());
        assert!(off.check(&raster_image(5)).is_none());

        let on = DuplicateCheck::new(Arc::new(InMemorySeenSet::new()), true);
        assert!(on.check(&raster_image(5)).is_none());
        assert!(on.check(&raster_image(6)).is_none());
        assert!(matches!(
            on.check(&raster_image(5)),
            Some(QualityFinding::Failure(_))
        ));
    }

    #[test]
    fn scope_serde_shape() {
        let json = serde_json::to_string(&SeenScope::Batch).unwrap();
        assert_eq!(json, r#"{"kind":"batch"}"#);
        let parsed: SeenScope =
            serde_json::from_str(r#"{"kind":"persistent","path":null}"#).unwrap();
        assert_eq!(parsed, SeenScope::Persistent { path: None });
    }
}
