//! Compiled-output cache.
//!
//! Entries are keyed by a hash of the source's absolute path, not its
//! content, and an entry is fresh while its own modification time is at or
//! after the source's. A renamed source is therefore cache-cold, and a
//! touched-but-unchanged source is recompiled.
//!
//! [`DiskCache`] is the shared on-disk store. Each entry is three files in
//! the cache directory:
//!
//! - `<key>`: compiled bytes; its mtime is the freshness oracle
//! - `<key>.sha256`: checksum of the bytes, checked on every read
//! - `<key>.lock`: `fs2` lock serialising writers across processes

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use fs2::FileExt;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::CacheError;

const CHECKSUM_EXT: &str = "sha256";
const LOCK_EXT: &str = "lock";

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Fixed-width, filesystem-safe cache key derived from a source path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// SHA-256 of the path's string form, as 64 lowercase hex characters.
    ///
    /// Callers pass absolute paths so that equal relative paths in
    /// different plugins never share an entry.
    pub fn for_path(path: &Path) -> Self {
        Self(sha256_hex(path.to_string_lossy().as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key → compiled bytes store shared by the scheduler and the assembler.
pub trait CacheStore: Send + Sync {
    /// Stored bytes, or `None` if never stored (or unreadable as stored).
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError>;

    /// When the entry was last written.
    fn modified_time(&self, key: &CacheKey) -> Result<Option<SystemTime>, CacheError>;

    /// Stores `content`, replacing any previous entry.
    fn put(&self, key: &CacheKey, content: &[u8]) -> Result<(), CacheError>;

    /// Whether the entry for `key` still reflects a source last modified at
    /// `source_mtime`. Always false when `cache_enabled` is false.
    fn is_fresh(&self, key: &CacheKey, source_mtime: SystemTime, cache_enabled: bool) -> bool {
        if !cache_enabled {
            return false;
        }
        match self.modified_time(key) {
            Ok(Some(entry_mtime)) => entry_mtime >= source_mtime,
            _ => false,
        }
    }
}

/// Summary of the on-disk cache contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
}

/// On-disk cache shared across plugins and invocations
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Opens the cache rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.as_str())
    }

    fn sidecar_path(&self, key: &CacheKey, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key.as_str(), ext))
    }

    fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, CacheError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn acquire_lock(&self, key: &CacheKey) -> Result<File, CacheError> {
        let lock_path = self.sidecar_path(key, LOCK_EXT);
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| CacheError::Lock {
                path: lock_path.clone(),
                source,
            })?;
        lock_file
            .lock_exclusive()
            .map_err(|source| CacheError::Lock {
                path: lock_path,
                source,
            })?;
        Ok(lock_file)
    }

    /// Writes `content` to `target` through a temp file in the cache dir.
    fn write_atomic(&self, target: &Path, content: &[u8]) -> Result<(), CacheError> {
        let io_err = |source| CacheError::Io {
            path: target.to_path_buf(),
            source,
        };
        let mut temp_file = tempfile::Builder::new()
            .prefix(".entry-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(io_err)?;
        temp_file.write_all(content).map_err(io_err)?;
        temp_file.as_file().sync_data().map_err(io_err)?;
        temp_file
            .persist(target)
            .map_err(|e| CacheError::Persist {
                path: target.to_path_buf(),
                source: e.error,
            })?;
        Ok(())
    }

    /// Reads the payload and returns it only if its checksum matches.
    fn read_verified(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        let Some(content) = Self::read_optional(&self.entry_path(key))? else {
            return Ok(None);
        };
        let Some(stored) = Self::read_optional(&self.sidecar_path(key, CHECKSUM_EXT))? else {
            warn!(key = %key, "cache entry has no checksum, ignoring it");
            return Ok(None);
        };
        if String::from_utf8_lossy(&stored).trim() != sha256_hex(&content) {
            warn!(key = %key, "cache entry checksum mismatch, ignoring it");
            return Ok(None);
        }
        Ok(Some(content))
    }

    /// Removes every entry. Returns the number of entries removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        for entry in self.read_dir()? {
            let path = entry.path();
            if path.extension().is_none() {
                removed += 1;
            }
            fs::remove_file(&path).map_err(|source| CacheError::Io { path, source })?;
        }
        Ok(removed)
    }

    /// Counts entries and their payload size.
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut stats = CacheStats::default();
        for entry in self.read_dir()? {
            let path = entry.path();
            if path.extension().is_some() {
                continue;
            }
            let metadata = entry
                .metadata()
                .map_err(|source| CacheError::Io { path, source })?;
            stats.entries += 1;
            stats.total_bytes += metadata.len();
        }
        Ok(stats)
    }

    fn read_dir(&self) -> Result<Vec<fs::DirEntry>, CacheError> {
        let io_err = |source| CacheError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            if entry.file_type().map_err(io_err)?.is_file() {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

impl CacheStore for DiskCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        self.read_verified(key)
    }

    fn modified_time(&self, key: &CacheKey) -> Result<Option<SystemTime>, CacheError> {
        let path = self.entry_path(key);
        match fs::metadata(&path) {
            Ok(metadata) => metadata
                .modified()
                .map(Some)
                .map_err(|source| CacheError::Io { path, source }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    fn put(&self, key: &CacheKey, content: &[u8]) -> Result<(), CacheError> {
        let _lock = self.acquire_lock(key)?;
        // Payload first: a crash between the two writes leaves a checksum
        // mismatch, which reads as a miss.
        self.write_atomic(&self.entry_path(key), content)?;
        self.write_atomic(
            &self.sidecar_path(key, CHECKSUM_EXT),
            sha256_hex(content).as_bytes(),
        )?;
        debug!(key = %key, bytes = content.len(), "cached");
        Ok(())
    }

    fn is_fresh(&self, key: &CacheKey, source_mtime: SystemTime, cache_enabled: bool) -> bool {
        if !cache_enabled {
            return false;
        }
        match self.modified_time(key) {
            Ok(Some(entry_mtime)) if entry_mtime >= source_mtime => {
                matches!(self.read_verified(key), Ok(Some(_)))
            }
            _ => false,
        }
    }
}

/// In-process cache with caller-controlled timestamps.
///
/// Useful where nothing should touch the shared directory, and in tests
/// that need exact control over entry times.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, (Vec<u8>, SystemTime)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an entry with an explicit modification time.
    pub fn insert_with_time(&self, key: CacheKey, content: Vec<u8>, modified: SystemTime) {
        self.lock().insert(key, (content, modified));
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, (Vec<u8>, SystemTime)>> {
        // A panic while holding the lock cannot leave a half-written entry,
        // so a poisoned map is still usable.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.lock().get(key).map(|(content, _)| content.clone()))
    }

    fn modified_time(&self, key: &CacheKey) -> Result<Option<SystemTime>, CacheError> {
        Ok(self.lock().get(key).map(|(_, modified)| *modified))
    }

    fn put(&self, key: &CacheKey, content: &[u8]) -> Result<(), CacheError> {
        self.lock()
            .insert(key.clone(), (content.to_vec(), SystemTime::now()));
        Ok(())
    }
}
