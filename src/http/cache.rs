//! Disk-backed response cache
//!
//! Entries are keyed by the SHA-256 of the request URL and expire after the
//! configured TTL. Writes go to a temp file first and are renamed into place,
//! so concurrent writers of the same key cannot leave a torn entry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const MAX_TTL_HOURS: u64 = 24 * 365 * 100;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A cached response body with the time it was stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub url: String,
    pub stored_at: DateTime<Utc>,
    pub body: String,
}

impl CachedResponse {
    /// Creates an entry stamped with the current time
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stored_at: Utc::now(),
            body: body.into(),
        }
    }

    /// An entry is fresh iff `now - stored_at < ttl`
    pub fn is_fresh_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.stored_at < ttl
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.stored_at
    }
}

/// Content-addressed cache directory
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    ttl: Duration,
    enabled: bool,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>, ttl_hours: u64, enabled: bool) -> Self {
        Self {
            dir: dir.into(),
            ttl: Duration::hours(ttl_hours.min(MAX_TTL_HOURS) as i64),
            enabled,
        }
    }

    /// A cache that never reads or writes
    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            ttl: Duration::zero(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stable key for a URL
    pub fn cache_key(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn entry_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::cache_key(url)))
    }

    /// Returns a fresh entry for `url`, or None on miss, expiry or corruption
    pub async fn load(&self, url: &str) -> Option<CachedResponse> {
        if !self.enabled {
            return None;
        }

        let path = self.entry_path(url);
        let raw = tokio::fs::read_to_string(&path).await.ok()?;
        let entry: CachedResponse = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Ignoring corrupt cache entry {}: {}", path.display(), e);
                return None;
            }
        };

        if entry.url != url {
            return None;
        }

        if !entry.is_fresh_at(self.ttl, Utc::now()) {
            tracing::debug!(
                "Cache entry for {} expired ({}h old)",
                url,
                entry.age().num_hours()
            );
            return None;
        }

        Some(entry)
    }

    /// Stores a body for `url` stamped with the current time
    pub async fn store(&self, url: &str, body: &str) -> std::io::Result<()> {
        self.write_entry(&CachedResponse::new(url, body)).await
    }

    /// Writes an entry as-is, keeping its timestamp
    pub async fn write_entry(&self, entry: &CachedResponse) -> std::io::Result<()> {
        if !self.enabled {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.entry_path(&entry.url);
        let json = serde_json::to_vec_pretty(entry)?;
        write_atomic(&path, &json).await
    }
}

/// Writes bytes to `path` via a sibling temp file and a rename
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let tmp = temp_path_for(path);
    tokio::fs::write(&tmp, bytes).await?;
    match tokio::fs::rename(&tmp, path).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = tokio::fs::remove_file(&tmp).await;
            Err(e)
        }
    }
}

/// Sibling temp path, unique per call within this process
pub fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{}.{}.{}.tmp", name, std::process::id(), seq))
}
