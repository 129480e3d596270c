//! Pattern snapshot cache
//!
//! Learned signatures are fully regenerable, so cache operations are
//! best-effort: a failed read or write degrades to a fresh learning pass,
//! never to an error the user sees. There is a single cache slot and the
//! last writer wins; the engine checks `captured_at` itself rather than
//! relying on the store to enforce a TTL.

use crate::patterns::LearnedSignature;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

const CACHE_DIR: &str = "richiesta";
const PATTERNS_CACHE_FILE: &str = "patterns.json";

/// Learned signatures plus the moment they were captured
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSnapshot {
    pub signatures: Vec<LearnedSignature>,
    pub captured_at: DateTime<Utc>,
}

/// Single-slot snapshot storage
pub trait PatternCache: Send + Sync {
    fn get(&self) -> Option<PatternSnapshot>;
    fn set(&self, snapshot: &PatternSnapshot);
    fn clear(&self);
}

/// File-backed cache under the platform cache directory
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    /// Cache at the default platform location, or `None` when the platform
    /// has no cache directory.
    pub fn new() -> Option<Self> {
        dirs::cache_dir().map(|dir| Self {
            path: dir.join(CACHE_DIR).join(PATTERNS_CACHE_FILE),
        })
    }

    /// Cache at an explicit path (tests, custom deployments).
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    fn read(&self) -> Result<PatternSnapshot> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("corrupt pattern cache {}", self.path.display()))
    }

    fn write(&self, snapshot: &PatternSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string(snapshot).context("failed to serialize snapshot")?;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("failed to lock {}", self.path.display()))?;
        let result = file.write_all(content.as_bytes()).context("write failed");
        let _ = file.unlock();
        result
    }
}

impl PatternCache for FileCache {
    fn get(&self) -> Option<PatternSnapshot> {
        self.read().ok()
    }

    fn set(&self, snapshot: &PatternSnapshot) {
        if let Err(err) = self.write(snapshot) {
            eprintln!("  Warning: failed to write pattern cache: {}", err);
        }
    }

    fn clear(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// In-memory cache for tests and cache-less environments
#[derive(Default)]
pub struct MemoryCache {
    slot: Mutex<Option<PatternSnapshot>>,
}

impl PatternCache for MemoryCache {
    fn get(&self) -> Option<PatternSnapshot> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn set(&self, snapshot: &PatternSnapshot) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(snapshot.clone());
        }
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}
