//! Historical request records and the live category catalog
//!
//! The engine never owns this data. Production deployments back the trait
//! with a remote database; tests and the demo binary use the in-memory
//! snapshot store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Lifecycle state of a marketplace request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Closed,
    Expired,
}

/// One historical marketplace request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub title: String,
    pub category: Option<String>,
    pub budget: Option<f64>,
    pub status: RecordStatus,
}

impl HistoricalRecord {
    /// Only active records with a known category teach the engine anything.
    pub fn eligible_for_learning(&self) -> bool {
        self.status == RecordStatus::Active && self.category.is_some()
    }
}

/// Read-only access to historical requests and the active category list
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Most recent active requests, recency descending.
    async fn recent_requests(&self, limit: usize) -> Result<Vec<HistoricalRecord>>;

    /// Active categories ordered by historical request count descending.
    async fn active_categories(&self, limit: usize) -> Result<Vec<String>>;
}

/// In-memory store backing tests and the demo binary
///
/// Records are expected to be provided newest-first; `recent_requests`
/// preserves that order.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MemoryStore {
    pub records: Vec<HistoricalRecord>,
    pub categories: Vec<String>,
}

impl MemoryStore {
    pub fn new(records: Vec<HistoricalRecord>, categories: Vec<String>) -> Self {
        Self {
            records,
            categories,
        }
    }

    /// Load a snapshot from a JSON file (demo data).
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid snapshot {}", path.display()))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn recent_requests(&self, limit: usize) -> Result<Vec<HistoricalRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.status == RecordStatus::Active)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn active_categories(&self, limit: usize) -> Result<Vec<String>> {
        Ok(self.categories.iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, category: Option<&str>, status: RecordStatus) -> HistoricalRecord {
        HistoricalRecord {
            title: title.to_string(),
            category: category.map(str::to_string),
            budget: None,
            status,
        }
    }

    #[test]
    fn test_learning_eligibility() {
        assert!(record("divano usato", Some("Casa e Giardino"), RecordStatus::Active)
            .eligible_for_learning());
        assert!(!record("divano usato", None, RecordStatus::Active).eligible_for_learning());
        assert!(!record("divano usato", Some("Casa e Giardino"), RecordStatus::Closed)
            .eligible_for_learning());
    }

    #[tokio::test]
    async fn test_memory_store_filters_inactive() {
        let store = MemoryStore::new(
            vec![
                record("tavolo in legno", Some("Casa e Giardino"), RecordStatus::Active),
                record("vecchio annuncio", Some("Moda"), RecordStatus::Expired),
            ],
            vec!["Casa e Giardino".to_string()],
        );

        let records = store.recent_requests(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "tavolo in legno");
    }

    #[tokio::test]
    async fn test_memory_store_respects_limits() {
        let records = (0..30)
            .map(|i| record(&format!("richiesta {}", i), Some("Altro"), RecordStatus::Active))
            .collect();
        let categories = (0..30).map(|i| format!("Categoria {}", i)).collect();
        let store = MemoryStore::new(records, categories);

        assert_eq!(store.recent_requests(5).await.unwrap().len(), 5);
        assert_eq!(store.active_categories(20).await.unwrap().len(), 20);
    }
}
