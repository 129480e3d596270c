//! Pattern store: learns per-category signatures from historical requests
//!
//! Signatures are rebuilt wholesale on each learning pass; there is no
//! incremental mutation. A pass reads the most recent active records,
//! groups them by category and distills each group into a keyword set and
//! budget statistics. The result is cached for an hour; every failure on
//! the way degrades to "no learned patterns", which callers treat as a
//! valid state rather than an error.

use crate::cache::{PatternCache, PatternSnapshot};
use crate::score::tokenize;
use crate::store::{HistoricalRecord, RecordStore};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Keywords kept per category; first seen wins
const MAX_KEYWORDS: usize = 20;

/// How many recent records one learning pass reads
const LEARNING_WINDOW: usize = 500;

/// Cache freshness window
const CACHE_TTL_MINUTES: i64 = 60;

/// Budget assumed for a category that never saw a positive numeric budget
const DEFAULT_BUDGET: f64 = 500.0;

/// Wall-clock seam so the freshness rule is testable
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Learned per-category profile of keywords and budget statistics
///
/// Invariant after every learning pass: `min_budget <= avg_budget <= max_budget`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedSignature {
    pub category: String,
    pub keywords: Vec<String>,
    pub avg_budget: f64,
    pub min_budget: f64,
    pub max_budget: f64,
    pub sample_count: usize,
}

/// Builds and caches learned signatures
pub struct PatternStore {
    store: Arc<dyn RecordStore>,
    cache: Arc<dyn PatternCache>,
    clock: Arc<dyn Clock>,
}

impl PatternStore {
    pub fn new(store: Arc<dyn RecordStore>, cache: Arc<dyn PatternCache>) -> Self {
        Self::with_clock(store, cache, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn RecordStore>,
        cache: Arc<dyn PatternCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            cache,
            clock,
        }
    }

    /// Learned signatures: from the cache when fresh, rebuilt otherwise.
    pub async fn load(&self) -> Vec<LearnedSignature> {
        let now = self.clock.now();
        if let Some(snapshot) = self.cache.get() {
            if now - snapshot.captured_at < Duration::minutes(CACHE_TTL_MINUTES) {
                return snapshot.signatures;
            }
        }

        let records = match self.store.recent_requests(LEARNING_WINDOW).await {
            Ok(records) => records,
            Err(err) => {
                eprintln!(
                    "  Warning: learning pass failed, continuing without patterns: {}",
                    err
                );
                return Vec::new();
            }
        };

        let signatures = build_signatures(&records);
        self.cache.set(&PatternSnapshot {
            signatures: signatures.clone(),
            captured_at: now,
        });
        signatures
    }
}

#[derive(Default)]
struct CategoryAccumulator {
    keywords: Vec<String>,
    budgets: Vec<f64>,
    samples: usize,
}

/// Distill records into signatures, sorted by sample count descending.
pub(crate) fn build_signatures(records: &[HistoricalRecord]) -> Vec<LearnedSignature> {
    let mut groups: BTreeMap<String, CategoryAccumulator> = BTreeMap::new();

    for record in records {
        if !record.eligible_for_learning() {
            continue;
        }
        let Some(category) = record.category.clone() else {
            continue;
        };
        let acc = groups.entry(category).or_default();
        acc.samples += 1;
        for token in tokenize(&record.title) {
            if acc.keywords.len() >= MAX_KEYWORDS {
                break;
            }
            if !acc.keywords.contains(&token) {
                acc.keywords.push(token);
            }
        }
        if let Some(budget) = record.budget {
            if budget > 0.0 {
                acc.budgets.push(budget);
            }
        }
    }

    let mut signatures: Vec<LearnedSignature> = groups
        .into_iter()
        .map(|(category, acc)| {
            let (avg_budget, min_budget, max_budget) = if acc.budgets.is_empty() {
                (DEFAULT_BUDGET, DEFAULT_BUDGET * 0.5, DEFAULT_BUDGET * 1.5)
            } else {
                let sum: f64 = acc.budgets.iter().sum();
                let avg = sum / acc.budgets.len() as f64;
                let min = acc.budgets.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = acc.budgets.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                (avg, min, max)
            };
            LearnedSignature {
                category,
                keywords: acc.keywords,
                avg_budget,
                min_budget,
                max_budget,
                sample_count: acc.samples,
            }
        })
        .collect();

    signatures.sort_by(|a, b| b.sample_count.cmp(&a.sample_count));
    signatures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::store::{MemoryStore, RecordStatus};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn record(title: &str, category: &str, budget: Option<f64>) -> HistoricalRecord {
        HistoricalRecord {
            title: title.to_string(),
            category: Some(category.to_string()),
            budget,
            status: RecordStatus::Active,
        }
    }

    struct FixedClock(Mutex<DateTime<Utc>>);

    impl FixedClock {
        fn new(at: DateTime<Utc>) -> Self {
            Self(Mutex::new(at))
        }

        fn advance(&self, minutes: i64) {
            let mut now = self.0.lock().unwrap();
            *now = *now + Duration::minutes(minutes);
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl RecordStore for BrokenStore {
        async fn recent_requests(&self, _limit: usize) -> Result<Vec<HistoricalRecord>> {
            anyhow::bail!("record store unreachable")
        }

        async fn active_categories(&self, _limit: usize) -> Result<Vec<String>> {
            anyhow::bail!("record store unreachable")
        }
    }

    #[test]
    fn test_budget_invariant_holds() {
        let records = vec![
            record("divano angolare grigio", "Casa e Giardino", Some(300.0)),
            record("tavolo allungabile", "Casa e Giardino", Some(150.0)),
            record("poltrona vintage", "Casa e Giardino", Some(600.0)),
        ];
        let signatures = build_signatures(&records);

        assert_eq!(signatures.len(), 1);
        let sig = &signatures[0];
        assert!(sig.min_budget <= sig.avg_budget && sig.avg_budget <= sig.max_budget);
        assert_eq!(sig.min_budget, 150.0);
        assert_eq!(sig.max_budget, 600.0);
        assert_eq!(sig.avg_budget, 350.0);
    }

    #[test]
    fn test_default_budget_when_none_positive() {
        let records = vec![
            record("lezioni private inglese", "Servizi", None),
            record("lezioni chitarra", "Servizi", Some(0.0)),
        ];
        let signatures = build_signatures(&records);

        let sig = &signatures[0];
        assert_eq!(sig.avg_budget, 500.0);
        assert_eq!(sig.min_budget, 250.0);
        assert_eq!(sig.max_budget, 750.0);
        assert!(sig.min_budget <= sig.avg_budget && sig.avg_budget <= sig.max_budget);
    }

    #[test]
    fn test_keyword_cap_keeps_first_seen() {
        let records: Vec<HistoricalRecord> = (0..30)
            .map(|i| {
                record(
                    &format!("oggetto{:02} particolare{:02}", i, i),
                    "Altro",
                    None,
                )
            })
            .collect();
        let signatures = build_signatures(&records);

        assert_eq!(signatures[0].keywords.len(), MAX_KEYWORDS);
        assert_eq!(signatures[0].keywords[0], "oggetto00");
    }

    #[test]
    fn test_signatures_sorted_by_sample_count() {
        let mut records = vec![record("bici da corsa", "Sport", Some(400.0))];
        for _ in 0..3 {
            records.push(record("telefono ricondizionato", "Elettronica", Some(200.0)));
        }
        let signatures = build_signatures(&records);

        assert_eq!(signatures[0].category, "Elettronica");
        assert_eq!(signatures[0].sample_count, 3);
        assert_eq!(signatures[1].category, "Sport");
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_learning() {
        let store = Arc::new(MemoryStore::new(
            vec![record("divano in pelle", "Casa e Giardino", Some(500.0))],
            vec![],
        ));
        let cache = Arc::new(MemoryCache::default());
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let patterns = PatternStore::with_clock(store, cache.clone(), clock.clone());

        let first = patterns.load().await;
        assert_eq!(first.len(), 1);

        // A write between loads is ignored while the cache is fresh.
        let mut tampered = cache.get().unwrap();
        tampered.signatures[0].sample_count = 42;
        cache.set(&tampered);

        clock.advance(30);
        let second = patterns.load().await;
        assert_eq!(second[0].sample_count, 42);

        clock.advance(31);
        let third = patterns.load().await;
        assert_eq!(third[0].sample_count, 1);
    }

    #[tokio::test]
    async fn test_store_failure_yields_empty_patterns() {
        let patterns = PatternStore::new(Arc::new(BrokenStore), Arc::new(MemoryCache::default()));
        assert!(patterns.load().await.is_empty());
    }
}
