//! Analysis engine: rule snapshot, worker pool and caches behind one handle.

use super::aggregator::Aggregator;
use super::cache::{CacheKey, KeyedCache, SourceId};
use crate::data::{load_csv, LoaderOptions, ObservationTable};
use crate::error::{AuditError, Result};
use crate::models::AnalysisResult;
use crate::rules::RuleStore;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Owns everything an analysis run needs.
///
/// Runs read an `Arc` snapshot of the rule store taken when they start;
/// [`Engine::replace_rules`] only affects runs started after it returns.
pub struct Engine {
    rules: RwLock<Arc<RuleStore>>,
    aggregator: Aggregator,
    loader: LoaderOptions,
    tables: KeyedCache<SourceId, ObservationTable>,
    results: KeyedCache<CacheKey, AnalysisResult>,
}

impl Engine {
    /// Creates an engine with a pool of `workers` evaluation threads.
    pub fn new(rules: RuleStore, loader: LoaderOptions, workers: usize) -> Result<Self> {
        let aggregator = Aggregator::new(workers)?;
        debug!("Evaluation pool started with {} workers", aggregator.workers());

        Ok(Self {
            rules: RwLock::new(Arc::new(rules)),
            aggregator,
            loader,
            tables: KeyedCache::new(),
            results: KeyedCache::new(),
        })
    }

    /// Snapshot of the current rule store.
    pub fn rules(&self) -> Arc<RuleStore> {
        let guard = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Installs a new rule store for subsequent runs.
    ///
    /// Cached results were produced with the old rules and are not dropped;
    /// invalidate the keys that should be recomputed.
    pub fn replace_rules(&self, rules: RuleStore) {
        let mut guard = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(rules);
    }

    /// Returns the cached result for `key`, running the analysis if absent.
    pub fn get_or_compute(&self, key: &CacheKey) -> Result<Arc<AnalysisResult>> {
        self.results.get_or_try_insert_with(key, || -> Result<AnalysisResult> {
            info!("Analyzing {}", key);
            let table = self.table(&key.source)?;
            self.analyze_table(&table, &key.technology)
        })
    }

    /// Runs an analysis over an in-memory table without caching.
    ///
    /// Fails with [`AuditError::MissingColumn`] when the table lacks the KPI
    /// column of any rule for `technology`. Count columns may be absent.
    pub fn analyze_table(&self, table: &ObservationTable, technology: &str) -> Result<AnalysisResult> {
        let rules = self.rules();
        let rules = rules.rules_for(technology);

        if let Some(rule) = rules.iter().find(|r| !table.has_column(&r.kpi)) {
            return Err(AuditError::MissingColumn {
                column: rule.kpi.clone(),
            });
        }

        Ok(self.aggregator.run(table, technology, rules))
    }

    /// Returns the raw table for a source, loading it on first use.
    pub fn table(&self, source: &SourceId) -> Result<Arc<ObservationTable>> {
        self.tables.get_or_try_insert_with(source, || {
            debug!("Loading {}", source);
            load_csv(source.path(), &self.loader)
        })
    }

    /// Drops the cached result for `key` and the raw table of its source.
    pub fn invalidate(&self, key: &CacheKey) {
        let had_result = self.results.invalidate(key);
        let had_table = self.tables.invalidate(&key.source);
        debug!(
            "Invalidated {} (result: {}, table: {})",
            key, had_result, had_table
        );
    }

    /// Number of cached analysis results.
    pub fn cached_results(&self) -> usize {
        self.results.len()
    }
}
