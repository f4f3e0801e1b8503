//! Caller-facing surface: thin orchestration that pairs the pure analyses
//! with the `LedgerStore` collaborator.

use std::collections::HashMap;
use std::time::Instant;

use tally_core::{HistoricalRecord, LedgerStore, ReadFilter, Record};

use crate::detect::{self, ConflictAnalysis, DetectorConfig, DuplicateDecision};
use crate::error::EngineError;
use crate::progress::{ProgressObserver, Stage};
use crate::suggest::{self, CategoryAnalysis, CategoryUpdate, ScoringConfig};

/// Classifies a candidate batch against the target ledger's existing records.
///
/// A failed read is a hard error: silently treating the ledger as empty would
/// mark every candidate safe and reintroduce the duplicates.
pub async fn detect_conflicts<S: LedgerStore>(
    store: &S,
    ledger: &str,
    candidates: &[Record],
    cfg: &DetectorConfig,
) -> Result<ConflictAnalysis, EngineError> {
    let existing = store
        .read_ledger(ledger, ReadFilter::All)
        .await
        .map_err(|source| EngineError::ExistingFetch {
            ledger: ledger.to_string(),
            source,
        })?;

    tracing::debug!(
        ledger,
        existing = existing.len(),
        candidates = candidates.len(),
        "running duplicate detection"
    );

    Ok(detect::analyze(ledger, &existing, candidates, cfg))
}

/// Applies a decision map to an analysis, returning the records to persist in
/// batch order. Pure re-export; performs no writes.
pub fn resolve_conflicts(
    analysis: &ConflictAnalysis,
    decisions: &HashMap<usize, DuplicateDecision>,
) -> Vec<Record> {
    detect::resolve(analysis, decisions)
}

/// Resolves the decisions and inserts the accepted records into the target
/// ledger, returning the assigned ids.
pub async fn insert_resolved<S: LedgerStore>(
    store: &S,
    analysis: &ConflictAnalysis,
    decisions: &HashMap<usize, DuplicateDecision>,
) -> Result<Vec<i64>, EngineError> {
    let records = detect::resolve(analysis, decisions);
    if records.is_empty() {
        return Ok(Vec::new());
    }
    let ids = store.insert_records(&analysis.ledger, &records).await?;
    tracing::debug!(ledger = %analysis.ledger, inserted = ids.len(), "inserted resolved records");
    Ok(ids)
}

/// Suggests a category for each candidate by matching against categorized
/// history from every related ledger.
///
/// Categorization is best-effort: discovery failure degrades to an empty
/// history, and a failing individual ledger is skipped. Neither blocks the
/// batch.
pub async fn suggest_categories<S: LedgerStore>(
    store: &S,
    ledger: &str,
    candidates: &[Record],
    cfg: &ScoringConfig,
    progress: &dyn ProgressObserver,
) -> CategoryAnalysis {
    progress.stage_started(Stage::DiscoverLedgers);
    let started = Instant::now();
    let ledgers = match store.list_related_ledgers().await {
        Ok(names) => names,
        Err(error) => {
            tracing::warn!(%error, "ledger discovery failed, proceeding without history");
            Vec::new()
        }
    };
    progress.stage_finished(Stage::DiscoverLedgers, started.elapsed());

    progress.stage_started(Stage::FetchHistory);
    let started = Instant::now();
    let mut history: Vec<HistoricalRecord> = Vec::new();
    for name in &ledgers {
        match store.read_ledger(name, ReadFilter::Categorized).await {
            Ok(records) => history.extend(records.into_iter().map(|record| HistoricalRecord {
                ledger: name.clone(),
                record,
            })),
            Err(error) => {
                tracing::warn!(ledger = %name, %error, "skipping ledger during history fetch");
            }
        }
    }
    progress.stage_finished(Stage::FetchHistory, started.elapsed());

    tracing::debug!(
        ledger,
        ledgers = ledgers.len(),
        history = history.len(),
        "scoring candidates against history"
    );

    suggest::analyze(ledger, candidates, &history, cfg, progress)
}

/// Writes the planned category updates one by one. Not transactional: the
/// first failure aborts the rest, prior writes stay committed, and the error
/// reports how many updates landed before the failing record.
pub async fn apply_category_decisions<S: LedgerStore>(
    store: &S,
    ledger: &str,
    updates: &[CategoryUpdate],
) -> Result<usize, EngineError> {
    let mut applied = 0;
    for update in updates {
        store
            .update_category(ledger, update.record_id, &update.category)
            .await
            .map_err(|source| EngineError::ApplyFailed {
                ledger: ledger.to_string(),
                record_id: update.record_id,
                applied,
                source,
            })?;
        applied += 1;
    }
    Ok(applied)
}
