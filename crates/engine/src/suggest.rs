//! Category suggestion by fuzzy-matching uncategorized candidates against
//! categorized history drawn from every related ledger.
//!
//! Scoring is pure; the staged history fetch (discovery + per-ledger reads)
//! lives in `api` so this module stays testable without a store.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tally_core::similarity::{
    amounts_equal_within, date_distance_days, default_amount_tolerance, normalize, similarity,
};
use tally_core::{HistoricalRecord, Record};

use crate::progress::{ProgressObserver, Stage};

/// Fallback category when no historical match scores above zero.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Qualitative strength of the best historical match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchReason {
    /// Normalized descriptions equal (or the candidate was already
    /// categorized).
    Exact,
    /// Combined score above the high cutoff.
    High,
    /// Moderate text similarity.
    Partial,
    /// Weak text similarity rescued by a matching amount.
    Amount,
    /// Nothing worth suggesting.
    None,
}

/// Per-candidate verdict supplied by the caller (or a human).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryDecision {
    /// Write the suggested category.
    Accept,
    /// Write a caller-supplied category instead.
    Edit(String),
    Skip,
}

/// Scoring weights and cutoffs. Empirically chosen; kept as named overridable
/// configuration so they can be recalibrated against labeled data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Added when the amounts match within tolerance.
    pub amount_bonus: u8,
    /// Added when the historical record is at most `recency_month_days` old
    /// relative to the candidate.
    pub recency_month_bonus: u8,
    /// Added when it is at most `recency_year_days` old instead.
    pub recency_year_bonus: u8,
    pub recency_month_days: u64,
    pub recency_year_days: u64,
    /// Scores strictly above this are `high`.
    pub high_cutoff: u8,
    /// Scores at or above this are `partial`; also the floor applied to
    /// `amount` matches.
    pub partial_floor: u8,
    /// Minimum raw text similarity for amount evidence to count at all.
    pub weak_text_floor: u8,
    /// Historical matches kept per candidate as evidence.
    pub evidence_limit: usize,
    pub amount_tolerance: Decimal,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            amount_bonus: 15,
            recency_month_bonus: 10,
            recency_year_bonus: 5,
            recency_month_days: 31,
            recency_year_days: 365,
            high_cutoff: 85,
            partial_floor: 50,
            weak_text_floor: 30,
            evidence_limit: 5,
            amount_tolerance: default_amount_tolerance(),
        }
    }
}

/// One historical match kept as evidence, tagged with its source ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub ledger: String,
    pub record: Record,
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub index: usize,
    pub record: Record,
    pub suggested_category: String,
    pub confidence: u8,
    pub reason: MatchReason,
    /// Best historical matches, strongest first.
    pub evidence: Vec<Evidence>,
    /// True when the candidate arrived with a meaningful category and was
    /// never compared; such rows have nothing to decide.
    pub already_categorized: bool,
}

/// Immutable snapshot of one suggestion run. Advisory only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAnalysis {
    pub ledger: String,
    /// One entry per candidate, in batch order.
    pub suggestions: Vec<Suggestion>,
    /// Sorted, deduplicated categories present in the history.
    pub available_categories: Vec<String>,
    pub history_size: usize,
}

/// A concrete write produced by applying decisions to an analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUpdate {
    pub record_id: i64,
    pub category: String,
}

struct Scored {
    score: u8,
    raw_similarity: u8,
    amount_equal: bool,
    descriptions_equal: bool,
    history_pos: usize,
}

/// Scores every candidate against the full history. Pure function; the
/// history is whatever the caller managed to fetch (possibly empty).
pub fn analyze(
    ledger: &str,
    candidates: &[Record],
    history: &[HistoricalRecord],
    cfg: &ScoringConfig,
    progress: &dyn ProgressObserver,
) -> CategoryAnalysis {
    progress.stage_started(Stage::Score);
    let started = Instant::now();

    let suggestions = candidates
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let suggestion = suggest_one(index, record, history, cfg);
            progress.item_scored(index + 1, candidates.len());
            suggestion
        })
        .collect();

    let available_categories: Vec<String> = history
        .iter()
        .filter_map(|h| h.record.category.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    progress.stage_finished(Stage::Score, started.elapsed());

    CategoryAnalysis {
        ledger: ledger.to_string(),
        suggestions,
        available_categories,
        history_size: history.len(),
    }
}

fn suggest_one(
    index: usize,
    record: &Record,
    history: &[HistoricalRecord],
    cfg: &ScoringConfig,
) -> Suggestion {
    // Already-categorized input is never second-guessed.
    if record.has_meaningful_category() {
        return Suggestion {
            index,
            record: record.clone(),
            suggested_category: record.category.clone().unwrap_or_default(),
            confidence: 100,
            reason: MatchReason::Exact,
            evidence: Vec::new(),
            already_categorized: true,
        };
    }

    let mut scored: Vec<Scored> = history
        .iter()
        .enumerate()
        .map(|(history_pos, h)| score_pair(record, &h.record, history_pos, cfg))
        .collect();

    // Strongest first; normalized-equal and raw similarity break score ties.
    scored.sort_by(|a, b| {
        (b.score, b.descriptions_equal, b.raw_similarity)
            .cmp(&(a.score, a.descriptions_equal, a.raw_similarity))
    });

    let (confidence, reason) = match scored.first() {
        None => (0, MatchReason::None),
        Some(best) => classify(best, cfg),
    };

    let suggested_category = if reason == MatchReason::None {
        UNKNOWN_CATEGORY.to_string()
    } else {
        scored
            .first()
            .and_then(|best| history[best.history_pos].record.category.clone())
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string())
    };

    let evidence = scored
        .iter()
        .filter(|s| s.score > 0)
        .take(cfg.evidence_limit)
        .map(|s| Evidence {
            ledger: history[s.history_pos].ledger.clone(),
            record: history[s.history_pos].record.clone(),
            score: s.score,
        })
        .collect();

    Suggestion {
        index,
        record: record.clone(),
        suggested_category,
        confidence,
        reason,
        evidence,
        already_categorized: false,
    }
}

fn score_pair(candidate: &Record, historical: &Record, history_pos: usize, cfg: &ScoringConfig) -> Scored {
    let raw_similarity = similarity(&candidate.description, &historical.description);
    let amount_equal =
        amounts_equal_within(candidate.amount, historical.amount, cfg.amount_tolerance);
    let descriptions_equal =
        normalize(&candidate.description) == normalize(&historical.description);

    let score = if descriptions_equal {
        100
    } else {
        let mut score = raw_similarity as u32;
        if amount_equal {
            score += cfg.amount_bonus as u32;
        }
        match date_distance_days(candidate.date, historical.date) {
            Some(d) if d <= cfg.recency_month_days => score += cfg.recency_month_bonus as u32,
            Some(d) if d <= cfg.recency_year_days => score += cfg.recency_year_bonus as u32,
            _ => {}
        }
        score.min(100) as u8
    };

    Scored {
        score,
        raw_similarity,
        amount_equal,
        descriptions_equal,
        history_pos,
    }
}

fn classify(best: &Scored, cfg: &ScoringConfig) -> (u8, MatchReason) {
    if best.descriptions_equal {
        (100, MatchReason::Exact)
    } else if best.score > cfg.high_cutoff {
        (best.score, MatchReason::High)
    } else if best.amount_equal
        && best.raw_similarity >= cfg.weak_text_floor
        && best.raw_similarity < cfg.partial_floor
    {
        // Text alone was too weak; the matching amount carries the match, so
        // the confidence is floored rather than left below the partial band.
        (best.score.max(cfg.partial_floor), MatchReason::Amount)
    } else if best.score >= cfg.partial_floor {
        (best.score, MatchReason::Partial)
    } else {
        (0, MatchReason::None)
    }
}

/// Default decision per candidate: accept confident suggestions, skip the
/// rest. Already-categorized candidates have nothing to decide and are
/// excluded entirely.
pub fn initialize_decisions(
    analysis: &CategoryAnalysis,
    cfg: &ScoringConfig,
) -> HashMap<usize, CategoryDecision> {
    analysis
        .suggestions
        .iter()
        .filter(|s| !s.already_categorized)
        .map(|s| {
            let decision = if s.confidence > cfg.high_cutoff {
                CategoryDecision::Accept
            } else {
                CategoryDecision::Skip
            };
            (s.index, decision)
        })
        .collect()
}

/// Resolves a decision map into concrete category writes, in batch order.
/// Pure; candidates without a persisted id or a usable category are dropped.
pub fn planned_updates(
    analysis: &CategoryAnalysis,
    decisions: &HashMap<usize, CategoryDecision>,
) -> Vec<CategoryUpdate> {
    analysis
        .suggestions
        .iter()
        .filter(|s| !s.already_categorized)
        .filter_map(|s| {
            let category = match decisions.get(&s.index) {
                Some(CategoryDecision::Accept) if s.suggested_category != UNKNOWN_CATEGORY => {
                    s.suggested_category.clone()
                }
                Some(CategoryDecision::Edit(category)) => category.clone(),
                _ => return None,
            };
            let record_id = s.record.id?;
            Some(CategoryUpdate { record_id, category })
        })
        .collect()
}
