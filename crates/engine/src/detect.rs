//! Duplicate/conflict detection for a batch of candidate records against the
//! ledger they are about to be merged into.
//!
//! The analysis is a pure partition: every candidate lands in exactly one of
//! safe-to-add, conflicts, or auto-skipped. Nothing here touches storage; the
//! caller fetches the existing records and persists whatever `resolve` hands
//! back.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tally_core::similarity::{
    amounts_equal_within, date_distance_days, default_amount_tolerance, normalize, similarity,
};
use tally_core::Record;

/// Duplicate-confidence tiers, ordered by evidentiary strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    /// Weak description similarity only.
    Low,
    /// Description moderately similar and (amount equal or dates close).
    Medium,
    /// Description near-identical and amount equal.
    High,
    /// Normalized date, description, and amount all equal.
    Exact,
}

/// Per-candidate verdict supplied by the caller (or a human).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateDecision {
    Add,
    Skip,
}

/// Tier thresholds and windows. Empirically chosen; kept as named overridable
/// configuration so they can be recalibrated against labeled data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Minimum description similarity for a `High` match.
    pub high_threshold: u8,
    /// Minimum description similarity for a `Medium` match.
    pub medium_threshold: u8,
    /// Similarity floor below which a pair is not reported at all.
    pub low_floor: u8,
    /// Date window (days) that lets a `Medium` match stand in for an equal
    /// amount.
    pub date_window_days: u64,
    pub amount_tolerance: Decimal,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            high_threshold: 90,
            medium_threshold: 70,
            low_floor: 40,
            date_window_days: 3,
            amount_tolerance: default_amount_tolerance(),
        }
    }
}

/// A candidate row paired with its position in the batch. The position is the
/// only stable handle a not-yet-persisted record has, so decisions key on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub index: usize,
    pub record: Record,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub candidate: Candidate,
    pub tier: MatchTier,
    /// Best similarity score (0..=100) behind the tier assignment.
    pub score: u8,
    /// Existing records that matched at the best tier, for side-by-side review.
    pub possible_duplicates: Vec<Record>,
}

/// Immutable snapshot of one detector run. Advisory only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictAnalysis {
    pub ledger: String,
    /// Candidates with no existing record above the similarity floor.
    pub safe_to_add: Vec<Candidate>,
    /// Candidates needing review, in batch order.
    pub conflicts: Vec<Conflict>,
    /// Near-certain duplicates (`Exact` tier), defaulting to skip but
    /// overridable like any other conflict.
    pub auto_skipped: Vec<Conflict>,
    pub existing: Vec<Record>,
}

impl ConflictAnalysis {
    pub fn total_candidates(&self) -> usize {
        self.safe_to_add.len() + self.conflicts.len() + self.auto_skipped.len()
    }
}

/// Classifies every candidate against every existing record in the target
/// ledger. Pure function over in-memory data.
pub fn analyze(
    ledger: &str,
    existing: &[Record],
    candidates: &[Record],
    cfg: &DetectorConfig,
) -> ConflictAnalysis {
    let mut safe_to_add = Vec::new();
    let mut conflicts = Vec::new();
    let mut auto_skipped = Vec::new();

    for (index, record) in candidates.iter().enumerate() {
        let candidate = Candidate {
            index,
            record: record.clone(),
        };

        let mut best: Option<(MatchTier, u8)> = None;
        let mut scored: Vec<(MatchTier, u8, usize)> = Vec::new();

        for (pos, exist) in existing.iter().enumerate() {
            if let Some((tier, score)) = score_pair(record, exist, cfg) {
                if best.map_or(true, |(t, s)| (tier, score) > (t, s)) {
                    best = Some((tier, score));
                }
                scored.push((tier, score, pos));
            }
        }

        match best {
            None => safe_to_add.push(candidate),
            Some((tier, score)) => {
                let possible_duplicates = scored
                    .iter()
                    .filter(|(t, _, _)| *t == tier)
                    .map(|(_, _, pos)| existing[*pos].clone())
                    .collect();
                let conflict = Conflict {
                    candidate,
                    tier,
                    score,
                    possible_duplicates,
                };
                if tier == MatchTier::Exact {
                    auto_skipped.push(conflict);
                } else {
                    conflicts.push(conflict);
                }
            }
        }
    }

    ConflictAnalysis {
        ledger: ledger.to_string(),
        safe_to_add,
        conflicts,
        auto_skipped,
        existing: existing.to_vec(),
    }
}

/// Best tier for one candidate/existing pair, or `None` when the pair is
/// below the similarity floor.
fn score_pair(candidate: &Record, exist: &Record, cfg: &DetectorConfig) -> Option<(MatchTier, u8)> {
    let sim = similarity(&candidate.description, &exist.description);
    let amount_eq = amounts_equal_within(candidate.amount, exist.amount, cfg.amount_tolerance);
    let date_distance = date_distance_days(candidate.date, exist.date);

    // Absent dates never count as equal; they only weaken the evidence.
    let dates_equal = date_distance == Some(0);
    let dates_close = date_distance.is_some_and(|d| d <= cfg.date_window_days);

    let descriptions_equal =
        normalize(&candidate.description) == normalize(&exist.description);

    if descriptions_equal && amount_eq && dates_equal {
        Some((MatchTier::Exact, 100))
    } else if sim >= cfg.high_threshold && amount_eq {
        Some((MatchTier::High, sim))
    } else if sim >= cfg.medium_threshold && (amount_eq || dates_close) {
        Some((MatchTier::Medium, sim))
    } else if sim >= cfg.low_floor {
        Some((MatchTier::Low, sim))
    } else {
        None
    }
}

/// Default decision for a reviewable match at the given tier.
pub fn default_decision(tier: MatchTier) -> DuplicateDecision {
    match tier {
        MatchTier::Exact | MatchTier::High => DuplicateDecision::Skip,
        MatchTier::Medium | MatchTier::Low => DuplicateDecision::Add,
    }
}

/// Builds the default per-conflict decision map for an analysis. Safe-to-add
/// candidates are omitted; their effective default is `Add`.
pub fn initialize_default_decisions(
    analysis: &ConflictAnalysis,
) -> HashMap<usize, DuplicateDecision> {
    analysis
        .conflicts
        .iter()
        .map(|c| (c.candidate.index, default_decision(c.tier)))
        .chain(
            analysis
                .auto_skipped
                .iter()
                .map(|c| (c.candidate.index, DuplicateDecision::Skip)),
        )
        .collect()
}

/// Applies a decision map to an analysis, returning the records to persist in
/// their original batch order. Performs no writes.
pub fn resolve(
    analysis: &ConflictAnalysis,
    decisions: &HashMap<usize, DuplicateDecision>,
) -> Vec<Record> {
    let mut accepted: Vec<(usize, &Record)> = Vec::new();

    let candidates = analysis
        .safe_to_add
        .iter()
        .map(|c| (c, DuplicateDecision::Add))
        .chain(analysis.conflicts.iter().map(|c| (&c.candidate, default_decision(c.tier))))
        .chain(
            analysis
                .auto_skipped
                .iter()
                .map(|c| (&c.candidate, DuplicateDecision::Skip)),
        );

    for (candidate, default) in candidates {
        let effective = decisions.get(&candidate.index).copied().unwrap_or(default);
        if effective == DuplicateDecision::Add {
            accepted.push((candidate.index, &candidate.record));
        }
    }

    accepted.sort_by_key(|(index, _)| *index);
    accepted.into_iter().map(|(_, r)| r.clone()).collect()
}
