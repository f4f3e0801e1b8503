use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Category labels that mean "not categorized yet". A record carrying one of
/// these is treated the same as a record with no category at all.
pub const PLACEHOLDER_CATEGORIES: &[&str] = &["Unknown", "Uncategorized"];

/// A single ledger row. The integer id is assigned by the ledger on insert and
/// is re-assigned per ledger, so duplicate identity is the
/// (date, description, amount) tuple rather than the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub description: String,
    pub amount: Decimal,
    pub balance: Option<Decimal>,
    pub category: Option<String>,
    pub responsible: Option<String>,
    pub bank: Option<String>,
    pub comment: Option<String>,
    pub owner: Option<String>,
}

impl Record {
    pub fn new(date: Option<NaiveDate>, description: &str, amount: Decimal) -> Self {
        Record {
            id: None,
            date,
            description: description.to_string(),
            amount,
            balance: None,
            category: None,
            responsible: None,
            bank: None,
            comment: None,
            owner: None,
        }
    }

    /// True when the record carries a real category, i.e. one that is neither
    /// blank nor a placeholder value.
    pub fn has_meaningful_category(&self) -> bool {
        match &self.category {
            Some(c) => is_meaningful_category(c),
            None => false,
        }
    }
}

pub fn is_meaningful_category(category: &str) -> bool {
    let trimmed = category.trim();
    !trimmed.is_empty() && !PLACEHOLDER_CATEGORIES.contains(&trimmed)
}

/// A categorized record together with the ledger it came from. History is
/// unioned across many ledgers, so the source tag is part of its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub ledger: String,
    pub record: Record,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(desc: &str, category: Option<&str>) -> Record {
        let mut r = Record::new(
            NaiveDate::from_ymd_opt(2025, 3, 24),
            desc,
            Decimal::new(-11900, 2),
        );
        r.category = category.map(str::to_string);
        r
    }

    #[test]
    fn missing_category_is_not_meaningful() {
        assert!(!rec("SPOTIFY AB", None).has_meaningful_category());
    }

    #[test]
    fn placeholder_categories_are_not_meaningful() {
        assert!(!rec("SPOTIFY AB", Some("Unknown")).has_meaningful_category());
        assert!(!rec("SPOTIFY AB", Some("Uncategorized")).has_meaningful_category());
        assert!(!rec("SPOTIFY AB", Some("")).has_meaningful_category());
        assert!(!rec("SPOTIFY AB", Some("   ")).has_meaningful_category());
    }

    #[test]
    fn real_category_is_meaningful() {
        assert!(rec("SPOTIFY AB", Some("Entertainment")).has_meaningful_category());
    }
}
