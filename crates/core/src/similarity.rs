use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Equality tolerance for amounts, absorbing rounding noise introduced by
/// currency parsing upstream.
pub fn default_amount_tolerance() -> Decimal {
    Decimal::new(5, 3) // 0.005
}

/// Collapses case, whitespace and punctuation variance so that semantically
/// identical merchant strings compare equal. Idempotent.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity of two descriptions in the range 0..=100, where 100 means the
/// normalized strings are equal and 0 means no shared content. Symmetric.
pub fn similarity(a: &str, b: &str) -> u8 {
    let a = normalize(a);
    let b = normalize(b);

    if a == b {
        return 100;
    }

    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 100;
    }

    let penalty = levenshtein_distance(&a, &b) * 100 / max_len;
    (100 - penalty.min(100)) as u8
}

/// Absolute day distance, or `None` when either date is absent. Callers treat
/// `None` as "unknown/large" rather than an error.
pub fn date_distance_days(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some((a - b).num_days().unsigned_abs()),
        _ => None,
    }
}

pub fn amounts_equal(a: Decimal, b: Decimal) -> bool {
    amounts_equal_within(a, b, default_amount_tolerance())
}

pub fn amounts_equal_within(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    (a - b).abs() <= tolerance
}

/// Levenshtein edit distance over chars using the two-row O(min(m,n)) space
/// algorithm. Char-based so that non-ASCII merchant strings ("LÖN") are
/// counted per glyph, not per byte.
fn levenshtein_distance(a: &[char], b: &[char]) -> usize {
    let (m, n) = (a.len(), b.len());

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    // Iterate the shorter string in the outer loop.
    let (a, b, m, n) = if m <= n { (a, b, m, n) } else { (b, a, n, m) };

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    #[test]
    fn normalize_collapses_case_and_punctuation() {
        assert_eq!(normalize("  SPOTIFY  AB "), "spotify ab");
        assert_eq!(normalize("Spotify*AB"), "spotify ab");
        assert_eq!(normalize("spotify ab"), "spotify ab");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("ICA Nära, Städet #42");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn similarity_of_identical_is_100() {
        assert_eq!(similarity("LÖN", "LÖN"), 100);
        assert_eq!(similarity("", ""), 100);
    }

    #[test]
    fn similarity_is_case_and_spacing_insensitive() {
        assert_eq!(similarity("SPOTIFY AB", "Spotify  AB"), 100);
    }

    #[test]
    fn similarity_is_symmetric() {
        assert_eq!(
            similarity("ICA Supermarket", "ICA Maxi"),
            similarity("ICA Maxi", "ICA Supermarket")
        );
    }

    #[test]
    fn similarity_of_unrelated_is_low() {
        assert!(similarity("SPOTIFY AB", "HYRA Q1") < 40);
    }

    #[test]
    fn similarity_against_empty_is_zero() {
        assert_eq!(similarity("SPOTIFY AB", ""), 0);
    }

    #[test]
    fn date_distance_counts_absolute_days() {
        assert_eq!(date_distance_days(d(2025, 4, 1), d(2025, 4, 30)), Some(29));
        assert_eq!(date_distance_days(d(2025, 4, 30), d(2025, 4, 1)), Some(29));
        assert_eq!(date_distance_days(d(2025, 4, 1), d(2025, 4, 1)), Some(0));
    }

    #[test]
    fn date_distance_unknown_when_either_missing() {
        assert_eq!(date_distance_days(None, d(2025, 4, 1)), None);
        assert_eq!(date_distance_days(d(2025, 4, 1), None), None);
        assert_eq!(date_distance_days(None, None), None);
    }

    #[test]
    fn amounts_equal_within_tolerance() {
        assert!(amounts_equal(Decimal::new(-11900, 2), Decimal::new(-11900, 2)));
        assert!(amounts_equal(Decimal::new(119004, 3), Decimal::new(119000, 3)));
        assert!(!amounts_equal(Decimal::new(-11900, 2), Decimal::new(-11901, 2)));
    }
}
