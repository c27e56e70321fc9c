// src/matching/scoring.rs
use strsim::jaro_winkler;

/// Two tokens count as the same word at or above this Jaro-Winkler score.
pub const TOKEN_MATCH_THRESHOLD: f64 = 0.88;

/// Dice coefficient over whitespace tokens where tokens pair up greedily by
/// Jaro-Winkler instead of strict equality, so "GOVERMENT" still pairs with "GOVERNMENT".
pub fn soft_token_dice(a: &str, b: &str) -> f64 {
    let left: Vec<&str> = a.split_whitespace().collect();
    let right: Vec<&str> = b.split_whitespace().collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let mut used = vec![false; right.len()];
    let mut paired = 0usize;
    for token in &left {
        let mut best: Option<(f64, usize)> = None;
        for (j, other) in right.iter().enumerate() {
            if used[j] {
                continue;
            }
            let score = if token == other { 1.0 } else { jaro_winkler(token, other) };
            if score >= TOKEN_MATCH_THRESHOLD && best.map_or(true, |(s, _)| score > s) {
                best = Some((score, j));
            }
        }
        if let Some((_, j)) = best {
            used[j] = true;
            paired += 1;
        }
    }
    (2 * paired) as f64 / (left.len() + right.len()) as f64
}

/// Similarity of two normalized strings in [0, 1]; 1.0 only for identical text.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return if a.is_empty() { 0.0 } else { 1.0 };
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let score = jaro_winkler(a, b) * soft_token_dice(a, b);
    // Different strings must never tie with an exact match.
    score.min(1.0 - f64::EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_scores_one() {
        assert_eq!(similarity("GOVERNMENT MEDICAL COLLEGE", "GOVERNMENT MEDICAL COLLEGE"), 1.0);
        assert_eq!(similarity("", ""), 0.0);
        assert_eq!(similarity("MBBS", ""), 0.0);
    }

    #[test]
    fn test_typos_stay_high() {
        let s = similarity("GOVERMENT MEDICAL COLLEGE", "GOVERNMENT MEDICAL COLLEGE");
        assert!(s > 0.9 && s < 1.0, "score {}", s);
    }

    #[test]
    fn test_different_discipline_is_rejected() {
        let s = similarity("GOVERNMENT MEDICAL COLLEGE", "GOVERNMENT DENTAL COLLEGE");
        assert!(s < 0.75, "score {}", s);
        let s = similarity("NARAYANA MEDICAL COLLEGE", "GOVERNMENT MEDICAL COLLEGE");
        assert!(s < 0.75, "score {}", s);
    }

    #[test]
    fn test_soft_dice_counts_each_token_once() {
        assert_eq!(soft_token_dice("A A A", "A"), 0.5);
        assert_eq!(soft_token_dice("MD GENERAL MEDICINE", "MD GENERAL MEDICINE"), 1.0);
        assert_eq!(soft_token_dice("", "X"), 0.0);
    }
}
