//! Deterministic alias-key normalization (§9: "lower, NFKC, strip leading/
//! trailing punctuation, collapse internal whitespace"). Case-folds Latin
//! and Cyrillic alike via Unicode-aware `to_lowercase`.

use unicode_normalization::UnicodeNormalization;

pub fn normalize_alias(raw: &str) -> String {
    let nfkc: String = raw.nfkc().collect();
    let lowered = nfkc.to_lowercase();

    let collapsed = lowered
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    collapsed
        .trim_matches(|c: char| c.is_ascii_punctuation())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_collapses_whitespace() {
        assert_eq!(normalize_alias("  Hemoglobin   A1c "), "hemoglobin a1c");
    }

    #[test]
    fn strips_surrounding_punctuation() {
        assert_eq!(normalize_alias("(Glucose)"), "glucose");
    }

    #[test]
    fn case_folds_cyrillic() {
        assert_eq!(normalize_alias("ГЕМОГЛОБИН"), "гемоглобин");
    }

    #[test]
    fn idempotent() {
        let once = normalize_alias("  Hgb.  ");
        let twice = normalize_alias(&once);
        assert_eq!(once, twice);
    }
}
