//! Lexical (surface overlap) scoring.
//!
//! Dice coefficient over character bigrams, scaled to `0..=100`. Whitespace
//! is ignored and comparison is case-sensitive. Used as the cheap first stage
//! of duplicate detection so the semantic stage only sees plausible matches.

pub const MAX_SCORE: f64 = 100.0;

/// Score two texts by shared character bigrams.
///
/// Identical texts (after whitespace removal) score 100, including two empty
/// texts. A text with fewer than two characters scores 0 against anything
/// it is not identical to.
pub fn score(a: &str, b: &str) -> f64 {
    strsim::sorensen_dice(a, b) * MAX_SCORE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identical_strings_score_max() {
        assert_eq!(score("shared message", "shared message"), MAX_SCORE);
        assert_eq!(score("x", "x"), MAX_SCORE);
    }

    #[test]
    fn test_empty_strings() {
        assert_eq!(score("", ""), MAX_SCORE);
        assert_eq!(score("", "hello"), 0.0);
        assert_eq!(score("hello", ""), 0.0);
    }

    #[test]
    fn test_whitespace_is_ignored() {
        assert_eq!(score("a b c", "abc"), MAX_SCORE);
        assert_eq!(score("   ", ""), MAX_SCORE);
    }

    #[test]
    fn test_single_char_against_different_text() {
        assert_eq!(score("a", "ab"), 0.0);
        assert_eq!(score("ab", "a"), 0.0);
    }

    #[test]
    fn test_disjoint_strings_score_zero() {
        assert_eq!(score("abcd", "wxyz"), 0.0);
    }

    #[test]
    fn test_known_values() {
        // he ea al le ed / se ea al le ed -> 4 shared of 10
        assert!(approx(score("healed", "sealed"), 80.0));
        // ni ig gh ht / na ac ch ht -> 1 shared of 8
        assert!(approx(score("night", "nacht"), 25.0));
    }

    #[test]
    fn test_repeated_bigrams_are_consumed_once() {
        // {AA} vs {AA, AA, AA}: only one match available
        assert!(approx(score("AA", "AAAA"), 50.0));
    }

    #[test]
    fn test_case_sensitive() {
        assert!(score("Hello", "hello") < MAX_SCORE);
    }

    #[test]
    fn test_symmetry() {
        let samples = [
            "",
            "a",
            "hello world",
            "hello there world",
            "Reunião às 10h amanhã",
            "reunião amanhã às 10h",
            "aaaaab",
            "ab ab ab",
        ];
        for a in samples {
            for b in samples {
                assert_eq!(score(a, b), score(b, a), "score({a:?}, {b:?}) not symmetric");
            }
        }
    }

    #[test]
    fn test_bounded() {
        let samples = ["", "ab", "abab", "the quick brown fox", "quick brown"];
        for a in samples {
            for b in samples {
                let s = score(a, b);
                assert!((0.0..=MAX_SCORE).contains(&s));
            }
        }
    }

    #[test]
    fn test_unicode_does_not_split_code_points() {
        let s = score("日本語のテキスト", "日本語のテキスト!");
        assert!(s > 80.0 && s < MAX_SCORE);
    }
}
