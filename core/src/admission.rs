//! Content admission gate for AI counselor comments.
//!
//! A cheap, deterministic filter that decides whether an entry's text is
//! substantial enough to spend a model call on. Short-but-dense Japanese
//! text is not penalized the way space-delimited scripts are: the word-count
//! rules only apply when the text contains no CJK characters.
//!
//! The gate runs twice per entry: once when the comment job is scheduled and
//! again when the job executes, because the entry may have been edited in
//! between and the gate stays authoritative at the point of spend.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Minimum number of non-whitespace characters for any script.
pub const MIN_COMPACT_CHARS: usize = 40;
/// Minimum normalized length for text without CJK characters.
const MIN_NORMALIZED_CHARS_NON_CJK: usize = 80;
/// Minimum whitespace-delimited word count for non-CJK text...
const MIN_WORDS_NON_CJK: usize = 15;
/// ...unless the compact length alone reaches this.
const DENSE_COMPACT_CHARS: usize = 80;
/// Minimum number of distinct characters; catches repeated-character spam.
const MIN_DISTINCT_CHARS: usize = 5;

/// Why an entry was not admitted. Stable wire codes, stored in entry and job
/// metadata for operators and the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Empty,
    TooShort,
    LowWordCount,
    LowVariance,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Empty => "empty",
            SkipReason::TooShort => "too_short",
            SkipReason::LowWordCount => "low_word_count",
            SkipReason::LowVariance => "low_variance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Admit,
    Skip { reason: SkipReason },
}

impl AdmissionDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionDecision::Admit)
    }
}

/// Decide whether `text` qualifies for a generated counselor comment.
///
/// Pure and deterministic; all lengths are counted in `char`s, not bytes, so
/// Japanese text is not over-counted.
pub fn evaluate_admission(text: &str) -> AdmissionDecision {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return AdmissionDecision::Skip {
            reason: SkipReason::Empty,
        };
    }

    let compact_len = compact.chars().count();
    if compact_len < MIN_COMPACT_CHARS {
        return AdmissionDecision::Skip {
            reason: SkipReason::TooShort,
        };
    }

    if !compact.chars().any(is_cjk) {
        let normalized = normalize_whitespace(text);
        if normalized.chars().count() < MIN_NORMALIZED_CHARS_NON_CJK {
            return AdmissionDecision::Skip {
                reason: SkipReason::TooShort,
            };
        }
        let word_count = normalized.split_whitespace().count();
        if word_count < MIN_WORDS_NON_CJK && compact_len < DENSE_COMPACT_CHARS {
            return AdmissionDecision::Skip {
                reason: SkipReason::LowWordCount,
            };
        }
    }

    let distinct: HashSet<char> = compact.chars().collect();
    if distinct.len() < MIN_DISTINCT_CHARS {
        return AdmissionDecision::Skip {
            reason: SkipReason::LowVariance,
        };
    }

    AdmissionDecision::Admit
}

/// Collapse runs of whitespace to single spaces and trim the ends.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hiragana, Katakana, CJK unified ideographs, CJK symbols and punctuation.
fn is_cjk(c: char) -> bool {
    matches!(
        c,
        '\u{3000}'..='\u{303F}'
            | '\u{3040}'..='\u{309F}'
            | '\u{30A0}'..='\u{30FF}'
            | '\u{4E00}'..='\u{9FFF}'
    )
}

#[cfg(test)]
mod tests {
    use super::{evaluate_admission, AdmissionDecision, SkipReason};

    fn skip_reason(text: &str) -> Option<SkipReason> {
        match evaluate_admission(text) {
            AdmissionDecision::Admit => None,
            AdmissionDecision::Skip { reason } => Some(reason),
        }
    }

    /// n chars cycling through five distinct kana, so variance never trips.
    fn kana(n: usize) -> String {
        "あいうえお".chars().cycle().take(n).collect()
    }

    #[test]
    fn empty_and_whitespace_only_are_rejected_as_empty() {
        assert_eq!(skip_reason(""), Some(SkipReason::Empty));
        assert_eq!(skip_reason("   \n\t  "), Some(SkipReason::Empty));
    }

    #[test]
    fn compact_length_boundary_at_forty_chars() {
        assert_eq!(skip_reason(&kana(1)), Some(SkipReason::TooShort));
        assert_eq!(skip_reason(&kana(39)), Some(SkipReason::TooShort));
        assert_eq!(evaluate_admission(&kana(40)), AdmissionDecision::Admit);
        // Whitespace does not count toward the compact length
        let spaced = kana(39)
            .chars()
            .flat_map(|c| [c, ' '])
            .collect::<String>();
        assert_eq!(skip_reason(&spaced), Some(SkipReason::TooShort));
    }

    #[test]
    fn repeated_character_spam_is_low_variance_regardless_of_length() {
        assert_eq!(skip_reason(&"あ".repeat(100)), Some(SkipReason::LowVariance));
        assert_eq!(skip_reason(&"aXbY".repeat(30)), Some(SkipReason::LowVariance));
    }

    #[test]
    fn short_non_cjk_text_is_too_short_even_past_forty_compact_chars() {
        // 10 words, compact length 59: past the 40-char floor but under the
        // 80-char normalized floor for non-CJK text.
        let text = "slowly breathe during stress helps people remain calmer inside today";
        assert_eq!(text.split_whitespace().count(), 10);
        assert!(text.chars().count() < 80);
        assert_eq!(skip_reason(text), Some(SkipReason::TooShort));
    }

    #[test]
    fn long_but_sparse_non_cjk_text_is_low_word_count() {
        // 10 words, 85 normalized chars, 76 compact — long enough overall
        // but too few words and not dense enough to compensate.
        let words = ["breathing", "exercises", "genuinely", "helped", "whenever",
            "yesterday", "overwhelm", "appeared", "quite", "fast"];
        let text = words.join(" ");
        assert_eq!(text.split_whitespace().count(), 10);
        assert!(text.chars().count() >= 80);
        assert!(text.chars().filter(|c| !c.is_whitespace()).count() < 80);
        assert_eq!(skip_reason(&text), Some(SkipReason::LowWordCount));
    }

    #[test]
    fn wordy_non_cjk_text_is_admitted() {
        let text = "Today I finally talked to my manager about the workload \
                    and it went better than I feared, so next week I will try \
                    to leave the office before seven every day.";
        assert!(text.split_whitespace().count() >= 15);
        assert_eq!(evaluate_admission(text), AdmissionDecision::Admit);
    }

    #[test]
    fn dense_non_cjk_text_passes_without_fifteen_words() {
        // Fewer than 15 words, but 80+ compact chars (e.g. agglutinated or
        // unspaced text) is accepted as dense.
        let words = ["concentration", "deteriorated", "significantly",
            "throughout", "yesterday", "afternoon", "productivity", "meetings"];
        let text = words.join(" ");
        assert!(text.split_whitespace().count() < 15);
        assert!(text.chars().filter(|c| !c.is_whitespace()).count() >= 80);
        assert_eq!(evaluate_admission(&text), AdmissionDecision::Admit);
    }

    #[test]
    fn japanese_diary_text_is_admitted_at_forty_chars() {
        let text = "今日は朝から気分が重かったけれど、昼に散歩へ出たら少しだけ楽になった。夜は早めに休む。";
        assert!(text.chars().filter(|c| !c.is_whitespace()).count() >= 40);
        assert_eq!(evaluate_admission(text), AdmissionDecision::Admit);
    }
}
