//! Counselor prompt construction.
//!
//! Builds the single instruction message appended to a fresh conversation
//! thread per comment job. The retrieved knowledge block is internal-only:
//! the model is told to use it as background and never to quote it or
//! present it as a reference.

use crate::diary::{EntryProjection, KnowledgeSnippet};

/// Upper bound on retrieved snippets included in the prompt, to keep the
/// instruction size predictable.
pub const MAX_PROMPT_SNIPPETS: usize = 5;

const ANONYMOUS_AUTHOR: &str = "anonymous";

/// Build the full counselor instruction text for one diary entry.
pub fn build_counselor_prompt(entry: &EntryProjection, snippets: &[KnowledgeSnippet]) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "You are an experienced mental-health counselor writing a short, caring \
         comment on a user's diary entry.\n\n",
    );

    let author = entry
        .author_display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(ANONYMOUS_AUTHOR);
    prompt.push_str(&format!("Writer: {author}\n"));

    if let Some(date) = entry.journal_date {
        prompt.push_str(&format!("Journal date: {}\n", date.format("%Y-%m-%d")));
    }
    if let Some(emotion) = non_empty(entry.emotion_label.as_deref()) {
        prompt.push_str(&format!("Primary emotion: {emotion}\n"));
    }
    if let Some(mood) = non_empty(entry.mood_label.as_deref()) {
        prompt.push_str(&format!("Mood: {mood}\n"));
    }
    if let Some(summary) = non_empty(entry.event_summary.as_deref()) {
        prompt.push_str(&format!("What happened: {summary}\n"));
    }
    if let Some(realization) = non_empty(entry.realization.as_deref()) {
        prompt.push_str(&format!("What the writer realized: {realization}\n"));
    }

    prompt.push_str("\nDiary entry:\n");
    prompt.push_str(entry.content.trim());
    prompt.push('\n');

    if !snippets.is_empty() {
        prompt.push_str("\nBackground knowledge (internal use only):\n");
        for snippet in snippets.iter().take(MAX_PROMPT_SNIPPETS) {
            match non_empty(snippet.title.as_deref()) {
                Some(title) => {
                    prompt.push_str(&format!("- {}: {}\n", title, snippet.content.trim()))
                }
                None => prompt.push_str(&format!("- {}\n", snippet.content.trim())),
            }
        }
        prompt.push_str(
            "Use this background only to inform your reply. Never quote it \
             verbatim, cite it, or reveal that reference material exists.\n",
        );
    }

    prompt.push_str(
        "\nWrite your comment now. Constraints:\n\
         - 5 to 10 lines.\n\
         - Warm and non-judgmental; a formal but caring register.\n\
         - Reflect concretely and empathetically on what the writer experienced.\n\
         - Offer exactly one small, actionable suggestion.\n\
         - No emoji.\n",
    );

    prompt
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::{build_counselor_prompt, MAX_PROMPT_SNIPPETS};
    use crate::diary::{EntryProjection, KnowledgeSnippet};

    fn entry() -> EntryProjection {
        EntryProjection {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            title: Some("A heavy Monday".to_string()),
            content: "Work was overwhelming today and I barely slept.".to_string(),
            event_summary: Some("Deadline moved up by two weeks".to_string()),
            realization: Some("I never ask for help until it is too late".to_string()),
            emotion_label: Some("anxiety".to_string()),
            mood_label: Some("low".to_string()),
            journal_date: NaiveDate::from_ymd_opt(2025, 11, 4),
            author_display_name: Some("Yuki".to_string()),
        }
    }

    fn snippet(content: &str) -> KnowledgeSnippet {
        KnowledgeSnippet {
            title: None,
            content: content.to_string(),
            score: 0.9,
        }
    }

    #[test]
    fn includes_profile_fields_and_body() {
        let prompt = build_counselor_prompt(&entry(), &[]);
        assert!(prompt.contains("Writer: Yuki"));
        assert!(prompt.contains("Journal date: 2025-11-04"));
        assert!(prompt.contains("Primary emotion: anxiety"));
        assert!(prompt.contains("What happened: Deadline moved up"));
        assert!(prompt.contains("Work was overwhelming today"));
        assert!(prompt.contains("No emoji"));
    }

    #[test]
    fn falls_back_to_anonymous_when_display_name_is_missing_or_blank() {
        let mut e = entry();
        e.author_display_name = None;
        assert!(build_counselor_prompt(&e, &[]).contains("Writer: anonymous"));
        e.author_display_name = Some("   ".to_string());
        assert!(build_counselor_prompt(&e, &[]).contains("Writer: anonymous"));
    }

    #[test]
    fn omits_optional_lines_when_fields_are_absent() {
        let mut e = entry();
        e.emotion_label = None;
        e.event_summary = None;
        let prompt = build_counselor_prompt(&e, &[]);
        assert!(!prompt.contains("Primary emotion:"));
        assert!(!prompt.contains("What happened:"));
    }

    #[test]
    fn knowledge_block_is_present_only_with_snippets_and_is_capped() {
        let without = build_counselor_prompt(&entry(), &[]);
        assert!(!without.contains("Background knowledge"));

        let snippets: Vec<_> = (0..8).map(|i| snippet(&format!("fact {i}"))).collect();
        let with = build_counselor_prompt(&entry(), &snippets);
        assert!(with.contains("Background knowledge (internal use only):"));
        assert!(with.contains("Never quote it"));
        for i in 0..MAX_PROMPT_SNIPPETS {
            assert!(with.contains(&format!("fact {i}")));
        }
        assert!(!with.contains(&format!("fact {MAX_PROMPT_SNIPPETS}")));
    }

    #[test]
    fn titled_snippets_are_labeled() {
        let s = KnowledgeSnippet {
            title: Some("Sleep hygiene".to_string()),
            content: "Consistent wake times stabilize mood.".to_string(),
            score: 0.8,
        };
        let prompt = build_counselor_prompt(&entry(), &[s]);
        assert!(prompt.contains("- Sleep hygiene: Consistent wake times"));
    }
}
