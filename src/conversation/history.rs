//! Conversation history trimming
//!
//! Token counts here are whitespace-delimited words, a cheap stand-in for the
//! model's tokenizer that keeps prompts inside the context window.

use crate::db::Interaction;

/// Default token budget for conversation history
pub const DEFAULT_TOKEN_BUDGET: usize = 300;

/// Approximate the number of model tokens in `text`
#[must_use]
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Render a stored interaction as a prompt history entry
#[must_use]
pub fn format_interaction(interaction: &Interaction) -> String {
    format!(
        "User: {}\nAI: {}",
        interaction.user_input, interaction.ai_response
    )
}

/// Select the history entries that fit within `budget` tokens
///
/// `newest_first` is ordered newest to oldest, the way the store returns it.
/// Entries are accumulated starting from the oldest; accumulation stops at the
/// first entry that would push the total over `budget`, and that entry and
/// everything newer is dropped. The result is ordered oldest to newest.
#[must_use]
pub fn trim_history<S: AsRef<str>>(newest_first: &[S], budget: usize) -> Vec<String> {
    let mut trimmed = Vec::new();
    let mut total = 0;

    for entry in newest_first.iter().rev() {
        let entry = entry.as_ref();
        let tokens = count_tokens(entry);
        if total + tokens > budget {
            break;
        }
        trimmed.push(entry.to_string());
        total += tokens;
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_tokens(entries: &[String]) -> usize {
        entries.iter().map(|e| count_tokens(e)).sum()
    }

    #[test]
    fn test_count_tokens() {
        assert_eq!(count_tokens(""), 0);
        assert_eq!(count_tokens("   "), 0);
        assert_eq!(count_tokens("User: Hi\nAI: Hello"), 4);
        assert_eq!(count_tokens("  spaced\t\tout\n words "), 3);
    }

    #[test]
    fn test_format_interaction() {
        let interaction = Interaction::new("u1", "Hi", "Hello", "2024-01-01 10:00:00");
        assert_eq!(format_interaction(&interaction), "User: Hi\nAI: Hello");
    }

    #[test]
    fn test_entry_over_budget_is_excluded() {
        let history = ["User: Hi\nAI: Hello"];
        assert!(trim_history(&history, 3).is_empty());
    }

    #[test]
    fn test_entry_within_budget_is_kept() {
        let history = ["User: Hi\nAI: Hello"];
        assert_eq!(trim_history(&history, 10), vec!["User: Hi\nAI: Hello"]);
    }

    #[test]
    fn test_output_is_oldest_first() {
        let newest_first = ["third", "second", "first"];
        assert_eq!(
            trim_history(&newest_first, 10),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn test_stops_at_first_overflow() {
        // Oldest-first: [2 tokens, 5 tokens, 1 token]. Budget 4 keeps only the
        // oldest; the 1-token entry after the overflow is not considered.
        let newest_first = ["c", "b b b b b", "a a"];
        assert_eq!(trim_history(&newest_first, 4), vec!["a a"]);
    }

    #[test]
    fn test_oversized_oldest_entry_drops_everything() {
        let newest_first = ["small", "one two three four five six"];
        assert!(trim_history(&newest_first, 5).is_empty());
    }

    #[test]
    fn test_exact_budget_is_allowed() {
        let newest_first = ["c c", "b b", "a a"];
        let trimmed = trim_history(&newest_first, 6);
        assert_eq!(trimmed.len(), 3);
        assert_eq!(total_tokens(&trimmed), 6);
    }

    #[test]
    fn test_zero_budget() {
        let newest_first = ["a", "b"];
        assert!(trim_history(&newest_first, 0).is_empty());
    }

    #[test]
    fn test_total_never_exceeds_budget() {
        let newest_first: Vec<String> = (1..=12)
            .map(|n| vec!["word"; n].join(" "))
            .collect();

        for budget in 0..100 {
            let trimmed = trim_history(&newest_first, budget);
            assert!(total_tokens(&trimmed) <= budget);

            // Maximal: the next older-than-excluded entry would overflow
            let oldest_first: Vec<&String> = newest_first.iter().rev().collect();
            if let Some(next) = oldest_first.get(trimmed.len()) {
                assert!(total_tokens(&trimmed) + count_tokens(next) > budget);
            }
        }
    }

    #[test]
    fn test_trimming_is_idempotent() {
        let newest_first = ["x y z", "a b", "c d e f", "g"];
        for budget in [0, 1, 3, 5, 9, 20] {
            let once = trim_history(&newest_first, budget);
            // Re-trimming expects newest-first input
            let newest_again: Vec<String> = once.iter().rev().cloned().collect();
            let twice = trim_history(&newest_again, budget);
            assert_eq!(once, twice);
        }
    }
}
