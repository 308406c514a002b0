//! Prompt assembly for the completion model

/// Marker the model continues from
pub const ASSISTANT_MARKER: &str = "AI:";

/// Build the model prompt from trimmed history and the new user input
///
/// History lines come first (oldest to newest), then the new turn and the
/// trailing [`ASSISTANT_MARKER`]. No truncation happens here.
#[must_use]
pub fn assemble_prompt<S: AsRef<str>>(history: &[S], user_input: &str) -> String {
    let turn = format!("User: {user_input}");
    let mut lines: Vec<&str> = history.iter().map(AsRef::as_ref).collect();
    lines.push(&turn);
    lines.push(ASSISTANT_MARKER);
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::trim_history;

    #[test]
    fn test_empty_history() {
        let history: [&str; 0] = [];
        assert_eq!(assemble_prompt(&history, "Book a table"), "User: Book a table\nAI:");
    }

    #[test]
    fn test_history_precedes_new_turn() {
        let history = ["User: Hi\nAI: Hello", "User: How are you?\nAI: Fine."];
        assert_eq!(
            assemble_prompt(&history, "Great"),
            "User: Hi\nAI: Hello\nUser: How are you?\nAI: Fine.\nUser: Great\nAI:"
        );
    }

    #[test]
    fn test_ends_with_marker_after_input() {
        let history = ["User: a\nAI: b"];
        let prompt = assemble_prompt(&history, "tomorrow at noon");
        assert!(prompt.ends_with("\nUser: tomorrow at noon\nAI:"));
    }

    #[test]
    fn test_trimmed_out_history() {
        let trimmed = trim_history(&["User: Hi\nAI: Hello"], 3);
        assert_eq!(assemble_prompt(&trimmed, "Hey"), "User: Hey\nAI:");
    }

    #[test]
    fn test_trimmed_in_history() {
        let trimmed = trim_history(&["User: Hi\nAI: Hello"], 10);
        assert_eq!(
            assemble_prompt(&trimmed, "Hey"),
            "User: Hi\nAI: Hello\nUser: Hey\nAI:"
        );
    }
}
