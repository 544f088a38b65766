//! Picks the chat model for a message: the fast one for everyday chat, the
//! smart one for explanations and grading.

use crate::tutor::prompt::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ModelTier {
    Fast,
    Smart,
}

/// Button commands don't need a classification round trip.
pub fn tier_for_command(message: &str) -> Option<ModelTier> {
    match Action::from_command(message.trim())? {
        Action::ExplainMore => Some(ModelTier::Smart),
        Action::Practice | Action::MoreExamples | Action::Roleplay => Some(ModelTier::Fast),
    }
}

pub fn classifier_prompt(message: &str) -> String {
    format!(
        "You route messages for a Spanish tutoring assistant.
Answer with exactly one word.
FAST: greetings, small talk, vocabulary lookups, translations of single words, requests for more examples or practice.
SMART: grammar explanations, corrections of the student's Spanish, grading quiz answers, anything that needs careful reasoning.

Student message:
\"\"\"{}\"\"\"",
        message
    )
}

pub fn parse_verdict(verdict: &str) -> Option<ModelTier> {
    let verdict = verdict.to_uppercase();
    match (verdict.contains("SMART"), verdict.contains("FAST")) {
        (true, false) => Some(ModelTier::Smart),
        (false, true) => Some(ModelTier::Fast),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdicts_are_read_loosely() {
        assert_eq!(parse_verdict("SMART"), Some(ModelTier::Smart));
        assert_eq!(parse_verdict(" fast.\n"), Some(ModelTier::Fast));
        assert_eq!(parse_verdict("**Smart**"), Some(ModelTier::Smart));
        assert_eq!(parse_verdict("either FAST or SMART"), None);
        assert_eq!(parse_verdict("no idea"), None);
    }

    #[test]
    fn commands_skip_classification() {
        assert_eq!(tier_for_command("BUTTON_EXPLAIN"), Some(ModelTier::Smart));
        assert_eq!(tier_for_command("BUTTON_EXERCISE"), Some(ModelTier::Fast));
        assert_eq!(tier_for_command("¿Qué significa 'piso'?"), None);
    }

    #[test]
    fn classifier_prompt_quotes_the_message() {
        assert!(classifier_prompt("¿Por qué 'soy' y no 'estoy'?")
            .ends_with("\"\"\"¿Por qué 'soy' y no 'estoy'?\"\"\""));
    }
}
