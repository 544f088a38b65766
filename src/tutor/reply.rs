use once_cell::sync::Lazy;
use regex::Regex;

/// Lines starting with this marker are follow-up suggestions, not reply text.
pub const SUGGESTION_MARKER: &str = "SUGGESTION:";

const MAX_SUGGESTIONS: usize = 3;

/// Telegram rejects messages longer than this many characters.
pub const MESSAGE_LIMIT: usize = 4096;

static BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^*\n]+?)\*\*").expect("valid bold regex"));

/// Splits a raw tutor reply into the text shown to the student and the
/// suggestions offered as buttons.
pub fn split_suggestions(raw: &str) -> (String, Vec<String>) {
    let mut text = Vec::new();
    let mut suggestions = Vec::new();

    for line in raw.lines() {
        match suggestion(line) {
            Some(suggestion) => {
                if !suggestion.is_empty() && suggestions.len() < MAX_SUGGESTIONS {
                    suggestions.push(suggestion);
                }
            }
            None => text.push(line),
        }
    }

    (text.join("\n").trim().to_string(), suggestions)
}

fn suggestion(line: &str) -> Option<String> {
    let stripped = line.trim().trim_start_matches(['*', '-', ' ']);
    let head = stripped.get(..SUGGESTION_MARKER.len())?;
    if !head.eq_ignore_ascii_case(SUGGESTION_MARKER) {
        return None;
    }
    let rest = &stripped[SUGGESTION_MARKER.len()..];
    Some(rest.replace('*', "").trim().to_string())
}

/// Splits `text` into messages of at most `limit` characters, breaking
/// between lines where possible. Blank pieces are dropped.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for mut line in text.lines() {
        loop {
            let line_len = line.chars().count();
            let needed = if current.is_empty() {
                line_len
            } else {
                current_len + 1 + line_len
            };
            if needed <= limit {
                if !current.is_empty() {
                    current.push('\n');
                }
                current.push_str(line);
                current_len = needed;
                break;
            }
            if !current.is_empty() {
                push_piece(&mut pieces, std::mem::take(&mut current));
                current_len = 0;
                continue;
            }
            // One line longer than a whole message
            let cut = line.char_indices().nth(limit).map_or(line.len(), |(i, _)| i);
            push_piece(&mut pieces, line[..cut].to_string());
            line = &line[cut..];
        }
    }
    push_piece(&mut pieces, current);
    pieces
}

fn push_piece(pieces: &mut Vec<String>, piece: String) {
    if !piece.trim().is_empty() {
        pieces.push(piece);
    }
}

/// Escapes `text` for Telegram's HTML parse mode and turns `**bold**` into
/// `<b>bold</b>`.
pub fn to_html(text: &str) -> String {
    let escaped = teloxide::utils::html::escape(text);
    BOLD.replace_all(&escaped, "<b>$1</b>").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestions_are_split_out() {
        let raw = "¡Muy bien! \"Soy\" is used for identity.

SUGGESTION: Practice ser vs estar
**Suggestion:** Five more examples
- SUGGESTION: Roleplay at the cafeteria";
        let (text, suggestions) = split_suggestions(raw);
        assert_eq!(text, "¡Muy bien! \"Soy\" is used for identity.");
        assert_eq!(
            suggestions,
            vec![
                "Practice ser vs estar",
                "Five more examples",
                "Roleplay at the cafeteria"
            ]
        );
    }

    #[test]
    fn at_most_three_suggestions_are_kept() {
        let raw = "Hola\nSUGGESTION: a\nSUGGESTION:\nSUGGESTION: b\nSUGGESTION: c\nSUGGESTION: d";
        let (text, suggestions) = split_suggestions(raw);
        assert_eq!(text, "Hola");
        assert_eq!(suggestions, vec!["a", "b", "c"]);
    }

    #[test]
    fn replies_without_suggestions_are_untouched() {
        let raw = "1. ¿Cómo estás?\nA) Bien\nB) Mal\nC) Así así";
        let (text, suggestions) = split_suggestions(raw);
        assert_eq!(text, raw);
        assert!(suggestions.is_empty());
    }

    #[test]
    fn short_and_multibyte_lines_are_not_suggestions() {
        assert_eq!(suggestion("¿Sí?"), None);
        assert_eq!(suggestion("Sugerencia: algo"), None);
    }

    #[test]
    fn short_replies_stay_in_one_message() {
        assert_eq!(split_message("¡Hola!\n¿Qué tal?", MESSAGE_LIMIT), vec!["¡Hola!\n¿Qué tal?"]);
        assert!(split_message("  \n\n", MESSAGE_LIMIT).is_empty());
    }

    #[test]
    fn long_replies_break_between_lines() {
        let text = vec!["¿Qué tal? Muy bien, gracias."; 1000].join("\n");
        let pieces = split_message(&text, MESSAGE_LIMIT);
        assert!(pieces.len() > 1);
        assert!(pieces.iter().all(|p| p.chars().count() <= MESSAGE_LIMIT));
        assert_eq!(pieces.join("\n"), text);
    }

    #[test]
    fn oversized_lines_are_cut_on_char_boundaries() {
        let line = "á".repeat(5000);
        let pieces = split_message(&line, MESSAGE_LIMIT);
        let lens: Vec<usize> = pieces.iter().map(|p| p.chars().count()).collect();
        assert_eq!(lens, vec![4096, 904]);
    }

    #[test]
    fn bold_markup_becomes_html() {
        assert_eq!(to_html("**Soy** < 3 & más"), "<b>Soy</b> &lt; 3 &amp; más");
        assert_eq!(to_html("**1.** ¿Cómo estás?"), "<b>1.</b> ¿Cómo estás?");
        assert_eq!(to_html("**sin cerrar"), "**sin cerrar");
    }
}
