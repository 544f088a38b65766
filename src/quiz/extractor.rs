//! Finds multiple-choice quizzes in free-form tutor replies.
//!
//! The tutor is asked to write quizzes as numbered questions followed by
//! lettered options, but the model is not consistent about it: options come as
//! `A)`, `a.`, `**B.**` and so on. Extraction is a cheap rejection gate
//! followed by a line-oriented parser that skips malformed questions instead of
//! failing the whole quiz.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::quiz::{OptionLetter, Options, Question, Quiz};

static NUMBERED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t*]*\d+[.)]").expect("valid numbered line regex"));
static LETTERED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t*]*[A-Da-d][.)]").expect("valid lettered line regex"));

static OPTION_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Da-d])[.)]\s*").expect("valid option label regex"));
static QUESTION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)[.)]\s*(.*)$").expect("valid question line regex"));
static OPTION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-D])\)\s*(.*)$").expect("valid option line regex"));

/// Extracts the quiz contained in `text`, if there is one.
///
/// Never fails: text without a well-formed question yields `None`.
pub fn extract(text: &str) -> Option<Quiz> {
    if !looks_like_quiz(text) {
        return None;
    }

    let lines: Vec<String> = text.lines().map(normalize_line).collect();
    let mut parser = Parser::default();
    for (index, line) in lines.iter().enumerate() {
        parser.feed(index, classify(line));
    }
    let (first_marker, questions) = parser.finish();

    // Skipped questions still end the intro
    let intro = lines[..first_marker?].join("\n").trim().to_string();
    log::debug!("Extracted a quiz with {} questions", questions.len());

    Quiz::new(intro, questions)
}

/// Both a numbered line and a lettered line have to be present somewhere.
fn looks_like_quiz(text: &str) -> bool {
    NUMBERED_LINE.is_match(text) && LETTERED_LINE.is_match(text)
}

/// Drops emphasis markers and rewrites `a.`, `a)` and `A.` labels as `A)`.
fn normalize_line(line: &str) -> String {
    let line = line.replace('*', "");
    let line = line.trim();
    match OPTION_LABEL.captures(line) {
        Some(caps) => {
            let letter = caps[1].to_ascii_uppercase();
            format!("{}) {}", letter, &line[caps[0].len()..])
        }
        None => line.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Line<'a> {
    Blank,
    Question { number: u32, text: &'a str },
    Option { letter: OptionLetter, text: &'a str },
    Text(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    if line.is_empty() {
        return Line::Blank;
    }
    if let Some(caps) = QUESTION_LINE.captures(line) {
        // A numeral that doesn't fit is just prose
        if let Ok(number) = caps[1].parse::<u32>() {
            let text = caps.get(2).map_or("", |m| m.as_str()).trim();
            return Line::Question { number, text };
        }
    }
    if let Some(caps) = OPTION_LINE.captures(line) {
        let letter = caps[1].chars().next().and_then(OptionLetter::from_char);
        if let Some(letter) = letter {
            let text = caps.get(2).map_or("", |m| m.as_str()).trim();
            return Line::Option { letter, text };
        }
    }
    Line::Text(line)
}

#[derive(Debug)]
struct Pending {
    number: u32,
    text: Vec<String>,
    options: Vec<String>,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    AwaitingQuestion,
    InQuestion(Pending),
    InOptions(Pending),
    /// The current question is malformed, wait for the next numbered line.
    Skipping,
}

#[derive(Debug, Default)]
struct Parser {
    state: State,
    /// Line index of the first numbered line, kept or not.
    first_marker: Option<usize>,
    parsed: Vec<Question>,
    seen_numbers: HashSet<u32>,
}

impl Parser {
    fn feed(&mut self, index: usize, line: Line<'_>) {
        let state = std::mem::take(&mut self.state);
        self.state = match (state, line) {
            (state, Line::Blank) => state,
            (state, Line::Question { number, text }) => {
                self.close(state);
                self.first_marker.get_or_insert(index);
                let mut pending = Pending {
                    number,
                    text: Vec::new(),
                    options: Vec::new(),
                };
                if !text.is_empty() {
                    pending.text.push(text.to_string());
                }
                State::InQuestion(pending)
            }
            (State::InQuestion(mut pending), Line::Option { letter, text })
            | (State::InOptions(mut pending), Line::Option { letter, text }) => {
                if text.is_empty() || pending.expected_letter() != Some(letter) {
                    State::Skipping
                } else {
                    pending.options.push(text.to_string());
                    State::InOptions(pending)
                }
            }
            (State::InQuestion(mut pending), Line::Text(text)) => {
                pending.text.push(text.to_string());
                State::InQuestion(pending)
            }
            // Prose after the options ends the question
            (State::InOptions(pending), Line::Text(_)) => {
                self.close(State::InOptions(pending));
                State::AwaitingQuestion
            }
            (state @ (State::AwaitingQuestion | State::Skipping), _) => state,
        };
    }

    fn finish(mut self) -> (Option<usize>, Vec<Question>) {
        let state = std::mem::take(&mut self.state);
        self.close(state);
        (self.first_marker, self.parsed)
    }

    fn close(&mut self, state: State) {
        let State::InOptions(pending) = state else {
            return;
        };
        if self.seen_numbers.contains(&pending.number) {
            log::debug!("Skipping repeated question number {}", pending.number);
            return;
        }
        let Some(text) = question_text(&pending.text) else {
            return;
        };
        let Some(options) = Options::from_run(pending.options) else {
            log::debug!("Skipping question {} with an incomplete option run", pending.number);
            return;
        };
        self.seen_numbers.insert(pending.number);
        self.parsed.push(Question::new(pending.number, text, options));
    }
}

impl Pending {
    fn expected_letter(&self) -> Option<OptionLetter> {
        OptionLetter::ALL.get(self.options.len()).copied()
    }
}

/// Joins the question lines and makes the text end with exactly one `?`.
fn question_text(lines: &[String]) -> Option<String> {
    let joined = lines.join(" ");
    let stem = joined.trim().trim_end_matches('?').trim_end();
    if stem.is_empty() {
        return None;
    }
    Some(format!("{}?", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = "¡Vamos a practicar! Choose the right form.

1. ¿Cómo te llamas?
A) Me llamo Ana
B) Soy de Madrid
C) Tengo veinte años

2. ¿De dónde eres?
A) Soy de Hong Kong
B) Estudio español
C) Vivo en el campus
D) Me gusta el café

3. ¿Qué estudias?
A) Estudio derecho
B) Como en la cafetería
C) Voy a la biblioteca";

    fn letters(question: &Question) -> Vec<OptionLetter> {
        question.options.letters().collect()
    }

    #[test]
    fn prose_is_not_a_quiz() {
        assert_eq!(extract(""), None);
        assert_eq!(extract("¡Hola! Hoy hablamos del verbo ser."), None);
        assert_eq!(extract("1. Primero, repasa el vocabulario.\n2. Después, practica."), None);
        assert_eq!(extract("A) una opción suelta\nB) otra"), None);
    }

    #[test]
    fn extracts_well_formed_quiz() {
        let quiz = extract(CANONICAL).unwrap();
        assert_eq!(quiz.intro, "¡Vamos a practicar! Choose the right form.");
        assert_eq!(quiz.questions.len(), 3);

        let first = &quiz.questions[0];
        assert_eq!(first.number, 1);
        assert_eq!(first.text, "¿Cómo te llamas?");
        assert_eq!(letters(first), vec![OptionLetter::A, OptionLetter::B, OptionLetter::C]);
        assert_eq!(first.options.get(OptionLetter::A), Some("Me llamo Ana"));

        assert_eq!(quiz.questions[1].options.len(), 4);
        assert_eq!(quiz.questions[1].options.get(OptionLetter::D), Some("Me gusta el café"));
    }

    #[test]
    fn mixed_formatting_extracts_like_canonical() {
        let messy = "¡Vamos a practicar! **Choose** the right form.

**1.** ¿Cómo te llamas?
a. Me llamo Ana
**B)** Soy de Madrid
c) Tengo veinte años

2) **¿De dónde eres?**
A. Soy de Hong Kong
b) Estudio español
C. Vivo en el campus
d. Me gusta el café

**3. ¿Qué estudias?**
*A)* Estudio derecho
B) Como en la cafetería
c. Voy a la biblioteca";

        assert_eq!(extract(messy), extract(CANONICAL));
    }

    #[test]
    fn question_missing_option_c_is_skipped() {
        let text = "1. ¿Cómo estás?
A) Bien
B) Mal
2. ¿Dónde vives?
A) En Hong Kong
B) En Madrid
C) En Lima";
        let quiz = extract(text).unwrap();
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].number, 2);
        assert_eq!(quiz.intro, "");
    }

    #[test]
    fn intro_stops_at_a_skipped_question() {
        let text = "Practiquemos un poco.

1. ¿Cómo estás?
A) Bien
B) Mal

2. ¿Dónde vives?
A) En Hong Kong
B) En Madrid
C) En Lima";
        let quiz = extract(text).unwrap();
        assert_eq!(quiz.intro, "Practiquemos un poco.");
        assert!(!quiz.intro.contains("Bien"));
        assert_eq!(quiz.questions[0].number, 2);
    }

    #[test]
    fn non_contiguous_letters_are_skipped() {
        let text = "1. ¿Qué hora es?
A) Es la una
B) Son las dos
D) Son las tres
2. ¿Qué día es hoy?
A) Lunes
B) Martes
C) Miércoles";
        let quiz = extract(text).unwrap();
        let numbers: Vec<u32> = quiz.questions.iter().map(|q| q.number).collect();
        assert_eq!(numbers, vec![2]);
    }

    #[test]
    fn fifth_option_spoils_the_question() {
        let text = "1. ¿Color?
A) rojo
B) azul
C) verde
D) negro
D) blanco";
        assert_eq!(extract(text), None);
    }

    #[test]
    fn only_malformed_questions_means_no_quiz() {
        let text = "1. ¿Cómo estás?\nA) Bien\nB) Mal\n\nGood luck!";
        assert_eq!(extract(text), None);
    }

    #[test]
    fn trailing_prose_is_ignored() {
        let text = format!("{}\n\nGood luck, you can do this!", CANONICAL);
        let quiz = extract(&text).unwrap();
        assert_eq!(quiz.questions.len(), 3);
        assert!(!quiz.intro.contains("Good luck"));
        for question in &quiz.questions {
            assert!(!question.text.contains("Good luck"));
            for (_, option) in question.options.iter() {
                assert!(!option.contains("Good luck"));
            }
        }
        assert_eq!(
            quiz.questions[2].options.get(OptionLetter::C),
            Some("Voy a la biblioteca")
        );
    }

    #[test]
    fn question_text_always_ends_with_one_question_mark() {
        let text = "1. Completa: Yo ___ estudiante
A) soy
B) es
C) son

2. ¿Tú eres de Madrid??
A) Sí
B) No
C) Quizás";
        let quiz = extract(text).unwrap();
        assert_eq!(quiz.questions[0].text, "Completa: Yo ___ estudiante?");
        assert_eq!(quiz.questions[1].text, "¿Tú eres de Madrid?");
    }

    #[test]
    fn question_text_can_span_lines() {
        let text = "1. Lee la frase:
\"Mi compañera de piso ___ muy simpática.\"
¿Qué verbo falta?
A) es
B) está
C) son";
        let quiz = extract(text).unwrap();
        assert_eq!(
            quiz.questions[0].text,
            "Lee la frase: \"Mi compañera de piso ___ muy simpática.\" ¿Qué verbo falta?"
        );
    }

    #[test]
    fn numbers_are_kept_as_written() {
        let text = "4. ¿Uno?
A) x
B) y
C) z
2. ¿Dos?
A) x
B) y
C) z";
        let quiz = extract(text).unwrap();
        let numbers: Vec<u32> = quiz.questions.iter().map(|q| q.number).collect();
        assert_eq!(numbers, vec![4, 2]);
    }

    #[test]
    fn repeated_numbers_keep_the_first_question() {
        let text = "1. ¿Uno?
A) x
B) y
C) z
1. ¿Otra vez uno?
A) x
B) y
C) z";
        let quiz = extract(text).unwrap();
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].text, "¿Uno?");
    }

    #[test]
    fn huge_numerals_do_not_panic() {
        let text = "99999999999999999999. ¿Grande?\nA) x\nB) y\nC) z";
        assert_eq!(extract(text), None);
    }

    #[test]
    fn normalizes_option_labels() {
        assert_eq!(normalize_line("  a. soy  "), "A) soy");
        assert_eq!(normalize_line("**c)** es"), "C) es");
        assert_eq!(normalize_line("B.está"), "B) está");
        assert_eq!(normalize_line("Ana estudia."), "Ana estudia.");
    }
}
