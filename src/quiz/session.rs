use std::collections::BTreeMap;

use crate::quiz::{OptionLetter, Quiz};

const SUBMISSION_PREAMBLE: &str = "Here are my answers to the quiz:";
const SUBMISSION_TRAILER: &str = "Please check my answers and give me detailed feedback on each one. Tell me which ones are correct and explain any mistakes.";
const NOT_ANSWERED: &str = "(Not answered)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Empty,
    PartiallyAnswered,
    FullyAnswered,
}

/// The student's answers to one rendered quiz.
///
/// Answers are keyed by question number. Submitting consumes the session, so a
/// retry of the same quiz starts from a fresh one.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuizSession {
    quiz_id: String,
    quiz: Quiz,
    answers: BTreeMap<u32, OptionLetter>,
}

impl QuizSession {
    pub fn new(quiz_id: impl Into<String>, quiz: Quiz) -> Self {
        Self {
            quiz_id: quiz_id.into(),
            quiz,
            answers: BTreeMap::new(),
        }
    }

    pub fn quiz_id(&self) -> &str {
        &self.quiz_id
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    /// Records `letter` for question `number`, replacing any earlier choice.
    ///
    /// Unknown questions and letters the question doesn't offer are ignored and
    /// reported with `false`.
    pub fn select(&mut self, number: u32, letter: OptionLetter) -> bool {
        let offered = self
            .quiz
            .question(number)
            .map_or(false, |question| question.options.contains(letter));
        if !offered {
            log::warn!(
                "Ignoring selection {}{} for quiz {}",
                number,
                letter,
                self.quiz_id
            );
            return false;
        }
        self.answers.insert(number, letter);
        true
    }

    pub fn selected(&self, number: u32) -> Option<OptionLetter> {
        self.answers.get(&number).copied()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn total(&self) -> usize {
        self.quiz.questions.len()
    }

    pub fn is_complete(&self) -> bool {
        self.answered_count() == self.total()
    }

    pub fn progress(&self) -> Progress {
        match self.answered_count() {
            0 => Progress::Empty,
            n if n < self.total() => Progress::PartiallyAnswered,
            _ => Progress::FullyAnswered,
        }
    }

    pub fn clear(&mut self) {
        self.answers.clear();
    }

    /// The message sent back to the tutor for grading.
    pub fn build_submission(self) -> String {
        let lines = self
            .quiz
            .questions
            .iter()
            .map(|question| match self.answers.get(&question.number) {
                Some(letter) => format!("{}. {}", question.number, letter),
                None => format!("{}. {}", question.number, NOT_ANSWERED),
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!("{}\n\n{}\n\n{}", SUBMISSION_PREAMBLE, lines, SUBMISSION_TRAILER)
    }
}
