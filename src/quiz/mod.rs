pub mod extractor;
pub mod render;
pub mod session;

use std::fmt;

pub use extractor::extract;
pub use session::QuizSession;

/// A multiple-choice exercise found in a tutor reply.
///
/// Holds no answer key: the tutor withholds the answers
/// and grades the submission itself.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Quiz {
    pub intro: String,
    pub questions: Vec<Question>,
}

impl Quiz {
    /// Returns `None` for an empty question list, a quiz always has questions.
    pub fn new(intro: String, questions: Vec<Question>) -> Option<Self> {
        if questions.is_empty() {
            return None;
        }
        Some(Self { intro, questions })
    }

    pub fn question(&self, number: u32) -> Option<&Question> {
        self.questions.iter().find(|q| q.number == number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub number: u32,
    pub text: String,
    pub options: Options,
}

impl Question {
    pub fn new(number: u32, text: String, options: Options) -> Self {
        Self {
            number,
            text,
            options,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
}

impl OptionLetter {
    pub const ALL: [OptionLetter; 4] = [
        OptionLetter::A,
        OptionLetter::B,
        OptionLetter::C,
        OptionLetter::D,
    ];

    /// Case-insensitive, `'b'` and `'B'` are the same letter.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(OptionLetter::A),
            'B' => Some(OptionLetter::B),
            'C' => Some(OptionLetter::C),
            'D' => Some(OptionLetter::D),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            OptionLetter::A => 'A',
            OptionLetter::B => 'B',
            OptionLetter::C => 'C',
            OptionLetter::D => 'D',
        }
    }
}

impl fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// The options of one question: A, B and C are always there, D is optional.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Options {
    a: String,
    b: String,
    c: String,
    d: Option<String>,
}

impl Options {
    /// Builds the options from texts given in A, B, C, (D) order.
    ///
    /// Rejects runs with fewer than three or more than four entries, and runs
    /// with an empty text.
    pub fn from_run(run: Vec<String>) -> Option<Self> {
        if !(3..=4).contains(&run.len()) || run.iter().any(|text| text.trim().is_empty()) {
            return None;
        }
        let mut run = run.into_iter();
        let a = run.next()?;
        let b = run.next()?;
        let c = run.next()?;
        let d = run.next();
        Some(Self { a, b, c, d })
    }

    pub fn get(&self, letter: OptionLetter) -> Option<&str> {
        match letter {
            OptionLetter::A => Some(&self.a),
            OptionLetter::B => Some(&self.b),
            OptionLetter::C => Some(&self.c),
            OptionLetter::D => self.d.as_deref(),
        }
    }

    pub fn contains(&self, letter: OptionLetter) -> bool {
        self.get(letter).is_some()
    }

    pub fn len(&self) -> usize {
        if self.d.is_some() {
            4
        } else {
            3
        }
    }

    pub fn letters(&self) -> impl Iterator<Item = OptionLetter> + '_ {
        self.iter().map(|(letter, _)| letter)
    }

    pub fn iter(&self) -> impl Iterator<Item = (OptionLetter, &str)> + '_ {
        OptionLetter::ALL
            .into_iter()
            .filter_map(move |letter| self.get(letter).map(|text| (letter, text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn options_need_three_or_four_entries() {
        assert!(Options::from_run(run(&["soy", "eres"])).is_none());
        assert!(Options::from_run(run(&["a", "b", "c", "d", "e"])).is_none());
        assert_eq!(Options::from_run(run(&["a", "b", "c"])).unwrap().len(), 3);
        assert_eq!(Options::from_run(run(&["a", "b", "c", "d"])).unwrap().len(), 4);
    }

    #[test]
    fn options_reject_empty_text() {
        assert!(Options::from_run(run(&["soy", "  ", "es"])).is_none());
    }

    #[test]
    fn options_iterate_in_letter_order() {
        let options = Options::from_run(run(&["soy", "eres", "es"])).unwrap();
        let letters: Vec<_> = options.letters().collect();
        assert_eq!(letters, vec![OptionLetter::A, OptionLetter::B, OptionLetter::C]);
        assert!(!options.contains(OptionLetter::D));
        assert_eq!(options.get(OptionLetter::B), Some("eres"));

        let pairs: Vec<_> = options.iter().collect();
        assert_eq!(pairs[2], (OptionLetter::C, "es"));
    }

    #[test]
    fn letters_parse_case_insensitively() {
        assert_eq!(OptionLetter::from_char('d'), Some(OptionLetter::D));
        assert_eq!(OptionLetter::from_char('B'), Some(OptionLetter::B));
        assert_eq!(OptionLetter::from_char('e'), None);
        assert_eq!(OptionLetter::C.to_string(), "C");
    }

    #[test]
    fn empty_quiz_is_not_a_quiz() {
        assert!(Quiz::new("intro".to_string(), Vec::new()).is_none());
    }
}
