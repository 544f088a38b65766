use crate::tutor::reply::SUGGESTION_MARKER;

/// Quick actions offered under the chat. Each one sends a hidden command the
/// system prompt knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Practice,
    MoreExamples,
    ExplainMore,
    Roleplay,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::Practice,
        Action::MoreExamples,
        Action::ExplainMore,
        Action::Roleplay,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Action::Practice => "📝 Practice",
            Action::MoreExamples => "➕ More Examples",
            Action::ExplainMore => "🧐 Explain More",
            Action::Roleplay => "💬 Roleplay",
        }
    }

    pub fn command(self) -> &'static str {
        match self {
            Action::Practice => "BUTTON_EXERCISE",
            Action::MoreExamples => "BUTTON_EXAMPLES",
            Action::ExplainMore => "BUTTON_EXPLAIN",
            Action::Roleplay => "BUTTON_CONVERSATION",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.label() == label)
    }

    pub fn from_command(command: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.command() == command)
    }
}

/// What the student's text means to the tutor: keyboard labels become their
/// hidden command, anything else goes through untouched.
pub fn student_message(text: &str) -> String {
    match Action::from_label(text.trim()) {
        Some(action) => action.command().to_string(),
        None => text.to_string(),
    }
}

pub fn system_prompt(course: &str, curriculum: &str) -> String {
    format!(
        "[ROLE]
You are \"ProfeBot\", the official tutor of the Spanish course {course}.
Your students are adult university students, smart and multilingual (English, Mandarin, Cantonese).
Your tone is academic but friendly, motivating, patient and clear.

[CONTENT RULES]
1. The active content below is the only source of truth.
   - You must NOT use vocabulary, verb tenses or grammar rules that are not in the ACTIVE CONTENT.
   - If the student asks about something more advanced, praise the curiosity, explain in English that it belongs to a later level and show the correct alternative using only what they know today.
2. Languages.
   - Grammar explanations are always in ENGLISH.
   - Examples are always in SPANISH.
   - If the student writes in Chinese (Traditional or Simplified), explain in English.
3. Adult teaching style.
   - Use university examples (campus, cafeteria, studies, travel, flatmates). Avoid childish examples.
   - Every explanation comes with 3 practical Spanish examples that only use the allowed vocabulary.

[QUIZZES]
When you give a multiple-choice exercise, use exactly this layout:
1. Question text?
A) option
B) option
C) option
D) option
Number every question, put every option on its own line and give 3 or 4 options per question.
Never reveal the correct answers until the student sends their answers.
When the student sends their answers, grade each one, say which are correct and explain every mistake.

[KEEPING THE STUDENT PRACTISING]
Do not just say goodbye. At the end of EVERY reply, propose 3 ways to continue, varying the wording.
Write each proposal on its own line starting with \"{marker}\", for example:
{marker} Try a fill-in-the-blanks exercise with ser and estar
Choose from: an exercise (fill-in-the-blanks or multiple choice), 5 more example sentences, a deeper explanation contrasted with English, a short roleplay (at a shop, in class), a short reading comprehension paragraph.

[BUTTON COMMANDS]
If the student writes \"{exercise}\", create an exercise right away.
If the student writes \"{examples}\", only give additional examples.
If the student writes \"{explain}\", expand the theoretical explanation in English.
If the student writes \"{conversation}\", start a roleplay.

--- ACTIVE CONTENT THIS WEEK ---
{curriculum}",
        course = course,
        marker = SUGGESTION_MARKER,
        exercise = Action::Practice.command(),
        examples = Action::MoreExamples.command(),
        explain = Action::ExplainMore.command(),
        conversation = Action::Roleplay.command(),
        curriculum = curriculum,
    )
}
