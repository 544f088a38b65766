//! Quiz controls for the chat: progress text, inline keyboard and the
//! callback data its buttons carry.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId};

use crate::quiz::{session::Progress, OptionLetter, QuizSession};

const CALLBACK_PREFIX: &str = "quiz:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizAction {
    Select { number: u32, letter: OptionLetter },
    Reset,
    Submit,
    /// Submit even though some questions are unanswered.
    SubmitAnyway,
}

/// Callback data is limited to 64 bytes by Telegram, hence the terse form.
pub fn encode(quiz_id: &str, action: QuizAction) -> String {
    let action = match action {
        QuizAction::Select { number, letter } => format!("{}{}", number, letter),
        QuizAction::Reset => "reset".to_string(),
        QuizAction::Submit => "submit".to_string(),
        QuizAction::SubmitAnyway => "force".to_string(),
    };
    format!("{}{}:{}", CALLBACK_PREFIX, quiz_id, action)
}

pub fn decode(data: &str) -> Option<(String, QuizAction)> {
    let rest = data.strip_prefix(CALLBACK_PREFIX)?;
    let (quiz_id, action) = rest.rsplit_once(':')?;
    if quiz_id.is_empty() {
        return None;
    }
    let action = match action {
        "reset" => QuizAction::Reset,
        "submit" => QuizAction::Submit,
        "force" => QuizAction::SubmitAnyway,
        select => {
            let mut chars = select.chars();
            let letter = chars.next_back().and_then(OptionLetter::from_char)?;
            let number = chars.as_str().parse().ok()?;
            QuizAction::Select { number, letter }
        }
    };
    Some((quiz_id.to_string(), action))
}

/// The message carrying the quiz controls. Its id is the quiz id.
pub fn controls_message(session: &QuizSession) -> Option<MessageId> {
    session.quiz_id().parse().ok().map(MessageId)
}

pub fn progress_line(session: &QuizSession) -> String {
    format!("Answered: {}/{}", session.answered_count(), session.total())
}

/// Text of the message holding the quiz keyboard: the intro, every question
/// with its options (the chosen one ticked), then the progress.
pub fn controls_text(session: &QuizSession, confirm_incomplete: bool) -> String {
    let quiz = session.quiz();
    let mut blocks = Vec::with_capacity(quiz.questions.len() + 2);
    if !quiz.intro.is_empty() {
        blocks.push(quiz.intro.clone());
    }
    for question in &quiz.questions {
        let selected = session.selected(question.number);
        let mut block = format!("{}. {}", question.number, question.text);
        for (letter, option) in question.options.iter() {
            let tick = if selected == Some(letter) { "✅ " } else { "" };
            block.push_str(&format!("\n{}{}) {}", tick, letter, option));
        }
        blocks.push(block);
    }

    let header = match session.progress() {
        Progress::Empty => "📝 Quiz time! Tap one option per question, then submit.",
        Progress::PartiallyAnswered => "📝 Keep going, then submit.",
        Progress::FullyAnswered => "📝 All answered, ready to submit!",
    };
    blocks.push(format!("{}\n{}", header, progress_line(session)));

    let mut text = blocks.join("\n\n");
    if confirm_incomplete {
        let missing = session.total() - session.answered_count();
        text.push_str(&format!(
            "\n\n⚠️ {} question(s) still unanswered. They will be sent as not answered.",
            missing
        ));
    }
    text
}

pub fn keyboard(session: &QuizSession, confirm_incomplete: bool) -> InlineKeyboardMarkup {
    let quiz_id = session.quiz_id();
    let mut rows: Vec<Vec<InlineKeyboardButton>> = session
        .quiz()
        .questions
        .iter()
        .map(|question| {
            let selected = session.selected(question.number);
            question
                .options
                .letters()
                .map(|letter| {
                    let label = if selected == Some(letter) {
                        format!("✅ {}{}", question.number, letter)
                    } else {
                        format!("{}{}", question.number, letter)
                    };
                    let action = QuizAction::Select {
                        number: question.number,
                        letter,
                    };
                    InlineKeyboardButton::callback(label, encode(quiz_id, action))
                })
                .collect()
        })
        .collect();

    let submit = if confirm_incomplete {
        InlineKeyboardButton::callback(
            "📨 Submit anyway",
            encode(quiz_id, QuizAction::SubmitAnyway),
        )
    } else {
        InlineKeyboardButton::callback("📨 Submit", encode(quiz_id, QuizAction::Submit))
    };
    rows.push(vec![
        InlineKeyboardButton::callback("🔄 Reset", encode(quiz_id, QuizAction::Reset)),
        submit,
    ]);

    InlineKeyboardMarkup::new(rows)
}
