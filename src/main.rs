mod config;
mod curriculum;
mod quiz;
mod tutor;

use std::sync::Arc;

use config::Config;
use curriculum::{CurriculumStore, NotionSource};
use dotenv::dotenv;
use quiz::{render, render::QuizAction, QuizSession};
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{
        CallbackQuery, ChatAction, ChatId, KeyboardButton, KeyboardMarkup, MessageId, ParseMode,
    },
    utils::command::BotCommands,
};
use tutor::{
    prompt::{student_message, Action},
    remember, reply, Turn, Tutor,
};

type TutorDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    Chatting {
        history: Vec<Turn>,
    },
    TakingQuiz {
        history: Vec<Turn>,
        session: QuizSession,
    },
}

type ConversationStorage = std::sync::Arc<ErasedStorage<State>>;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
enum Command {
    #[command(description = "start over and show the quick actions.")]
    Start,
    #[command(description = "show this text.")]
    Help,
    #[command(description = "forget the conversation so far.")]
    NewChat,
    #[command(description = "clear your answers to the open quiz.")]
    Reset,
    #[command(description = "reload the course content from Notion.")]
    Refresh,
}

#[tokio::main]
async fn main() {
    if let Err(err) = dotenv() {
        eprintln!("No .env file loaded: {}", err);
    }

    pretty_env_logger::init();
    log::info!("Starting ProfeBot...");

    if let Err(err) = run().await {
        log::error!("ProfeBot stopped: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> HandlerResult {
    let config = Arc::new(Config::from_env()?);
    let bot = Bot::from_env();

    log::info!("Opening the conversation database at {}", config.db_path);
    let storage: ConversationStorage = SqliteStorage::open(&config.db_path, Json).await?.erase();

    let tutor = Arc::new(Tutor::new(&config.llm, config.course.clone())?);
    if tutor.is_hybrid() {
        log::info!("Hybrid routing between the fast and smart models is on");
    }

    let curriculum = Arc::new(CurriculumStore::new(
        config.notion.clone().map(NotionSource::new),
    ));
    // The bot still works without content, the tutor is told nothing is active
    if let Err(err) = curriculum.refresh().await {
        log::error!("Could not load the curriculum: {}", err);
    }

    if let Err(err) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("Could not register the bot commands: {}", err);
    }

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, ErasedStorage<State>, State>()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(command),
                )
                .branch(dptree::case![State::Start].endpoint(start))
                .branch(dptree::case![State::Chatting { history }].endpoint(chat))
                .branch(
                    dptree::case![State::TakingQuiz { history, session }]
                        .endpoint(chat_during_quiz),
                ),
        )
        .branch(
            Update::filter_callback_query()
                .enter_dialogue::<CallbackQuery, ErasedStorage<State>, State>()
                .branch(
                    dptree::case![State::TakingQuiz { history, session }].endpoint(quiz_button),
                )
                .branch(dptree::endpoint(closed_quiz_button)),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![storage, tutor, curriculum, config])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    Ok(())
}

const GREETING_TEXT: &str = "¡Hola! I am ProfeBot, your Spanish tutor. \
Ask me anything about Spanish or the course, in English, Español or 中文. \
The buttons below start a quick practice.";
const TEXT_ONLY: &str = "Please write your message as text.";
const TUTOR_UNAVAILABLE: &str =
    "Lo siento, I couldn't reach the tutor right now. Please try again in a moment.";

async fn command(
    bot: Bot,
    dialogue: TutorDialogue,
    msg: Message,
    cmd: Command,
    curriculum: Arc<CurriculumStore>,
) -> HandlerResult {
    match cmd {
        Command::Start => {
            bot.send_message(msg.chat.id, GREETING_TEXT)
                .reply_markup(reply_keyboard(&[]))
                .await?;
            dialogue
                .update(State::Chatting {
                    history: Vec::new(),
                })
                .await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }
        Command::NewChat => {
            dialogue
                .update(State::Chatting {
                    history: Vec::new(),
                })
                .await?;
            bot.send_message(msg.chat.id, "Fresh start! What would you like to practise?")
                .reply_markup(reply_keyboard(&[]))
                .await?;
        }
        Command::Reset => match dialogue.get().await? {
            Some(State::TakingQuiz {
                history,
                mut session,
            }) => {
                session.clear();
                match render::controls_message(&session) {
                    Some(message_id) => {
                        show_controls(&bot, msg.chat.id, Some(message_id), &session, false).await;
                        bot.send_message(
                            msg.chat.id,
                            "🔄 Answers cleared, the quiz above is ready again.",
                        )
                        .await?;
                    }
                    None => {
                        bot.send_message(msg.chat.id, render::controls_text(&session, false))
                            .reply_markup(render::keyboard(&session, false))
                            .await?;
                    }
                }
                dialogue
                    .update(State::TakingQuiz { history, session })
                    .await?;
            }
            _ => {
                bot.send_message(msg.chat.id, "There is no open quiz to reset.")
                    .await?;
            }
        },
        Command::Refresh => {
            let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;
            let text = match curriculum.refresh().await {
                Ok(0) => "Notion is not configured, there is no course content to load.".to_string(),
                Ok(count) => format!("✅ Course data loaded: {} active unit(s).", count),
                Err(err) => {
                    log::error!("Curriculum refresh failed: {}", err);
                    format!("Could not refresh the course data: {}", err)
                }
            };
            bot.send_message(msg.chat.id, text).await?;
        }
    }
    Ok(())
}

async fn start(
    bot: Bot,
    dialogue: TutorDialogue,
    msg: Message,
    tutor: Arc<Tutor>,
    curriculum: Arc<CurriculumStore>,
    config: Arc<Config>,
) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT)
        .reply_markup(reply_keyboard(&[]))
        .await?;

    match msg.text() {
        Some(text) => {
            let ctx = Conversation {
                bot,
                dialogue,
                tutor,
                curriculum,
                config,
            };
            ctx.converse(Vec::new(), student_message(text), None)
                .await
        }
        None => {
            dialogue
                .update(State::Chatting {
                    history: Vec::new(),
                })
                .await?;
            Ok(())
        }
    }
}

async fn chat(
    bot: Bot,
    dialogue: TutorDialogue,
    history: Vec<Turn>,
    msg: Message,
    tutor: Arc<Tutor>,
    curriculum: Arc<CurriculumStore>,
    config: Arc<Config>,
) -> HandlerResult {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, TEXT_ONLY).await?;
        return Ok(());
    };

    let ctx = Conversation {
        bot,
        dialogue,
        tutor,
        curriculum,
        config,
    };
    ctx.converse(history, student_message(text), None)
        .await
}

/// Writing instead of submitting leaves the open quiz behind.
async fn chat_during_quiz(
    bot: Bot,
    dialogue: TutorDialogue,
    (history, session): (Vec<Turn>, QuizSession),
    msg: Message,
    tutor: Arc<Tutor>,
    curriculum: Arc<CurriculumStore>,
    config: Arc<Config>,
) -> HandlerResult {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, TEXT_ONLY).await?;
        return Ok(());
    };
    log::debug!(
        "Chat {} left quiz {} with {}/{} answers",
        msg.chat.id.0,
        session.quiz_id(),
        session.answered_count(),
        session.total()
    );

    let ctx = Conversation {
        bot,
        dialogue,
        tutor,
        curriculum,
        config,
    };
    ctx.converse(history, student_message(text), None)
        .await
}

async fn quiz_button(
    bot: Bot,
    dialogue: TutorDialogue,
    (history, mut session): (Vec<Turn>, QuizSession),
    q: CallbackQuery,
    tutor: Arc<Tutor>,
    curriculum: Arc<CurriculumStore>,
    config: Arc<Config>,
) -> HandlerResult {
    let Some((quiz_id, action)) = q.data.as_deref().and_then(render::decode) else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };
    if quiz_id != session.quiz_id() {
        bot.answer_callback_query(q.id)
            .text("This quiz is closed.")
            .await?;
        return Ok(());
    }

    let chat_id = dialogue.chat_id();
    let message_id = q.message.as_ref().map(|m| m.id);

    match action {
        QuizAction::Select { number, letter } => {
            if !session.select(number, letter) {
                bot.answer_callback_query(q.id)
                    .text("That option is not available.")
                    .await?;
                return Ok(());
            }
            bot.answer_callback_query(q.id)
                .text(render::progress_line(&session))
                .await?;
            show_controls(&bot, chat_id, message_id, &session, false).await;
            dialogue
                .update(State::TakingQuiz { history, session })
                .await?;
        }
        QuizAction::Reset => {
            session.clear();
            bot.answer_callback_query(q.id)
                .text("Answers cleared.")
                .await?;
            show_controls(&bot, chat_id, message_id, &session, false).await;
            dialogue
                .update(State::TakingQuiz { history, session })
                .await?;
        }
        QuizAction::Submit if !session.is_complete() => {
            bot.answer_callback_query(q.id)
                .text(format!(
                    "{}. Answer the rest or submit anyway.",
                    render::progress_line(&session)
                ))
                .show_alert(true)
                .await?;
            show_controls(&bot, chat_id, message_id, &session, true).await;
        }
        QuizAction::Submit | QuizAction::SubmitAnyway => {
            bot.answer_callback_query(q.id).await?;
            if let Some(message_id) = message_id {
                if let Err(err) = bot.edit_message_reply_markup(chat_id, message_id).await {
                    log::debug!("Could not remove the quiz keyboard: {}", err);
                }
            }

            // A failed grading request leaves the quiz open with its answers
            let reopen = State::TakingQuiz {
                history: history.clone(),
                session: session.clone(),
            };
            let submission = session.build_submission();
            bot.send_message(chat_id, &submission).await?;

            let ctx = Conversation {
                bot,
                dialogue,
                tutor,
                curriculum,
                config,
            };
            ctx.converse(history, submission, Some(reopen)).await?;
        }
    }
    Ok(())
}

async fn closed_quiz_button(bot: Bot, q: CallbackQuery) -> HandlerResult {
    bot.answer_callback_query(q.id)
        .text("This quiz is no longer active.")
        .await?;
    Ok(())
}

/// Re-renders the quiz message after the answers changed.
async fn show_controls(
    bot: &Bot,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    session: &QuizSession,
    confirm_incomplete: bool,
) {
    let Some(message_id) = message_id else {
        return;
    };
    // Telegram refuses edits that change nothing, which is harmless here
    if let Err(err) = bot
        .edit_message_text(
            chat_id,
            message_id,
            render::controls_text(session, confirm_incomplete),
        )
        .reply_markup(render::keyboard(session, confirm_incomplete))
        .await
    {
        log::debug!("Quiz message not updated: {}", err);
    }
}

/// Suggestions first, then the quick actions.
fn reply_keyboard(suggestions: &[String]) -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = suggestions
        .iter()
        .map(|s| vec![KeyboardButton::new(s.clone())])
        .collect();
    rows.push(
        Action::ALL[..2]
            .iter()
            .map(|a| KeyboardButton::new(a.label()))
            .collect(),
    );
    rows.push(
        Action::ALL[2..]
            .iter()
            .map(|a| KeyboardButton::new(a.label()))
            .collect(),
    );
    KeyboardMarkup::new(rows).resize_keyboard(true)
}

/// Everything one exchange with the tutor needs.
struct Conversation {
    bot: Bot,
    dialogue: TutorDialogue,
    tutor: Arc<Tutor>,
    curriculum: Arc<CurriculumStore>,
    config: Arc<Config>,
}

impl Conversation {
    /// Sends `message` to the tutor, shows the reply and opens a quiz if the
    /// reply contains one. On failure the dialogue goes to `on_failure`, or
    /// back to plain chatting with the history untouched.
    async fn converse(
        self,
        mut history: Vec<Turn>,
        message: String,
        on_failure: Option<State>,
    ) -> HandlerResult {
        let chat_id = self.dialogue.chat_id();
        let _ = self
            .bot
            .send_chat_action(chat_id, ChatAction::Typing)
            .await;

        let context = self.curriculum.context().await;
        let reply = match self.tutor.reply(&context, &history, &message).await {
            Ok(reply) => reply,
            Err(err) => {
                log::error!("Tutor reply failed for chat {}: {}", chat_id.0, err);
                let _ = self.bot.send_message(chat_id, TUTOR_UNAVAILABLE).await;
                let state = on_failure.unwrap_or(State::Chatting { history });
                self.dialogue.update(state).await?;
                return Ok(());
            }
        };
        log::info!("Chat {} answered by the {:?} model", chat_id.0, reply.tier);

        if !self.deliver(&reply.text, &reply.suggestions).await {
            let _ = self.bot.send_message(chat_id, TUTOR_UNAVAILABLE).await;
            let state = on_failure.unwrap_or(State::Chatting { history });
            self.dialogue.update(state).await?;
            return Ok(());
        }

        let limit = self.config.history_turns;
        remember(&mut history, Turn::student(message), limit);
        remember(&mut history, Turn::tutor(reply.text.clone()), limit);

        let state = match quiz::extract(&reply.text) {
            Some(found) => {
                log::info!(
                    "Chat {} got a quiz with {} questions",
                    chat_id.0,
                    found.questions.len()
                );
                // The controls message id doubles as the quiz id
                match self.bot.send_message(chat_id, "📝 Loading quiz…").await {
                    Ok(sent) => {
                        let session = QuizSession::new(sent.id.0.to_string(), found);
                        show_controls(&self.bot, chat_id, Some(sent.id), &session, false).await;
                        State::TakingQuiz { history, session }
                    }
                    Err(err) => {
                        log::error!("Quiz controls not sent to chat {}: {}", chat_id.0, err);
                        State::Chatting { history }
                    }
                }
            }
            None => State::Chatting { history },
        };
        self.dialogue.update(state).await?;
        Ok(())
    }

    /// Sends the reply as HTML, split into as many messages as Telegram needs.
    /// The reply keyboard goes with the last one. Returns whether every part
    /// was sent.
    async fn deliver(&self, text: &str, suggestions: &[String]) -> bool {
        let chat_id = self.dialogue.chat_id();
        let pieces = reply::split_message(text, reply::MESSAGE_LIMIT);
        let last = pieces.len().saturating_sub(1);
        for (index, piece) in pieces.iter().enumerate() {
            let mut request = self
                .bot
                .send_message(chat_id, reply::to_html(piece))
                .parse_mode(ParseMode::Html);
            if index == last {
                request = request.reply_markup(reply_keyboard(suggestions));
            }
            if let Err(err) = request.await {
                log::error!(
                    "Reply part {}/{} not sent to chat {}: {}",
                    index + 1,
                    pieces.len(),
                    chat_id.0,
                    err
                );
                return false;
            }
        }
        !pieces.is_empty()
    }
}
