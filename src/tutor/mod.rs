pub mod gateway;
pub mod prompt;
pub mod reply;
pub mod router;

use chatgpt::client::ChatGPT;
use chatgpt::config::ChatGPTEngine;
use chatgpt::types::{ChatMessage, CompletionResponse, Role};

use crate::config::LlmConfig;
use gateway::GatewayClient;
use router::ModelTier;

#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    #[error("chat completion failed: {0}")]
    Completion(#[from] chatgpt::err::Error),
    #[error("invalid chat API url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("gateway request failed: {0}")]
    Gateway(#[from] reqwest::Error),
    #[error("gateway answered {status}: {body}")]
    GatewayStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("the completion had no text")]
    EmptyCompletion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Speaker {
    Student,
    Tutor,
}

/// One message of the conversation, as kept in the dialogue state.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub content: String,
}

impl Turn {
    pub fn student(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Student,
            content: content.into(),
        }
    }

    pub fn tutor(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Tutor,
            content: content.into(),
        }
    }
}

/// Appends `turn` and drops the oldest turns beyond `limit`.
pub fn remember(history: &mut Vec<Turn>, turn: Turn, limit: usize) {
    history.push(turn);
    if history.len() > limit {
        let excess = history.len() - limit;
        history.drain(..excess);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TutorReply {
    /// The reply with suggestion lines removed.
    pub text: String,
    pub suggestions: Vec<String>,
    pub tier: ModelTier,
}

/// A connection to one chat model.
pub enum ChatClient {
    /// OpenAI-compatible API with a bearer token.
    Direct(ChatGPT),
    Gateway(GatewayClient),
}

impl ChatClient {
    pub fn connect(config: &LlmConfig, model: &str) -> Result<Self, TutorError> {
        let client = if config.uses_gateway() {
            ChatClient::Gateway(GatewayClient::new(config, model)?)
        } else {
            ChatClient::Direct(direct_client(config, model)?)
        };
        log::info!("Connected chat model {} at {}", model, config.api_url);
        Ok(client)
    }

    pub async fn complete(
        &self,
        system: Option<&str>,
        history: &[Turn],
        message: &str,
    ) -> Result<String, TutorError> {
        match self {
            ChatClient::Direct(gpt) => send_direct(gpt, system, history, message).await,
            ChatClient::Gateway(gateway) => gateway.complete(system, history, message).await,
        }
    }
}

async fn send_direct(
    gpt: &ChatGPT,
    system: Option<&str>,
    history: &[Turn],
    message: &str,
) -> Result<String, TutorError> {
    let mut conversation = Vec::with_capacity(history.len() + 2);
    if let Some(system) = system {
        conversation.push(ChatMessage {
            role: Role::System,
            content: system.to_string(),
        });
    }
    conversation.extend(history.iter().map(|turn| ChatMessage {
        role: match turn.speaker {
            Speaker::Student => Role::User,
            Speaker::Tutor => Role::Assistant,
        },
        content: turn.content.clone(),
    }));
    conversation.push(ChatMessage {
        role: Role::User,
        content: message.to_string(),
    });

    let response: CompletionResponse = gpt.send_history(&conversation).await?;
    Ok(response.message().clone().content)
}

pub struct Tutor {
    course: String,
    fast: ChatClient,
    smart: Option<ChatClient>,
}

impl Tutor {
    pub fn new(config: &LlmConfig, course: impl Into<String>) -> Result<Self, TutorError> {
        let fast = ChatClient::connect(config, &config.fast_model)?;
        let smart = match &config.smart_model {
            Some(model) => Some(ChatClient::connect(config, model)?),
            None => None,
        };
        Ok(Self {
            course: course.into(),
            fast,
            smart,
        })
    }

    pub fn is_hybrid(&self) -> bool {
        self.smart.is_some()
    }

    /// Answers `message` in the context of the active curriculum and the
    /// recent conversation.
    pub async fn reply(
        &self,
        curriculum: &str,
        history: &[Turn],
        message: &str,
    ) -> Result<TutorReply, TutorError> {
        let tier = self.choose_tier(message).await;
        log::debug!("Answering with the {:?} model: {:?}", tier, message);

        let system = prompt::system_prompt(&self.course, curriculum);
        let content = self
            .client(tier)
            .complete(Some(&system), history, message)
            .await?;
        log::debug!("Completion: {:?}", content);

        let (text, suggestions) = reply::split_suggestions(&content);
        Ok(TutorReply {
            text,
            suggestions,
            tier,
        })
    }

    async fn choose_tier(&self, message: &str) -> ModelTier {
        if self.smart.is_none() {
            return ModelTier::Fast;
        }
        if let Some(tier) = router::tier_for_command(message) {
            return tier;
        }

        let classifier = router::classifier_prompt(message);
        match self.fast.complete(None, &[], &classifier).await {
            Ok(verdict) => {
                router::parse_verdict(&verdict).unwrap_or_else(|| {
                    log::warn!("Unclear routing verdict {:?}, using the fast model", verdict);
                    ModelTier::Fast
                })
            }
            Err(err) => {
                log::warn!("Routing call failed, using the fast model: {}", err);
                ModelTier::Fast
            }
        }
    }

    fn client(&self, tier: ModelTier) -> &ChatClient {
        match (tier, &self.smart) {
            (ModelTier::Smart, Some(smart)) => smart,
            _ => &self.fast,
        }
    }
}

fn direct_client(config: &LlmConfig, model: &str) -> Result<ChatGPT, TutorError> {
    let api_url = url::Url::parse(&config.api_url).map_err(|source| TutorError::InvalidUrl {
        url: config.api_url.clone(),
        source,
    })?;

    let mut gpt = ChatGPT::new(&config.api_key)?;
    // The engine name has to outlive the client, which lives until shutdown
    gpt.config.engine = ChatGPTEngine::Custom(Box::leak(model.to_string().into_boxed_str()));
    gpt.config.api_url = api_url;
    gpt.config.temperature = config.temperature;
    gpt.config.timeout = config.timeout;
    gpt.config.max_tokens = Some(config.max_tokens);
    Ok(gpt)
}
