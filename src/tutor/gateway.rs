//! Chat completions through an API gateway that expects its own auth header
//! and query parameters instead of a bearer token, as Azure API Management
//! deployments do.

use reqwest::Client;
use serde_json::{json, Value};

use super::{Speaker, Turn, TutorError};
use crate::config::LlmConfig;

pub struct GatewayClient {
    client: Client,
    url: String,
    api_key: String,
    auth_header: Option<String>,
    query: Vec<(String, String)>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GatewayClient {
    pub fn new(config: &LlmConfig, model: &str) -> Result<Self, TutorError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            auth_header: config.auth_header.clone(),
            query: config.query.clone(),
            model: model.to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub async fn complete(
        &self,
        system: Option<&str>,
        history: &[Turn],
        message: &str,
    ) -> Result<String, TutorError> {
        let payload = request_body(
            &self.model,
            self.temperature,
            self.max_tokens,
            system,
            history,
            message,
        );
        let request = self
            .client
            .post(&self.url)
            .header("Cache-Control", "no-cache")
            .query(&self.query)
            .json(&payload);
        let request = match &self.auth_header {
            Some(name) => request.header(name.as_str(), &self.api_key),
            None => request.bearer_auth(&self.api_key),
        };

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            return Err(TutorError::GatewayStatus { status, body });
        }

        let body: Value = response.json().await?;
        completion_text(&body).ok_or(TutorError::EmptyCompletion)
    }
}

/// The OpenAI-style chat completion request.
pub fn request_body(
    model: &str,
    temperature: f32,
    max_tokens: u32,
    system: Option<&str>,
    history: &[Turn],
    message: &str,
) -> Value {
    let mut messages = Vec::with_capacity(history.len() + 2);
    if let Some(system) = system {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.extend(history.iter().map(|turn| {
        let role = match turn.speaker {
            Speaker::Student => "user",
            Speaker::Tutor => "assistant",
        };
        json!({ "role": role, "content": turn.content })
    }));
    messages.push(json!({ "role": "user", "content": message }));

    json!({
        "model": model,
        "messages": messages,
        "max_tokens": max_tokens,
        "temperature": temperature
    })
}

fn completion_text(body: &Value) -> Option<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
}
