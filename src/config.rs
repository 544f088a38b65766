use std::time::Duration;

const DEFAULT_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";
const DEFAULT_FAST_MODEL: &str = "deepseek-chat";
const DEFAULT_COURSE: &str = "SPAN1001";
const DEFAULT_MAX_TOKENS: u32 = 1000;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("NOTION_TOKEN and NOTION_DATABASE_ID must be set together")]
    PartialNotion,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_url: String,
    pub fast_model: String,
    /// With a smart model set, every message is routed between the two.
    pub smart_model: Option<String>,
    pub temperature: f32,
    pub timeout: Duration,
    /// Header carrying the API key for gateways such as Azure API Management
    /// (`Ocp-Apim-Subscription-Key`). Unset means a bearer token.
    pub auth_header: Option<String>,
    /// Extra query parameters sent with every completion, e.g. `deployment-id`.
    pub query: Vec<(String, String)>,
    pub max_tokens: u32,
}

impl LlmConfig {
    /// Custom auth headers and query parameters need the gateway client.
    pub fn uses_gateway(&self) -> bool {
        self.auth_header.is_some() || !self.query.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotionConfig {
    pub token: String,
    pub database_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub llm: LlmConfig,
    pub notion: Option<NotionConfig>,
    pub course: String,
    pub history_turns: usize,
    pub db_path: String,
}

impl Config {
    /// Reads the configuration from the environment. Load `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_key = get("LLM_API_KEY").ok_or(ConfigError::Missing("LLM_API_KEY"))?;
        let llm = LlmConfig {
            api_key,
            api_url: get("LLM_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            fast_model: get("FAST_MODEL").unwrap_or_else(|| DEFAULT_FAST_MODEL.to_string()),
            smart_model: get("SMART_MODEL"),
            temperature: parse_or(get("LLM_TEMPERATURE"), "LLM_TEMPERATURE", 0.5)?,
            timeout: Duration::from_secs(parse_or(get("LLM_TIMEOUT_SECS"), "LLM_TIMEOUT_SECS", 30)?),
            auth_header: get("LLM_AUTH_HEADER").map(|name| name.trim().to_string()),
            query: match get("LLM_QUERY") {
                Some(query) => parse_query(&query)?,
                None => Vec::new(),
            },
            max_tokens: parse_or(get("LLM_MAX_TOKENS"), "LLM_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
        };
        if llm.max_tokens == 0 {
            return Err(ConfigError::Invalid {
                key: "LLM_MAX_TOKENS",
                value: "0".to_string(),
            });
        }

        let notion = match (get("NOTION_TOKEN"), get("NOTION_DATABASE_ID")) {
            (Some(token), Some(database_id)) => Some(NotionConfig { token, database_id }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialNotion),
        };

        let history_turns = parse_or(get("HISTORY_TURNS"), "HISTORY_TURNS", 20)?;
        if history_turns == 0 {
            return Err(ConfigError::Invalid {
                key: "HISTORY_TURNS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            llm,
            notion,
            course: get("COURSE_NAME").unwrap_or_else(|| DEFAULT_COURSE.to_string()),
            history_turns,
            db_path: get("DB_PATH").unwrap_or_else(|| "db.sqlite".to_string()),
        })
    }
}

/// Parses `deployment-id=DeepSeek-V3&api-version=2024-02-01`.
fn parse_query(query: &str) -> Result<Vec<(String, String)>, ConfigError> {
    query
        .split('&')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(ConfigError::Invalid {
                key: "LLM_QUERY",
                value: query.to_string(),
            }),
        })
        .collect()
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_fill_the_gaps() {
        let config = config(&[("LLM_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.llm.api_url, DEFAULT_API_URL);
        assert_eq!(config.llm.fast_model, "deepseek-chat");
        assert_eq!(config.llm.smart_model, None);
        assert_eq!(config.llm.temperature, 0.5);
        assert_eq!(config.llm.timeout, Duration::from_secs(30));
        assert_eq!(config.notion, None);
        assert_eq!(config.course, "SPAN1001");
        assert_eq!(config.history_turns, 20);
        assert_eq!(config.db_path, "db.sqlite");
        assert_eq!(config.llm.max_tokens, 1000);
        assert!(!config.llm.uses_gateway());
    }

    #[test]
    fn gateway_settings_are_read() {
        let config = config(&[
            ("LLM_API_KEY", "k"),
            ("LLM_API_URL", "https://gateway.example/chat/completions"),
            ("LLM_AUTH_HEADER", "Ocp-Apim-Subscription-Key"),
            ("LLM_QUERY", "deployment-id=DeepSeek-V3&api-version=2024-02-01"),
            ("LLM_MAX_TOKENS", "800"),
        ])
        .unwrap();
        assert!(config.llm.uses_gateway());
        assert_eq!(
            config.llm.auth_header.as_deref(),
            Some("Ocp-Apim-Subscription-Key")
        );
        assert_eq!(
            config.llm.query,
            vec![
                ("deployment-id".to_string(), "DeepSeek-V3".to_string()),
                ("api-version".to_string(), "2024-02-01".to_string())
            ]
        );
        assert_eq!(config.llm.max_tokens, 800);
    }

    #[test]
    fn malformed_query_is_reported() {
        assert_eq!(
            config(&[("LLM_API_KEY", "k"), ("LLM_QUERY", "deployment-id")]),
            Err(ConfigError::Invalid {
                key: "LLM_QUERY",
                value: "deployment-id".to_string()
            })
        );
        assert!(config(&[("LLM_API_KEY", "k"), ("LLM_MAX_TOKENS", "0")]).is_err());
    }

    #[test]
    fn api_key_is_required() {
        assert_eq!(config(&[]), Err(ConfigError::Missing("LLM_API_KEY")));
        assert_eq!(
            config(&[("LLM_API_KEY", "  ")]),
            Err(ConfigError::Missing("LLM_API_KEY"))
        );
    }

    #[test]
    fn notion_settings_come_in_pairs() {
        assert_eq!(
            config(&[("LLM_API_KEY", "k"), ("NOTION_TOKEN", "secret")]),
            Err(ConfigError::PartialNotion)
        );
        let config = config(&[
            ("LLM_API_KEY", "k"),
            ("NOTION_TOKEN", "secret"),
            ("NOTION_DATABASE_ID", "db"),
            ("SMART_MODEL", "deepseek-reasoner"),
        ])
        .unwrap();
        assert_eq!(config.notion.unwrap().database_id, "db");
        assert_eq!(config.llm.smart_model.as_deref(), Some("deepseek-reasoner"));
    }

    #[test]
    fn malformed_numbers_are_reported() {
        assert_eq!(
            config(&[("LLM_API_KEY", "k"), ("LLM_TIMEOUT_SECS", "soon")]),
            Err(ConfigError::Invalid {
                key: "LLM_TIMEOUT_SECS",
                value: "soon".to_string()
            })
        );
        assert!(config(&[("LLM_API_KEY", "k"), ("HISTORY_TURNS", "0")]).is_err());
    }
}
