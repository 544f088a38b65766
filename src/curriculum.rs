//! The active course content, read from the instructor's Notion database.
//!
//! Only rows with the `Activo` checkbox ticked are loaded. Their vocabulary,
//! grammar and communication columns become the content the tutor may use.

use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::config::NotionConfig;

const NOTION_VERSION: &str = "2022-06-28";
const NO_ACTIVE_UNITS: &str =
    "No active units are loaded. Stick to greetings, introductions and basic classroom Spanish.";

#[derive(Debug, thiserror::Error)]
pub enum CurriculumError {
    #[error("Notion request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Notion answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("no active units found, check the 'Activo' column")]
    NoActiveUnits,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub name: String,
    pub lexicon: String,
    pub grammar: String,
    pub communication: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Curriculum {
    pub units: Vec<Unit>,
}

impl Curriculum {
    /// The curriculum as it is pasted into the system prompt.
    pub fn context(&self) -> String {
        if self.units.is_empty() {
            return NO_ACTIVE_UNITS.to_string();
        }
        self.units
            .iter()
            .map(|unit| {
                format!(
                    "=== ACTIVE UNIT: {} ===\n[VOCABULARY]: {}\n[GRAMMAR RULES]: {}\n[COMMUNICATION/INFO]: {}\n==============================",
                    unit.name, unit.lexicon, unit.grammar, unit.communication
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Builds the units out of a Notion database query response.
pub fn units_from_query(body: &Value) -> Vec<Unit> {
    let Some(pages) = body["results"].as_array() else {
        return Vec::new();
    };
    pages
        .iter()
        .map(|page| {
            let props = &page["properties"];
            let name = property_text(props, "Nombre", "title");
            Unit {
                name: if name.is_empty() {
                    "Untitled".to_string()
                } else {
                    name
                },
                lexicon: property_text(props, "Léxico", "rich_text"),
                grammar: property_text(props, "Gramática", "rich_text"),
                communication: property_text(props, "Comunicación", "rich_text"),
            }
        })
        .collect()
}

fn property_text(props: &Value, column: &str, kind: &str) -> String {
    props[column][kind]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| item["text"]["content"].as_str().unwrap_or(""))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

pub struct NotionSource {
    client: Client,
    config: NotionConfig,
}

impl NotionSource {
    pub fn new(config: NotionConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub async fn fetch(&self) -> Result<Curriculum, CurriculumError> {
        let url = format!(
            "https://api.notion.com/v1/databases/{}/query",
            self.config.database_id
        );
        let payload = json!({
            "filter": {
                "property": "Activo",
                "checkbox": { "equals": true }
            }
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            return Err(CurriculumError::Status { status, body });
        }

        let body: Value = response.json().await?;
        let units = units_from_query(&body);
        if units.is_empty() {
            return Err(CurriculumError::NoActiveUnits);
        }
        Ok(Curriculum { units })
    }
}

/// The curriculum shared by every conversation, reloadable on demand.
pub struct CurriculumStore {
    source: Option<NotionSource>,
    current: RwLock<Curriculum>,
}

impl CurriculumStore {
    pub fn new(source: Option<NotionSource>) -> Self {
        Self {
            source,
            current: RwLock::new(Curriculum::default()),
        }
    }

    /// Reloads the units and returns how many are active. On failure the
    /// previous curriculum stays in place.
    pub async fn refresh(&self) -> Result<usize, CurriculumError> {
        let Some(source) = &self.source else {
            log::warn!("Notion is not configured, no curriculum to load");
            return Ok(0);
        };
        let curriculum = source.fetch().await?;
        let count = curriculum.units.len();
        *self.current.write().await = curriculum;
        log::info!("Loaded {} active units from Notion", count);
        Ok(count)
    }

    pub async fn context(&self) -> String {
        self.current.read().await.context()
    }
}
