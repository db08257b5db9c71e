//! Conversation data model.
//!
//! [`ConversationState`] serializes to exactly the chat-completions request
//! body, so the same document is sent to the backend, written as the session
//! file, and read back for resume or replay. Fields this crate does not model
//! are carried in `extra` and written back untouched.

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::params::GenerationParams;

pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredConversation")]
pub struct ConversationState {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    pub top_p: f32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// On-disk shape accepted on load. Older documents carry `max_tokens`;
/// when both limits are present `max_completion_tokens` wins and the
/// legacy key is not written back.
#[derive(Deserialize)]
struct StoredConversation {
    #[serde(default)]
    model: String,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    temperature: f32,
    #[serde(default)]
    max_completion_tokens: Option<u32>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    top_p: f32,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<StoredConversation> for ConversationState {
    fn from(stored: StoredConversation) -> Self {
        Self {
            model: stored.model,
            messages: stored.messages,
            temperature: stored.temperature,
            max_completion_tokens: stored.max_completion_tokens.or(stored.max_tokens),
            top_p: stored.top_p,
            extra: stored.extra,
        }
    }
}

impl ConversationState {
    /// Zero-value conversation carrying the given generation parameters.
    pub fn fresh(params: &GenerationParams) -> Self {
        let mut state = Self::default();
        state.apply_params(params);
        state
    }

    /// Overwrites the session-level generation parameters. `role` is a
    /// per-message property and is deliberately not touched here.
    pub fn apply_params(&mut self, params: &GenerationParams) {
        self.model = params.model.clone();
        self.temperature = params.temperature;
        self.max_completion_tokens = (params.max_tokens > 0).then_some(params.max_tokens);
        self.top_p = params.top_p;
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn new(role: impl Into<String>, content: MessageContent) -> Self {
        Self {
            role: role.into(),
            content: Some(content),
            extra: Map::new(),
        }
    }

    pub fn text(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(role, MessageContent::Text(text.into()))
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::text(ROLE_SYSTEM, text)
    }

    /// Text of the message; multimodal parts contribute only their text segments.
    pub fn text_content(&self) -> String {
        match &self.content {
            Some(MessageContent::Text(text)) => text.clone(),
            Some(MessageContent::Parts(parts)) => parts
                .iter()
                .filter_map(ContentPart::text)
                .collect::<Vec<&str>>()
                .join("\n"),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One element of a multimodal content array.
///
/// Parts whose shape is exactly `{"type":"text","text":..}` or
/// `{"type":"image_url","image_url":{..}}` are typed. Anything else,
/// including known types carrying extra keys, is kept as raw JSON and
/// written back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
    Other(Value),
}

impl ContentPart {
    pub fn kind(&self) -> &str {
        match self {
            ContentPart::Text { .. } => "text",
            ContentPart::ImageUrl { .. } => "image_url",
            ContentPart::Other(value) => value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown"),
        }
    }

    /// Text carried by the part, if it is a text part.
    pub fn text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            ContentPart::Other(value) if self.kind() == "text" => {
                value.get("text").and_then(Value::as_str)
            }
            _ => None,
        }
    }

    fn from_value(value: Value) -> Self {
        let Some(map) = value.as_object().filter(|map| map.len() == 2) else {
            return ContentPart::Other(value);
        };
        match map.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = map.get("text").and_then(Value::as_str) {
                    return ContentPart::Text {
                        text: text.to_string(),
                    };
                }
            }
            Some("image_url") => {
                if let Some(Ok(image_url)) = map
                    .get("image_url")
                    .map(|raw| serde_json::from_value::<ImageUrl>(raw.clone()))
                {
                    return ContentPart::ImageUrl { image_url };
                }
            }
            _ => {}
        }
        ContentPart::Other(value)
    }
}

impl Serialize for ContentPart {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ContentPart::Text { text } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "text")?;
                map.serialize_entry("text", text)?;
                map.end()
            }
            ContentPart::ImageUrl { image_url } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "image_url")?;
                map.serialize_entry("image_url", image_url)?;
                map.end()
            }
            ContentPart::Other(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ContentPart {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(ContentPart::from_value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ImageUrl {
    pub fn new(url: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            url: url.into(),
            detail,
            extra: Map::new(),
        }
    }
}
