//! Sampling parameters and retrieval documents attached to a chat request.

use serde::{Deserialize, Serialize};

/// How the service may drop history to fit its context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromptTruncation {
    Off,
    Auto,
    AutoPreserveOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationQuality {
    Accurate,
    Fast,
}

/// Generation parameters. A `None` field is omitted from the payload, which
/// means "use the service default", never zero.
///
/// `Default` yields the client-side defaults; `service_defaults()` leaves every
/// field unset. Fields missing when deserializing take the client-side default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Top-k, 0 to 500.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<u32>,

    /// Top-p, 0.0 to 1.0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_truncation: Option<PromptTruncation>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation_quality: Option<CitationQuality>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationConfig {
    pub fn service_defaults() -> Self {
        Self {
            temperature: None,
            k: None,
            p: None,
            frequency_penalty: None,
            presence_penalty: None,
            prompt_truncation: None,
            citation_quality: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: Some(0.7),
            k: Some(10),
            p: Some(0.5),
            frequency_penalty: Some(0.0),
            presence_penalty: Some(0.0),
            prompt_truncation: None,
            citation_quality: Some(CitationQuality::Accurate),
            max_tokens: None,
        }
    }
}

/// Evidence passed to the model for retrieval-augmented generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            title: None,
            author: None,
            date: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }
}
