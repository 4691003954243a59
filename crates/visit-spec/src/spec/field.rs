use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single labelled line inside a layout entry.
///
/// `relevance` and `highlight` are expressions over fact names. A missing
/// `relevance` means the field is always shown; a missing `highlight` means the
/// field is never emphasised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConfigField {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<String>,
    #[serde(
        default,
        alias = "display_template",
        skip_serializing_if = "Option::is_none"
    )]
    pub template: Option<String>,
    #[serde(default, alias = "isRedFont", skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
}

impl ConfigField {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            relevance: None,
            template: None,
            highlight: None,
        }
    }

    pub fn with_relevance(mut self, relevance: impl Into<String>) -> Self {
        self.relevance = Some(relevance.into());
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_highlight(mut self, highlight: impl Into<String>) -> Self {
        self.highlight = Some(highlight.into());
        self
    }
}
