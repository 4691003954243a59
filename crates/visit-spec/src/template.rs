use handlebars::{Handlebars, RenderError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to render template `{template}`: {source}")]
pub struct TemplateError {
    pub template: String,
    #[source]
    pub source: RenderError,
}

/// Handlebars wrapper used for display templates and label templates.
///
/// Output is never HTML-escaped since labels carry their own markup (`<br/>`).
/// Missing values render as empty text.
pub struct TemplateEngine {
    registry: Handlebars<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        Self { registry }
    }

    pub fn render<T: Serialize>(&self, template: &str, data: &T) -> Result<String, TemplateError> {
        self.registry
            .render_template(template, data)
            .map_err(|source| TemplateError {
                template: template.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_without_escaping_and_blanks_missing() {
        let engine = TemplateEngine::new();
        let out = engine
            .render("{{a}}<br/>{{b}}|{{missing}}|", &json!({"a": "x & y", "b": "<i>z</i>"}))
            .expect("render");
        assert_eq!(out, "x & y<br/><i>z</i>||");
    }

    #[test]
    fn reports_malformed_template() {
        let engine = TemplateEngine::new();
        let err = engine.render("{{#if a}}open", &json!({})).unwrap_err();
        assert_eq!(err.template, "{{#if a}}open");
    }
}
