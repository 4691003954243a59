use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::facts::{FactBuilder, FactSet, LINE_BREAK};
use crate::labels::LabelSource;
use crate::record::VisitRecord;
use crate::relevance::{RelevanceEngine, WhenAbsent, check, is_relevant};
use crate::spec::{ConfigDocument, ConfigField};
use crate::template::TemplateEngine;

/// One line of the presentation list.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderItem {
    GroupHeader(String),
    SubGroupHeader(String),
    Field {
        field: ConfigField,
        highlighted: bool,
    },
}

/// A render item together with the facts of the record it came from.
#[derive(Debug, Clone)]
pub struct RenderRow {
    /// Position of the source record in the slice handed to [`VisitRenderer::assemble`].
    pub record: usize,
    pub item: RenderItem,
    pub facts: Arc<FactSet>,
}

/// Builds and formats render lists for visit records.
pub struct VisitRenderer {
    engine: Box<dyn RelevanceEngine>,
    labels: Box<dyn LabelSource>,
    templates: TemplateEngine,
}

impl VisitRenderer {
    pub fn new(engine: impl RelevanceEngine + 'static, labels: impl LabelSource + 'static) -> Self {
        Self {
            engine: Box::new(engine),
            labels: Box::new(labels),
            templates: TemplateEngine::new(),
        }
    }

    pub fn labels(&self) -> &dyn LabelSource {
        self.labels.as_ref()
    }

    pub fn templates(&self) -> &TemplateEngine {
        &self.templates
    }

    pub fn facts(&self, record: &VisitRecord) -> FactSet {
        FactBuilder::new(self.labels.as_ref(), &self.templates).build(record)
    }

    /// Walk `document` once per record, in the order given.
    ///
    /// Each record gets its own fact set.
    pub fn assemble(&self, document: &ConfigDocument, records: &[VisitRecord]) -> Vec<RenderRow> {
        let rows = records
            .iter()
            .enumerate()
            .flat_map(|(index, record)| self.assemble_record(document, index, self.facts(record)))
            .collect::<Vec<_>>();

        tracing::trace!(records = records.len(), rows = rows.len(), "assembled render list");
        rows
    }

    /// Render list for a single fact set.
    ///
    /// Headers are always emitted, even when none of the fields under them turn
    /// out to be relevant.
    pub fn assemble_record(
        &self,
        document: &ConfigDocument,
        record: usize,
        facts: FactSet,
    ) -> Vec<RenderRow> {
        let facts = Arc::new(facts);
        let row = |item| RenderRow {
            record,
            item,
            facts: Arc::clone(&facts),
        };
        let mut rows = Vec::new();

        for entry in &document.entries {
            if let Some(group) = entry.group() {
                rows.push(row(RenderItem::GroupHeader(group.to_string())));
            }
            if let Some(sub_group) = entry.sub_group() {
                rows.push(row(RenderItem::SubGroupHeader(sub_group.to_string())));
            }
            for field in entry.fields() {
                if !is_relevant(
                    self.engine.as_ref(),
                    &facts,
                    field.relevance.as_deref(),
                    &field.key,
                ) {
                    continue;
                }
                let highlighted = check(
                    self.engine.as_ref(),
                    &facts,
                    field.highlight.as_deref(),
                    WhenAbsent::Fail,
                    &field.key,
                );
                rows.push(row(RenderItem::Field {
                    field: field.clone(),
                    highlighted,
                }));
            }
        }

        rows
    }

    /// Display text for a row: the heading for headers, the filled template for
    /// fields, or the fact named by the field key when there is no template.
    pub fn format_row(&self, row: &RenderRow) -> Option<String> {
        match &row.item {
            RenderItem::GroupHeader(label) | RenderItem::SubGroupHeader(label) => {
                Some(label.clone())
            }
            RenderItem::Field { field, .. } => match &field.template {
                Some(template) => match self.templates.render(template, row.facts.as_ref()) {
                    Ok(text) => Some(text),
                    Err(err) => {
                        tracing::warn!(field = %field.key, "{err}");
                        None
                    }
                },
                None => row.facts.get(&field.key).map(str::to_string),
            },
        }
    }
}

/// Plain text rendering, one block per record.
pub fn render_text(renderer: &VisitRenderer, rows: &[RenderRow]) -> String {
    let mut lines = Vec::new();
    let mut current = None;

    for row in rows {
        if current.is_some_and(|record| record != row.record) {
            lines.push(String::new());
        }
        current = Some(row.record);

        let text = renderer.format_row(row).unwrap_or_default();
        match &row.item {
            RenderItem::GroupHeader(_) => lines.push(format!("# {text}")),
            RenderItem::SubGroupHeader(_) => lines.push(format!("## {text}")),
            RenderItem::Field { highlighted, .. } => {
                let marker = if *highlighted { "!" } else { " " };
                let text = text.replace(LINE_BREAK, "\n    ");
                lines.push(format!("{marker}  {text}"));
            }
        }
    }

    lines.join("\n")
}

/// Structured rendering: `{"visits": [{"items": [...]}, ...]}`.
pub fn render_json(renderer: &VisitRenderer, rows: &[RenderRow]) -> Value {
    let mut visits: Vec<Vec<Value>> = Vec::new();

    for row in rows {
        while visits.len() <= row.record {
            visits.push(Vec::new());
        }

        let text = renderer.format_row(row);
        let item = match &row.item {
            RenderItem::GroupHeader(label) => json!({ "kind": "group", "label": label }),
            RenderItem::SubGroupHeader(label) => json!({ "kind": "sub_group", "label": label }),
            RenderItem::Field { field, highlighted } => {
                let mut map = Map::new();
                map.insert("kind".into(), Value::String("field".into()));
                map.insert("key".into(), Value::String(field.key.clone()));
                map.insert("text".into(), text.map(Value::String).unwrap_or(Value::Null));
                map.insert("highlighted".into(), Value::Bool(*highlighted));
                Value::Object(map)
            }
        };
        visits[row.record].push(item);
    }

    json!({
        "visits": visits
            .into_iter()
            .map(|items| json!({ "items": items }))
            .collect::<Vec<_>>(),
    })
}
