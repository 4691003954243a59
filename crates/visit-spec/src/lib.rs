#![allow(missing_docs)]

pub mod assets;
pub mod expr;
pub mod facts;
pub mod labels;
pub mod record;
pub mod relevance;
pub mod render;
pub mod spec;
pub mod template;

pub use assets::{AssetDir, CachedConfigLoader, ConfigLoadError, ConfigSource, InlineAssets};
pub use expr::{Expr, ExprError};
pub use facts::{FactBuilder, FactSet, FactSetBuilder, generate_diseases_text};
pub use labels::{LabelId, LabelSource, StaticLabels};
pub use record::{Treatment, VisitRecord};
pub use relevance::{ExprEngine, RelevanceEngine, RelevanceError, WhenAbsent, is_relevant};
pub use render::{RenderItem, RenderRow, VisitRenderer, render_json, render_text};
pub use spec::{ConfigDocument, ConfigEntry, ConfigField, ConfigParseError, config_schema};
pub use template::{TemplateEngine, TemplateError};
