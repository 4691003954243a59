pub mod document;
pub mod field;

pub use document::{ConfigDocument, ConfigEntry, ConfigParseError, config_schema};
pub use field::ConfigField;
