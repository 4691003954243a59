use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use serde_yaml::Value;
use thiserror::Error;

use crate::spec::field::ConfigField;

/// Keys that only make sense on an entry. Seeing one on a field means the
/// author nested an entry one level too deep.
const ENTRY_KEYS: [&str; 4] = ["group", "sub_group", "subGroup", "fields"];

/// Errors raised while turning raw layout bytes into a [`ConfigDocument`].
#[derive(Debug, Error)]
pub enum ConfigParseError {
    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),
    #[error("document {document} must be a mapping or a sequence of mappings")]
    NotAnEntry { document: usize },
    #[error("document {document}, entry {entry}: schema mismatch at {path}: {source}")]
    Schema {
        document: usize,
        entry: usize,
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("document {document}, entry {entry}: declares no group, sub_group or fields")]
    EmptyEntry { document: usize, entry: usize },
    #[error(
        "document {document}, entry {entry}: field {field} declares `{key}`, which belongs on the entry"
    )]
    NestedEntry {
        document: usize,
        entry: usize,
        field: usize,
        key: &'static str,
    },
    #[error("document {document}, entry {entry}: duplicate field key `{key}`")]
    DuplicateKey {
        document: usize,
        entry: usize,
        key: String,
    },
}

/// One presentation block of a layout, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigEntry {
    /// A group heading, optionally followed by a sub-group heading, then fields.
    Group {
        label: String,
        sub_group: Option<String>,
        fields: Vec<ConfigField>,
    },
    /// A sub-group heading followed by fields.
    SubGroup {
        label: String,
        fields: Vec<ConfigField>,
    },
    /// Fields with no heading of their own.
    Fields(Vec<ConfigField>),
}

impl ConfigEntry {
    pub fn group(&self) -> Option<&str> {
        match self {
            ConfigEntry::Group { label, .. } => Some(label),
            ConfigEntry::SubGroup { .. } | ConfigEntry::Fields(_) => None,
        }
    }

    pub fn sub_group(&self) -> Option<&str> {
        match self {
            ConfigEntry::Group { sub_group, .. } => sub_group.as_deref(),
            ConfigEntry::SubGroup { label, .. } => Some(label),
            ConfigEntry::Fields(_) => None,
        }
    }

    pub fn fields(&self) -> &[ConfigField] {
        match self {
            ConfigEntry::Group { fields, .. }
            | ConfigEntry::SubGroup { fields, .. }
            | ConfigEntry::Fields(fields) => fields,
        }
    }
}

/// Ordered layout configuration. Entry order is presentation order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigDocument {
    pub entries: Vec<ConfigEntry>,
}

/// On-disk shape of a layout entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
struct EntryWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group: Option<String>,
    #[serde(default, alias = "subGroup", skip_serializing_if = "Option::is_none")]
    sub_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<ConfigField>>,
}

impl ConfigDocument {
    /// Parse a layout from raw bytes.
    ///
    /// The input may hold several `---` separated YAML documents. Each document is
    /// either one entry (a mapping) or a list of entries; empty documents are skipped.
    /// Unknown keys are ignored, but the entry shapes themselves are checked and the
    /// first violation fails the whole parse.
    pub fn parse(raw: &[u8]) -> Result<Self, ConfigParseError> {
        let mut entries = Vec::new();

        for (document, deserializer) in serde_yaml::Deserializer::from_slice(raw).enumerate() {
            let value = Value::deserialize(deserializer)?;
            match value {
                Value::Null => continue,
                Value::Mapping(_) => entries.push(parse_entry(document, 0, value)?),
                Value::Sequence(items) => {
                    for (entry, item) in items.into_iter().enumerate() {
                        if !item.is_mapping() {
                            return Err(ConfigParseError::NotAnEntry { document });
                        }
                        entries.push(parse_entry(document, entry, item)?);
                    }
                }
                _ => return Err(ConfigParseError::NotAnEntry { document }),
            }
        }

        Ok(Self { entries })
    }

    pub fn parse_str(raw: &str) -> Result<Self, ConfigParseError> {
        Self::parse(raw.as_bytes())
    }

    /// Total number of field lines across all entries.
    pub fn field_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.fields().len()).sum()
    }

    /// Write the layout back out as a single YAML sequence of entries.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        let wire = self.entries.iter().map(entry_to_wire).collect::<Vec<_>>();
        serde_yaml::to_string(&wire)
    }
}

/// JSON Schema describing one layout document (a list of entries).
pub fn config_schema() -> JsonValue {
    schemars::schema_for!(Vec<EntryWire>).to_value()
}

fn parse_entry(document: usize, entry: usize, value: Value) -> Result<ConfigEntry, ConfigParseError> {
    if let Some(Value::Sequence(fields)) = value.get("fields") {
        for (field, item) in fields.iter().enumerate() {
            if let Some(key) = ENTRY_KEYS.iter().copied().find(|key| item.get(*key).is_some()) {
                return Err(ConfigParseError::NestedEntry {
                    document,
                    entry,
                    field,
                    key,
                });
            }
        }
    }

    let wire: EntryWire = serde_path_to_error::deserialize(value).map_err(|err| {
        let path = err.path().to_string();
        let path = if path.is_empty() || path == "." {
            "<root>".to_string()
        } else {
            path
        };
        ConfigParseError::Schema {
            document,
            entry,
            path,
            source: err.into_inner(),
        }
    })?;

    let group = wire.group.filter(|label| !label.trim().is_empty());
    let sub_group = wire.sub_group.filter(|label| !label.trim().is_empty());
    let fields = wire.fields.unwrap_or_default();

    let mut seen = BTreeSet::new();
    for field in &fields {
        if !seen.insert(field.key.as_str()) {
            return Err(ConfigParseError::DuplicateKey {
                document,
                entry,
                key: field.key.clone(),
            });
        }
    }

    match (group, sub_group) {
        (Some(label), sub_group) => Ok(ConfigEntry::Group {
            label,
            sub_group,
            fields,
        }),
        (None, Some(label)) => Ok(ConfigEntry::SubGroup { label, fields }),
        (None, None) if !fields.is_empty() => Ok(ConfigEntry::Fields(fields)),
        (None, None) => Err(ConfigParseError::EmptyEntry { document, entry }),
    }
}

fn entry_to_wire(entry: &ConfigEntry) -> EntryWire {
    let fields = entry.fields();
    EntryWire {
        group: entry.group().map(str::to_string),
        sub_group: entry.sub_group().map(str::to_string),
        fields: (!fields.is_empty()).then(|| fields.to_vec()),
    }
}
