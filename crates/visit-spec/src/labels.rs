use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Translatable strings the visit pipeline asks for.
///
/// The medication and page counter entries are templates: `{{value}}` for the
/// medication pieces, `{{current}}` and `{{total}}` for the page counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelId {
    Diagnosis,
    DiagnosisType,
    DiseaseCode,
    Treatment,
    SingleMedicine,
    MedicationDose,
    MedicationDuration,
    DoseOrDuration,
    PageCounter,
}

/// Resolves label ids to display text. `None` means the label is unavailable and
/// whatever depended on it is left out.
pub trait LabelSource: Send + Sync {
    fn label(&self, id: LabelId) -> Option<String>;
}

/// Fixed table of labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticLabels {
    labels: BTreeMap<LabelId, String>,
}

impl StaticLabels {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn english() -> Self {
        Self::empty()
            .with(LabelId::Diagnosis, "Diagnosis")
            .with(LabelId::DiagnosisType, "Diagnosis type")
            .with(LabelId::DiseaseCode, "Disease code")
            .with(LabelId::Treatment, "Treatment")
            .with(LabelId::SingleMedicine, "{{value}}")
            .with(LabelId::MedicationDose, "{{value}}")
            .with(LabelId::MedicationDuration, "{{value}}")
            .with(LabelId::DoseOrDuration, " ({{value}})")
            .with(LabelId::PageCounter, "Page {{current}} of {{total}}")
    }

    /// English defaults overridden by a YAML map of `label_id: text`.
    pub fn from_yaml(raw: &[u8]) -> Result<Self, serde_yaml::Error> {
        let overrides: BTreeMap<LabelId, String> = serde_yaml::from_slice(raw)?;
        let mut labels = Self::english();
        labels.labels.extend(overrides);
        Ok(labels)
    }

    pub fn with(mut self, id: LabelId, text: impl Into<String>) -> Self {
        self.labels.insert(id, text.into());
        self
    }

    pub fn without(mut self, id: LabelId) -> Self {
        self.labels.remove(&id);
        self
    }
}

impl LabelSource for StaticLabels {
    fn label(&self, id: LabelId) -> Option<String> {
        self.labels.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_overrides_keep_other_defaults() {
        let labels = StaticLabels::from_yaml(b"diagnosis: Utambuzi\ntreatment: Matibabu\n")
            .expect("labels");
        assert_eq!(labels.label(LabelId::Diagnosis).as_deref(), Some("Utambuzi"));
        assert_eq!(labels.label(LabelId::Treatment).as_deref(), Some("Matibabu"));
        assert_eq!(
            labels.label(LabelId::DiseaseCode).as_deref(),
            Some("Disease code")
        );
    }

    #[test]
    fn unknown_label_id_is_rejected() {
        assert!(StaticLabels::from_yaml(b"no_such_label: x\n").is_err());
    }
}
