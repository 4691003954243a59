use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::json;

use crate::labels::{LabelId, LabelSource};
use crate::record::{Treatment, VisitRecord};
use crate::template::TemplateEngine;

/// Fact names produced for a visit.
pub mod keys {
    pub const VISIT_DATE: &str = "visit_date";
    pub const TEST_NAME: &str = "test_name";
    pub const TEST_RESULT: &str = "test_result";
    pub const DIAGNOSIS: &str = "diagnosis";
    pub const DIAGNOSIS_TYPE: &str = "diagnosis_type";
    pub const DISEASE_CODE: &str = "disease_code";
    pub const TREATMENT: &str = "treatment";

    pub const DIAGNOSIS_LABEL: &str = "diagnosis_label";
    pub const DIAGNOSIS_TYPE_LABEL: &str = "diagnosis_type_label";
    pub const DISEASE_CODE_LABEL: &str = "disease_code_label";
    pub const TREATMENT_LABEL: &str = "treatment_label";
}

/// `d MMM yyyy`, e.g. `5 Dec 2019`.
pub const VISIT_DATE_FORMAT: &str = "%-d %b %Y";

/// Separator between medication fragments.
pub const LINE_BREAK: &str = "<br/>";

/// Named values derived from one record. Absent facts are simply not present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FactSet {
    facts: BTreeMap<String, String>,
}

impl FactSet {
    pub fn builder() -> FactSetBuilder {
        FactSetBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.facts.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.facts.contains_key(name)
    }

}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FactSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            facts: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Default)]
pub struct FactSetBuilder {
    facts: BTreeMap<String, String>,
}

impl FactSetBuilder {
    /// Record `value` under `name`; `None` leaves the fact absent.
    pub fn put(&mut self, name: &str, value: Option<impl Into<String>>) -> &mut Self {
        if let Some(value) = value {
            self.facts.insert(name.to_string(), value.into());
        }
        self
    }

    pub fn build(self) -> FactSet {
        FactSet { facts: self.facts }
    }
}

/// Newline-joined non-empty disease codes in record order, duplicates dropped.
pub fn generate_diseases_text(diseases: &[String]) -> String {
    let mut seen = BTreeSet::new();
    diseases
        .iter()
        .map(String::as_str)
        .filter(|disease| !disease.is_empty() && seen.insert(*disease))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turns visit records into fact sets.
pub struct FactBuilder<'a> {
    labels: &'a dyn LabelSource,
    templates: &'a TemplateEngine,
}

impl<'a> FactBuilder<'a> {
    pub fn new(labels: &'a dyn LabelSource, templates: &'a TemplateEngine) -> Self {
        Self { labels, templates }
    }

    pub fn build(&self, record: &VisitRecord) -> FactSet {
        let mut facts = FactSet::builder();

        facts
            .put(
                keys::VISIT_DATE,
                record
                    .visit_date
                    .map(|date| date.format(VISIT_DATE_FORMAT).to_string()),
            )
            .put(keys::TEST_NAME, record.test_name.clone())
            .put(keys::TEST_RESULT, record.test_result.clone())
            .put(keys::DIAGNOSIS, record.diagnosis.clone())
            .put(keys::DIAGNOSIS_TYPE, record.diagnosis_type.clone())
            .put(
                keys::DISEASE_CODE,
                Some(generate_diseases_text(&record.diseases)),
            )
            .put(
                keys::TREATMENT,
                Some(self.generate_medication_text(&record.treatments)),
            );

        facts
            .put(keys::DIAGNOSIS_LABEL, self.labels.label(LabelId::Diagnosis))
            .put(
                keys::DIAGNOSIS_TYPE_LABEL,
                self.labels.label(LabelId::DiagnosisType),
            )
            .put(
                keys::DISEASE_CODE_LABEL,
                self.labels.label(LabelId::DiseaseCode),
            )
            .put(keys::TREATMENT_LABEL, self.labels.label(LabelId::Treatment));

        facts.build()
    }

    /// One `medicine (dose. duration)` fragment per treatment with a medicine
    /// name, joined by [`LINE_BREAK`].
    pub fn generate_medication_text(&self, treatments: &BTreeMap<String, Treatment>) -> String {
        treatments
            .values()
            .filter_map(|treatment| self.medication_fragment(treatment))
            .collect::<Vec<_>>()
            .join(LINE_BREAK)
    }

    fn medication_fragment(&self, treatment: &Treatment) -> Option<String> {
        let medicine = non_empty(treatment.medicine.as_deref())?;
        let mut fragment = self.fill(LabelId::SingleMedicine, medicine)?;

        let dose = non_empty(treatment.dosage.as_deref())
            .and_then(|dosage| self.fill(LabelId::MedicationDose, dosage));
        let duration = non_empty(treatment.duration.as_deref())
            .and_then(|duration| self.fill(LabelId::MedicationDuration, duration));

        let dose_and_duration = match (dose, duration) {
            (Some(dose), Some(duration)) => Some(format!("{dose}. {duration}")),
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        };

        if let Some(text) = dose_and_duration
            && let Some(wrapped) = self.fill(LabelId::DoseOrDuration, &text)
        {
            fragment.push_str(&wrapped);
        }

        Some(fragment)
    }

    fn fill(&self, id: LabelId, value: &str) -> Option<String> {
        let template = self.labels.label(id)?;
        match self.templates.render(&template, &json!({ "value": value })) {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!(label = ?id, "label template failed: {err}");
                None
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.is_empty())
}
