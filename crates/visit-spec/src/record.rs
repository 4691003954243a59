use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One prescribed treatment on a visit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Treatment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medicine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dosage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl Treatment {
    pub fn new(medicine: impl Into<String>) -> Self {
        Self {
            medicine: Some(medicine.into()),
            ..Self::default()
        }
    }

    pub fn with_dosage(mut self, dosage: impl Into<String>) -> Self {
        self.dosage = Some(dosage.into());
        self
    }

    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = Some(duration.into());
        self
    }
}

/// Summary of a single clinical visit, as supplied by the data source.
///
/// `diseases` is a set kept in insertion order; `treatments` is keyed by
/// treatment id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VisitRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diseases: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub treatments: BTreeMap<String, Treatment>,
}

impl VisitRecord {
    /// Add a disease code unless it is already present.
    pub fn add_disease(&mut self, code: impl Into<String>) {
        let code = code.into();
        if !self.diseases.contains(&code) {
            self.diseases.push(code);
        }
    }

    pub fn add_treatment(&mut self, id: impl Into<String>, treatment: Treatment) {
        self.treatments.insert(id.into(), treatment);
    }
}
