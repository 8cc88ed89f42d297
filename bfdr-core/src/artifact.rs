//! Semantic artifact labels and the per-record bundle keyed by them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CoreError;

/// Fixed label naming one fetched clinical data set.
///
/// The serialized form is the human-readable label, which is also what the
/// failure listings show.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactLabel {
    #[serde(rename = "Apgar Score 1 Minute")]
    ApgarOneMinute,
    #[serde(rename = "Apgar Score 5 Minutes")]
    ApgarFiveMinutes,
    #[serde(rename = "Apgar Score 10 Minutes")]
    ApgarTenMinutes,
    #[serde(rename = "Child Patient Resource")]
    ChildPatient,
    #[serde(rename = "Birth Parent Patient Resource")]
    MotherPatient,
    #[serde(rename = "Infant Living?")]
    InfantLiving,
    #[serde(rename = "Related Persons")]
    RelatedPersons,
    #[serde(rename = "Mother Weight")]
    MotherWeight,
    #[serde(rename = "Mother Pre-Pregnancy Weight")]
    MotherPrePregnancyWeight,
    #[serde(rename = "Mother Delivery Weight")]
    MotherDeliveryWeight,
    #[serde(rename = "Child Weight")]
    ChildWeight,
    #[serde(rename = "Child Birth Weight")]
    ChildBirthWeight,
    #[serde(rename = "Delivery Date")]
    DeliveryDate,
    #[serde(rename = "Mother Height")]
    MotherHeight,
    #[serde(rename = "Mother Coverage")]
    MotherCoverage,
    #[serde(rename = "Mother Conditions")]
    MotherConditions,
    #[serde(rename = "Child Conditions")]
    ChildConditions,
    #[serde(rename = "Mother's Risk Factors Observations")]
    MotherRiskFactors,
    #[serde(rename = "Characteristics of Labor/Delivery Observations")]
    LaborDeliveryCharacteristics,
    #[serde(rename = "Mother Procedures")]
    MotherProcedures,
    #[serde(rename = "Child Procedures")]
    ChildProcedures,
    #[serde(rename = "Fetal Presentation")]
    FetalPresentation,
    #[serde(rename = "Delivery Route")]
    DeliveryRoute,
    #[serde(rename = "Trial of Labor Attempted")]
    TrialOfLaborAttempted,
    #[serde(rename = "Maternal Morbidity Observations")]
    MaternalMorbidity,
    #[serde(rename = "Abnormal Newborn Conditions")]
    AbnormalNewbornConditions,
    #[serde(rename = "Gestational Age")]
    GestationalAge,
    #[serde(rename = "Multiple Birth Indicator")]
    MultipleBirthIndicator,
    #[serde(rename = "Previous Cesareans")]
    PreviousCesareans,
    #[serde(rename = "Congenital Anomalies")]
    CongenitalAnomalies,
    #[serde(rename = "Down Syndrome Karyotype")]
    DownSyndromeKaryotype,
    #[serde(rename = "Chromosomal Anomaly Karyotype")]
    ChromosomalAnomalyKaryotype,
    #[serde(rename = "Infections During Pregnancy")]
    InfectionsDuringPregnancy,
}

impl ArtifactLabel {
    pub const ALL: [ArtifactLabel; 33] = [
        ArtifactLabel::ApgarOneMinute,
        ArtifactLabel::ApgarFiveMinutes,
        ArtifactLabel::ApgarTenMinutes,
        ArtifactLabel::ChildPatient,
        ArtifactLabel::MotherPatient,
        ArtifactLabel::InfantLiving,
        ArtifactLabel::RelatedPersons,
        ArtifactLabel::MotherWeight,
        ArtifactLabel::MotherPrePregnancyWeight,
        ArtifactLabel::MotherDeliveryWeight,
        ArtifactLabel::ChildWeight,
        ArtifactLabel::ChildBirthWeight,
        ArtifactLabel::DeliveryDate,
        ArtifactLabel::MotherHeight,
        ArtifactLabel::MotherCoverage,
        ArtifactLabel::MotherConditions,
        ArtifactLabel::ChildConditions,
        ArtifactLabel::MotherRiskFactors,
        ArtifactLabel::LaborDeliveryCharacteristics,
        ArtifactLabel::MotherProcedures,
        ArtifactLabel::ChildProcedures,
        ArtifactLabel::FetalPresentation,
        ArtifactLabel::DeliveryRoute,
        ArtifactLabel::TrialOfLaborAttempted,
        ArtifactLabel::MaternalMorbidity,
        ArtifactLabel::AbnormalNewbornConditions,
        ArtifactLabel::GestationalAge,
        ArtifactLabel::MultipleBirthIndicator,
        ArtifactLabel::PreviousCesareans,
        ArtifactLabel::CongenitalAnomalies,
        ArtifactLabel::DownSyndromeKaryotype,
        ArtifactLabel::ChromosomalAnomalyKaryotype,
        ArtifactLabel::InfectionsDuringPregnancy,
    ];

    /// Human-readable label, identical to the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactLabel::ApgarOneMinute => "Apgar Score 1 Minute",
            ArtifactLabel::ApgarFiveMinutes => "Apgar Score 5 Minutes",
            ArtifactLabel::ApgarTenMinutes => "Apgar Score 10 Minutes",
            ArtifactLabel::ChildPatient => "Child Patient Resource",
            ArtifactLabel::MotherPatient => "Birth Parent Patient Resource",
            ArtifactLabel::InfantLiving => "Infant Living?",
            ArtifactLabel::RelatedPersons => "Related Persons",
            ArtifactLabel::MotherWeight => "Mother Weight",
            ArtifactLabel::MotherPrePregnancyWeight => "Mother Pre-Pregnancy Weight",
            ArtifactLabel::MotherDeliveryWeight => "Mother Delivery Weight",
            ArtifactLabel::ChildWeight => "Child Weight",
            ArtifactLabel::ChildBirthWeight => "Child Birth Weight",
            ArtifactLabel::DeliveryDate => "Delivery Date",
            ArtifactLabel::MotherHeight => "Mother Height",
            ArtifactLabel::MotherCoverage => "Mother Coverage",
            ArtifactLabel::MotherConditions => "Mother Conditions",
            ArtifactLabel::ChildConditions => "Child Conditions",
            ArtifactLabel::MotherRiskFactors => "Mother's Risk Factors Observations",
            ArtifactLabel::LaborDeliveryCharacteristics => {
                "Characteristics of Labor/Delivery Observations"
            }
            ArtifactLabel::MotherProcedures => "Mother Procedures",
            ArtifactLabel::ChildProcedures => "Child Procedures",
            ArtifactLabel::FetalPresentation => "Fetal Presentation",
            ArtifactLabel::DeliveryRoute => "Delivery Route",
            ArtifactLabel::TrialOfLaborAttempted => "Trial of Labor Attempted",
            ArtifactLabel::MaternalMorbidity => "Maternal Morbidity Observations",
            ArtifactLabel::AbnormalNewbornConditions => "Abnormal Newborn Conditions",
            ArtifactLabel::GestationalAge => "Gestational Age",
            ArtifactLabel::MultipleBirthIndicator => "Multiple Birth Indicator",
            ArtifactLabel::PreviousCesareans => "Previous Cesareans",
            ArtifactLabel::CongenitalAnomalies => "Congenital Anomalies",
            ArtifactLabel::DownSyndromeKaryotype => "Down Syndrome Karyotype",
            ArtifactLabel::ChromosomalAnomalyKaryotype => "Chromosomal Anomaly Karyotype",
            ArtifactLabel::InfectionsDuringPregnancy => "Infections During Pregnancy",
        }
    }
}

impl fmt::Display for ArtifactLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactLabel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArtifactLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| CoreError::UnknownLabel(s.to_string()))
    }
}

/// What a single fetch produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactOutcome {
    Resource(Value),
    Resources(Vec<Value>),
    Error(String),
}

/// One labelled fetch result together with the request that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactEntry {
    pub label: ArtifactLabel,
    pub request_url: String,
    pub outcome: ArtifactOutcome,
}

impl ArtifactEntry {
    pub fn resource(label: ArtifactLabel, request_url: impl Into<String>, resource: Value) -> Self {
        Self {
            label,
            request_url: request_url.into(),
            outcome: ArtifactOutcome::Resource(resource),
        }
    }

    pub fn resources(
        label: ArtifactLabel,
        request_url: impl Into<String>,
        resources: Vec<Value>,
    ) -> Self {
        Self {
            label,
            request_url: request_url.into(),
            outcome: ArtifactOutcome::Resources(resources),
        }
    }

    pub fn error(
        label: ArtifactLabel,
        request_url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            label,
            request_url: request_url.into(),
            outcome: ArtifactOutcome::Error(message.into()),
        }
    }

    pub fn as_resource(&self) -> Option<&Value> {
        match &self.outcome {
            ArtifactOutcome::Resource(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_resources(&self) -> Option<&[Value]> {
        match &self.outcome {
            ArtifactOutcome::Resources(values) => Some(values),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            ArtifactOutcome::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ArtifactOutcome::Error(_))
    }
}

/// Per-record store of fetched artifacts, at most one entry per label.
///
/// Serialized as a plain list of entries in label order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ArtifactEntry>", into = "Vec<ArtifactEntry>")]
pub struct ArtifactBundle {
    entries: BTreeMap<ArtifactLabel, ArtifactEntry>,
}

impl ArtifactBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `entry`, replacing whatever the label held before.
    pub fn insert(&mut self, entry: ArtifactEntry) -> Option<ArtifactEntry> {
        self.entries.insert(entry.label, entry)
    }

    /// Concatenates resource lists for the same label.
    ///
    /// Only a list appended onto a list is concatenated; every other
    /// combination behaves like [`ArtifactBundle::insert`].
    pub fn append(&mut self, entry: ArtifactEntry) {
        if let Some(existing) = self.entries.get_mut(&entry.label) {
            if let (ArtifactOutcome::Resources(current), ArtifactOutcome::Resources(more)) =
                (&mut existing.outcome, &entry.outcome)
            {
                current.extend(more.iter().cloned());
                return;
            }
        }
        self.insert(entry);
    }

    /// Moves every entry of `delta` into this bundle, overwriting by label.
    pub fn merge(&mut self, delta: ArtifactBundle) {
        for (_, entry) in delta.entries {
            self.insert(entry);
        }
    }

    pub fn get(&self, label: ArtifactLabel) -> Option<&ArtifactEntry> {
        self.entries.get(&label)
    }

    /// Single resource stored under `label`, if it resolved.
    pub fn resource(&self, label: ArtifactLabel) -> Option<&Value> {
        self.get(label).and_then(ArtifactEntry::as_resource)
    }

    /// Resource list stored under `label`; `None` when never fetched or errored.
    pub fn resources(&self, label: ArtifactLabel) -> Option<&[Value]> {
        self.get(label).and_then(ArtifactEntry::as_resources)
    }

    pub fn contains(&self, label: ArtifactLabel) -> bool {
        self.entries.contains_key(&label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArtifactEntry> {
        self.entries.values()
    }

    /// Entries holding an error marker, in label order.
    pub fn failures(&self) -> impl Iterator<Item = &ArtifactEntry> {
        self.entries.values().filter(|entry| entry.is_error())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<ArtifactEntry>> for ArtifactBundle {
    fn from(entries: Vec<ArtifactEntry>) -> Self {
        let mut bundle = ArtifactBundle::new();
        for entry in entries {
            bundle.insert(entry);
        }
        bundle
    }
}

impl From<ArtifactBundle> for Vec<ArtifactEntry> {
    fn from(bundle: ArtifactBundle) -> Self {
        bundle.entries.into_values().collect()
    }
}

impl FromIterator<ArtifactEntry> for ArtifactBundle {
    fn from_iter<I: IntoIterator<Item = ArtifactEntry>>(iter: I) -> Self {
        let mut bundle = ArtifactBundle::new();
        for entry in iter {
            bundle.insert(entry);
        }
        bundle
    }
}
