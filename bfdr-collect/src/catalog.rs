//! Which searches fill which artifact label.

use bfdr_core::ArtifactLabel as L;
use bfdr_core::PatientRole::{Child, Mother};
use bfdr_core::{ArtifactLabel, PatientRole};
use bfdr_fhir::LOINC;

/// A FHIR search: resource type plus ordered parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub resource_type: &'static str,
    pub params: Vec<(String, String)>,
}

impl SearchQuery {
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.push((name.to_string(), value.into()));
        self
    }

    /// Server-relative request path, recorded with each artifact.
    pub fn request_url(&self) -> String {
        let query = self
            .params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        if query.is_empty() {
            format!("/{}", self.resource_type)
        } else {
            format!("/{}?{query}", self.resource_type)
        }
    }
}

pub fn patient_by_identifier(system: &str, value: &str) -> SearchQuery {
    SearchQuery::new("Patient").param("identifier", format!("{system}|{value}"))
}

pub fn related_persons(patient_id: &str) -> SearchQuery {
    SearchQuery::new("RelatedPerson")
        .param("patient", patient_id)
        .param("-relationship-level", "Patient")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// Observations coded with this LOINC code.
    Observation(&'static str),
    ActiveConditions,
    Procedures,
    Coverage,
}

/// One labelled search issued during a record's burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fetch {
    pub label: ArtifactLabel,
    pub role: PatientRole,
    pub kind: FetchKind,
}

impl Fetch {
    const fn observation(label: ArtifactLabel, role: PatientRole, loinc: &'static str) -> Self {
        Self {
            label,
            role,
            kind: FetchKind::Observation(loinc),
        }
    }

    const fn of(label: ArtifactLabel, role: PatientRole, kind: FetchKind) -> Self {
        Self { label, role, kind }
    }

    pub fn query(&self, patient_id: &str) -> SearchQuery {
        match self.kind {
            FetchKind::Observation(code) => SearchQuery::new("Observation")
                .param("patient", patient_id)
                .param("code", format!("{LOINC}|{code}")),
            FetchKind::ActiveConditions => SearchQuery::new("Condition")
                .param("patient", patient_id)
                .param("clinical-status", "active"),
            FetchKind::Procedures => SearchQuery::new("Procedure").param("patient", patient_id),
            FetchKind::Coverage => SearchQuery::new("Coverage").param("patient", patient_id),
        }
    }
}

/// Issued concurrently once the birth parent is known.
pub const MOTHER_BURST: &[Fetch] = &[
    Fetch::observation(L::MotherWeight, Mother, "29463-7"),
    Fetch::observation(L::MotherPrePregnancyWeight, Mother, "56077-1"),
    Fetch::observation(L::MotherDeliveryWeight, Mother, "69461-2"),
    Fetch::observation(L::MotherHeight, Mother, "3137-7"),
    Fetch::of(L::MotherCoverage, Mother, FetchKind::Coverage),
    Fetch::of(L::MotherConditions, Mother, FetchKind::ActiveConditions),
    Fetch::observation(L::MotherRiskFactors, Mother, "73775-9"),
    Fetch::observation(L::LaborDeliveryCharacteristics, Mother, "73813-8"),
    Fetch::of(L::MotherProcedures, Mother, FetchKind::Procedures),
    Fetch::observation(L::TrialOfLaborAttempted, Mother, "73760-1"),
    Fetch::observation(L::MaternalMorbidity, Mother, "73781-7"),
    Fetch::observation(L::MultipleBirthIndicator, Mother, "57722-1"),
    Fetch::observation(L::PreviousCesareans, Mother, "68497-7"),
    Fetch::observation(L::InfectionsDuringPregnancy, Mother, "72519-2"),
];

/// Issued concurrently after the mother burst settles.
pub const CHILD_BURST: &[Fetch] = &[
    Fetch::observation(L::ApgarTenMinutes, Child, "9271-8"),
    Fetch::observation(L::ApgarFiveMinutes, Child, "9274-2"),
    Fetch::observation(L::ApgarOneMinute, Child, "9272-6"),
    Fetch::observation(L::InfantLiving, Child, "73757-7"),
    Fetch::observation(L::ChildWeight, Child, "29463-7"),
    Fetch::observation(L::ChildBirthWeight, Child, "8339-4"),
    Fetch::observation(L::DeliveryDate, Child, "11778-8"),
    Fetch::observation(L::FetalPresentation, Child, "73761-9"),
    Fetch::observation(L::AbnormalNewbornConditions, Child, "73812-0"),
    Fetch::of(L::ChildConditions, Child, FetchKind::ActiveConditions),
    Fetch::of(L::ChildProcedures, Child, FetchKind::Procedures),
    Fetch::observation(L::GestationalAge, Child, "11884-4"),
    Fetch::observation(L::CongenitalAnomalies, Child, "73780-9"),
    Fetch::observation(L::DownSyndromeKaryotype, Child, "73778-3"),
    Fetch::observation(L::ChromosomalAnomalyKaryotype, Child, "73778-8"),
];
