//! Core domain model for birth/fetal-death registration extraction.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod artifact;

pub use artifact::{ArtifactBundle, ArtifactEntry, ArtifactLabel, ArtifactOutcome};

/// Tunables for the derivation rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Months before delivery treated as the start of pregnancy.
    pub pregnancy_horizon_months: u32,
    /// Whether annotated columns carry their "(from ...)" provenance suffix.
    pub annotate_sources: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            pregnancy_horizon_months: 9,
            annotate_sources: true,
        }
    }
}

/// Which patient of a birth record a lookup targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PatientRole {
    Child,
    Mother,
}

impl PatientRole {
    /// Bundle label holding this role's Patient resource.
    pub fn patient_label(self) -> ArtifactLabel {
        match self {
            PatientRole::Child => ArtifactLabel::ChildPatient,
            PatientRole::Mother => ArtifactLabel::MotherPatient,
        }
    }
}

/// Processing state of a birth record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    NotStarted,
    InProgress,
    Complete,
    Error,
}

impl RecordStatus {
    /// Transitions only ever move forward: `NotStarted → InProgress → {Complete | Error}`.
    pub fn can_advance_to(self, next: RecordStatus) -> bool {
        matches!(
            (self, next),
            (RecordStatus::NotStarted, RecordStatus::InProgress)
                | (RecordStatus::InProgress, RecordStatus::Complete)
                | (RecordStatus::InProgress, RecordStatus::Error)
        )
    }

    /// Whether collection has finished for the record, successfully or not.
    pub fn is_settled(self) -> bool {
        matches!(self, RecordStatus::Complete | RecordStatus::Error)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordStatus::NotStarted => "Not started",
            RecordStatus::InProgress => "In progress",
            RecordStatus::Complete => "Complete",
            RecordStatus::Error => "Error",
        })
    }
}

/// One newborn to register, with everything fetched for it so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BirthRecord {
    pub child_mrn: String,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default = "default_selected")]
    pub selected: bool,
    #[serde(default)]
    pub artifacts: ArtifactBundle,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
}

fn default_selected() -> bool {
    true
}

impl BirthRecord {
    /// Empty, selected record for a bare identifier.
    pub fn new(child_mrn: impl Into<String>) -> Self {
        Self {
            child_mrn: child_mrn.into(),
            status: RecordStatus::NotStarted,
            selected: true,
            artifacts: ArtifactBundle::new(),
            settled_at: None,
        }
    }

    /// Moves the record to `next`, rejecting any backwards or skipping step.
    pub fn advance(&mut self, next: RecordStatus) -> Result<(), CoreError> {
        if !self.status.can_advance_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_settled() {
            self.settled_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Labels whose fetch failed, with the request and failure message.
    pub fn failed_artifacts(&self) -> Vec<ArtifactFailure> {
        self.artifacts
            .failures()
            .map(|entry| ArtifactFailure {
                label: entry.label,
                request_url: entry.request_url.clone(),
                message: entry.error_message().unwrap_or_default().to_string(),
            })
            .collect()
    }
}

/// A labelled fetch that ended in an error marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactFailure {
    pub label: ArtifactLabel,
    pub request_url: String,
    pub message: String,
}

impl fmt::Display for ArtifactFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.label, self.request_url, self.message)
    }
}

/// Outcome of one field rule.
///
/// A present value is never empty; rules that find nothing produce
/// [`FieldResult::missing`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldResult {
    pub value: Option<String>,
    pub provenance: Option<String>,
}

impl FieldResult {
    pub fn missing() -> Self {
        Self::default()
    }

    /// Value annotated with the source that produced it.
    pub fn found(value: impl Into<String>, provenance: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            return Self::missing();
        }
        Self {
            value: Some(value),
            provenance: Some(provenance.into()),
        }
    }

    /// Value with no meaningful source annotation.
    pub fn plain(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            return Self::missing();
        }
        Self {
            value: Some(value),
            provenance: None,
        }
    }

    /// `Some` non-empty text becomes a plain result, anything else is missing.
    pub fn from_option(value: Option<String>) -> Self {
        value.map(Self::plain).unwrap_or_default()
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Text for display, with `" (from <provenance>)"` appended when asked.
    pub fn render(&self, annotate: bool) -> Option<String> {
        let value = self.value.as_ref()?;
        match (&self.provenance, annotate) {
            (Some(source), true) => Some(format!("{value} (from {source})")),
            _ => Some(value.clone()),
        }
    }
}

/// Splits free text into record identifiers on commas and line breaks.
pub fn parse_identifiers(text: &str) -> Vec<String> {
    text.split(|c: char| c == ',' || c == '\n' || c == '\r')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// One empty record per identifier in `text`.
pub fn records_from_identifiers(text: &str) -> Vec<BirthRecord> {
    parse_identifiers(text)
        .into_iter()
        .map(BirthRecord::new)
        .collect()
}

/// Errors raised by the core model.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("record cannot move from {from} to {to}")]
    InvalidTransition { from: RecordStatus, to: RecordStatus },
    #[error("unknown artifact label: {0}")]
    UnknownLabel(String),
}
