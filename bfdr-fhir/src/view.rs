//! Read-only view over one record's artifacts, and the rule evaluator.

use bfdr_core::{ArtifactBundle, ArtifactLabel, ExtractionConfig, FieldResult, PatientRole};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::composite;
use crate::extract::{boolean_text, integer_text, join_values, observation_timestamp, quantity_text};
use crate::matcher::{join_labels, match_codings, CodeTarget};
use crate::rules::{
    CodedRule, Field, GeneralMeasurement, MeasurementRule, ObservationValueRule, Pick, Rule,
    Selection, Source, SourceKind, ValueKind, WindowFilter,
};
use crate::temporal::{
    classify_by_window, earliest, format_timestamp, latest, parse_fhir_datetime,
    resolve_delivery_date,
};

/// Lookup surface the field rules read through.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    artifacts: &'a ArtifactBundle,
    config: &'a ExtractionConfig,
}

impl<'a> RecordView<'a> {
    pub fn new(artifacts: &'a ArtifactBundle, config: &'a ExtractionConfig) -> Self {
        Self { artifacts, config }
    }

    pub fn artifacts(&self) -> &'a ArtifactBundle {
        self.artifacts
    }

    pub fn config(&self) -> &'a ExtractionConfig {
        self.config
    }

    pub fn patient(&self, role: PatientRole) -> Option<&'a Value> {
        self.artifacts.resource(role.patient_label())
    }

    pub(crate) fn observations(&self, label: ArtifactLabel) -> Option<&'a [Value]> {
        self.artifacts.resources(label)
    }

    pub(crate) fn conditions(&self, label: ArtifactLabel) -> Option<&'a [Value]> {
        self.artifacts.resources(label)
    }

    pub(crate) fn procedures(&self, label: ArtifactLabel) -> Option<&'a [Value]> {
        self.artifacts.resources(label)
    }

    pub(crate) fn coverages(&self, label: ArtifactLabel) -> Option<&'a [Value]> {
        self.artifacts.resources(label)
    }

    pub fn delivery_date(&self) -> Option<DateTime<Utc>> {
        resolve_delivery_date(self.artifacts)
    }

    /// Derives `field`; lookups that find nothing yield a missing result.
    pub fn field(&self, field: Field) -> FieldResult {
        match field.rule() {
            Rule::Coded(rule) => self.coded(&rule),
            Rule::Measurement(rule) => self.measurement(&rule),
            Rule::ObservationValue(rule) => self.observation_value(&rule),
            Rule::Composite(rule) => composite::evaluate(self, rule),
        }
    }

    fn coded(&self, rule: &CodedRule) -> FieldResult {
        for code in rule.codes {
            let target = CodeTarget::exact(code, rule.system);
            for source in rule.sources {
                let Some(resources) = self.source_resources(source) else {
                    continue;
                };
                let matches = match_codings(resources, source.kind.path(), &target);
                let value = match rule.selection {
                    Selection::First => matches.first().map(|coded| coded.label().to_string()),
                    Selection::All => join_labels(&matches),
                };
                if let Some(value) = value {
                    let result = FieldResult::found(value, source.provenance);
                    if result.is_present() {
                        return result;
                    }
                }
            }
        }
        FieldResult::missing()
    }

    fn source_resources(&self, source: &Source) -> Option<&'a [Value]> {
        match source.kind {
            SourceKind::Observations => self.observations(source.label),
            SourceKind::Conditions => self.conditions(source.label),
            SourceKind::Procedures => self.procedures(source.label),
        }
    }

    fn measurement(&self, rule: &MeasurementRule) -> FieldResult {
        if let Some(specific) = rule.specific {
            let value = self
                .observations(specific.label)
                .and_then(|observations| join_values(observations, quantity_text));
            if let Some(value) = value {
                return FieldResult::found(value, specific.provenance);
            }
        }
        rule.general
            .map(|general| self.general_measurement(&general))
            .unwrap_or_default()
    }

    fn general_measurement(&self, rule: &GeneralMeasurement) -> FieldResult {
        let Some(observations) = self.observations(rule.label) else {
            return FieldResult::missing();
        };

        let candidates: Vec<&Value> = match rule.window {
            WindowFilter::Unbounded => observations.iter().collect(),
            WindowFilter::DuringPregnancy | WindowFilter::BeforePregnancy => {
                let Some(delivery) = self.delivery_date() else {
                    return FieldResult::missing();
                };
                let partition = classify_by_window(
                    observations,
                    delivery,
                    self.config.pregnancy_horizon_months,
                );
                if rule.window == WindowFilter::DuringPregnancy {
                    partition.during
                } else {
                    partition.before
                }
            }
        };

        let chosen = match rule.pick {
            Pick::Earliest => earliest(candidates),
            Pick::Latest => latest(candidates),
        };
        let Some(observation) = chosen else {
            return FieldResult::missing();
        };
        let Some(value) = quantity_text(observation) else {
            return FieldResult::missing();
        };

        let provenance = match observation_timestamp(observation) {
            Some(raw) => {
                let stamp = parse_fhir_datetime(raw)
                    .map(format_timestamp)
                    .unwrap_or_else(|| raw.to_string());
                format!("{} {stamp}", rule.provenance)
            }
            None => rule.provenance.trim_end_matches(" on").to_string(),
        };
        FieldResult::found(value, provenance)
    }

    fn observation_value(&self, rule: &ObservationValueRule) -> FieldResult {
        let Some(observations) = self.observations(rule.label) else {
            return FieldResult::missing();
        };
        let extract: fn(&Value) -> Option<String> = match rule.kind {
            ValueKind::Quantity => quantity_text,
            ValueKind::Integer => integer_text,
            ValueKind::Boolean => boolean_text,
        };
        FieldResult::from_option(join_values(observations, extract))
    }
}
