//! Delivery date resolution and pregnancy-window classification.

use bfdr_core::{ArtifactBundle, ArtifactLabel, FieldResult};
use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

use crate::extract::{observation_timestamp, str_field};

/// Parses a FHIR `date`, `dateTime` or `instant`.
///
/// Values without an offset are read as UTC; partial dates resolve to their
/// first day.
pub fn parse_fhir_datetime(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    let date = parse_partial_date(text)?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

fn parse_partial_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d").ok())
        .or_else(|| NaiveDate::parse_from_str(&format!("{text}-01-01"), "%Y-%m-%d").ok())
}

/// RFC 3339 rendering used in provenance notes.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Delivery date text: "Delivery Date" observations first, then the child's birth date.
pub fn delivery_date_field(artifacts: &ArtifactBundle) -> FieldResult {
    if let Some(observations) = artifacts.resources(ArtifactLabel::DeliveryDate) {
        let dates: Vec<&str> = observations
            .iter()
            .filter_map(|observation| str_field(observation, "valueDateTime"))
            .collect();
        if !dates.is_empty() {
            return FieldResult::found(dates.join(", "), "delivery date observation");
        }
    }

    artifacts
        .resource(ArtifactLabel::ChildPatient)
        .and_then(|patient| str_field(patient, "birthDate"))
        .map(|birth_date| FieldResult::found(birth_date, "child date of birth"))
        .unwrap_or_default()
}

/// Reference date every windowed rule is measured from.
///
/// Several delivery-date observations join into text that no longer parses,
/// so an ambiguous record resolves to `None`.
pub fn resolve_delivery_date(artifacts: &ArtifactBundle) -> Option<DateTime<Utc>> {
    delivery_date_field(artifacts)
        .value()
        .and_then(parse_fhir_datetime)
}

/// Observations split around the pregnancy window `(D - H, D]`.
#[derive(Debug, Default, PartialEq)]
pub struct WindowPartition<'a> {
    /// Timestamped inside `(D - H, D]`.
    pub during: Vec<&'a Value>,
    /// Timestamped at or before `D - H`.
    pub before: Vec<&'a Value>,
}

pub fn window_start(delivery: DateTime<Utc>, horizon_months: u32) -> Option<DateTime<Utc>> {
    delivery.checked_sub_months(Months::new(horizon_months))
}

/// Partitions observations by timestamp relative to the delivery date.
///
/// Observations without a parsable timestamp, and those after delivery,
/// land in neither list.
pub fn classify_by_window(
    observations: &[Value],
    delivery: DateTime<Utc>,
    horizon_months: u32,
) -> WindowPartition<'_> {
    let mut partition = WindowPartition::default();
    let Some(start) = window_start(delivery, horizon_months) else {
        return partition;
    };

    for observation in observations {
        let Some(recorded_at) = observation_timestamp(observation).and_then(parse_fhir_datetime)
        else {
            continue;
        };
        if recorded_at <= start {
            partition.before.push(observation);
        } else if recorded_at <= delivery {
            partition.during.push(observation);
        }
    }
    partition
}

/// Stable ascending sort on the raw timestamp string; missing timestamps first.
pub fn sort_by_timestamp(observations: &mut [&Value]) {
    observations.sort_by(|a, b| observation_timestamp(a).cmp(&observation_timestamp(b)));
}

/// Last element after [`sort_by_timestamp`].
pub fn latest<'a>(mut observations: Vec<&'a Value>) -> Option<&'a Value> {
    sort_by_timestamp(&mut observations);
    observations.last().copied()
}

/// First element after [`sort_by_timestamp`].
pub fn earliest<'a>(mut observations: Vec<&'a Value>) -> Option<&'a Value> {
    sort_by_timestamp(&mut observations);
    observations.first().copied()
}
