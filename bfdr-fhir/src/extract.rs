//! Small readers over raw FHIR JSON resources.

use serde_json::Value;

const MR_IDENTIFIER_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v2-0203";
const US_CORE_RACE: &str = "http://hl7.org/fhir/us/core/StructureDefinition/us-core-race";
const US_CORE_ETHNICITY: &str = "http://hl7.org/fhir/us/core/StructureDefinition/us-core-ethnicity";

/// Text of a non-empty string field.
pub(crate) fn str_field<'a>(resource: &'a Value, field: &str) -> Option<&'a str> {
    resource
        .get(field)
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}

pub(crate) fn array_field<'a>(resource: &'a Value, field: &str) -> &'a [Value] {
    resource
        .get(field)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Timestamp string an observation was recorded at, unparsed.
pub(crate) fn observation_timestamp(resource: &Value) -> Option<&str> {
    str_field(resource, "effectiveDateTime")
        .or_else(|| str_field(resource, "effectiveInstant"))
        .or_else(|| {
            resource
                .get("effectivePeriod")
                .and_then(|period| str_field(period, "start"))
        })
}

/// `valueQuantity` rendered as value immediately followed by unit, e.g. `3500g`.
pub(crate) fn quantity_text(resource: &Value) -> Option<String> {
    let quantity = resource.get("valueQuantity")?;
    let magnitude = quantity.get("value").and_then(Value::as_f64)?;
    let number = format_numeric(magnitude);
    match str_field(quantity, "unit") {
        Some(unit) => Some(format!("{number}{unit}")),
        None => Some(number),
    }
}

pub(crate) fn integer_text(resource: &Value) -> Option<String> {
    resource
        .get("valueInteger")
        .and_then(Value::as_i64)
        .map(|value| value.to_string())
}

pub(crate) fn boolean_value(resource: &Value) -> Option<bool> {
    resource.get("valueBoolean").and_then(Value::as_bool)
}

pub(crate) fn boolean_text(resource: &Value) -> Option<String> {
    boolean_value(resource).map(|value| value.to_string())
}

/// Renders whole numbers without a fractional part.
pub(crate) fn format_numeric(value: f64) -> String {
    if value.fract().abs() < f64::EPSILON {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

/// Joins per-resource values, keeping a slot for resources without one.
///
/// Returns `None` when nothing but separators would remain.
pub(crate) fn join_values<'a, I, F>(resources: I, extract: F) -> Option<String>
where
    I: IntoIterator<Item = &'a Value>,
    F: Fn(&'a Value) -> Option<String>,
{
    let parts: Vec<String> = resources
        .into_iter()
        .map(|resource| extract(resource).unwrap_or_default())
        .collect();
    if parts.iter().all(|part| part.trim().is_empty()) {
        return None;
    }
    Some(parts.join(", "))
}

pub(crate) fn patient_first_name(patient: &Value) -> Option<String> {
    let name = array_field(patient, "name").first()?;
    array_field(name, "given")
        .first()
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub(crate) fn patient_last_name(patient: &Value) -> Option<String> {
    let name = array_field(patient, "name").first()?;
    str_field(name, "family").map(str::to_string)
}

/// Values of identifiers typed as medical record numbers.
pub(crate) fn patient_mrns(patient: &Value) -> Option<String> {
    let mrns: Vec<&str> = array_field(patient, "identifier")
        .iter()
        .filter(|identifier| {
            identifier
                .get("type")
                .map(|concept| {
                    array_field(concept, "coding").iter().any(|coding| {
                        str_field(coding, "code") == Some("MR")
                            && str_field(coding, "system") == Some(MR_IDENTIFIER_SYSTEM)
                    })
                })
                .unwrap_or(false)
        })
        .filter_map(|identifier| str_field(identifier, "value"))
        .collect();
    non_empty_join(&mrns, ", ")
}

pub(crate) fn patient_addresses(patient: &Value) -> Option<String> {
    let lines: Vec<&str> = array_field(patient, "address")
        .iter()
        .filter_map(|address| str_field(address, "text"))
        .collect();
    non_empty_join(&lines, " | ")
}

pub(crate) fn patient_race(patient: &Value) -> Option<String> {
    us_core_category(patient, US_CORE_RACE)
}

pub(crate) fn patient_ethnicity(patient: &Value) -> Option<String> {
    us_core_category(patient, US_CORE_ETHNICITY)
}

/// Sub-extension codings of a US Core category extension as `code/display`.
fn us_core_category(patient: &Value, url: &str) -> Option<String> {
    let extension = array_field(patient, "extension")
        .iter()
        .find(|extension| str_field(extension, "url") == Some(url))?;

    let parts: Vec<String> = array_field(extension, "extension")
        .iter()
        .filter_map(|sub| sub.get("valueCoding"))
        .map(|coding| {
            format!(
                "{}/{}",
                str_field(coding, "code").unwrap_or_default(),
                str_field(coding, "display").unwrap_or_default()
            )
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

fn non_empty_join(parts: &[&str], separator: &str) -> Option<String> {
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(separator))
    }
}
