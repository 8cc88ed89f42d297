//! Coded-value matching across CodeableConcepts.

use serde_json::Value;

use crate::extract::{array_field, str_field};

pub const SNOMED: &str = "http://snomed.info/sct";
pub const LOINC: &str = "http://loinc.org";

/// One `(code, system, display)` coding borrowed from a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodedValue<'a> {
    pub code: Option<&'a str>,
    pub system: Option<&'a str>,
    pub display: Option<&'a str>,
}

impl<'a> CodedValue<'a> {
    fn from_coding(coding: &'a Value) -> Self {
        Self {
            code: coding.get("code").and_then(Value::as_str),
            system: coding.get("system").and_then(Value::as_str),
            display: coding.get("display").and_then(Value::as_str),
        }
    }

    /// Display text, or the code when the coding carries no display.
    pub fn label(&self) -> &'a str {
        self.display
            .filter(|display| !display.trim().is_empty())
            .or(self.code)
            .unwrap_or_default()
    }
}

/// Where a resource keeps the concept rules match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConceptPath {
    /// `Observation.valueCodeableConcept`
    ObservationValue,
    /// `Condition.code`, `Procedure.code`
    Code,
}

impl ConceptPath {
    fn field(self) -> &'static str {
        match self {
            ConceptPath::ObservationValue => "valueCodeableConcept",
            ConceptPath::Code => "code",
        }
    }
}

/// Which codes a target accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeFilter<'c> {
    Any,
    Exact(&'c str),
    OneOf(&'c [&'c str]),
}

/// Code filter plus an optional system constraint (`None` matches any system).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeTarget<'c> {
    pub codes: CodeFilter<'c>,
    pub system: Option<&'c str>,
}

impl<'c> CodeTarget<'c> {
    pub fn exact(code: &'c str, system: Option<&'c str>) -> Self {
        Self {
            codes: CodeFilter::Exact(code),
            system,
        }
    }

    pub fn one_of(codes: &'c [&'c str], system: Option<&'c str>) -> Self {
        Self {
            codes: CodeFilter::OneOf(codes),
            system,
        }
    }

    pub fn any() -> Self {
        Self {
            codes: CodeFilter::Any,
            system: None,
        }
    }

    pub fn matches(&self, coded: &CodedValue<'_>) -> bool {
        let code_ok = match self.codes {
            CodeFilter::Any => true,
            CodeFilter::Exact(code) => coded.code == Some(code),
            CodeFilter::OneOf(codes) => coded.code.is_some_and(|code| codes.contains(&code)),
        };
        let system_ok = match self.system {
            Some(system) => coded.system == Some(system),
            None => true,
        };
        code_ok && system_ok
    }
}

/// Every coding of the concept at `path`, in document order.
pub fn codings_of(resource: &Value, path: ConceptPath) -> impl Iterator<Item = CodedValue<'_>> {
    resource
        .get(path.field())
        .map(|concept| array_field(concept, "coding"))
        .unwrap_or_default()
        .iter()
        .map(CodedValue::from_coding)
}

/// All codings across `resources` that satisfy `target`, in iteration order.
///
/// Resources without codings contribute nothing; no match yields an empty list.
pub fn match_codings<'a>(
    resources: &'a [Value],
    path: ConceptPath,
    target: &CodeTarget<'_>,
) -> Vec<CodedValue<'a>> {
    resources
        .iter()
        .flat_map(|resource| codings_of(resource, path))
        .filter(|coded| target.matches(coded))
        .collect()
}

/// Whether any resource carries a coding satisfying `target`.
pub fn has_coding(resources: &[Value], path: ConceptPath, target: &CodeTarget<'_>) -> bool {
    resources
        .iter()
        .flat_map(|resource| codings_of(resource, path))
        .any(|coded| target.matches(&coded))
}

/// Labels of `matches` joined with `", "`, or `None` for no matches.
pub fn join_labels(matches: &[CodedValue<'_>]) -> Option<String> {
    if matches.is_empty() {
        return None;
    }
    Some(
        matches
            .iter()
            .map(CodedValue::label)
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// Whether `coding` carries exactly this system and code.
pub(crate) fn coding_has(coding: &Value, system: &str, code: &str) -> bool {
    str_field(coding, "system") == Some(system) && str_field(coding, "code") == Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn condition(codings: Value) -> Value {
        json!({"resourceType": "Condition", "code": {"coding": codings}})
    }

    #[test]
    fn matches_on_code_and_system() {
        let conditions = vec![
            condition(json!([{"system": SNOMED, "code": "73211009", "display": "Diabetes"}])),
            condition(json!([{"system": "http://hl7.org/fhir/sid/icd-10-cm", "code": "73211009"}])),
        ];
        let target = CodeTarget::exact("73211009", Some(SNOMED));
        let found = match_codings(&conditions, ConceptPath::Code, &target);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].display, Some("Diabetes"));
    }

    #[test]
    fn wildcard_system_matches_every_system() {
        let observations = vec![
            json!({"valueCodeableConcept": {"coding": [{"system": "urn:phin", "code": "PHC1250", "display": "Vent"}]}}),
            json!({"valueCodeableConcept": {"coding": [{"code": "PHC1250", "display": "Vent again"}]}}),
        ];
        let target = CodeTarget::exact("PHC1250", None);
        let found = match_codings(&observations, ConceptPath::ObservationValue, &target);
        assert_eq!(
            found.iter().map(CodedValue::label).collect::<Vec<_>>(),
            vec!["Vent", "Vent again"]
        );
    }

    #[test]
    fn resources_without_codings_are_skipped() {
        let resources = vec![
            json!({"resourceType": "Condition"}),
            json!({"resourceType": "Condition", "code": {"text": "free text"}}),
            condition(json!([{"system": SNOMED, "code": "1"}])),
        ];
        let found = match_codings(&resources, ConceptPath::Code, &CodeTarget::any());
        assert_eq!(found.len(), 1);
        assert!(match_codings(&resources, ConceptPath::Code, &CodeTarget::exact("2", None)).is_empty());
    }

    #[test]
    fn duplicates_are_preserved_in_order() {
        let resources = vec![
            condition(json!([
                {"system": SNOMED, "code": "11466000", "display": "Cesarean"},
                {"system": SNOMED, "code": "48782003", "display": "Vaginal"}
            ])),
            condition(json!([{"system": SNOMED, "code": "11466000", "display": "Cesarean"}])),
        ];
        let codes = ["48782003", "11466000"];
        let found = match_codings(&resources, ConceptPath::Code, &CodeTarget::one_of(&codes, Some(SNOMED)));
        assert_eq!(join_labels(&found).as_deref(), Some("Cesarean, Vaginal, Cesarean"));
    }

    #[test]
    fn label_falls_back_to_code() {
        let resources = vec![condition(json!([{"system": SNOMED, "code": "15938005"}]))];
        let found = match_codings(&resources, ConceptPath::Code, &CodeTarget::exact("15938005", Some(SNOMED)));
        assert_eq!(found[0].label(), "15938005");
        assert!(has_coding(&resources, ConceptPath::Code, &CodeTarget::exact("15938005", Some(SNOMED))));
    }
}
