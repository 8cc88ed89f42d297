//! Fields whose logic does not fit the generic fallback chains.

use bfdr_core::{ArtifactLabel, FieldResult, PatientRole};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::extract::{
    array_field, boolean_value, patient_addresses, patient_ethnicity, patient_first_name,
    patient_last_name, patient_mrns, patient_race, str_field,
};
use crate::matcher::{
    has_coding, join_labels, match_codings, CodeTarget, CodedValue, ConceptPath, SNOMED,
};
use crate::rules::{Composite, KaryotypeRule, CESAREAN, PRESENTATION_CODES, ROUTE_CODES};
use crate::temporal::{delivery_date_field, parse_fhir_datetime};
use crate::view::RecordView;

pub(crate) fn evaluate(view: &RecordView<'_>, rule: Composite) -> FieldResult {
    match rule {
        Composite::FirstName(role) => from_patient(view, role, patient_first_name),
        Composite::LastName(role) => from_patient(view, role, patient_last_name),
        Composite::Sex(role) => from_patient(view, role, |patient| {
            str_field(patient, "gender").map(str::to_string)
        }),
        Composite::Mrns(role) => from_patient(view, role, patient_mrns),
        Composite::BirthDate(role) => from_patient(view, role, |patient| {
            str_field(patient, "birthDate").map(str::to_string)
        }),
        Composite::Address(role) => from_patient(view, role, patient_addresses),
        Composite::Race(role) => from_patient(view, role, patient_race),
        Composite::Ethnicity(role) => from_patient(view, role, patient_ethnicity),
        Composite::DeliveryDate => delivery_date_field(view.artifacts()),
        Composite::PaymentSource => payment_source(view),
        Composite::FetalPresentation => fetal_presentation(view),
        Composite::DeliveryRoute => delivery_route(view),
        Composite::TrialOfLabor => trial_of_labor(view),
        Composite::Karyotype(rule) => karyotype(view, &rule),
    }
}

fn from_patient<F>(view: &RecordView<'_>, role: PatientRole, extract: F) -> FieldResult
where
    F: Fn(&Value) -> Option<String>,
{
    FieldResult::from_option(view.patient(role).and_then(extract))
}

fn route_codings<'a>(view: &RecordView<'a>) -> Vec<CodedValue<'a>> {
    view.procedures(ArtifactLabel::MotherProcedures)
        .map(|procedures| {
            match_codings(
                procedures,
                ConceptPath::Code,
                &CodeTarget::one_of(ROUTE_CODES, Some(SNOMED)),
            )
        })
        .unwrap_or_default()
}

/// Delivery-route procedures rendered as `display [code]`.
fn delivery_route(view: &RecordView<'_>) -> FieldResult {
    let rendered: Vec<String> = route_codings(view)
        .iter()
        .map(|coded| format!("{} [{}]", coded.label(), coded.code.unwrap_or_default()))
        .collect();
    FieldResult::plain(rendered.join(", "))
}

fn trial_of_labor(view: &RecordView<'_>) -> FieldResult {
    let route = route_codings(view);
    if !route.is_empty() && !route.iter().any(|coded| coded.code == Some(CESAREAN)) {
        return FieldResult::plain("Cesarean not attempted");
    }

    let observations = view
        .observations(ArtifactLabel::TrialOfLaborAttempted)
        .unwrap_or_default();
    let answers: Vec<bool> = observations.iter().filter_map(boolean_value).collect();
    if answers.contains(&true) {
        FieldResult::plain("Yes")
    } else if answers.contains(&false) {
        FieldResult::plain("No")
    } else {
        FieldResult::missing()
    }
}

fn karyotype(view: &RecordView<'_>, rule: &KaryotypeRule) -> FieldResult {
    if !view.field(rule.anomaly).is_present() {
        return FieldResult::missing();
    }
    let Some(observations) = view.observations(rule.label).filter(|list| !list.is_empty()) else {
        return FieldResult::missing();
    };
    let confirmed = has_coding(
        observations,
        ConceptPath::ObservationValue,
        &CodeTarget::exact(rule.confirming_code, Some(SNOMED)),
    );
    FieldResult::plain(if confirmed { "Confirmed" } else { "Not confirmed" })
}

fn fetal_presentation(view: &RecordView<'_>) -> FieldResult {
    if let Some(observations) = view.observations(ArtifactLabel::FetalPresentation) {
        let matches = match_codings(observations, ConceptPath::ObservationValue, &CodeTarget::any());
        if let Some(value) = join_labels(&matches) {
            return FieldResult::found(value, "Fetal Presentation observations");
        }
    }

    view.conditions(ArtifactLabel::MotherConditions)
        .and_then(|conditions| {
            join_labels(&match_codings(
                conditions,
                ConceptPath::Code,
                &CodeTarget::one_of(PRESENTATION_CODES, Some(SNOMED)),
            ))
        })
        .map(|value| FieldResult::found(value, "Mother's Conditions"))
        .unwrap_or_default()
}

/// Payors of every coverage in force on the delivery date.
fn payment_source(view: &RecordView<'_>) -> FieldResult {
    let Some(coverages) = view
        .coverages(ArtifactLabel::MotherCoverage)
        .filter(|list| !list.is_empty())
    else {
        return FieldResult::missing();
    };
    let Some(delivery) = view.delivery_date() else {
        return FieldResult::missing();
    };

    let payors: Vec<String> = coverages
        .iter()
        .filter(|coverage| covers(coverage, delivery))
        .filter_map(payor_names)
        .collect();
    FieldResult::plain(payors.join(", "))
}

/// Missing periods and bounds are open; unparsable bounds never match.
fn covers(coverage: &Value, date: DateTime<Utc>) -> bool {
    let Some(period) = coverage.get("period") else {
        return true;
    };
    bound_holds(period, "start", |start| start <= date)
        && bound_holds(period, "end", |end| end >= date)
}

fn bound_holds(period: &Value, key: &str, holds: impl Fn(DateTime<Utc>) -> bool) -> bool {
    match str_field(period, key) {
        None => true,
        Some(text) => parse_fhir_datetime(text).is_some_and(holds),
    }
}

fn payor_names(coverage: &Value) -> Option<String> {
    let names: Vec<&str> = array_field(coverage, "payor")
        .iter()
        .filter_map(|payor| str_field(payor, "display"))
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bfdr_core::{ArtifactBundle, ArtifactEntry, ExtractionConfig};
    use serde_json::json;

    use crate::rules::Field;

    fn procedure(code: &str, display: &str) -> Value {
        json!({"code": {"coding": [{"system": SNOMED, "code": code, "display": display}]}})
    }

    fn trial(answer: bool) -> Value {
        json!({"valueBoolean": answer})
    }

    fn derive(entries: Vec<ArtifactEntry>, field: Field) -> FieldResult {
        let artifacts: ArtifactBundle = entries.into_iter().collect();
        let config = ExtractionConfig::default();
        RecordView::new(&artifacts, &config).field(field)
    }

    fn list(label: ArtifactLabel, resources: Vec<Value>) -> ArtifactEntry {
        ArtifactEntry::resources(label, "/search", resources)
    }

    #[test]
    fn route_renders_display_and_code() {
        let result = derive(
            vec![list(
                ArtifactLabel::MotherProcedures,
                vec![procedure("302383004", "Forceps delivery"), procedure("236958009", "Induction")],
            )],
            Field::DeliveryRoute,
        );
        assert_eq!(result.value(), Some("Forceps delivery [302383004]"));
        assert_eq!(result.provenance, None);
    }

    #[test]
    fn non_cesarean_route_overrides_trial_of_labor() {
        let result = derive(
            vec![
                list(ArtifactLabel::MotherProcedures, vec![procedure("302383004", "Forceps")]),
                list(ArtifactLabel::TrialOfLaborAttempted, vec![trial(true)]),
            ],
            Field::TrialOfLaborAttempted,
        );
        assert_eq!(result.value(), Some("Cesarean not attempted"));
    }

    #[test]
    fn cesarean_route_reads_trial_observations() {
        let cesarean = list(ArtifactLabel::MotherProcedures, vec![procedure(CESAREAN, "Cesarean")]);
        let yes = derive(
            vec![
                cesarean.clone(),
                list(ArtifactLabel::TrialOfLaborAttempted, vec![trial(false), trial(true)]),
            ],
            Field::TrialOfLaborAttempted,
        );
        assert_eq!(yes.value(), Some("Yes"));

        let no = derive(
            vec![cesarean.clone(), list(ArtifactLabel::TrialOfLaborAttempted, vec![trial(false)])],
            Field::TrialOfLaborAttempted,
        );
        assert_eq!(no.value(), Some("No"));

        assert!(!derive(vec![cesarean], Field::TrialOfLaborAttempted).is_present());
    }

    #[test]
    fn karyotype_requires_the_anomaly() {
        let karyotype = list(
            ArtifactLabel::DownSyndromeKaryotype,
            vec![json!({"valueCodeableConcept": {"coding": [{"system": SNOMED, "code": "442124003"}]}})],
        );
        assert!(!derive(vec![karyotype.clone()], Field::DownSyndromeKaryotypeConfirmed).is_present());

        let anomaly = list(ArtifactLabel::ChildConditions, vec![procedure("70156005", "Down syndrome")]);
        let confirmed = derive(
            vec![anomaly.clone(), karyotype],
            Field::DownSyndromeKaryotypeConfirmed,
        );
        assert_eq!(confirmed.value(), Some("Confirmed"));

        let unconfirmed = derive(
            vec![
                anomaly.clone(),
                list(ArtifactLabel::DownSyndromeKaryotype, vec![json!({"valueString": "pending"})]),
            ],
            Field::DownSyndromeKaryotypeConfirmed,
        );
        assert_eq!(unconfirmed.value(), Some("Not confirmed"));

        assert!(!derive(vec![anomaly], Field::DownSyndromeKaryotypeConfirmed).is_present());
    }

    #[test]
    fn payment_source_filters_on_delivery_date() {
        let coverages = list(
            ArtifactLabel::MotherCoverage,
            vec![
                json!({"payor": [{"display": "Medicaid"}], "period": {"start": "2023-01-01"}}),
                json!({"payor": [{"display": "Expired Plan"}], "period": {"end": "2022-12-31"}}),
                json!({"payor": [{"display": "Open Plan"}, {"display": "Secondary"}]}),
                json!({"payor": [{"display": "Garbled"}], "period": {"start": "soon"}}),
                json!({"payor": []}),
            ],
        );
        let delivery = list(ArtifactLabel::DeliveryDate, vec![json!({"valueDateTime": "2023-10-15"})]);

        let result = derive(vec![coverages.clone(), delivery], Field::PrimaryPaymentSource);
        assert_eq!(result.value(), Some("Medicaid, Open Plan, Secondary"));

        assert!(!derive(vec![coverages], Field::PrimaryPaymentSource).is_present());
    }

    #[test]
    fn fetal_presentation_prefers_observations() {
        let conditions = list(
            ArtifactLabel::MotherConditions,
            vec![procedure("6096002", "Breech presentation"), procedure("73211009", "Diabetes")],
        );
        let from_conditions = derive(vec![conditions.clone()], Field::FetalPresentation);
        assert_eq!(from_conditions.value(), Some("Breech presentation"));
        assert_eq!(from_conditions.provenance.as_deref(), Some("Mother's Conditions"));

        let observation = list(
            ArtifactLabel::FetalPresentation,
            vec![json!({"valueCodeableConcept": {"coding": [{"code": "70028003", "display": "Cephalic"}]}})],
        );
        let from_observation = derive(vec![conditions, observation], Field::FetalPresentation);
        assert_eq!(from_observation.value(), Some("Cephalic"));
    }

    #[test]
    fn demographics_come_from_the_right_patient() {
        let child = ArtifactEntry::resource(
            ArtifactLabel::ChildPatient,
            "/Patient?identifier=c",
            json!({"gender": "female", "birthDate": "2023-10-15", "name": [{"given": ["Baby"], "family": "Doe"}]}),
        );
        let mother = ArtifactEntry::resource(
            ArtifactLabel::MotherPatient,
            "/Patient?identifier=m",
            json!({"birthDate": "1990-02-03", "address": [{"text": "1 Main St"}, {"text": "PO Box 9"}]}),
        );
        let entries = vec![child, mother];
        assert_eq!(derive(entries.clone(), Field::ChildSex).value(), Some("female"));
        assert_eq!(derive(entries.clone(), Field::ChildLastName).value(), Some("Doe"));
        assert_eq!(derive(entries.clone(), Field::MotherBirthDate).value(), Some("1990-02-03"));
        assert_eq!(
            derive(entries.clone(), Field::MotherAddress).value(),
            Some("1 Main St | PO Box 9")
        );
        assert!(!derive(entries, Field::MotherFirstName).is_present());
    }
}
