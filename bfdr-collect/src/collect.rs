//! Per-record collection: the initial patient chain, then the two bursts.

use bfdr_core::{
    ArtifactBundle, ArtifactEntry, ArtifactLabel, ArtifactOutcome, BirthRecord, CoreError,
    PatientRole, RecordStatus,
};
use bfdr_fhir::{birth_parent_identifier, find_birth_parent};
use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::catalog::{self, Fetch, SearchQuery, CHILD_BURST, MOTHER_BURST};
use crate::config::CollectConfig;
use crate::error::CollectError;
use crate::transport::Transport;

/// Request URL stored for labels that never reached the server.
pub const NO_REQUEST: &str = "No request made";

/// Upper bound on Bundle pages followed for one search.
const MAX_PAGES: usize = 20;

/// Everything gathered for one record, plus the failure that stopped it early.
#[derive(Debug)]
pub struct CollectOutcome {
    pub artifacts: ArtifactBundle,
    pub fatal: Option<CollectError>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CollectSummary {
    pub complete: usize,
    pub errored: usize,
}

#[derive(Debug, Default)]
struct PatientIds {
    child: Option<String>,
    mother: Option<String>,
}

impl PatientIds {
    fn from_artifacts(artifacts: &ArtifactBundle) -> Self {
        let id_of = |role: PatientRole| artifacts.resource(role.patient_label()).and_then(resource_id);
        Self {
            child: id_of(PatientRole::Child),
            mother: id_of(PatientRole::Mother),
        }
    }

    fn get(&self, role: PatientRole) -> Option<&str> {
        match role {
            PatientRole::Child => self.child.as_deref(),
            PatientRole::Mother => self.mother.as_deref(),
        }
    }
}

pub struct Collector<T> {
    transport: T,
    child_identifier_system: String,
}

impl<T: Transport> Collector<T> {
    pub fn new(transport: T, config: &CollectConfig) -> Self {
        Self {
            transport,
            child_identifier_system: config.child_identifier_system.clone(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Drains selected, not-started records one at a time, in order.
    pub async fn process_selected(
        &self,
        records: &mut [BirthRecord],
    ) -> Result<CollectSummary, CoreError> {
        let mut summary = CollectSummary::default();
        let queue = records
            .iter_mut()
            .filter(|record| record.selected && record.status == RecordStatus::NotStarted);

        for record in queue {
            record.advance(RecordStatus::InProgress)?;
            info!(child_mrn = %record.child_mrn, "collecting record");

            let outcome = self.collect_record(&record.child_mrn).await;
            record.artifacts.merge(outcome.artifacts);
            for failure in record.failed_artifacts() {
                warn!(
                    child_mrn = %record.child_mrn,
                    label = %failure.label,
                    request = %failure.request_url,
                    error = %failure.message,
                    "artifact unavailable"
                );
            }

            if let Some(err) = outcome.fatal {
                warn!(child_mrn = %record.child_mrn, error = %err, "collection aborted");
                record.advance(RecordStatus::Error)?;
                summary.errored += 1;
            } else {
                record.advance(RecordStatus::Complete)?;
                summary.complete += 1;
            }
            info!(child_mrn = %record.child_mrn, status = %record.status, "record settled");
        }
        Ok(summary)
    }

    /// Fetches every artifact for one child identifier.
    ///
    /// Only a network failure in the initial chain stops early; every other
    /// failure is stored as an error marker under its label.
    pub async fn collect_record(&self, child_mrn: &str) -> CollectOutcome {
        let mut artifacts = ArtifactBundle::new();
        if let Err(fatal) = self.initial_chain(child_mrn, &mut artifacts).await {
            return CollectOutcome {
                artifacts,
                fatal: Some(fatal),
            };
        }

        let ids = PatientIds::from_artifacts(&artifacts);
        for fetches in [MOTHER_BURST, CHILD_BURST] {
            let entries = self.burst(fetches, &ids).await;
            artifacts.merge(entries.into_iter().collect());
        }

        CollectOutcome {
            artifacts,
            fatal: None,
        }
    }

    async fn initial_chain(
        &self,
        child_mrn: &str,
        artifacts: &mut ArtifactBundle,
    ) -> Result<(), CollectError> {
        let query = catalog::patient_by_identifier(&self.child_identifier_system, child_mrn);
        let child = self.search_patient(ArtifactLabel::ChildPatient, &query).await;
        let child_id = child.as_ref().ok().and_then(resource_id);
        settle(
            artifacts,
            ArtifactLabel::ChildPatient,
            query.request_url(),
            child.map(ArtifactOutcome::Resource),
        )?;

        match child_id {
            Some(child_id) => self.related_persons(&child_id, artifacts).await?,
            None => settle(
                artifacts,
                ArtifactLabel::RelatedPersons,
                NO_REQUEST.to_string(),
                Err(CollectError::MissingDependency(ArtifactLabel::RelatedPersons)),
            )?,
        }

        match mother_identifier(artifacts) {
            Ok((system, value)) => {
                let query = catalog::patient_by_identifier(&system, &value);
                let mother = self.search_patient(ArtifactLabel::MotherPatient, &query).await;
                settle(
                    artifacts,
                    ArtifactLabel::MotherPatient,
                    query.request_url(),
                    mother.map(ArtifactOutcome::Resource),
                )
            }
            Err(err) => settle(artifacts, ArtifactLabel::MotherPatient, NO_REQUEST.to_string(), Err(err)),
        }
    }

    /// Related persons across every `next` page; later pages are appended.
    async fn related_persons(
        &self,
        child_id: &str,
        artifacts: &mut ArtifactBundle,
    ) -> Result<(), CollectError> {
        let label = ArtifactLabel::RelatedPersons;
        let query = catalog::related_persons(child_id);
        debug!(label = %label, request = %query.request_url(), "fetching");
        let first = match self.transport.search(&query).await {
            Ok(bundle) => bundle,
            Err(err) => return settle(artifacts, label, query.request_url(), Err(err)),
        };
        let people = bundle_entries(&first)
            .and_then(|entries| require_entries(entries, query.resource_type, label));
        let found = people.is_ok();
        settle(artifacts, label, query.request_url(), people.map(ArtifactOutcome::Resources))?;
        if !found {
            return Ok(());
        }

        let mut next = next_link(&first);
        let mut pages = 1;
        while let Some(url) = next.take() {
            if pages >= MAX_PAGES {
                warn!(label = %label, request = %url, "page limit reached");
                break;
            }
            let (entries, following) = match self.transport.follow(&url).await.and_then(|bundle| {
                let entries = bundle_entries(&bundle)?;
                Ok((entries, next_link(&bundle)))
            }) {
                Ok(page) => page,
                Err(err) if err.is_network() => return Err(err),
                Err(err) => {
                    warn!(label = %label, request = %url, error = %err, "stopped paging");
                    break;
                }
            };
            artifacts.append(ArtifactEntry::resources(label, url.as_str(), entries));
            next = following.filter(|link| *link != url);
            pages += 1;
        }
        Ok(())
    }

    async fn burst(&self, fetches: &[Fetch], ids: &PatientIds) -> Vec<ArtifactEntry> {
        join_all(fetches.iter().map(|fetch| self.fetch(fetch, ids.get(fetch.role)))).await
    }

    async fn fetch(&self, fetch: &Fetch, patient_id: Option<&str>) -> ArtifactEntry {
        let Some(patient_id) = patient_id else {
            let err = CollectError::MissingDependency(fetch.label);
            return ArtifactEntry::error(fetch.label, NO_REQUEST, err.to_string());
        };
        let query = fetch.query(patient_id);
        let request_url = query.request_url();
        match self.search_resources(fetch.label, &query).await {
            Ok(resources) => ArtifactEntry::resources(fetch.label, request_url, resources),
            Err(err) => ArtifactEntry::error(fetch.label, request_url, err.to_string()),
        }
    }

    async fn search_resources(
        &self,
        label: ArtifactLabel,
        query: &SearchQuery,
    ) -> Result<Vec<Value>, CollectError> {
        debug!(label = %label, request = %query.request_url(), "fetching");
        let bundle = self.transport.search(query).await?;
        let entries = bundle_entries(&bundle)?;
        require_entries(entries, query.resource_type, label)
    }

    /// A patient search must match exactly one patient.
    async fn search_patient(
        &self,
        label: ArtifactLabel,
        query: &SearchQuery,
    ) -> Result<Value, CollectError> {
        debug!(label = %label, request = %query.request_url(), "fetching");
        let bundle = self.transport.search(query).await?;
        let mut entries = bundle_entries(&bundle)?;
        match entries.pop() {
            Some(patient) if entries.is_empty() => Ok(patient),
            _ => Err(CollectError::NotFound(format!(
                "{label} search did not return single patient"
            ))),
        }
    }
}

/// Stores the outcome under `label`; network failures are handed back.
fn settle(
    artifacts: &mut ArtifactBundle,
    label: ArtifactLabel,
    request_url: String,
    outcome: Result<ArtifactOutcome, CollectError>,
) -> Result<(), CollectError> {
    match outcome {
        Ok(outcome) => {
            artifacts.insert(ArtifactEntry {
                label,
                request_url,
                outcome,
            });
            Ok(())
        }
        Err(err) => {
            artifacts.insert(ArtifactEntry::error(label, request_url, err.to_string()));
            if err.is_network() {
                Err(err)
            } else {
                Ok(())
            }
        }
    }
}

fn mother_identifier(artifacts: &ArtifactBundle) -> Result<(String, String), CollectError> {
    let people = match artifacts.resources(ArtifactLabel::RelatedPersons) {
        Some(people) if !people.is_empty() => people,
        _ => return Err(CollectError::NotFound("No related persons found".to_string())),
    };
    let parent = find_birth_parent(people).ok_or_else(|| {
        CollectError::NotFound("No birth parent found in related persons".to_string())
    })?;
    birth_parent_identifier(parent)
        .map(|(system, value)| (system.to_string(), value.to_string()))
        .ok_or_else(|| CollectError::NotFound("No identifier found on birth parent".to_string()))
}

fn require_entries(
    entries: Vec<Value>,
    resource_type: &str,
    label: ArtifactLabel,
) -> Result<Vec<Value>, CollectError> {
    if entries.is_empty() {
        return Err(CollectError::NotFound(format!(
            "{resource_type} did not return any results for {label}"
        )));
    }
    Ok(entries)
}

/// URL of the Bundle's `next` page, if any.
fn next_link(bundle: &Value) -> Option<String> {
    bundle
        .get("link")
        .and_then(Value::as_array)?
        .iter()
        .find(|link| link.get("relation").and_then(Value::as_str) == Some("next"))
        .and_then(|link| link.get("url").and_then(Value::as_str))
        .filter(|url| !url.trim().is_empty())
        .map(str::to_string)
}

/// `Bundle.entry[].resource`, in order.
fn bundle_entries(bundle: &Value) -> Result<Vec<Value>, CollectError> {
    match bundle.get("resourceType").and_then(Value::as_str) {
        Some("Bundle") | None => {}
        Some(other) => {
            return Err(CollectError::InvalidResponse(format!(
                "expected a Bundle, received {other}"
            )))
        }
    }
    Ok(bundle
        .get("entry")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get("resource").cloned())
                .collect()
        })
        .unwrap_or_default())
}

fn resource_id(resource: &Value) -> Option<String> {
    resource
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bundle_entries_unwraps_resources() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [{"resource": {"id": "a"}}, {"fullUrl": "x"}, {"resource": {"id": "b"}}]
        });
        let entries = bundle_entries(&bundle).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1]["id"], "b");
        assert!(bundle_entries(&json!({"resourceType": "Bundle"})).unwrap().is_empty());
        assert!(matches!(
            bundle_entries(&json!({"resourceType": "OperationOutcome"})),
            Err(CollectError::InvalidResponse(_))
        ));
    }

    #[test]
    fn next_link_reads_the_next_relation() {
        let bundle = json!({
            "resourceType": "Bundle",
            "link": [
                {"relation": "self", "url": "https://ehr.test/RelatedPerson?page=1"},
                {"relation": "next", "url": "https://ehr.test/RelatedPerson?page=2"}
            ]
        });
        assert_eq!(
            next_link(&bundle).as_deref(),
            Some("https://ehr.test/RelatedPerson?page=2")
        );
        assert_eq!(next_link(&json!({"resourceType": "Bundle"})), None);
        assert_eq!(
            next_link(&json!({"link": [{"relation": "next", "url": " "}]})),
            None
        );
    }

    #[test]
    fn settle_only_propagates_network_errors() {
        let mut artifacts = ArtifactBundle::new();
        let missing = settle(
            &mut artifacts,
            ArtifactLabel::MotherCoverage,
            NO_REQUEST.to_string(),
            Err(CollectError::MissingDependency(ArtifactLabel::MotherCoverage)),
        );
        assert!(missing.is_ok());
        assert_eq!(
            artifacts.get(ArtifactLabel::MotherCoverage).unwrap().error_message(),
            Some("Patient required for Mother Coverage")
        );

        let down = settle(
            &mut artifacts,
            ArtifactLabel::ChildPatient,
            "/Patient".to_string(),
            Err(CollectError::Network("connection refused".to_string())),
        );
        assert!(down.is_err());
        assert!(artifacts.get(ArtifactLabel::ChildPatient).unwrap().is_error());
    }

    #[test]
    fn mother_identifier_explains_each_gap() {
        let mut artifacts = ArtifactBundle::new();
        assert_eq!(
            mother_identifier(&artifacts).unwrap_err().to_string(),
            "No related persons found"
        );

        artifacts.insert(ArtifactEntry::resources(
            ArtifactLabel::RelatedPersons,
            "/RelatedPerson",
            vec![json!({"relationship": [{"coding": [{"system": "http://terminology.hl7.org/CodeSystem/v3-RoleCode", "code": "MTH"}]}]})],
        ));
        assert_eq!(
            mother_identifier(&artifacts).unwrap_err().to_string(),
            "No identifier found on birth parent"
        );
    }
}
