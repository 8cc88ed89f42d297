use std::collections::HashMap;
use std::fs;
use std::sync::Mutex;

use async_trait::async_trait;
use bfdr_collect::{CollectConfig, CollectError, Collector, SearchQuery, Transport, NO_REQUEST};
use bfdr_core::{records_from_identifiers, ArtifactLabel, ExtractionConfig, RecordStatus};
use bfdr_fhir::{column_labels, derive_row};
use serde_json::{json, Value};

const CHILD_SEARCH: &str = "/Patient?identifier=urn:oid:2.16.840.1.113883.6.1000|90827350";

/// Answers searches from a request-URL keyed fixture; unknown searches get an empty Bundle.
struct FakeServer {
    responses: HashMap<String, Result<Value, CollectError>>,
    requests: Mutex<Vec<String>>,
}

impl FakeServer {
    fn from_fixture(name: &str) -> Self {
        let path = format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"));
        let text = fs::read_to_string(&path).unwrap_or_else(|err| panic!("cannot read {path}: {err}"));
        let bundles: HashMap<String, Value> = serde_json::from_str(&text).unwrap();
        Self {
            responses: bundles.into_iter().map(|(url, bundle)| (url, Ok(bundle))).collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing(mut self, request_url: &str, err: CollectError) -> Self {
        self.responses.insert(request_url.to_string(), Err(err));
        self
    }

    fn answering(mut self, request_url: &str, bundle: Value) -> Self {
        self.responses.insert(request_url.to_string(), Ok(bundle));
        self
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn search(&self, query: &SearchQuery) -> Result<Value, CollectError> {
        let url = query.request_url();
        self.requests.lock().unwrap().push(url.clone());
        self.responses
            .get(&url)
            .cloned()
            .unwrap_or_else(|| Ok(json!({"resourceType": "Bundle", "type": "searchset"})))
    }

    async fn follow(&self, url: &str) -> Result<Value, CollectError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(CollectError::Http {
                status: 404,
                body: String::new(),
            }))
    }
}

fn collector(server: FakeServer) -> Collector<FakeServer> {
    Collector::new(server, &CollectConfig::default())
}

fn column(label: &str) -> usize {
    column_labels()
        .iter()
        .position(|candidate| *candidate == label)
        .unwrap()
}

#[tokio::test]
async fn collects_a_full_record_and_marks_gaps() {
    let collector = collector(FakeServer::from_fixture("birth_server.json"));
    let mut records = records_from_identifiers("90827350");

    let summary = collector.process_selected(&mut records).await.unwrap();
    assert_eq!(summary.complete, 1);
    assert_eq!(summary.errored, 0);

    let record = &records[0];
    assert_eq!(record.status, RecordStatus::Complete);
    assert!(record.settled_at.is_some());
    assert_eq!(record.artifacts.len(), ArtifactLabel::ALL.len() - 1);
    assert_eq!(
        record.artifacts.resource(ArtifactLabel::MotherPatient).unwrap()["id"],
        "mother-1"
    );

    let coverage = record.artifacts.get(ArtifactLabel::MotherCoverage).unwrap();
    assert_eq!(coverage.request_url, "/Coverage?patient=mother-1");
    assert_eq!(
        coverage.error_message(),
        Some("Coverage did not return any results for Mother Coverage")
    );

    let requests = collector_requests(&collector);
    assert_eq!(
        &requests[..3],
        &[
            CHILD_SEARCH.to_string(),
            "/RelatedPerson?patient=child-1&-relationship-level=Patient".to_string(),
            "/Patient?identifier=urn:oid:1.2.3|M-1".to_string(),
        ]
    );

    let row = derive_row(record, &ExtractionConfig::default());
    assert_eq!(row[column("Mother First Name")].as_deref(), Some("Hana"));
    assert_eq!(row[column("Trial of Labor Attempted")].as_deref(), Some("Yes"));
    assert_eq!(
        row[column("Mother Weight at Delivery")].as_deref(),
        Some("82kg (from delivery weight observation)")
    );
    assert_eq!(
        row[column("Immediate Assisted Ventilation")].as_deref(),
        Some("Assisted ventilation (from Child's Procedures)")
    );
}

fn collector_requests(collector: &Collector<FakeServer>) -> Vec<String> {
    collector.transport().requests()
}

#[tokio::test]
async fn network_failure_on_child_patient_marks_record_error() {
    let server = FakeServer::from_fixture("birth_server.json")
        .failing(CHILD_SEARCH, CollectError::Network("connection refused".to_string()));
    let collector = collector(server);
    let mut records = records_from_identifiers("90827350\n44");

    let summary = collector.process_selected(&mut records).await.unwrap();
    assert_eq!(summary.errored, 1);
    assert_eq!(summary.complete, 1);

    let failed = &records[0];
    assert_eq!(failed.status, RecordStatus::Error);
    assert_eq!(failed.artifacts.len(), 1);
    assert_eq!(
        failed.failed_artifacts()[0].message,
        "network error: connection refused"
    );

    let orphan = &records[1];
    assert_eq!(orphan.status, RecordStatus::Complete);
    assert_eq!(
        orphan.artifacts.get(ArtifactLabel::ChildPatient).unwrap().error_message(),
        Some("Child Patient Resource search did not return single patient")
    );
    assert_eq!(
        orphan.artifacts.get(ArtifactLabel::RelatedPersons).unwrap().error_message(),
        Some("Patient required for Related Persons")
    );
    let apgar = orphan.artifacts.get(ArtifactLabel::ApgarOneMinute).unwrap();
    assert_eq!(apgar.request_url, NO_REQUEST);
    assert_eq!(apgar.error_message(), Some("Patient required for Apgar Score 1 Minute"));
}

#[tokio::test]
async fn burst_failures_stay_local_to_their_label() {
    let server = FakeServer::from_fixture("birth_server.json")
        .failing(
            "/Coverage?patient=mother-1",
            CollectError::Network("reset by peer".to_string()),
        )
        .failing(
            "/Procedure?patient=mother-1",
            CollectError::Http {
                status: 500,
                body: "boom".to_string(),
            },
        );
    let collector = collector(server);
    let mut records = records_from_identifiers("90827350");
    collector.process_selected(&mut records).await.unwrap();

    let record = &records[0];
    assert_eq!(record.status, RecordStatus::Complete);
    assert_eq!(
        record.artifacts.get(ArtifactLabel::MotherCoverage).unwrap().error_message(),
        Some("network error: reset by peer")
    );
    assert_eq!(
        record.artifacts.get(ArtifactLabel::MotherProcedures).unwrap().error_message(),
        Some("HTTP 500: boom")
    );
    assert!(record.artifacts.resources(ArtifactLabel::DeliveryDate).is_some());
}

#[tokio::test]
async fn missing_birth_parent_still_collects_child_burst() {
    let server = FakeServer::from_fixture("birth_server.json").failing(
        "/RelatedPerson?patient=child-1&-relationship-level=Patient",
        CollectError::Http {
            status: 403,
            body: String::new(),
        },
    );
    let collector = collector(server);
    let mut records = records_from_identifiers("90827350");
    collector.process_selected(&mut records).await.unwrap();

    let record = &records[0];
    assert_eq!(record.status, RecordStatus::Complete);
    assert_eq!(
        record.artifacts.get(ArtifactLabel::MotherPatient).unwrap().error_message(),
        Some("No related persons found")
    );
    assert_eq!(
        record.artifacts.get(ArtifactLabel::MotherWeight).unwrap().error_message(),
        Some("Patient required for Mother Weight")
    );
    assert!(record.artifacts.resources(ArtifactLabel::ChildProcedures).is_some());
    assert!(collector_requests(&collector)
        .iter()
        .all(|request| !request.contains("mother-1")));
}

#[tokio::test]
async fn only_selected_unstarted_records_are_processed() {
    let collector = collector(FakeServer::from_fixture("birth_server.json"));
    let mut records = records_from_identifiers("11, 22, 90827350");
    records[0].selected = false;
    records[1].advance(RecordStatus::InProgress).unwrap();
    records[1].advance(RecordStatus::Complete).unwrap();

    let summary = collector.process_selected(&mut records).await.unwrap();
    assert_eq!(summary.complete, 1);

    assert_eq!(records[0].status, RecordStatus::NotStarted);
    assert!(records[0].artifacts.is_empty());
    assert!(records[1].artifacts.is_empty());
    assert_eq!(records[2].status, RecordStatus::Complete);

    let requests = collector_requests(&collector);
    assert_eq!(requests[0], CHILD_SEARCH);
    assert!(requests.iter().all(|request| !request.ends_with("|11") && !request.ends_with("|22")));
}

const RELATED_SEARCH: &str = "/RelatedPerson?patient=child-1&-relationship-level=Patient";
const SECOND_PAGE: &str = "https://ehr.test/fhir/RelatedPerson?patient=child-1&page=2";

/// The fixture's birth-parent RelatedPerson, moved onto a second page.
fn paged_server() -> FakeServer {
    let server = FakeServer::from_fixture("birth_server.json");
    let mother = server.responses[RELATED_SEARCH].as_ref().unwrap()["entry"][0].clone();
    server
        .answering(
            RELATED_SEARCH,
            json!({
                "resourceType": "Bundle",
                "link": [{"relation": "next", "url": SECOND_PAGE}],
                "entry": [{"resource": {
                    "resourceType": "RelatedPerson",
                    "id": "grandmother",
                    "relationship": [{"coding": [{"code": "GRMTH"}]}]
                }}]
            }),
        )
        .answering(
            SECOND_PAGE,
            json!({"resourceType": "Bundle", "entry": [mother]}),
        )
}

#[tokio::test]
async fn related_persons_follow_next_pages() {
    let collector = collector(paged_server());
    let mut records = records_from_identifiers("90827350");
    collector.process_selected(&mut records).await.unwrap();

    let record = &records[0];
    assert_eq!(record.status, RecordStatus::Complete);
    let related = record.artifacts.get(ArtifactLabel::RelatedPersons).unwrap();
    assert_eq!(related.request_url, RELATED_SEARCH);
    let people = related.as_resources().unwrap();
    assert_eq!(people.len(), 2);
    assert_eq!(people[0]["id"], "grandmother");
    assert_eq!(
        record.artifacts.resource(ArtifactLabel::MotherPatient).unwrap()["id"],
        "mother-1"
    );

    let requests = collector_requests(&collector);
    assert_eq!(
        &requests[1..4],
        &[
            RELATED_SEARCH.to_string(),
            SECOND_PAGE.to_string(),
            "/Patient?identifier=urn:oid:1.2.3|M-1".to_string(),
        ]
    );
}

#[tokio::test]
async fn failed_next_page_keeps_earlier_pages() {
    let server = paged_server().failing(
        SECOND_PAGE,
        CollectError::Http {
            status: 502,
            body: String::new(),
        },
    );
    let collector = collector(server);
    let mut records = records_from_identifiers("90827350");
    collector.process_selected(&mut records).await.unwrap();

    let record = &records[0];
    assert_eq!(record.status, RecordStatus::Complete);
    assert_eq!(
        record.artifacts.resources(ArtifactLabel::RelatedPersons).unwrap().len(),
        1
    );
    assert_eq!(
        record.artifacts.get(ArtifactLabel::MotherPatient).unwrap().error_message(),
        Some("No birth parent found in related persons")
    );
}

#[tokio::test]
async fn network_failure_on_next_page_marks_record_error() {
    let server = paged_server().failing(
        SECOND_PAGE,
        CollectError::Network("connection reset".to_string()),
    );
    let collector = collector(server);
    let mut records = records_from_identifiers("90827350");
    let summary = collector.process_selected(&mut records).await.unwrap();

    assert_eq!(summary.errored, 1);
    assert_eq!(records[0].status, RecordStatus::Error);
    assert!(records[0].artifacts.resources(ArtifactLabel::RelatedPersons).is_some());
    assert!(!records[0].artifacts.contains(ArtifactLabel::MotherPatient));
}
