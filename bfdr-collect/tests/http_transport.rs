use bfdr_collect::{CollectConfig, CollectError, HttpTransport, Transport, MOTHER_BURST};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport_for(server: &MockServer, token: Option<&str>) -> HttpTransport {
    HttpTransport::new(&CollectConfig {
        base_url: format!("{}/", server.uri()),
        access_token: token.map(str::to_string),
        ..CollectConfig::default()
    })
}

#[tokio::test]
async fn search_sends_fhir_headers_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Observation"))
        .and(query_param("patient", "m1"))
        .and(query_param("code", "http://loinc.org|29463-7"))
        .and(header("Accept", "application/fhir+json"))
        .and(header("Authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "entry": [{"resource": {"resourceType": "Observation", "id": "w1"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server, Some("secret"));
    let bundle = transport.search(&MOTHER_BURST[0].query("m1")).await.unwrap();
    assert_eq!(bundle["entry"][0]["resource"]["id"], "w1");
}

#[tokio::test]
async fn non_success_status_is_an_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Observation"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = transport_for(&server, None)
        .search(&MOTHER_BURST[0].query("m1"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CollectError::Http {
            status: 500,
            body: "boom".to_string()
        }
    );
}

#[tokio::test]
async fn undecodable_body_is_an_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = transport_for(&server, None)
        .search(&MOTHER_BURST[0].query("m1"))
        .await
        .unwrap_err();
    assert!(matches!(err, CollectError::InvalidResponse(_)), "{err:?}");
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let transport = HttpTransport::new(&CollectConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        ..CollectConfig::default()
    });
    let err = transport
        .search(&MOTHER_BURST[0].query("m1"))
        .await
        .unwrap_err();
    assert!(err.is_network(), "{err:?}");
}

#[tokio::test]
async fn follow_fetches_absolute_and_relative_page_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/RelatedPerson"))
        .and(query_param("page", "2"))
        .and(header("Authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "entry": [{"resource": {"resourceType": "RelatedPerson", "id": "p2"}}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let transport = transport_for(&server, Some("secret"));
    let absolute = format!("{}/RelatedPerson?page=2", server.uri());
    let page = transport.follow(&absolute).await.unwrap();
    assert_eq!(page["entry"][0]["resource"]["id"], "p2");

    let page = transport.follow("RelatedPerson?page=2").await.unwrap();
    assert_eq!(page["entry"][0]["resource"]["id"], "p2");
}
