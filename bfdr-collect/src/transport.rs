use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::catalog::SearchQuery;
use crate::config::CollectConfig;
use crate::error::CollectError;

/// Runs FHIR searches and returns the raw Bundle.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Value, CollectError>;

    /// Fetches a Bundle page named by a `link[relation=next]` URL.
    async fn follow(&self, url: &str) -> Result<Value, CollectError>;
}

/// [`Transport`] over HTTP with an optional bearer token.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &CollectConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        }
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.get(url);
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }
        req.header("Accept", "application/fhir+json")
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn search(&self, query: &SearchQuery) -> Result<Value, CollectError> {
        let url = format!("{}/{}", self.base_url, query.resource_type);
        debug!(request = %query.request_url(), "searching");
        let resp = self
            .request(&url)
            .query(&query.params)
            .send()
            .await
            .map_err(|err| CollectError::Network(err.to_string()))?;
        handle_response(resp).await
    }

    async fn follow(&self, url: &str) -> Result<Value, CollectError> {
        let url = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base_url, url.trim_start_matches('/'))
        };
        debug!(request = %url, "following page");
        let resp = self
            .request(&url)
            .send()
            .await
            .map_err(|err| CollectError::Network(err.to_string()))?;
        handle_response(resp).await
    }
}

async fn handle_response(resp: reqwest::Response) -> Result<Value, CollectError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(CollectError::Http {
            status: status.as_u16(),
            body,
        });
    }
    resp.json::<Value>()
        .await
        .map_err(|err| CollectError::InvalidResponse(err.to_string()))
}
