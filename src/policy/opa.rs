use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Read-only client for the policy store's data API.
///
/// The document shape is owned by whoever loads policy into the store, so
/// lookups are tolerant: a missing section or empty result reads as absent
/// rather than failing the call. Plain HTTP, no authentication.
#[derive(Debug, Clone)]
pub struct OpaClient {
    base: Url,
    client: Client,
}

/// Source of policy documents. Lets rule resolution run against fixtures.
#[async_trait]
pub trait PolicySource {
    /// GET a document below the data API root. `path` is rooted there,
    /// e.g. `/net/cpsnodes/thunder-1`; an empty path fetches the whole
    /// document.
    async fn fetch(&self, path: &str) -> Result<Value>;
}

impl OpaClient {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let base = Url::parse(&format!("http://{host}:{port}"))
            .with_context(|| format!("Invalid policy source address: {host}:{port}"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { base, client })
    }

    fn document_url(&self, path: &str) -> Result<Url> {
        self.base
            .join(&format!("/v1/data{path}"))
            .with_context(|| format!("Invalid policy document path: {path}"))
    }
}

#[async_trait]
impl PolicySource for OpaClient {
    async fn fetch(&self, path: &str) -> Result<Value> {
        let url = self.document_url(path)?;
        tracing::debug!("Fetching policy document: {url}");

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("Policy source request failed: {url}"))?;

        if !response.status().is_success() {
            anyhow::bail!("Policy source returned {} for {url}", response.status());
        }

        response
            .json::<Value>()
            .await
            .with_context(|| format!("Policy source returned malformed JSON for {url}"))
    }
}

/// First element of the `result` array as a non-empty string.
pub fn first_result_string(doc: &Value) -> Option<String> {
    match doc.pointer("/result")?.as_array()?.first()? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// First element of the `result` array as an unsigned rate.
///
/// The store's sample data carries rates as quoted strings, so both JSON
/// numbers and string-encoded numbers are accepted.
pub fn first_result_u64(doc: &Value) -> Option<u64> {
    match doc.pointer("/result")?.as_array()?.first()? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_builds_data_api_urls() {
        let client = OpaClient::new("10.1.1.10", 8181).unwrap();
        assert_eq!(
            client.document_url("/net/cps/orange").unwrap().as_str(),
            "http://10.1.1.10:8181/v1/data/net/cps/orange"
        );
        assert_eq!(
            client.document_url("").unwrap().as_str(),
            "http://10.1.1.10:8181/v1/data"
        );
    }

    #[test]
    fn client_rejects_unparseable_address() {
        assert!(OpaClient::new("host with spaces", 8181).is_err());
    }

    #[test]
    fn first_result_string_reads_first_element() {
        let doc = json!({"result": ["orange", "green"]});
        assert_eq!(first_result_string(&doc), Some("orange".to_string()));
    }

    #[test]
    fn first_result_string_tolerates_absence() {
        assert_eq!(first_result_string(&json!({})), None);
        assert_eq!(first_result_string(&json!({"result": []})), None);
        assert_eq!(first_result_string(&json!({"result": null})), None);
        assert_eq!(first_result_string(&json!({"result": [""]})), None);
        assert_eq!(first_result_string(&json!({"result": [42]})), None);
    }

    #[test]
    fn first_result_u64_parses_quoted_and_bare_numbers() {
        assert_eq!(first_result_u64(&json!({"result": ["100"]})), Some(100));
        assert_eq!(first_result_u64(&json!({"result": [1000]})), Some(1000));
        assert_eq!(first_result_u64(&json!({"result": ["0"]})), Some(0));
    }

    #[test]
    fn first_result_u64_tolerates_absence_and_garbage() {
        assert_eq!(first_result_u64(&json!({})), None);
        assert_eq!(first_result_u64(&json!({"result": []})), None);
        assert_eq!(first_result_u64(&json!({"result": ["fast"]})), None);
        assert_eq!(first_result_u64(&json!({"result": [-5]})), None);
    }
}
