//! Graph store client: read-only DQL queries against a Dgraph alpha over HTTP.

use crate::config::StoreConfig;
use crate::error::StoreError;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Query variables, keyed with the leading `$`.
pub type Variables = BTreeMap<String, String>;

/// The only contract the pipeline has with the store. Implementations must
/// report failures as `Err`, never as an empty success.
pub trait GraphClient: Send {
    /// Run a read-only query; returns the `data` object of the response.
    fn query(&self, text: &str, variables: &Variables) -> Result<Value, StoreError>;
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
    variables: &'a Variables,
}

pub struct DgraphHttpClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl DgraphHttpClient {
    /// Build the client and probe `/health`. An unreachable store is an error
    /// here rather than on the first query.
    pub fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let base_url = config.base_url();
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| StoreError::Connect {
                addr: base_url.clone(),
                reason: e.to_string(),
            })?;

        let health = client
            .get(format!("{}/health", base_url))
            .send()
            .map_err(|e| StoreError::Connect {
                addr: base_url.clone(),
                reason: e.to_string(),
            })?;
        if !health.status().is_success() {
            return Err(StoreError::Connect {
                addr: base_url,
                reason: format!("health check returned {}", health.status()),
            });
        }

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Value, StoreError> {
        let url = format!("{}{}", self.base_url, path);
        let res = self.client.post(&url).json(body).send()?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }
        Ok(res.json::<Value>()?)
    }
}

impl GraphClient for DgraphHttpClient {
    fn query(&self, text: &str, variables: &Variables) -> Result<Value, StoreError> {
        debug!(vars = ?variables, "dgraph query");
        let response = self.post(
            "/query?ro=true",
            &QueryBody {
                query: text,
                variables,
            },
        )?;
        into_data(response)
    }
}

/// Split a Dgraph response envelope into its `data` object or the server errors.
fn into_data(mut response: Value) -> Result<Value, StoreError> {
    if let Some(Value::Array(errors)) = response.get("errors") {
        if !errors.is_empty() {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| {
                    e.get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| e.to_string())
                })
                .collect();
            return Err(StoreError::Server(messages.join("; ")));
        }
    }
    match response.get_mut("data").map(Value::take) {
        Some(data @ Value::Object(_)) => Ok(data),
        _ => Err(StoreError::Malformed("response has no data object".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_with_data() {
        let data = into_data(json!({"data": {"queryHosts": []}, "extensions": {}})).unwrap();
        assert_eq!(data, json!({"queryHosts": []}));
    }

    #[test]
    fn envelope_with_errors_is_failure() {
        let err = into_data(json!({"errors": [{"message": "bad predicate"}], "data": null}))
            .unwrap_err();
        assert!(matches!(err, StoreError::Server(ref m) if m == "bad predicate"));
    }

    #[test]
    fn envelope_without_data_is_failure() {
        assert!(matches!(
            into_data(json!({"extensions": {}})),
            Err(StoreError::Malformed(_))
        ));
    }
}
