//! Minimal JSON-RPC 2.0 client over HTTP.
//!
//! Supports single calls and batches. Batch responses are matched to
//! requests by id, since nodes are free to answer a batch in any order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One outgoing JSON-RPC request.
#[derive(Debug, Clone, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    params: Value,
}

/// Error object in a JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// One incoming JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// HTTP JSON-RPC client bound to one endpoint.
pub struct JsonRpcClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Create a client for `url` with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Transport`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    /// The endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Call one method and decode its result.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Node`] if the node reports an error, and
    /// [`RpcError::Transport`] / [`RpcError::Status`] / [`RpcError::Decode`]
    /// for everything that prevents reading a result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcError> {
        let mut results = self.batch(&[(method, params)]).await?;
        let result = results
            .pop()
            .ok_or_else(|| RpcError::Decode("empty response".to_owned()))?;
        decode_result(method, result)
    }

    /// Send several calls of one method as a single batch.
    ///
    /// Results are returned in request order.
    ///
    /// # Errors
    ///
    /// Fails as a whole if any call fails; see [`Self::call`].
    pub async fn batch_call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Vec<T>, RpcError> {
        if params.is_empty() {
            return Ok(Vec::new());
        }
        let calls: Vec<(&str, Value)> = params.into_iter().map(|p| (method, p)).collect();
        self.batch(&calls)
            .await?
            .into_iter()
            .map(|result| decode_result(method, result))
            .collect()
    }

    /// Send `(method, params)` calls as one batch, returning raw results in
    /// request order.
    async fn batch(&self, calls: &[(&str, Value)]) -> Result<Vec<Value>, RpcError> {
        let first_id = self
            .next_id
            .fetch_add(calls.len() as u64, Ordering::Relaxed);
        let requests: Vec<RpcRequest> = calls
            .iter()
            .zip(first_id..)
            .map(|((method, params), id)| RpcRequest {
                jsonrpc: "2.0",
                id,
                method: (*method).to_owned(),
                params: params.clone(),
            })
            .collect();

        tracing::debug!(
            url = %self.url,
            requests = requests.len(),
            method = calls.first().map_or("", |(method, _)| *method),
            "Sending JSON-RPC batch"
        );

        let response = self
            .client
            .post(&self.url)
            .json(&requests)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(RpcError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RpcError::Decode(format!("response is not JSON: {e}")))?;
        match_responses(&requests, body)
    }
}

/// Match a response body to the requests that produced it.
///
/// Accepts a JSON array (the normal batch answer) or a single object (a
/// single answer, or a node rejecting the whole batch).
fn match_responses(requests: &[RpcRequest], body: Value) -> Result<Vec<Value>, RpcError> {
    let responses: Vec<RpcResponse> = match body {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| RpcError::Decode(e.to_string()))?,
        other => vec![serde_json::from_value(other).map_err(|e| RpcError::Decode(e.to_string()))?],
    };

    let mut by_id: HashMap<u64, RpcResponse> = HashMap::with_capacity(responses.len());
    for response in responses {
        match response.id {
            Some(id) => {
                by_id.insert(id, response);
            }
            None => {
                // Only errors may lack an id; they apply to the whole batch.
                let error = response.error.ok_or_else(|| {
                    RpcError::Decode("response without id or error".to_owned())
                })?;
                return Err(RpcError::Node {
                    method: requests
                        .first()
                        .map_or_else(String::new, |request| request.method.clone()),
                    code: error.code,
                    message: error.message,
                });
            }
        }
    }

    requests
        .iter()
        .map(|request| {
            let response = by_id
                .remove(&request.id)
                .ok_or(RpcError::MissingResponse { id: request.id })?;
            if let Some(error) = response.error {
                return Err(RpcError::Node {
                    method: request.method.clone(),
                    code: error.code,
                    message: error.message,
                });
            }
            Ok(response.result.unwrap_or(Value::Null))
        })
        .collect()
}

fn decode_result<T: DeserializeOwned>(method: &str, result: Value) -> Result<T, RpcError> {
    serde_json::from_value(result)
        .map_err(|e| RpcError::Decode(format!("unexpected {method} result: {e}")))
}
