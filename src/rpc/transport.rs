//! JSON-RPC 2.0 wire types and the HTTP upstream transport.

use crate::payment::Voucher;
use crate::rpc::error::{RpcError, RpcResult};
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// A JSON-RPC 2.0 request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Method name.
    pub method: String,
    /// Positional parameters.
    pub params: Vec<Value>,
    /// Request id.
    pub id: u64,
    /// Always `"2.0"`.
    pub jsonrpc: String,
}

impl JsonRpcRequest {
    /// Build a request.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Vec<Value>, id: u64) -> Self {
        Self {
            method: method.into(),
            params,
            id,
            jsonrpc: "2.0".to_string(),
        }
    }
}

/// Error object of a JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcErrorObject {
    /// Error code.
    #[serde(default)]
    pub code: i64,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Optional data.
    #[serde(default)]
    pub data: Option<Value>,
}

/// A JSON-RPC 2.0 response body.
///
/// A body carrying neither `result` nor `error` is not a JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    /// Call result. `Some(Value::Null)` when the upstream returned `null`.
    #[serde(default, deserialize_with = "present")]
    pub result: Option<Value>,
    /// Error, when the call failed.
    #[serde(default)]
    pub error: Option<JsonRpcErrorObject>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl JsonRpcResponse {
    /// Turn the response into the call result, raising the error object if any.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Rpc`] carrying the upstream code, message and data,
    /// or [`RpcError::Decode`] if the body has neither a result nor an error.
    pub fn into_result(self) -> RpcResult<Value> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
                data: error.data,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(RpcError::Decode(
                "response has neither result nor error".to_string(),
            )),
        }
    }
}

/// The call interface seen by code making RPC calls.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Call `method` with positional `params`.
    ///
    /// # Errors
    ///
    /// Returns the upstream error unchanged, or a payment error if a paid
    /// method could not be paid for.
    async fn send(&self, method: &str, params: Vec<Value>) -> RpcResult<Value>;
}

/// Delivers a single request upstream, optionally carrying a voucher as
/// transport-level metadata.
#[async_trait]
pub trait UpstreamTransport: Send + Sync + 'static {
    /// Post `request`, attaching `voucher` outside the JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails or the upstream returns an error.
    async fn post(&self, request: JsonRpcRequest, voucher: Option<Voucher>) -> RpcResult<Value>;
}

/// JSON-RPC over HTTP with the method and voucher in the query string.
pub struct HttpUpstream {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpUpstream {
    /// Create a transport posting to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid URL or the HTTP client
    /// cannot be built.
    pub fn new(endpoint: &str, timeout: Duration) -> RpcResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| RpcError::Transport(format!("invalid endpoint {endpoint}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, endpoint })
    }

    /// Endpoint URL for one request.
    #[must_use]
    pub fn request_url(&self, method: &str, voucher: Option<&Voucher>) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("method", method);
            if let Some(voucher) = voucher {
                query
                    .append_pair("channelId", &voucher.channel_id.to_string())
                    .append_pair("amount", &voucher.amount.to_string())
                    .append_pair("signature", &voucher.signature.to_string());
            }
        }
        url
    }
}

#[async_trait]
impl UpstreamTransport for HttpUpstream {
    async fn post(&self, request: JsonRpcRequest, voucher: Option<Voucher>) -> RpcResult<Value> {
        let url = self.request_url(&request.method, voucher.as_ref());
        debug!(id = request.id, method = %request.method, "rpc request");

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let parsed = serde_json::from_slice::<JsonRpcResponse>(&body);
        let result = match parsed {
            Ok(response) if response.error.is_some() || status.is_success() => {
                response.into_result()
            }
            Err(e) if status.is_success() => Err(RpcError::Decode(e.to_string())),
            _ => Err(RpcError::Transport(format!("HTTP {status}"))),
        };
        debug!(id = request.id, ok = result.is_ok(), "rpc response");
        result
    }
}
