//! ---
//! ha_section: "03-cluster-rpc"
//! ha_subsection: "module"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "JSON-RPC clients for cluster and local validator endpoints."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised by the JSON-RPC clients.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("failed to construct http client")]
    Client(#[source] reqwest::Error),
    #[error("transport error calling {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("node error from {url}: {message} (code {code})")]
    Node {
        url: String,
        code: i64,
        message: String,
    },
    #[error("malformed response from {url}: {detail}")]
    Malformed { url: String, detail: String },
    #[error("all {attempted} cluster RPC endpoints failed")]
    AllEndpointsFailed {
        attempted: usize,
        #[source]
        last: Box<RpcError>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct RpcResponse<T> {
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// One entry of the `getClusterNodes` directory. Only the pubkey and the
/// gossip endpoint are consumed; everything else is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterNode {
    pub pubkey: String,
    #[serde(default)]
    pub gossip: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdentityResult {
    identity: String,
}

async fn call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
) -> Result<T, RpcError> {
    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
    });
    let response = client
        .post(url)
        .json(&body)
        .send()
        .await
        .map_err(|source| RpcError::Transport {
            url: url.to_owned(),
            source,
        })?;
    let parsed: RpcResponse<T> =
        response
            .json()
            .await
            .map_err(|source| RpcError::Transport {
                url: url.to_owned(),
                source,
            })?;

    if let Some(error) = parsed.error {
        return Err(RpcError::Node {
            url: url.to_owned(),
            code: error.code,
            message: error.message,
        });
    }
    parsed.result.ok_or_else(|| RpcError::Malformed {
        url: url.to_owned(),
        detail: format!("{method} response carries neither result nor error"),
    })
}

/// Client for the cluster membership directory.
///
/// Holds the configured RPC URLs in preference order; each call walks the
/// list and returns the first successful response.
#[derive(Debug, Clone)]
pub struct ClusterRpcClient {
    urls: Vec<String>,
    client: reqwest::Client,
}

impl ClusterRpcClient {
    pub fn new(urls: Vec<String>, timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RpcError::Client)?;
        Ok(Self { urls, client })
    }

    /// Fetch the current cluster node list.
    pub async fn get_cluster_nodes(&self) -> Result<Vec<ClusterNode>, RpcError> {
        let mut last_error: Option<RpcError> = None;
        for url in &self.urls {
            match call::<Vec<ClusterNode>>(&self.client, url, "getClusterNodes").await {
                Ok(nodes) => {
                    debug!(url = %url, node_count = nodes.len(), "cluster nodes fetched");
                    return Ok(nodes);
                }
                Err(err) => {
                    warn!(url = %url, error = %err, "cluster RPC endpoint failed");
                    last_error = Some(err);
                }
            }
        }
        let last = last_error.unwrap_or(RpcError::Malformed {
            url: "<none>".to_owned(),
            detail: "no cluster RPC URLs configured".to_owned(),
        });
        Err(RpcError::AllEndpointsFailed {
            attempted: self.urls.len(),
            last: Box::new(last),
        })
    }
}

/// Client for the local validator's RPC endpoint.
#[derive(Debug, Clone)]
pub struct ValidatorRpcClient {
    url: String,
    client: reqwest::Client,
}

impl ValidatorRpcClient {
    pub fn new(url: String, timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RpcError::Client)?;
        Ok(Self { url, client })
    }

    /// The base58 pubkey the validator is currently running under.
    pub async fn get_identity(&self) -> Result<String, RpcError> {
        let result: IdentityResult = call(&self.client, &self.url, "getIdentity").await?;
        Ok(result.identity)
    }

    /// Whether the validator reports itself healthy.
    ///
    /// An unhealthy node answers with an RPC error object; that is a valid
    /// response, not a transport failure.
    pub async fn get_health(&self) -> Result<bool, RpcError> {
        match call::<String>(&self.client, &self.url, "getHealth").await {
            Ok(result) => Ok(result == "ok"),
            Err(RpcError::Node { url, code, message }) => {
                debug!(url = %url, code, message = %message, "validator reports unhealthy");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}
