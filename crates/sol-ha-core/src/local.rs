//! ---
//! ha_section: "01-failover-core"
//! ha_subsection: "module"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "Failover decision core and role transitions."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
use std::sync::Arc;

use async_trait::async_trait;
use sol_ha_common::{IdentityPair, Role};
use sol_ha_rpc::ValidatorRpcClient;
use tracing::warn;

/// The local validator process as seen by the supervisor.
///
/// Both operations fail closed: an unreachable process reports an unknown
/// role and is considered unhealthy.
#[async_trait]
pub trait LocalValidator: Send + Sync {
    async fn current_role(&self) -> Role;
    async fn is_healthy(&self) -> bool;
}

/// Production implementation backed by the validator's RPC endpoint.
pub struct RpcLocalValidator {
    rpc: ValidatorRpcClient,
    identities: Arc<IdentityPair>,
}

impl RpcLocalValidator {
    pub fn new(rpc: ValidatorRpcClient, identities: Arc<IdentityPair>) -> Self {
        Self { rpc, identities }
    }
}

#[async_trait]
impl LocalValidator for RpcLocalValidator {
    async fn current_role(&self) -> Role {
        match self.rpc.get_identity().await {
            Ok(pubkey) => {
                let role = self.identities.role_for(&pubkey);
                if role == Role::Unknown {
                    warn!(pubkey = %pubkey, "local validator reports an unrecognised identity");
                }
                role
            }
            Err(err) => {
                warn!(error = %err, "failed to query local validator identity");
                Role::Unknown
            }
        }
    }

    async fn is_healthy(&self) -> bool {
        match self.rpc.get_health().await {
            Ok(healthy) => healthy,
            Err(err) => {
                warn!(error = %err, "failed to query local validator health");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};
    use sol_ha_common::Keypair;
    use std::io::Write;
    use std::time::Duration;

    fn identity_pair() -> Arc<IdentityPair> {
        let write = |keypair: &Keypair| {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            let bytes: Vec<u8> = keypair.to_keypair_bytes().to_vec();
            file.write_all(serde_json::to_string(&bytes).unwrap().as_bytes())
                .unwrap();
            file
        };
        let active = write(&Keypair::from_seed([1u8; 32]));
        let passive = write(&Keypair::from_seed([2u8; 32]));
        let pair = IdentityPair::load(&sol_ha_common::config::IdentityPathsConfig {
            active: active.path().to_path_buf(),
            passive: passive.path().to_path_buf(),
        })
        .unwrap();
        Arc::new(pair)
    }

    async fn spawn_identity_server(identity: String, healthy: bool) -> String {
        let app = Router::new().route(
            "/",
            post(move |Json(request): Json<serde_json::Value>| {
                let identity = identity.clone();
                async move {
                    match request["method"].as_str() {
                        Some("getIdentity") => Json(serde_json::json!({
                            "jsonrpc": "2.0", "id": 1,
                            "result": {"identity": identity},
                        })),
                        Some("getHealth") if healthy => Json(serde_json::json!({
                            "jsonrpc": "2.0", "id": 1, "result": "ok",
                        })),
                        _ => Json(serde_json::json!({
                            "jsonrpc": "2.0", "id": 1,
                            "error": {"code": -32005, "message": "node is behind"},
                        })),
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn maps_reported_pubkey_to_role() {
        let identities = identity_pair();
        let url =
            spawn_identity_server(identities.active.pubkey().to_owned(), true).await;
        let local = RpcLocalValidator::new(
            ValidatorRpcClient::new(url, Duration::from_secs(1)).unwrap(),
            identities.clone(),
        );
        assert_eq!(local.current_role().await, Role::Active);
        assert!(local.is_healthy().await);
    }

    #[tokio::test]
    async fn unrecognised_pubkey_is_unknown() {
        let identities = identity_pair();
        let url = spawn_identity_server("SomeOtherPubkey".to_owned(), false).await;
        let local = RpcLocalValidator::new(
            ValidatorRpcClient::new(url, Duration::from_secs(1)).unwrap(),
            identities,
        );
        assert_eq!(local.current_role().await, Role::Unknown);
        assert!(!local.is_healthy().await);
    }

    #[tokio::test]
    async fn unreachable_process_fails_closed() {
        let identities = identity_pair();
        let local = RpcLocalValidator::new(
            ValidatorRpcClient::new("http://127.0.0.1:1".to_owned(), Duration::from_millis(200))
                .unwrap(),
            identities,
        );
        assert_eq!(local.current_role().await, Role::Unknown);
        assert!(!local.is_healthy().await);
    }
}
