//! Auth tree traversal.
//!
//! Talks to the realm's authenticate endpoint. A traversal starts with an
//! empty POST naming the tree, then loops: the server returns a node, the
//! caller fills its callbacks, the node is submitted back with its `authId`.
//! The server ends the loop with a `tokenId`.

use bridge_traits::{HttpMethod, HttpRequest, RequestAction};
use core_runtime::CoreConfig;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::error::{AuthError, FailureStage, Result};
use crate::interceptor::Dispatcher;
use crate::node::{Node, TreeResult};

const API_VERSION_HEADER: &str = "Accept-API-Version";
const AUTHENTICATE_API_VERSION: &str = "resource=2.1, protocol=1.0";

/// Client for one realm's authenticate endpoint.
///
/// Stateless: all traversal state lives in the `authId` inside the [`Node`],
/// which the caller carries between calls.
pub struct TreeClient {
    config: CoreConfig,
    dispatcher: Dispatcher,
}

impl TreeClient {
    pub fn new(config: CoreConfig, dispatcher: Dispatcher) -> Self {
        Self { config, dispatcher }
    }

    /// Start traversing the named tree.
    #[instrument(skip(self))]
    pub async fn start(&self, service: &str) -> Result<TreeResult> {
        debug!(service, "starting tree traversal");
        self.post(service, json!({}), RequestAction::StartAuthenticate)
            .await
    }

    /// Submit a filled node and get the next step.
    ///
    /// Consumes the node; its `authId` continues the traversal.
    #[instrument(skip(self, node))]
    pub async fn submit(&self, service: &str, node: Node) -> Result<TreeResult> {
        self.post(service, node.into_request_body(), RequestAction::Authenticate)
            .await
    }

    async fn post(&self, service: &str, body: Value, action: RequestAction) -> Result<TreeResult> {
        let request = HttpRequest::new(HttpMethod::Post, self.config.authenticate_url(service), action)
            .header(API_VERSION_HEADER, AUTHENTICATE_API_VERSION)
            .json(&body)
            .map_err(|e| AuthError::Serialization(e.to_string()))?
            .timeout(self.config.timeout);

        let response = self.dispatcher.execute(request).await?;

        if response.is_success() {
            return TreeResult::parse(&response.body);
        }

        let status = response.status;
        let body_text = response
            .text()
            .unwrap_or_else(|_| "unreadable response body".to_string());
        warn!(status, service, "authenticate request rejected");

        if status == 401 && is_session_timeout(&body_text) {
            return Err(AuthError::AuthenticationExpired);
        }

        if response.is_client_error() {
            return Err(AuthError::AuthenticationFailed {
                reason: failure_reason(&body_text),
                stage: FailureStage::Tree,
                detail: format!("authenticate endpoint returned {}: {}", status, body_text),
            });
        }

        Err(AuthError::Protocol(format!(
            "authenticate endpoint returned {}: {}",
            status, body_text
        )))
    }
}

/// The server reports an expired `authId` lease as a 401 whose detail names
/// a session timeout (error code 110).
fn is_session_timeout(body: &str) -> bool {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return false;
    };
    let code = value
        .pointer("/detail/errorCode")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let message = value.get("message").and_then(|v| v.as_str()).unwrap_or("");
    code == "110" || message.contains("Session has timed out")
}

fn failure_reason(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "authentication rejected".to_string())
}
