//! Tree node wire handling.
//!
//! Each authenticate response is either another node (an `authId` plus a
//! page of callbacks) or the terminal success shape (`tokenId` plus
//! `successUrl`). The `authId` is an opaque continuation the server signs;
//! it must be echoed back verbatim on the next submit.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::callback::{Callback, CallbackPayload};
use crate::error::{AuthError, Result};
use crate::types::SsoToken;

/// One page of an in-progress tree traversal.
///
/// Owns its callbacks; submit consumes the node so a stale page cannot be
/// submitted twice.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) auth_id: String,
    pub stage: Option<String>,
    pub header: Option<String>,
    pub description: Option<String>,
    pub callbacks: Vec<Callback>,
}

impl Node {
    /// Opaque continuation token for this traversal.
    pub fn auth_id(&self) -> &str {
        &self.auth_id
    }

    /// Mutable access to the callbacks for filling in values.
    pub fn callbacks_mut(&mut self) -> &mut [Callback] {
        &mut self.callbacks
    }

    /// Serialize this node back into the submit request body.
    pub(crate) fn into_request_body(self) -> Value {
        let payloads: Vec<CallbackPayload> =
            self.callbacks.into_iter().map(Callback::into_payload).collect();
        json!({
            "authId": self.auth_id,
            "callbacks": payloads,
        })
    }
}

/// Outcome of one authenticate round-trip.
#[derive(Debug, Clone)]
pub enum TreeResult {
    /// The tree needs more input; render the node's callbacks and submit.
    Next(Node),
    /// The tree completed and issued a session token.
    Success(SsoToken),
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(rename = "authId")]
    auth_id: Option<String>,
    #[serde(default)]
    callbacks: Vec<CallbackPayload>,
    stage: Option<String>,
    header: Option<String>,
    description: Option<String>,
    #[serde(rename = "tokenId")]
    token_id: Option<String>,
    #[serde(rename = "successUrl")]
    success_url: Option<String>,
}

impl TreeResult {
    /// Parse an authenticate response body.
    ///
    /// A body with `tokenId` is terminal success; a body with `authId` is
    /// the next node. Anything else is a protocol error.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let wire: WireResponse = serde_json::from_slice(body)
            .map_err(|e| AuthError::Protocol(format!("unparseable authenticate response: {}", e)))?;

        if let Some(token_id) = wire.token_id {
            let mut token = SsoToken::new(token_id);
            if let Some(url) = wire.success_url {
                token = token.with_success_url(url);
            }
            return Ok(TreeResult::Success(token));
        }

        let auth_id = wire.auth_id.ok_or_else(|| {
            AuthError::Protocol(
                "authenticate response carries neither tokenId nor authId".to_string(),
            )
        })?;

        Ok(TreeResult::Next(Node {
            auth_id,
            stage: wire.stage,
            header: wire.header,
            description: wire.description,
            callbacks: wire
                .callbacks
                .into_iter()
                .map(Callback::from_payload)
                .collect(),
        }))
    }
}
