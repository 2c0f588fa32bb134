//! Push mechanism registration.
//!
//! Registers this device as a push second factor. The server supplies the
//! registration material (endpoint, shared secret, challenge, mechanism id)
//! through a QR code or a hidden callback in a registration tree; this
//! module proves possession of the shared secret by answering the challenge
//! with an HMAC-SHA256 response, and enrolls the device's messaging token.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bridge_traits::{HttpMethod, HttpRequest, RequestAction};
use core_runtime::CoreConfig;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, instrument};

use crate::error::{AuthError, Result};
use crate::interceptor::Dispatcher;
use crate::token_store::TokenStorage;

const LOAD_BALANCER_COOKIE_HEADER: &str = "Set-Cookie";
const MESSAGE_ID_HEADER: &str = "messageId";

/// Registration material supplied by the server, usually through a QR code
/// scanned during a registration tree.
#[derive(Clone)]
pub struct PushRegistration {
    /// Endpoint to send the registration response to.
    pub registration_endpoint: String,
    /// Endpoint later authentication challenges are answered against.
    pub authentication_endpoint: String,
    /// Base64-encoded shared secret.
    pub shared_secret: String,
    /// Base64-encoded challenge to answer.
    pub challenge: String,
    /// Server-assigned identifier for the mechanism being created.
    pub mechanism_uid: String,
    /// Identity provider shown to the user (e.g. the deployment name).
    pub issuer: String,
    /// Account the mechanism belongs to.
    pub account_name: String,
    /// Registration message identifier to echo, when the server sent one.
    pub message_id: Option<String>,
    /// Load balancer cookie to echo, when the deployment uses one.
    pub load_balancer_cookie: Option<String>,
}

impl std::fmt::Debug for PushRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushRegistration")
            .field("registration_endpoint", &self.registration_endpoint)
            .field("authentication_endpoint", &self.authentication_endpoint)
            .field("shared_secret", &"[REDACTED]")
            .field("challenge", &"[REDACTED]")
            .field("mechanism_uid", &self.mechanism_uid)
            .field("issuer", &self.issuer)
            .field("account_name", &self.account_name)
            .field("message_id", &self.message_id)
            .finish()
    }
}

/// A successfully registered push mechanism.
///
/// Carries what later authentication challenges need: the endpoint, the
/// shared secret, and the identity it belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct PushMechanism {
    pub mechanism_uid: String,
    pub issuer: String,
    pub account_name: String,
    pub registration_endpoint: String,
    pub authentication_endpoint: String,
    /// Base64-encoded shared secret for answering challenges.
    pub secret: String,
    /// Stable identifier for this device's mechanism records.
    pub device_id: String,
}

impl std::fmt::Debug for PushMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushMechanism")
            .field("mechanism_uid", &self.mechanism_uid)
            .field("issuer", &self.issuer)
            .field("account_name", &self.account_name)
            .field("authentication_endpoint", &self.authentication_endpoint)
            .field("secret", &"[REDACTED]")
            .field("device_id", &self.device_id)
            .finish()
    }
}

#[derive(Serialize)]
struct RegistrationMessage<'a> {
    #[serde(rename = "deviceId")]
    device_id: &'a str,
    #[serde(rename = "deviceType")]
    device_type: &'a str,
    #[serde(rename = "communicationType")]
    communication_type: &'a str,
    #[serde(rename = "mechanismUid")]
    mechanism_uid: &'a str,
    response: &'a str,
}

/// Registers push mechanisms against the deployment.
pub struct PushRegistrar {
    config: CoreConfig,
    dispatcher: Dispatcher,
    storage: TokenStorage,
}

impl PushRegistrar {
    pub fn new(config: CoreConfig, dispatcher: Dispatcher, storage: TokenStorage) -> Self {
        Self {
            config,
            dispatcher,
            storage,
        }
    }

    /// Register this device for the given material.
    ///
    /// # Errors
    ///
    /// [`AuthError::MechanismCreationFailed`] when the host supplied no push
    /// transport, the transport is unavailable, the device has no messaging
    /// token, or the server rejects the registration.
    #[instrument(skip(self, registration), fields(mechanism_uid = %registration.mechanism_uid))]
    pub async fn register(&self, registration: &PushRegistration) -> Result<PushMechanism> {
        let transport = self.config.push_transport.as_ref().ok_or_else(|| {
            AuthError::MechanismCreationFailed(
                "no push transport configured on this client".to_string(),
            )
        })?;

        if !transport.is_available() {
            return Err(AuthError::MechanismCreationFailed(
                "push messaging service is unavailable on this device".to_string(),
            ));
        }

        let device_token = transport
            .device_token()
            .await
            .map_err(|e| AuthError::MechanismCreationFailed(e.to_string()))?
            .ok_or_else(|| {
                AuthError::MechanismCreationFailed(
                    "device has no messaging registration token".to_string(),
                )
            })?;

        let response =
            challenge_response(&registration.shared_secret, &registration.challenge)?;
        let device_id = self.storage.device_id().await?;

        let message = RegistrationMessage {
            device_id: &device_token,
            device_type: std::env::consts::OS,
            communication_type: "gcm",
            mechanism_uid: &registration.mechanism_uid,
            response: &response,
        };

        let mut request = HttpRequest::new(
            HttpMethod::Post,
            registration.registration_endpoint.clone(),
            RequestAction::RegisterMechanism,
        )
        .json(&message)
        .map_err(|e| AuthError::Serialization(e.to_string()))?
        .timeout(self.config.timeout);

        if let Some(ref message_id) = registration.message_id {
            request = request.header(MESSAGE_ID_HEADER, message_id.clone());
        }
        if let Some(ref cookie) = registration.load_balancer_cookie {
            request = request.header(LOAD_BALANCER_COOKIE_HEADER, cookie.clone());
        }

        self.dispatcher
            .execute_expect_success(request, |status, body| {
                AuthError::MechanismCreationFailed(format!(
                    "registration endpoint returned {}: {}",
                    status, body
                ))
            })
            .await?;

        debug!("push mechanism registered");
        Ok(PushMechanism {
            mechanism_uid: registration.mechanism_uid.clone(),
            issuer: registration.issuer.clone(),
            account_name: registration.account_name.clone(),
            registration_endpoint: registration.registration_endpoint.clone(),
            authentication_endpoint: registration.authentication_endpoint.clone(),
            secret: registration.shared_secret.clone(),
            device_id,
        })
    }
}

/// Answer a registration challenge: BASE64(HMAC-SHA256(secret, challenge)),
/// with secret and challenge both base64-decoded first.
fn challenge_response(shared_secret_b64: &str, challenge_b64: &str) -> Result<String> {
    let secret = STANDARD
        .decode(shared_secret_b64)
        .map_err(|e| AuthError::MechanismCreationFailed(format!("bad shared secret: {}", e)))?;
    let challenge = STANDARD
        .decode(challenge_b64)
        .map_err(|e| AuthError::MechanismCreationFailed(format!("bad challenge: {}", e)))?;

    let mut mac = Hmac::<Sha256>::new_from_slice(&secret)
        .map_err(|e| AuthError::MechanismCreationFailed(format!("bad secret length: {}", e)))?;
    mac.update(&challenge);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::InterceptorRegistry;
    use async_trait::async_trait;
    use bridge_traits::{
        BridgeError, HttpClient, HttpResponse, PushTransport, SecureStore,
    };
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MemoryStore {
        data: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl SecureStore for MemoryStore {
        async fn set(&self, key: &str, value: &[u8]) -> std::result::Result<(), BridgeError> {
            self.data
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, BridgeError> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        async fn delete(&self, key: &str) -> std::result::Result<(), BridgeError> {
            self.data.lock().unwrap().remove(key);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingHttpClient {
        log: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl HttpClient for RecordingHttpClient {
        async fn execute(
            &self,
            request: HttpRequest,
        ) -> std::result::Result<HttpResponse, BridgeError> {
            self.log.lock().unwrap().push(request);
            Ok(HttpResponse {
                status: 200,
                headers: HashMap::new(),
                body: Bytes::from("{}"),
            })
        }
    }

    struct MockPushTransport {
        token: Option<String>,
        available: bool,
    }

    #[async_trait]
    impl PushTransport for MockPushTransport {
        async fn device_token(&self) -> std::result::Result<Option<String>, BridgeError> {
            Ok(self.token.clone())
        }

        fn is_available(&self) -> bool {
            self.available
        }
    }

    fn registrar(
        http: Arc<RecordingHttpClient>,
        transport: Option<Arc<dyn PushTransport>>,
    ) -> PushRegistrar {
        let mut builder = CoreConfig::builder()
            .server_url("https://openam.example.com/openam")
            .http_client(http)
            .secure_store(Arc::new(MemoryStore::default()));
        if let Some(transport) = transport {
            builder = builder.push_transport(transport);
        }
        let config = builder.build().unwrap();
        let dispatcher = Dispatcher::new(config.http_client.clone(), InterceptorRegistry::new());
        let storage = TokenStorage::new(config.secure_store.clone());
        PushRegistrar::new(config, dispatcher, storage)
    }

    fn registration() -> PushRegistration {
        PushRegistration {
            registration_endpoint: "https://openam.example.com/openam/json/push/sns/message?_action=register".to_string(),
            authentication_endpoint: "https://openam.example.com/openam/json/push/sns/message?_action=authenticate".to_string(),
            shared_secret: STANDARD.encode(b"shared-secret-material"),
            challenge: STANDARD.encode(b"challenge-bytes"),
            mechanism_uid: "mech-1".to_string(),
            issuer: "ForgeRock".to_string(),
            account_name: "demo".to_string(),
            message_id: Some("REGISTER:abc".to_string()),
            load_balancer_cookie: Some("amlbcookie=01".to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_posts_challenge_answer() {
        let http = Arc::new(RecordingHttpClient::default());
        let transport: Arc<dyn PushTransport> = Arc::new(MockPushTransport {
            token: Some("fcm-token-1".to_string()),
            available: true,
        });

        let mechanism = registrar(http.clone(), Some(transport))
            .register(&registration())
            .await
            .unwrap();

        assert_eq!(mechanism.mechanism_uid, "mech-1");
        assert_eq!(mechanism.issuer, "ForgeRock");
        assert_eq!(mechanism.account_name, "demo");
        assert!(!mechanism.device_id.is_empty());

        let requests = http.log.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].action, RequestAction::RegisterMechanism);
        assert_eq!(
            requests[0].headers.get("messageId"),
            Some(&"REGISTER:abc".to_string())
        );

        let body: serde_json::Value =
            serde_json::from_slice(requests[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(body["deviceId"], "fcm-token-1");
        assert_eq!(body["communicationType"], "gcm");
        assert_eq!(body["mechanismUid"], "mech-1");
        let expected = challenge_response(
            &STANDARD.encode(b"shared-secret-material"),
            &STANDARD.encode(b"challenge-bytes"),
        )
        .unwrap();
        assert_eq!(body["response"], expected.as_str());
    }

    #[tokio::test]
    async fn test_register_without_transport_fails() {
        let http = Arc::new(RecordingHttpClient::default());
        let result = registrar(http.clone(), None).register(&registration()).await;
        assert!(matches!(
            result,
            Err(AuthError::MechanismCreationFailed(_))
        ));
        assert!(http.log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_without_device_token_fails() {
        let http = Arc::new(RecordingHttpClient::default());
        let transport: Arc<dyn PushTransport> = Arc::new(MockPushTransport {
            token: None,
            available: true,
        });
        let result = registrar(http.clone(), Some(transport))
            .register(&registration())
            .await;
        assert!(matches!(
            result,
            Err(AuthError::MechanismCreationFailed(_))
        ));
        assert!(http.log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_debug_redacts_secret_material() {
        let debug = format!("{:?}", registration());
        assert!(!debug.contains(&STANDARD.encode(b"shared-secret-material")));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_challenge_response_is_deterministic() {
        let secret = STANDARD.encode(b"shared-secret-material");
        let challenge = STANDARD.encode(b"challenge-bytes");

        let a = challenge_response(&secret, &challenge).unwrap();
        let b = challenge_response(&secret, &challenge).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());

        // Different challenges produce different answers.
        let other = STANDARD.encode(b"other-challenge");
        assert_ne!(a, challenge_response(&secret, &other).unwrap());
    }

    #[test]
    fn test_challenge_response_rejects_bad_base64() {
        let result = challenge_response("not base64!!!", "also not base64!!!");
        assert!(matches!(
            result,
            Err(AuthError::MechanismCreationFailed(_))
        ));
    }

    #[test]
    fn test_known_hmac_vector() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        let secret = STANDARD.encode(b"key");
        let challenge = STANDARD.encode(b"The quick brown fox jumps over the lazy dog");
        let response = challenge_response(&secret, &challenge).unwrap();

        let expected = STANDARD.encode(
            hex_literal(
                "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8",
            ),
        );
        assert_eq!(response, expected);
    }

    fn hex_literal(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }
}
