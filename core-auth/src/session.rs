//! Client facade.
//!
//! [`AuthClient`] wires the tree client, OAuth client, token manager, and
//! SSO manager over one configuration and exposes the interactive walk:
//! start a flow, render the returned node's callbacks, fill them, advance,
//! repeat until [`Step::Session`] or [`Step::User`].
//!
//! One interactive flow at a time per client. Starting a second flow while
//! an [`AuthFlow`] is alive fails with `AuthenticationInProgress`; dropping
//! the flow abandons it and frees the slot (the server forgets the `authId`
//! on its own lease timeout).

use core_runtime::{AuthLifecycleEvent, CoreConfig, CoreEvent, EventBus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{AuthError, Result};
use crate::interceptor::{Dispatcher, InterceptorRegistry, RequestInterceptor};
use crate::node::{Node, TreeResult};
use crate::oauth::OAuth2Client;
use crate::sso::SingleSignOnManager;
use crate::token_manager::TokenManager;
use crate::token_store::TokenStorage;
use crate::tree::TreeClient;
use crate::types::SsoToken;
use crate::user::User;

/// What a completed flow should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlowPurpose {
    /// Establish a user: persist the session, then mint tokens eagerly.
    Login,
    /// Same as login, against the registration tree.
    Register,
    /// Session only: persist the token, mint nothing.
    Session,
}

/// Clears the client's in-progress slot when the flow ends, however it ends.
struct FlowGuard {
    slot: Arc<AtomicBool>,
}

impl Drop for FlowGuard {
    fn drop(&mut self) {
        self.slot.store(false, Ordering::SeqCst);
    }
}

/// An in-progress tree traversal, owned by the caller.
///
/// Fill the node's callbacks through [`AuthFlow::node_mut`], then hand the
/// flow back to [`AuthClient::advance`]. Dropping the flow abandons it.
pub struct AuthFlow {
    purpose: FlowPurpose,
    service: String,
    node: Node,
    guard: FlowGuard,
}

impl AuthFlow {
    /// The node awaiting input.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Mutable access for filling callbacks.
    pub fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    /// The tree this flow is traversing.
    pub fn service(&self) -> &str {
        &self.service
    }
}

impl std::fmt::Debug for AuthFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthFlow")
            .field("service", &self.service)
            .field("stage", &self.node.stage)
            .field("callbacks", &self.node.callbacks.len())
            .finish()
    }
}

/// Outcome of starting or advancing a flow.
#[derive(Debug)]
pub enum Step {
    /// The tree needs more input.
    Prompt(AuthFlow),
    /// A session-only flow completed with this session token.
    Session(SsoToken),
    /// A login or registration flow completed.
    User(User),
}

pub(crate) struct SharedCore {
    pub(crate) config: CoreConfig,
    pub(crate) events: EventBus,
    pub(crate) tree: TreeClient,
    pub(crate) oauth: Arc<OAuth2Client>,
    pub(crate) sso: SingleSignOnManager,
    pub(crate) storage: TokenStorage,
    pub(crate) tokens: TokenManager,
    pub(crate) dispatcher: Dispatcher,
}

/// Entry point for authentication against one deployment.
#[derive(Clone)]
pub struct AuthClient {
    shared: Arc<SharedCore>,
    in_progress: Arc<AtomicBool>,
}

impl AuthClient {
    /// Build a client from a validated configuration.
    pub fn new(config: CoreConfig) -> Self {
        Self::with_interceptors(config, InterceptorRegistry::new())
    }

    /// Build a client with a pre-populated interceptor chain.
    pub fn with_interceptors(config: CoreConfig, registry: InterceptorRegistry) -> Self {
        let dispatcher = Dispatcher::new(config.http_client.clone(), registry);
        let events = EventBus::default();
        let storage = TokenStorage::new(config.secure_store.clone());
        let oauth = Arc::new(OAuth2Client::new(config.clone(), dispatcher.clone()));
        let sso = SingleSignOnManager::new(storage.clone(), oauth.clone());
        let tokens = TokenManager::new(storage.clone(), oauth.clone(), events.clone());
        let tree = TreeClient::new(config.clone(), dispatcher.clone());

        Self {
            shared: Arc::new(SharedCore {
                config,
                events,
                tree,
                oauth,
                sso,
                storage,
                tokens,
                dispatcher,
            }),
            in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register a request interceptor on this client's chain.
    pub fn register_interceptor(&self, interceptor: Arc<dyn RequestInterceptor>) {
        self.shared.dispatcher.registry().register(interceptor);
    }

    /// Remove a previously registered interceptor. Returns whether it was
    /// found in the chain.
    pub fn unregister_interceptor(&self, interceptor: &Arc<dyn RequestInterceptor>) -> bool {
        self.shared.dispatcher.registry().unregister(interceptor)
    }

    /// Event stream for auth and token lifecycle notifications.
    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    /// Registrar for enrolling this device as a push second factor.
    pub fn push_registrar(&self) -> crate::mechanism::PushRegistrar {
        crate::mechanism::PushRegistrar::new(
            self.shared.config.clone(),
            self.shared.dispatcher.clone(),
            self.shared.storage.clone(),
        )
    }

    /// Whether a session token is stored.
    pub async fn has_session(&self) -> Result<bool> {
        self.shared.sso.has_session().await
    }

    /// A [`User`] handle when a session is stored, `None` otherwise.
    pub async fn current_user(&self) -> Result<Option<User>> {
        if self.shared.sso.has_session().await? {
            Ok(Some(User::new(self.shared.clone())))
        } else {
            Ok(None)
        }
    }

    /// Start the login tree.
    ///
    /// Fails with [`AuthError::AlreadyAuthenticated`] when a session already
    /// exists; log out first.
    #[instrument(skip(self))]
    pub async fn login(&self) -> Result<Step> {
        if self.shared.sso.has_session().await? {
            return Err(AuthError::AlreadyAuthenticated);
        }
        let service = self.shared.config.auth_service.clone();
        self.start_flow(FlowPurpose::Login, service).await
    }

    /// Start the registration tree.
    #[instrument(skip(self))]
    pub async fn register(&self) -> Result<Step> {
        if self.shared.sso.has_session().await? {
            return Err(AuthError::AlreadyAuthenticated);
        }
        let service = self.shared.config.registration_service.clone();
        self.start_flow(FlowPurpose::Register, service).await
    }

    /// Start an arbitrary tree, session-only.
    ///
    /// Unlike [`AuthClient::login`], an existing session is allowed: a new
    /// token from the tree replaces it, and any access token bundle minted
    /// against the old session is revoked and dropped.
    #[instrument(skip(self))]
    pub async fn authenticate(&self, service: &str) -> Result<Step> {
        self.start_flow(FlowPurpose::Session, service.to_string())
            .await
    }

    /// Submit a filled flow and get the next step.
    #[instrument(skip(self, flow))]
    pub async fn advance(&self, flow: AuthFlow) -> Result<Step> {
        let AuthFlow {
            purpose,
            service,
            node,
            guard,
        } = flow;

        let result = self.shared.tree.submit(&service, node).await;
        self.handle_tree_result(purpose, service, result, guard)
            .await
    }

    async fn start_flow(&self, purpose: FlowPurpose, service: String) -> Result<Step> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AuthError::AuthenticationInProgress);
        }
        let guard = FlowGuard {
            slot: self.in_progress.clone(),
        };

        self.shared
            .events
            .emit(CoreEvent::Auth(AuthLifecycleEvent::FlowStarted {
                service: service.clone(),
            }))
            .ok();

        let result = self.shared.tree.start(&service).await;
        self.handle_tree_result(purpose, service, result, guard)
            .await
    }

    async fn handle_tree_result(
        &self,
        purpose: FlowPurpose,
        service: String,
        result: Result<TreeResult>,
        guard: FlowGuard,
    ) -> Result<Step> {
        match result {
            Ok(TreeResult::Next(node)) => {
                self.shared
                    .events
                    .emit(CoreEvent::Auth(AuthLifecycleEvent::FlowContinued {
                        service: service.clone(),
                        stage: node.stage.clone(),
                    }))
                    .ok();
                Ok(Step::Prompt(AuthFlow {
                    purpose,
                    service,
                    node,
                    guard,
                }))
            }
            Ok(TreeResult::Success(token)) => {
                // The guard drops here: the traversal is over either way.
                drop(guard);
                self.complete(purpose, &service, token).await
            }
            Err(e) => {
                drop(guard);
                self.shared
                    .events
                    .emit(CoreEvent::Auth(AuthLifecycleEvent::AuthError {
                        message: e.to_string(),
                        recoverable: !matches!(e, AuthError::Config(_)),
                    }))
                    .ok();
                Err(e)
            }
        }
    }

    async fn complete(
        &self,
        purpose: FlowPurpose,
        service: &str,
        token: SsoToken,
    ) -> Result<Step> {
        self.shared.sso.persist_token(&token).await?;
        self.shared
            .events
            .emit(CoreEvent::Auth(AuthLifecycleEvent::SignedIn {
                service: service.to_string(),
            }))
            .ok();
        debug!(service, "tree traversal completed");

        match purpose {
            FlowPurpose::Session => Ok(Step::Session(token)),
            FlowPurpose::Login | FlowPurpose::Register => {
                // The session is established; eager minting is an
                // optimization and its failure is not fatal here. The user
                // handle mints again on first token use.
                if let Err(e) = self.shared.tokens.get_access_token().await {
                    warn!(error = %e, "eager token mint after sign-in failed");
                }
                Ok(Step::User(User::new(self.shared.clone())))
            }
        }
    }
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("server_url", &self.shared.config.server_url.as_str())
            .field("realm", &self.shared.config.realm)
            .finish()
    }
}

