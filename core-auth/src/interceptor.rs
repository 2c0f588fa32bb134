//! Request interception.
//!
//! Every outbound request passes through an ordered chain of host-registered
//! interceptors before it reaches the transport. Interceptors see the full
//! request, including its [`RequestAction`] tag, and return a (possibly
//! modified) request. Typical uses: injecting tracking headers, rewriting
//! URLs for gateway deployments, adding advice parameters.
//!
//! The registry belongs to a client instance, not to the process. Two
//! clients in one process can carry different chains.

use bridge_traits::{HttpClient, HttpRequest, HttpResponse};
use std::sync::{Arc, RwLock};
use tracing::trace;

use crate::error::{AuthError, Result};

/// A hook over outbound requests.
///
/// Implementations must be cheap; the chain runs on every request. Branch
/// on [`HttpRequest::action`] to target specific operations.
pub trait RequestInterceptor: Send + Sync {
    fn intercept(&self, request: HttpRequest) -> HttpRequest;
}

/// Blanket impl so closures can be registered directly.
impl<F> RequestInterceptor for F
where
    F: Fn(HttpRequest) -> HttpRequest + Send + Sync,
{
    fn intercept(&self, request: HttpRequest) -> HttpRequest {
        self(request)
    }
}

/// Ordered collection of interceptors.
///
/// Registration order is execution order. The same interceptor may be
/// registered more than once and will then run once per registration.
#[derive(Clone, Default)]
pub struct InterceptorRegistry {
    chain: Arc<RwLock<Vec<Arc<dyn RequestInterceptor>>>>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interceptor to the end of the chain.
    pub fn register(&self, interceptor: Arc<dyn RequestInterceptor>) {
        // Lock poisoning means a panicked writer; recovering the inner
        // vector is still sound for append.
        let mut chain = match self.chain.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        chain.push(interceptor);
    }

    /// Remove an interceptor from the chain.
    ///
    /// Matches by instance: every registration of this exact `Arc` is
    /// removed, and the rest of the chain keeps its order. Returns whether
    /// anything was removed.
    pub fn unregister(&self, interceptor: &Arc<dyn RequestInterceptor>) -> bool {
        let mut chain = match self.chain.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = chain.len();
        chain.retain(|registered| !Arc::ptr_eq(registered, interceptor));
        chain.len() != before
    }

    /// Number of registered interceptors.
    pub fn len(&self) -> usize {
        match self.chain.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the chain over a request, in registration order.
    pub fn apply(&self, request: HttpRequest) -> HttpRequest {
        let chain = match self.chain.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        chain
            .iter()
            .fold(request, |req, interceptor| interceptor.intercept(req))
    }
}

impl std::fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorRegistry")
            .field("len", &self.len())
            .finish()
    }
}

/// Sends requests through the interceptor chain and the host transport.
#[derive(Clone)]
pub struct Dispatcher {
    http_client: Arc<dyn HttpClient>,
    registry: InterceptorRegistry,
}

impl Dispatcher {
    pub fn new(http_client: Arc<dyn HttpClient>, registry: InterceptorRegistry) -> Self {
        Self {
            http_client,
            registry,
        }
    }

    pub fn registry(&self) -> &InterceptorRegistry {
        &self.registry
    }

    /// Intercept, then execute. Transport failures map to
    /// [`AuthError::Transport`].
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let action = request.action;
        let request = self.registry.apply(request);
        trace!(action = %action, url = %request.url, "dispatching request");
        self.http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))
    }

    /// Like [`Dispatcher::execute`] but fails on non-2xx statuses, mapping
    /// them to the given error constructor.
    pub async fn execute_expect_success(
        &self,
        request: HttpRequest,
        on_failure: impl FnOnce(u16, String) -> AuthError,
    ) -> Result<HttpResponse> {
        let response = self.execute(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            let status = response.status;
            let body = response
                .text()
                .unwrap_or_else(|_| "unreadable response body".to_string());
            Err(on_failure(status, body))
        }
    }
}
