//! # Core Auth
//!
//! Client-side engine for server-defined authentication trees, OAuth 2.0
//! token management, and SSO session handling.
//!
//! The server owns the flow: each authenticate response is a page of typed
//! callbacks the client renders, fills, and submits back, until the tree
//! issues a session token. From that session the client mints OAuth access
//! tokens with PKCE, keeps them fresh through refresh, and tears everything
//! down again on logout.
//!
//! ## Walking a tree
//!
//! ```ignore
//! use core_auth::{AuthClient, Callback, Step};
//!
//! let client = AuthClient::new(config);
//! let mut step = client.login().await?;
//!
//! while let Step::Prompt(mut flow) = step {
//!     for callback in flow.node_mut().callbacks_mut() {
//!         match callback {
//!             Callback::Name(name) => name.set_name("demo")?,
//!             Callback::Password(password) => password.set_password("secret")?,
//!             _ => {}
//!         }
//!     }
//!     step = client.advance(flow).await?;
//! }
//!
//! let Step::User(user) = step else { unreachable!() };
//! let token = user.get_access_token().await?;
//! ```

pub mod callback;
pub mod error;
pub mod interceptor;
pub mod mechanism;
pub mod node;
pub mod oauth;
pub mod session;
pub mod sso;
pub mod token_manager;
pub mod token_store;
pub mod tree;
pub mod types;
pub mod user;

pub use callback::{
    Callback, CallbackPayload, ChoiceCallback, ConfirmationCallback, Field, HiddenValueCallback,
    MetadataCallback, NameCallback, PasswordCallback, PollingWaitCallback,
    StringAttributeInputCallback, TextOutputCallback, ValidatedCreatePasswordCallback,
    ValidatedCreateUsernameCallback,
};
pub use error::{AuthError, FailureStage, Result};
pub use interceptor::{Dispatcher, InterceptorRegistry, RequestInterceptor};
pub use mechanism::{PushMechanism, PushRegistrar, PushRegistration};
pub use node::{Node, TreeResult};
pub use oauth::{OAuth2Client, PkceVerifier};
pub use session::{AuthClient, AuthFlow, Step};
pub use sso::SingleSignOnManager;
pub use token_manager::TokenManager;
pub use token_store::TokenStorage;
pub use tree::TreeClient;
pub use types::{AccessToken, SsoToken, UserInfo};
pub use user::{LogoutReport, User};
