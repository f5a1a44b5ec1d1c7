// Authentication Module
// OAuth2 authorization code flow with OIDC discovery and sealed credential cookies

pub mod config;
pub mod credential;
pub mod discovery;
pub mod error;
pub mod manager;
pub mod middleware;
pub mod provider;
pub mod routes;
pub mod session;
pub mod state;

pub use config::{CookieConfig, ProviderSettings, SameSitePolicy, SessionConfig};
pub use credential::{Credential, CredentialStore, EncryptedCookieStore};
pub use discovery::ProviderConfig;
pub use error::AuthError;
pub use manager::{AuthManager, CallbackParams};
pub use middleware::{AuthenticatedUser, require_authentication};
pub use provider::{IdentityProvider, OidcProvider, TokenResponse, UserProfile};
pub use routes::{AuthState, create_auth_router};
pub use session::{Session, SessionId};
pub use state::{InMemoryStateStore, StateGenerator, StateStore, generate_state};
