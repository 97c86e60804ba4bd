//! Warden Auth: password hashing, signed tokens with authorization
//! claims, principal resolution and the login/refresh/logout flows.

pub mod config;
pub mod error;
pub mod password;
pub mod principal;
pub mod service;
pub mod token;

pub use config::AuthConfig;
pub use error::AuthError;
pub use principal::PrincipalResolver;
pub use service::{AuthService, RegisterInput, TokenPair};
pub use token::{Claims, TokenSubject, TokenType, tenant_scope_from_token};
