//! Turns a presented access token into a [`Principal`].

use tracing::debug;
use warden_core::authz::{Guard, Principal, TrustModel};
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::permission::Codename;
use warden_core::repository::UserRepository;
use warden_core::tenant::TenantScope;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::token::{self, Claims, TokenType};

/// Resolves principals according to the deployment's [`TrustModel`].
///
/// `users` must be an unrestricted repository: the principal's own tenant
/// is not known until the user has been loaded.
pub struct PrincipalResolver<U: UserRepository> {
    users: U,
    config: AuthConfig,
}

impl<U: UserRepository> PrincipalResolver<U> {
    pub fn new(users: U, config: AuthConfig) -> Self {
        Self { users, config }
    }

    pub fn trust_model(&self) -> TrustModel {
        self.config.trust_model
    }

    /// Resolve the principal behind a bearer token.
    pub async fn resolve(&self, token: Option<&str>) -> WardenResult<Principal> {
        let claims = token
            .and_then(|t| token::decode_expecting(t, TokenType::Access, &self.config))
            .ok_or_else(AuthError::credentials)?;
        let user_id = claims.user_id().ok_or_else(AuthError::credentials)?;

        match self.config.trust_model {
            TrustModel::LiveLookup => match self.users.get_with_roles(user_id).await {
                Ok(user) => Ok(Principal::from(&user)),
                Err(WardenError::NotFound { .. }) => {
                    debug!(%user_id, "token subject no longer exists");
                    Err(AuthError::credentials().into())
                }
                Err(e) => Err(e),
            },
            TrustModel::ClaimsTrust => Ok(principal_from_claims(user_id, &claims)),
        }
    }

    /// Tenant scope for the storage session of the request carrying `token`.
    ///
    /// Follows the same trust model as [`Self::resolve`]: under
    /// `LiveLookup` the scope comes from the stored user, so a demotion or a
    /// tenant move applies to the next request. Any resolution failure, or
    /// an inactive account, yields [`TenantScope::Anonymous`].
    pub async fn tenant_scope(&self, token: Option<&str>) -> TenantScope {
        match self.config.trust_model {
            TrustModel::ClaimsTrust => token::tenant_scope_from_token(token, &self.config),
            TrustModel::LiveLookup => match self.resolve(token).await {
                Ok(principal) if principal.is_active => principal.tenant_scope(),
                Ok(_) => TenantScope::Anonymous,
                Err(e) => {
                    debug!(error = %e, "no tenant scope for request");
                    TenantScope::Anonymous
                }
            },
        }
    }

    /// Resolve and check `guard` in one step.
    pub async fn authorize(&self, token: Option<&str>, guard: &Guard) -> WardenResult<Principal> {
        let principal = self.resolve(token).await?;
        guard.check(Some(&principal))?;
        Ok(principal)
    }
}

/// Tokens are only minted for active accounts, so a claims-trust principal
/// is active until its token expires.
fn principal_from_claims(user_id: uuid::Uuid, claims: &Claims) -> Principal {
    Principal::new(
        user_id,
        claims.tenant(),
        true,
        claims.is_superuser,
        claims.roles.iter().cloned(),
        claims
            .permissions
            .iter()
            .filter_map(|c| Codename::parse(c.as_str()).ok()),
    )
}
