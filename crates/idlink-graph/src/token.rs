//! Link confirmation tokens.
//!
//! Before an identity is linked to a target account, the caller obtains a
//! token for the target and has the target's owner hand it back. The service
//! only forwards to the [`UserTokenIssuer`]; secrecy, expiry and single use
//! are the issuer's business.

use std::sync::Arc;

use idlink_core::{IdentityRef, Result, TenantContext};
use idlink_identity::{Account, IdentityLookup, UserTokenIssuer};

/// Token provider name for link confirmation.
pub const LINK_TOKEN_PROVIDER: &str = "idlink";

/// Token purpose for link confirmation. Distinct from every other purpose
/// the issuer serves, so these tokens cannot be replayed elsewhere.
pub const LINK_TOKEN_PURPOSE: &str = "link-account";

/// Purposes used by other account workflows sharing the same issuer.
pub const RESET_PASSWORD_PURPOSE: &str = "reset-password";
pub const CONFIRM_EMAIL_PURPOSE: &str = "confirm-email";

pub struct LinkTokenService {
    accounts: Arc<dyn IdentityLookup>,
    issuer: Arc<dyn UserTokenIssuer>,
}

impl LinkTokenService {
    pub fn new(accounts: Arc<dyn IdentityLookup>, issuer: Arc<dyn UserTokenIssuer>) -> Self {
        Self { accounts, issuer }
    }

    /// Issue a link token for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`idlink_core::LinkError::AccountNotFound`] if `target` does
    /// not resolve inside its own tenant.
    pub async fn generate_link_token(
        &self,
        ctx: &TenantContext,
        target: &IdentityRef,
    ) -> Result<String> {
        let account = self.resolve(ctx, target).await?;
        let token = self
            .issuer
            .issue(&account, LINK_TOKEN_PROVIDER, LINK_TOKEN_PURPOSE)
            .await?;
        tracing::debug!(%target, "issued link token");
        Ok(token)
    }

    /// Check a link token presented for `target`. Unknown, expired, consumed
    /// or malformed tokens give `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`idlink_core::LinkError::AccountNotFound`] if `target` does
    /// not resolve inside its own tenant.
    pub async fn verify_link_token(
        &self,
        ctx: &TenantContext,
        target: &IdentityRef,
        token: &str,
    ) -> Result<bool> {
        let account = self.resolve(ctx, target).await?;
        let valid = self
            .issuer
            .verify(&account, LINK_TOKEN_PROVIDER, LINK_TOKEN_PURPOSE, token)
            .await?;
        tracing::debug!(%target, valid, "verified link token");
        Ok(valid)
    }

    /// Look the account up in its own tenant, whatever tenant the request
    /// came in under.
    async fn resolve(&self, ctx: &TenantContext, target: &IdentityRef) -> Result<Account> {
        let scoped = ctx.with_tenant(target.tenant_id);
        self.accounts.get_by_id(&scoped, target.user_id).await
    }
}
