//! Accounts and tenant-scoped account lookup.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use idlink_core::{IdentityRef, LinkError, Result, TenantContext};

/// A user account owned by one tenant (or the host).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub user_name: String,
    /// Changes whenever credentials change; outstanding tokens bound to an
    /// older stamp stop verifying.
    pub security_stamp: String,
}

impl Account {
    pub fn new(tenant_id: Option<Uuid>, user_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            user_name: user_name.into(),
            security_stamp: new_stamp(),
        }
    }

    #[must_use]
    pub fn identity(&self) -> IdentityRef {
        IdentityRef::new(self.tenant_id, self.id)
    }
}

fn new_stamp() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Resolves a user id to an account inside the context's tenant.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// # Errors
    ///
    /// Returns [`LinkError::AccountNotFound`] if no visible account has this id.
    async fn get_by_id(&self, ctx: &TenantContext, user_id: Uuid) -> Result<Account>;
}

/// Accounts kept in memory, keyed by (tenant, user).
#[derive(Debug, Default)]
pub struct MemoryAccountDirectory {
    accounts: RwLock<HashMap<IdentityRef, Account>>,
}

impl MemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a fresh account.
    pub async fn create(&self, tenant_id: Option<Uuid>, user_name: &str) -> Account {
        let account = Account::new(tenant_id, user_name);
        self.insert(account.clone()).await;
        account
    }

    pub async fn insert(&self, account: Account) {
        self.accounts.write().await.insert(account.identity(), account);
    }

    /// Issue a new security stamp, invalidating tokens bound to the old one.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::AccountNotFound`] if the account does not exist.
    pub async fn rotate_security_stamp(&self, identity: &IdentityRef) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(identity)
            .ok_or(LinkError::AccountNotFound {
                tenant_id: identity.tenant_id,
                user_id: identity.user_id,
            })?;
        account.security_stamp = new_stamp();
        Ok(())
    }
}

#[async_trait]
impl IdentityLookup for MemoryAccountDirectory {
    async fn get_by_id(&self, ctx: &TenantContext, user_id: Uuid) -> Result<Account> {
        let accounts = self.accounts.read().await;
        let own = IdentityRef::new(ctx.current_tenant(), user_id);

        let found = match accounts.get(&own) {
            Some(account) => Some(account),
            None if !ctx.is_filtered() => accounts.values().find(|a| a.id == user_id),
            None => None,
        };

        found.cloned().ok_or(LinkError::AccountNotFound {
            tenant_id: ctx.current_tenant(),
            user_id,
        })
    }
}
