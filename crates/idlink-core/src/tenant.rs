//! Explicit tenant scoping.
//!
//! Every store and account lookup receives a [`TenantContext`] instead of
//! reading an ambient "current tenant". Switching tenants derives a new
//! value; the caller's context is never mutated, so the previous scope is
//! back in effect as soon as the derived value goes out of use, on every exit
//! path.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which rows a lookup is allowed to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "tenant_id", rename_all = "snake_case")]
pub enum TenantScope {
    /// Only data belonging to this tenant (`None` = host).
    Tenant(Option<Uuid>),
    /// Tenant filter disabled. Used for operations that span tenants.
    Unfiltered,
}

/// The tenant scope a request runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TenantContext {
    current: Option<Uuid>,
    scope: TenantScope,
}

impl TenantContext {
    /// A context for a request made on behalf of `tenant_id`.
    pub fn ambient(tenant_id: Option<Uuid>) -> Self {
        Self {
            current: tenant_id,
            scope: TenantScope::Tenant(tenant_id),
        }
    }

    /// The host (no tenant) context.
    pub fn host() -> Self {
        Self::ambient(None)
    }

    /// Switch to `tenant_id`, filtering lookups to that tenant.
    #[must_use]
    pub fn with_tenant(&self, tenant_id: Option<Uuid>) -> Self {
        Self::ambient(tenant_id)
    }

    /// Keep the current tenant but stop filtering by it.
    #[must_use]
    pub fn unfiltered(&self) -> Self {
        Self {
            current: self.current,
            scope: TenantScope::Unfiltered,
        }
    }

    #[must_use]
    pub fn current_tenant(&self) -> Option<Uuid> {
        self.current
    }

    #[must_use]
    pub fn scope(&self) -> TenantScope {
        self.scope
    }

    #[must_use]
    pub fn is_filtered(&self) -> bool {
        matches!(self.scope, TenantScope::Tenant(_))
    }

    /// Whether a row owned by `tenant_id` is visible in this context.
    #[must_use]
    pub fn admits(&self, tenant_id: Option<Uuid>) -> bool {
        match self.scope {
            TenantScope::Tenant(t) => t == tenant_id,
            TenantScope::Unfiltered => true,
        }
    }
}

impl Default for TenantContext {
    fn default() -> Self {
        Self::host()
    }
}
