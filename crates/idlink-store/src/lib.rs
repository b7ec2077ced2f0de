//! # idlink-store
//!
//! Persistence for link rows.
//!
//! A link is stored once, with an orientation, and is found from either
//! side. Every call carries a [`TenantContext`]: under a filtered context a
//! row is visible only when the context's tenant owns at least one of its
//! ends. Cross-tenant callers pass [`TenantContext::unfiltered`].
//!
//! - [`SqliteLinkStore`]: durable store backed by SQLite
//! - [`MemoryLinkStore`]: in-process store for tests and embedding

use async_trait::async_trait;

use idlink_core::{IdentityRef, Link, Result, TenantContext};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryLinkStore;
pub use sqlite::SqliteLinkStore;

/// Storage of link rows. Each call is a single atomic row operation.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// All links touching `identity`, in insertion order, minus links whose
    /// other end is listed in `excluding`.
    async fn find_direct(
        &self,
        scope: &TenantContext,
        identity: &IdentityRef,
        excluding: &[IdentityRef],
    ) -> Result<Vec<Link>>;

    /// The link joining `a` and `b` in either orientation.
    async fn find(
        &self,
        scope: &TenantContext,
        a: &IdentityRef,
        b: &IdentityRef,
    ) -> Result<Option<Link>>;

    async fn insert(&self, scope: &TenantContext, link: &Link) -> Result<()>;

    async fn delete(&self, scope: &TenantContext, link: &Link) -> Result<()>;

    /// Every visible link, in insertion order.
    async fn list(&self, scope: &TenantContext) -> Result<Vec<Link>>;

    async fn count(&self, scope: &TenantContext) -> Result<u64> {
        Ok(self.list(scope).await?.len() as u64)
    }
}

/// Whether `link` is visible under `scope`.
#[must_use]
pub fn is_visible(scope: &TenantContext, link: &Link) -> bool {
    scope.admits(link.source.tenant_id) || scope.admits(link.target.tenant_id)
}

/// Whether the other end of `link`, seen from `identity`, is excluded.
fn leads_to_excluded(link: &Link, identity: &IdentityRef, excluding: &[IdentityRef]) -> bool {
    link.other_end(identity)
        .is_some_and(|other| excluding.contains(&other))
}
