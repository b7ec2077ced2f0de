//! Link lifecycle and closure queries.
//!
//! Links always span tenant boundaries, so every store call here runs with
//! the tenant filter bypassed. The caller's [`TenantContext`] is only read,
//! never changed.
//!
//! `link` and `unlink` are idempotent: linking an identity to itself,
//! linking an already linked pair, and unlinking an unlinked pair all return
//! `Ok(())` without touching the store.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use idlink_core::{IdentityRef, Link, Result, TenantContext};
use idlink_identity::{IdAllocator, UuidAllocator};
use idlink_store::LinkStore;

use crate::traversal::{breadth_first_links, NeighborSource};

/// Owns the link relation between (tenant, user) pairs.
pub struct LinkManager {
    store: Arc<dyn LinkStore>,
    ids: Arc<dyn IdAllocator>,
}

impl LinkManager {
    pub fn new(store: Arc<dyn LinkStore>) -> Self {
        Self::with_ids(store, Arc::new(UuidAllocator))
    }

    pub fn with_ids(store: Arc<dyn LinkStore>, ids: Arc<dyn IdAllocator>) -> Self {
        Self { store, ids }
    }

    /// Links touching `seed`; with `include_indirect`, every link reachable
    /// from it, breadth first.
    ///
    /// # Errors
    ///
    /// Returns [`idlink_core::LinkError::Storage`] if the store fails and
    /// [`idlink_core::LinkError::Cancelled`] if `cancel` fires between rounds.
    pub async fn get_linked_identities(
        &self,
        ctx: &TenantContext,
        seed: &IdentityRef,
        include_indirect: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<Link>> {
        let neighbors = StoreNeighbors {
            store: self.store.as_ref(),
            scope: ctx.unfiltered(),
        };

        if !include_indirect {
            return neighbors.neighbors(seed, &[]).await;
        }
        breadth_first_links(&neighbors, seed, cancel).await
    }

    /// Distinct identities reachable from `seed`, seed excluded, in the
    /// order they were discovered.
    ///
    /// # Errors
    ///
    /// See [`LinkManager::get_linked_identities`].
    pub async fn linked_identities(
        &self,
        ctx: &TenantContext,
        seed: &IdentityRef,
        cancel: &CancellationToken,
    ) -> Result<Vec<IdentityRef>> {
        let links = self.get_linked_identities(ctx, seed, true, cancel).await?;

        let mut seen = HashSet::from([*seed]);
        Ok(links
            .iter()
            .flat_map(Link::ends)
            .filter(|identity| seen.insert(*identity))
            .collect())
    }

    /// Whether `a` and `b` share a direct link, in either orientation.
    ///
    /// # Errors
    ///
    /// Returns [`idlink_core::LinkError::Storage`] if the store fails.
    pub async fn is_linked(
        &self,
        ctx: &TenantContext,
        a: &IdentityRef,
        b: &IdentityRef,
    ) -> Result<bool> {
        Ok(self.store.find(&ctx.unfiltered(), a, b).await?.is_some())
    }

    /// Whether `b` is reachable from `a` through any chain of links.
    ///
    /// # Errors
    ///
    /// See [`LinkManager::get_linked_identities`].
    pub async fn is_linked_indirectly(
        &self,
        ctx: &TenantContext,
        a: &IdentityRef,
        b: &IdentityRef,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if a == b {
            return Ok(false);
        }
        if self.is_linked(ctx, a, b).await? {
            return Ok(true);
        }
        let links = self.get_linked_identities(ctx, a, true, cancel).await?;
        Ok(links.iter().any(|l| l.touches(b)))
    }

    /// Link `source` to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`idlink_core::LinkError::Storage`] if the store fails.
    pub async fn link(
        &self,
        ctx: &TenantContext,
        source: &IdentityRef,
        target: &IdentityRef,
    ) -> Result<()> {
        if source == target {
            tracing::debug!(%source, "ignoring self-link");
            return Ok(());
        }
        if self.is_linked(ctx, source, target).await? {
            tracing::debug!(%source, %target, "already linked");
            return Ok(());
        }

        // Two concurrent calls for the same pair can both get here; the store
        // has no uniqueness constraint on the unordered pair.
        let link = Link::new(self.ids.new_id(), *source, *target);
        self.store.insert(&ctx.unfiltered(), &link).await?;
        tracing::info!(link = %link.id, %source, %target, "linked identities");
        Ok(())
    }

    /// Remove the link between `source` and `target`, whichever way round it
    /// was stored.
    ///
    /// # Errors
    ///
    /// Returns [`idlink_core::LinkError::Storage`] if the store fails.
    pub async fn unlink(
        &self,
        ctx: &TenantContext,
        source: &IdentityRef,
        target: &IdentityRef,
    ) -> Result<()> {
        let scope = ctx.unfiltered();
        let Some(link) = self.store.find(&scope, source, target).await? else {
            tracing::debug!(%source, %target, "not linked, nothing to remove");
            return Ok(());
        };

        self.store.delete(&scope, &link).await?;
        tracing::info!(link = %link.id, %source, %target, "unlinked identities");
        Ok(())
    }
}

/// Adapts a [`LinkStore`] to the traversal under a fixed scope.
struct StoreNeighbors<'a> {
    store: &'a dyn LinkStore,
    scope: TenantContext,
}

#[async_trait]
impl NeighborSource for StoreNeighbors<'_> {
    async fn neighbors(
        &self,
        identity: &IdentityRef,
        excluding: &[IdentityRef],
    ) -> Result<Vec<Link>> {
        self.store.find_direct(&self.scope, identity, excluding).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idlink_core::LinkError;
    use idlink_identity::SequentialIds;
    use idlink_store::MemoryLinkStore;
    use uuid::Uuid;

    struct Fixture {
        store: Arc<MemoryLinkStore>,
        manager: LinkManager,
        ctx: TenantContext,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryLinkStore::new());
        let manager = LinkManager::with_ids(store.clone(), Arc::new(SequentialIds::new()));
        Fixture {
            store,
            manager,
            ctx: TenantContext::ambient(Some(Uuid::new_v4())),
        }
    }

    fn tenant_user(tenant: Uuid) -> IdentityRef {
        IdentityRef::in_tenant(tenant, Uuid::new_v4())
    }

    async fn edge_count(f: &Fixture) -> u64 {
        f.store.count(&TenantContext::host().unfiltered()).await.unwrap()
    }

    #[tokio::test]
    async fn link_twice_stores_one_edge() {
        let f = fixture();
        let a = tenant_user(Uuid::new_v4());
        let b = IdentityRef::host(Uuid::new_v4());

        f.manager.link(&f.ctx, &a, &b).await.unwrap();
        f.manager.link(&f.ctx, &a, &b).await.unwrap();
        f.manager.link(&f.ctx, &b, &a).await.unwrap();

        assert_eq!(edge_count(&f).await, 1);
    }

    #[tokio::test]
    async fn is_linked_is_symmetric() {
        let f = fixture();
        let a = tenant_user(Uuid::new_v4());
        let b = tenant_user(Uuid::new_v4());
        let c = tenant_user(Uuid::new_v4());

        f.manager.link(&f.ctx, &a, &b).await.unwrap();

        assert!(f.manager.is_linked(&f.ctx, &a, &b).await.unwrap());
        assert!(f.manager.is_linked(&f.ctx, &b, &a).await.unwrap());
        assert!(!f.manager.is_linked(&f.ctx, &a, &c).await.unwrap());
        assert!(!f.manager.is_linked(&f.ctx, &c, &a).await.unwrap());
    }

    #[tokio::test]
    async fn self_link_is_ignored() {
        let f = fixture();
        let a = tenant_user(Uuid::new_v4());

        f.manager.link(&f.ctx, &a, &a).await.unwrap();

        assert_eq!(edge_count(&f).await, 0);
        assert!(!f.manager.is_linked(&f.ctx, &a, &a).await.unwrap());
    }

    #[tokio::test]
    async fn same_user_in_different_tenants_is_not_a_self_link() {
        let f = fixture();
        let user = Uuid::new_v4();
        let host = IdentityRef::host(user);
        let scoped = IdentityRef::in_tenant(Uuid::new_v4(), user);

        f.manager.link(&f.ctx, &host, &scoped).await.unwrap();
        assert!(f.manager.is_linked(&f.ctx, &scoped, &host).await.unwrap());
    }

    #[tokio::test]
    async fn unlink_twice_is_quiet() {
        let f = fixture();
        let a = tenant_user(Uuid::new_v4());
        let b = tenant_user(Uuid::new_v4());
        f.manager.link(&f.ctx, &a, &b).await.unwrap();

        // Reverse orientation still finds the stored edge.
        f.manager.unlink(&f.ctx, &b, &a).await.unwrap();
        f.manager.unlink(&f.ctx, &b, &a).await.unwrap();

        assert_eq!(edge_count(&f).await, 0);
        assert!(!f.manager.is_linked(&f.ctx, &a, &b).await.unwrap());
    }

    #[tokio::test]
    async fn links_cross_tenants_regardless_of_ambient_tenant() {
        let f = fixture();
        // Neither side belongs to the caller's ambient tenant.
        let a = tenant_user(Uuid::new_v4());
        let b = tenant_user(Uuid::new_v4());

        f.manager.link(&f.ctx, &a, &b).await.unwrap();

        let other = TenantContext::ambient(Some(Uuid::new_v4()));
        assert!(f.manager.is_linked(&other, &a, &b).await.unwrap());
        // A filtered view from an unrelated tenant sees nothing.
        assert_eq!(f.store.count(&other).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn direct_and_indirect_closure() {
        let f = fixture();
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        let u1 = IdentityRef::in_tenant(t1, Uuid::new_v4());
        let u2 = IdentityRef::in_tenant(t2, Uuid::new_v4());
        let u3 = IdentityRef::host(Uuid::new_v4());

        f.manager.link(&f.ctx, &u1, &u2).await.unwrap();
        f.manager.link(&f.ctx, &u2, &u3).await.unwrap();
        let cancel = CancellationToken::new();

        let direct = f
            .manager
            .get_linked_identities(&f.ctx, &u1, false, &cancel)
            .await
            .unwrap();
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].other_end(&u1), Some(u2));

        let all = f
            .manager
            .get_linked_identities(&f.ctx, &u1, true, &cancel)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|l| l.touches(&u3)));

        let identities = f.manager.linked_identities(&f.ctx, &u1, &cancel).await.unwrap();
        assert_eq!(identities, vec![u2, u3]);
    }

    #[tokio::test]
    async fn unlinked_seed_has_empty_closure() {
        let f = fixture();
        let lonely = tenant_user(Uuid::new_v4());
        let cancel = CancellationToken::new();

        for include_indirect in [false, true] {
            let links = f
                .manager
                .get_linked_identities(&f.ctx, &lonely, include_indirect, &cancel)
                .await
                .unwrap();
            assert!(links.is_empty());
        }
    }

    #[tokio::test]
    async fn cycle_closure_terminates() {
        let f = fixture();
        let a = tenant_user(Uuid::new_v4());
        let b = tenant_user(Uuid::new_v4());
        let c = IdentityRef::host(Uuid::new_v4());

        f.manager.link(&f.ctx, &a, &b).await.unwrap();
        f.manager.link(&f.ctx, &b, &c).await.unwrap();
        f.manager.link(&f.ctx, &c, &a).await.unwrap();

        let all = f
            .manager
            .get_linked_identities(&f.ctx, &a, true, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn indirect_membership() {
        let f = fixture();
        let a = tenant_user(Uuid::new_v4());
        let b = tenant_user(Uuid::new_v4());
        let c = tenant_user(Uuid::new_v4());
        let d = tenant_user(Uuid::new_v4());
        f.manager.link(&f.ctx, &a, &b).await.unwrap();
        f.manager.link(&f.ctx, &c, &b).await.unwrap();
        let cancel = CancellationToken::new();

        assert!(f.manager.is_linked_indirectly(&f.ctx, &a, &c, &cancel).await.unwrap());
        assert!(f.manager.is_linked_indirectly(&f.ctx, &c, &a, &cancel).await.unwrap());
        assert!(!f.manager.is_linked_indirectly(&f.ctx, &a, &d, &cancel).await.unwrap());
        assert!(!f.manager.is_linked_indirectly(&f.ctx, &a, &a, &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn link_ids_come_from_the_allocator() {
        let f = fixture();
        let a = tenant_user(Uuid::new_v4());
        let b = tenant_user(Uuid::new_v4());
        f.manager.link(&f.ctx, &a, &b).await.unwrap();

        let stored = f.store.list(&f.ctx.unfiltered()).await.unwrap();
        assert_eq!(stored[0].id, Uuid::from_u128(1));
        assert_eq!(stored[0].source, a);
        assert_eq!(stored[0].target, b);
    }

    #[tokio::test]
    async fn storage_failure_propagates_and_writes_nothing() {
        let f = fixture();
        let a = tenant_user(Uuid::new_v4());
        let b = tenant_user(Uuid::new_v4());

        f.store.fail_next_call();
        let err = f.manager.link(&f.ctx, &a, &b).await.unwrap_err();
        assert!(matches!(err, LinkError::Storage(_)));
        assert_eq!(edge_count(&f).await, 0);
    }

    #[tokio::test]
    async fn cancelled_closure_reports_cancellation() {
        let f = fixture();
        let a = tenant_user(Uuid::new_v4());
        let b = tenant_user(Uuid::new_v4());
        f.manager.link(&f.ctx, &a, &b).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let fetches = f.store.direct_queries();
        let err = f
            .manager
            .get_linked_identities(&f.ctx, &a, true, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::Cancelled));
        assert_eq!(f.store.direct_queries(), fetches);
    }
}
