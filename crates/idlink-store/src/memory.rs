//! In-memory link store.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use idlink_core::{IdentityRef, Link, LinkError, Result, TenantContext};

use crate::{is_visible, leads_to_excluded, LinkStore};

/// Keeps links in insertion order behind an async lock.
///
/// Can be told to fail its next call, which lets callers exercise
/// storage-failure paths without a broken database.
#[derive(Debug, Default)]
pub struct MemoryLinkStore {
    links: RwLock<Vec<Link>>,
    fail_next: AtomicBool,
    direct_queries: AtomicU64,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing rows, bypassing all checks.
    pub fn with_links(links: impl IntoIterator<Item = Link>) -> Self {
        Self {
            links: RwLock::new(links.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Make the next store call return [`LinkError::Storage`].
    pub fn fail_next_call(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of `find_direct` calls served so far.
    pub fn direct_queries(&self) -> u64 {
        self.direct_queries.load(Ordering::SeqCst)
    }

    fn check_fault(&self) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(LinkError::Storage("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LinkStore for MemoryLinkStore {
    async fn find_direct(
        &self,
        scope: &TenantContext,
        identity: &IdentityRef,
        excluding: &[IdentityRef],
    ) -> Result<Vec<Link>> {
        self.check_fault()?;
        self.direct_queries.fetch_add(1, Ordering::SeqCst);
        let links = self.links.read().await;
        Ok(links
            .iter()
            .filter(|l| l.touches(identity))
            .filter(|l| is_visible(scope, l))
            .filter(|l| !leads_to_excluded(l, identity, excluding))
            .cloned()
            .collect())
    }

    async fn find(
        &self,
        scope: &TenantContext,
        a: &IdentityRef,
        b: &IdentityRef,
    ) -> Result<Option<Link>> {
        self.check_fault()?;
        let links = self.links.read().await;
        Ok(links
            .iter()
            .find(|l| l.connects(a, b) && is_visible(scope, l))
            .cloned())
    }

    async fn insert(&self, scope: &TenantContext, link: &Link) -> Result<()> {
        self.check_fault()?;
        if !is_visible(scope, link) {
            return Err(LinkError::Storage(format!(
                "link {} is outside the current tenant scope",
                link.id
            )));
        }
        let mut links = self.links.write().await;
        if links.iter().any(|l| l.id == link.id) {
            return Err(LinkError::Storage(format!("duplicate link id {}", link.id)));
        }
        links.push(link.clone());
        Ok(())
    }

    async fn delete(&self, scope: &TenantContext, link: &Link) -> Result<()> {
        self.check_fault()?;
        if !is_visible(scope, link) {
            return Err(LinkError::Storage(format!(
                "link {} is outside the current tenant scope",
                link.id
            )));
        }
        self.links.write().await.retain(|l| l.id != link.id);
        Ok(())
    }

    async fn list(&self, scope: &TenantContext) -> Result<Vec<Link>> {
        self.check_fault()?;
        let links = self.links.read().await;
        Ok(links.iter().filter(|l| is_visible(scope, l)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn link(a: IdentityRef, b: IdentityRef) -> Link {
        Link::new(Uuid::new_v4(), a, b)
    }

    #[tokio::test]
    async fn find_direct_sees_both_orientations_in_order() {
        let a = IdentityRef::host(Uuid::new_v4());
        let b = IdentityRef::host(Uuid::new_v4());
        let c = IdentityRef::host(Uuid::new_v4());
        let ab = link(a, b);
        let ca = link(c, a);
        let store = MemoryLinkStore::with_links([ab.clone(), link(b, c), ca.clone()]);

        let all = TenantContext::host().unfiltered();
        let found = store.find_direct(&all, &a, &[]).await.unwrap();
        assert_eq!(found, vec![ab.clone(), ca]);

        let found = store.find_direct(&all, &a, &[c]).await.unwrap();
        assert_eq!(found, vec![ab]);
        assert_eq!(store.direct_queries(), 2);
    }

    #[tokio::test]
    async fn filtered_scope_hides_foreign_rows_and_rejects_inserts() {
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        let a = IdentityRef::in_tenant(t1, Uuid::new_v4());
        let b = IdentityRef::in_tenant(t1, Uuid::new_v4());
        let store = MemoryLinkStore::new();
        let row = link(a, b);

        let foreign = TenantContext::ambient(Some(t2));
        let err = store.insert(&foreign, &row).await.unwrap_err();
        assert!(matches!(err, LinkError::Storage(_)));

        store.insert(&foreign.unfiltered(), &row).await.unwrap();
        assert!(store.find(&foreign, &a, &b).await.unwrap().is_none());
        assert!(store.find(&foreign.unfiltered(), &b, &a).await.unwrap().is_some());
        assert_eq!(store.count(&TenantContext::ambient(Some(t1))).await.unwrap(), 1);
        assert_eq!(store.count(&foreign).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn injected_failure_hits_exactly_one_call() {
        let store = MemoryLinkStore::new();
        store.fail_next_call();

        let ctx = TenantContext::host();
        assert!(matches!(store.list(&ctx).await, Err(LinkError::Storage(_))));
        assert!(store.list(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_by_id() {
        let a = IdentityRef::host(Uuid::new_v4());
        let b = IdentityRef::host(Uuid::new_v4());
        let row = link(a, b);
        let store = MemoryLinkStore::with_links([row.clone()]);
        let ctx = TenantContext::host().unfiltered();

        store.delete(&ctx, &row).await.unwrap();
        assert_eq!(store.count(&ctx).await.unwrap(), 0);
    }
}
