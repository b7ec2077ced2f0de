//! Transitive closure over the link graph.
//!
//! Breadth-first frontier expansion from a seed identity. Each round asks
//! the neighbor source for the links of every newly reached identity while
//! excluding edges that lead back to identities already visited, so no edge
//! is walked twice and cycles terminate.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use idlink_core::{IdentityRef, Link, LinkError, Result};

/// Where the traversal gets its edges from.
#[async_trait]
pub trait NeighborSource: Send + Sync {
    /// Links touching `identity`, minus those whose far end is in `excluding`.
    async fn neighbors(&self, identity: &IdentityRef, excluding: &[IdentityRef])
        -> Result<Vec<Link>>;
}

/// Every link reachable from `seed`, each exactly once, in discovery order.
///
/// The first round is the seed's direct links. `cancel` is checked before
/// every round; a cancelled traversal returns [`LinkError::Cancelled`] and
/// drops what it collected.
///
/// # Errors
///
/// Propagates neighbor-source failures and cancellation.
pub async fn breadth_first_links<N>(
    source: &N,
    seed: &IdentityRef,
    cancel: &CancellationToken,
) -> Result<Vec<Link>>
where
    N: NeighborSource + ?Sized,
{
    if cancel.is_cancelled() {
        return Err(LinkError::Cancelled);
    }

    let mut visited: Vec<IdentityRef> = vec![*seed];
    let mut visited_set: HashSet<IdentityRef> = HashSet::from([*seed]);
    let mut seen_links: HashSet<Uuid> = HashSet::new();

    let mut batch = keep_unseen(source.neighbors(seed, &[]).await?, &mut seen_links);
    let mut result = batch.clone();
    let mut round = 0u32;

    while !batch.is_empty() {
        if cancel.is_cancelled() {
            tracing::debug!(%seed, round, collected = result.len(), "traversal cancelled");
            return Err(LinkError::Cancelled);
        }
        round += 1;

        // Far ends not reached before this round, in batch order.
        let mut frontier: Vec<IdentityRef> = Vec::new();
        for link in &batch {
            for end in link.ends() {
                if !visited_set.contains(&end) && !frontier.contains(&end) {
                    frontier.push(end);
                }
            }
        }

        let mut next = Vec::new();
        for candidate in &frontier {
            let found = source.neighbors(candidate, &visited).await?;
            next.extend(keep_unseen(found, &mut seen_links));
        }

        tracing::debug!(
            %seed,
            round,
            frontier = frontier.len(),
            fetched = next.len(),
            "traversal round"
        );

        for candidate in frontier {
            visited_set.insert(candidate);
            visited.push(candidate);
        }
        result.extend(next.iter().cloned());
        batch = next;
    }

    Ok(result)
}

/// Drop links already returned. Two identities reached in the same round
/// that share an edge would otherwise both report it.
fn keep_unseen(links: Vec<Link>, seen: &mut HashSet<Uuid>) -> Vec<Link> {
    links.into_iter().filter(|l| seen.insert(l.id)).collect()
}
