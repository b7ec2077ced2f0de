//! Link type: an undirected edge between two identities.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::IdentityRef;

/// One stored edge of the link graph.
///
/// Links are stored with an orientation but are logically undirected:
/// `connects(a, b)` holds whichever side `a` was stored on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub id: Uuid,

    /// The identity that requested the link.
    pub source: IdentityRef,

    /// The identity that was linked to.
    pub target: IdentityRef,
}

impl Link {
    pub fn new(id: Uuid, source: IdentityRef, target: IdentityRef) -> Self {
        Self { id, source, target }
    }

    /// Both ends, source first.
    #[must_use]
    pub fn ends(&self) -> [IdentityRef; 2] {
        [self.source, self.target]
    }

    #[must_use]
    pub fn touches(&self, identity: &IdentityRef) -> bool {
        self.source == *identity || self.target == *identity
    }

    /// True if this edge joins `a` and `b` in either orientation.
    #[must_use]
    pub fn connects(&self, a: &IdentityRef, b: &IdentityRef) -> bool {
        (self.source == *a && self.target == *b) || (self.source == *b && self.target == *a)
    }

    /// The end opposite `identity`, or `None` if the edge does not touch it.
    #[must_use]
    pub fn other_end(&self, identity: &IdentityRef) -> Option<IdentityRef> {
        if self.source == *identity {
            Some(self.target)
        } else if self.target == *identity {
            Some(self.source)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs() -> (IdentityRef, IdentityRef, IdentityRef) {
        (
            IdentityRef::in_tenant(Uuid::new_v4(), Uuid::new_v4()),
            IdentityRef::in_tenant(Uuid::new_v4(), Uuid::new_v4()),
            IdentityRef::host(Uuid::new_v4()),
        )
    }

    #[test]
    fn connects_either_orientation() {
        let (a, b, c) = refs();
        let link = Link::new(Uuid::new_v4(), a, b);

        assert!(link.connects(&a, &b));
        assert!(link.connects(&b, &a));
        assert!(!link.connects(&a, &c));
        assert!(link.touches(&a));
        assert!(!link.touches(&c));
    }

    #[test]
    fn other_end_walks_the_edge() {
        let (a, b, c) = refs();
        let link = Link::new(Uuid::new_v4(), a, b);

        assert_eq!(link.other_end(&a), Some(b));
        assert_eq!(link.other_end(&b), Some(a));
        assert_eq!(link.other_end(&c), None);
        assert_eq!(link.ends(), [a, b]);
    }

    #[test]
    fn link_serialization_roundtrip() {
        let (a, _, c) = refs();
        let link = Link::new(Uuid::new_v4(), a, c);

        let json = serde_json::to_string(&link).expect("serialize");
        assert!(json.contains("\"tenant_id\":null"));
        let deserialized: Link = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(link, deserialized);
    }
}
