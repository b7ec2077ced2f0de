//! Link id allocation.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

pub trait IdAllocator: Send + Sync {
    fn new_id(&self) -> Uuid;
}

/// Random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidAllocator;

impl IdAllocator for UuidAllocator {
    fn new_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Predictable ids (1, 2, 3, ...) for tests.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdAllocator for SequentialIds {
    fn new_id(&self) -> Uuid {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        Uuid::from_u128(u128::from(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_ids_count_up() {
        let ids = SequentialIds::new();
        assert_eq!(ids.new_id(), Uuid::from_u128(1));
        assert_eq!(ids.new_id(), Uuid::from_u128(2));
    }

    #[test]
    fn uuid_allocator_does_not_repeat() {
        let ids = UuidAllocator;
        assert_ne!(ids.new_id(), ids.new_id());
    }
}
