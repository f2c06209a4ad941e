use crate::actor::ActorIdentity;
use std::collections::BTreeMap;

/// Which of the two waiter classes a ticket belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueueKind {
    Regular,
    Exclusive,
}

/// The two FIFO-by-key waiter queues: `regular` for single-permit acquirers,
/// `exclusive` for promoted full-capacity acquirers. Both are ordered maps
/// keyed by the dispatcher's shared monotonic order counter, so peek-first
/// is always the oldest arrival.
#[derive(Debug, Default)]
pub(crate) struct WaiterQueues<A: ActorIdentity> {
    regular: BTreeMap<u64, A>,
    exclusive: BTreeMap<u64, A>,
}

impl<A: ActorIdentity> WaiterQueues<A> {
    pub(crate) fn new() -> Self {
        Self { regular: BTreeMap::new(), exclusive: BTreeMap::new() }
    }

    fn map(&self, kind: QueueKind) -> &BTreeMap<u64, A> {
        match kind {
            QueueKind::Regular => &self.regular,
            QueueKind::Exclusive => &self.exclusive,
        }
    }

    fn map_mut(&mut self, kind: QueueKind) -> &mut BTreeMap<u64, A> {
        match kind {
            QueueKind::Regular => &mut self.regular,
            QueueKind::Exclusive => &mut self.exclusive,
        }
    }

    pub(crate) fn is_empty(&self, kind: QueueKind) -> bool {
        self.map(kind).is_empty()
    }

    pub(crate) fn len(&self, kind: QueueKind) -> usize {
        self.map(kind).len()
    }

    pub(crate) fn insert(&mut self, kind: QueueKind, order: u64, actor: A) {
        let prev = self.map_mut(kind).insert(order, actor);
        debug_assert!(prev.is_none(), "order keys must be unique across both queues");
    }

    pub(crate) fn first_key(&self, kind: QueueKind) -> Option<u64> {
        self.map(kind).keys().next().copied()
    }

    pub(crate) fn is_head(&self, kind: QueueKind, order: u64) -> bool {
        self.first_key(kind) == Some(order)
    }

    pub(crate) fn remove(&mut self, kind: QueueKind, order: u64) -> Option<A> {
        self.map_mut(kind).remove(&order)
    }

    pub(crate) fn remove_first(&mut self, kind: QueueKind) -> Option<(u64, A)> {
        let key = self.first_key(kind)?;
        self.map_mut(kind).remove(&key).map(|actor| (key, actor))
    }

    /// Moves the entry keyed `order` from `regular` to `exclusive`,
    /// preserving the key so the waiter keeps its original arrival order
    /// within its new class.
    pub(crate) fn promote(&mut self, order: u64) -> bool {
        match self.regular.remove(&order) {
            Some(actor) => {
                self.exclusive.insert(order, actor);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_ordering_by_key() {
        let mut q = WaiterQueues::new();
        q.insert(QueueKind::Regular, 5, "b");
        q.insert(QueueKind::Regular, 2, "a");
        assert_eq!(q.first_key(QueueKind::Regular), Some(2));
        assert_eq!(q.remove_first(QueueKind::Regular), Some((2, "a")));
        assert_eq!(q.remove_first(QueueKind::Regular), Some((5, "b")));
        assert!(q.is_empty(QueueKind::Regular));
    }

    #[test]
    fn promotion_preserves_key_and_class() {
        let mut q = WaiterQueues::new();
        q.insert(QueueKind::Regular, 7, "x");
        assert!(q.promote(7));
        assert!(q.is_empty(QueueKind::Regular));
        assert_eq!(q.first_key(QueueKind::Exclusive), Some(7));
    }

    #[test]
    fn promote_missing_key_is_noop() {
        let mut q: WaiterQueues<&str> = WaiterQueues::new();
        assert!(!q.promote(42));
    }
}
