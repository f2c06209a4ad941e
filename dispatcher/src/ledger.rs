use crate::actor::ActorIdentity;
use crate::errors::{DispatchError, DispatchResult};
use std::collections::HashMap;
use txdispatch_utils::option::OptionExtensions;

/// Tracks total acquired permits and the per-actor breakdown.
///
/// Plain data, no internal synchronization: callers (the [`crate::Dispatcher`])
/// hold an external lock for the lifetime of every mutation.
#[derive(Debug)]
pub(crate) struct PermitLedger<A: ActorIdentity> {
    total_capacity: u32,
    acquired: u32,
    per_actor: HashMap<A, u32>,
}

impl<A: ActorIdentity> PermitLedger<A> {
    pub(crate) fn new(total_capacity: u32) -> DispatchResult<Self> {
        if total_capacity < 1 {
            return Err(DispatchError::InvalidCapacity(total_capacity));
        }
        Ok(Self { total_capacity, acquired: 0, per_actor: HashMap::new() })
    }

    pub(crate) fn total_capacity(&self) -> u32 {
        self.total_capacity
    }

    pub(crate) fn acquired(&self) -> u32 {
        self.acquired
    }

    pub(crate) fn available(&self) -> u32 {
        self.total_capacity - self.acquired
    }

    pub(crate) fn held_by(&self, actor: &A) -> u32 {
        self.per_actor.get(actor).copied().unwrap_or(0)
    }

    /// Credits `amount` permits to `actor`. Caller must have already
    /// validated capacity; this never fails.
    pub(crate) fn grant(&mut self, actor: &A, amount: u32) {
        self.acquired += amount;
        *self.per_actor.entry(actor.clone()).or_insert(0) += amount;
    }

    /// Debits `amount` permits from `actor`, removing the entry once it
    /// reaches zero so a released actor is never left with a stale zero
    /// entry in the per-actor breakdown.
    pub(crate) fn release(&mut self, actor: &A, amount: u32) -> DispatchResult<()> {
        let held = self.held_by(actor);
        if amount > held {
            return Err(DispatchError::OverRelease { requested: amount, held });
        }
        self.acquired -= amount;
        let remaining = held - amount;
        if remaining == 0 {
            self.per_actor.remove(actor);
        } else {
            self.per_actor.insert(actor.clone(), remaining);
        }
        debug_assert!(self.per_actor.get(actor).is_none_or(|&v| v > 0));
        Ok(())
    }

    #[cfg(debug_assertions)]
    pub(crate) fn assert_invariants(&self) {
        debug_assert!(self.acquired <= self.total_capacity);
        let sum: u32 = self.per_actor.values().sum();
        debug_assert_eq!(sum, self.acquired);
        for &v in self.per_actor.values() {
            debug_assert!(v > 0 && v <= self.total_capacity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_capacity() {
        assert!(PermitLedger::<u32>::new(0).is_err());
    }

    #[test]
    fn grant_and_release_round_trip() {
        let mut ledger = PermitLedger::new(3).unwrap();
        ledger.grant(&1u32, 2);
        assert_eq!(ledger.acquired(), 2);
        assert_eq!(ledger.held_by(&1), 2);
        ledger.release(&1, 2).unwrap();
        assert_eq!(ledger.acquired(), 0);
        assert_eq!(ledger.held_by(&1), 0);
        assert!(!ledger.per_actor.contains_key(&1));
    }

    #[test]
    fn over_release_fails_without_mutating_state() {
        let mut ledger = PermitLedger::new(3).unwrap();
        ledger.grant(&1u32, 1);
        let err = ledger.release(&1, 2).unwrap_err();
        assert_eq!(err, DispatchError::OverRelease { requested: 2, held: 1 });
        assert_eq!(ledger.held_by(&1), 1);
    }
}
