use crate::actor::ActorIdentity;
use crate::config::ConfigBridge;
use crate::errors::{DispatchError, DispatchResult};
use crate::ledger::PermitLedger;
use crate::queue::{QueueKind, WaiterQueues};
use crate::transaction::TransactionHandle;
use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex};
use std::cell::Cell;
use std::time::{Duration, Instant};

struct State<A: ActorIdentity> {
    ledger: PermitLedger<A>,
    queues: WaiterQueues<A>,
    next_order: u64,
}

impl<A: ActorIdentity> State<A> {
    fn alloc_order(&mut self) -> u64 {
        let order = self.next_order;
        self.next_order += 1;
        order
    }
}

/// A fair, bounded-permit, reentrant dispatcher guarding a shared capacity.
///
/// Regular acquirers (`acquire`) each cost one permit and are served
/// strictly FIFO. Exclusive acquirers (`acquire_exclusive`,
/// `try_acquire_exclusive`) cost however many permits are needed to bring
/// the calling actor's held total up to full capacity. A single
/// `parking_lot::Mutex` guards all state; a single `parking_lot::Condvar`
/// is broadcast (`notify_all`) on every event that might let a waiter make
/// progress.
pub struct Dispatcher<A: ActorIdentity> {
    state: Mutex<State<A>>,
    condvar: Condvar,
}

impl<A: ActorIdentity> Dispatcher<A> {
    /// Creates a dispatcher for `max_simultaneous_transactions` permits.
    /// Fails with [`DispatchError::InvalidCapacity`] if `< 1`.
    pub fn new(max_simultaneous_transactions: u32) -> DispatchResult<Self> {
        let ledger = PermitLedger::new(max_simultaneous_transactions)?;
        Ok(Self {
            state: Mutex::new(State { ledger, queues: WaiterQueues::new(), next_order: 0 }),
            condvar: Condvar::new(),
        })
    }

    /// Permits currently free. No side effects.
    pub fn available_permits(&self) -> u32 {
        self.state.lock().ledger.available()
    }

    pub fn regular_waiter_count(&self) -> usize {
        self.state.lock().queues.len(QueueKind::Regular)
    }

    pub fn exclusive_waiter_count(&self) -> usize {
        self.state.lock().queues.len(QueueKind::Exclusive)
    }

    /// Blocks until one additional permit is granted to `actor`.
    ///
    /// A regular acquirer that finds the regular queue non-empty always
    /// enqueues, even if capacity happens to be free. This is what keeps
    /// the regular class strictly FIFO.
    pub fn acquire(&self, actor: &A) -> DispatchResult<()> {
        let capacity;
        let order;
        {
            let mut state = self.state.lock();
            capacity = state.ledger.total_capacity();
            let current = state.ledger.held_by(actor);
            if current >= capacity {
                return Err(DispatchError::CapacityExhausted { held: current, capacity });
            }
            let must_wait = state.ledger.acquired() == capacity || !state.queues.is_empty(QueueKind::Regular);
            if !must_wait {
                state.ledger.grant(actor, 1);
                debug!("acquire: {actor:?} granted immediately, acquired={}/{}", state.ledger.acquired(), capacity);
                return Ok(());
            }
            order = state.alloc_order();
            state.queues.insert(QueueKind::Regular, order, actor.clone());
            trace!("acquire: {actor:?} enqueued as regular waiter #{order}");
        }

        let cleanup = self.ticket_cleanup_guard(QueueKind::Regular, order);
        {
            let mut state = self.state.lock();
            while !(state.ledger.acquired() < capacity && state.queues.is_head(QueueKind::Regular, order)) {
                self.condvar.wait(&mut state);
            }
            state.queues.remove(QueueKind::Regular, order);
            state.ledger.grant(actor, 1);
            debug!("acquire: {actor:?} granted after waiting, acquired={}/{}", state.ledger.acquired(), capacity);
        }
        scopeguard::ScopeGuard::into_inner(cleanup);
        Ok(())
    }

    /// Blocks until `actor`'s held total reaches full capacity. Returns the
    /// number of permits actually granted (`capacity - held_on_entry`).
    pub fn acquire_exclusive(&self, actor: &A) -> DispatchResult<u32> {
        let capacity;
        let mut need;
        let order;
        {
            let mut state = self.state.lock();
            capacity = state.ledger.total_capacity();
            let current = state.ledger.held_by(actor);
            if current >= capacity {
                return Err(DispatchError::CapacityExhausted { held: current, capacity });
            }
            need = capacity - current;
            let must_wait = state.ledger.acquired() > capacity - need || !state.queues.is_empty(QueueKind::Regular);
            if !must_wait {
                state.ledger.grant(actor, need);
                debug!("acquire_exclusive: {actor:?} granted {need} immediately");
                return Ok(need);
            }
            order = state.alloc_order();
            state.queues.insert(QueueKind::Regular, order, actor.clone());
            trace!("acquire_exclusive: {actor:?} enqueued as regular waiter #{order}, need={need}");
        }

        let cleanup = self.ticket_cleanup_guard(QueueKind::Regular, order);
        let mut kind = QueueKind::Regular;
        let mut has_waited_once = false;
        let granted;
        {
            let mut state = self.state.lock();
            loop {
                // The grant check is always evaluated fresh, before ever deciding to
                // wait, so a notification that arrives in the gap between enqueueing
                // and this thread actually parking on the condvar is never lost.
                let is_head = state.queues.is_head(kind, order);
                if is_head && state.ledger.acquired() <= capacity - need {
                    state.queues.remove(kind, order);
                    state.ledger.grant(actor, need);
                    debug!("acquire_exclusive: {actor:?} granted {need} after waiting");
                    granted = need;
                    break;
                }
                // Promotion, by contrast, is a reaction to "still blocked after
                // actually being woken": it must not fire on the very first pass,
                // before this waiter has ever genuinely slept. A waiter fully
                // satisfied by the first release it sees never promotes at all.
                if has_waited_once && is_head && kind == QueueKind::Regular {
                    // Still head of the regular queue but cannot proceed: move out of the
                    // way so regular traffic behind this waiter is not starved.
                    warn!("acquire_exclusive: {actor:?} promoted waiter #{order} out of the regular queue");
                    self.condvar.notify_all();
                    state.queues.promote(order);
                    kind = QueueKind::Exclusive;
                    cleanup.set((kind, order));
                }
                self.condvar.wait(&mut state);
                has_waited_once = true;
            }
        }
        scopeguard::ScopeGuard::into_inner(cleanup);
        Ok(granted)
    }

    /// Best-effort exclusive acquisition bounded by `timeout`. Returns the
    /// number of permits granted: `need` on full success, `1` on downgrade,
    /// `0` on timeout.
    pub fn try_acquire_exclusive(&self, actor: &A, timeout: Duration) -> DispatchResult<u32> {
        let started = Instant::now();
        let capacity;
        let mut need;
        let order;
        {
            let mut state = self.state.lock();
            capacity = state.ledger.total_capacity();
            let current = state.ledger.held_by(actor);
            if current >= capacity {
                return Err(DispatchError::CapacityExhausted { held: current, capacity });
            }
            need = capacity - current;
            let must_wait = state.ledger.acquired() > capacity - need || !state.queues.is_empty(QueueKind::Regular);
            if !must_wait {
                state.ledger.grant(actor, need);
                debug!("try_acquire_exclusive: {actor:?} granted {need} immediately");
                return Ok(need);
            }
            order = state.alloc_order();
            state.queues.insert(QueueKind::Regular, order, actor.clone());
            trace!("try_acquire_exclusive: {actor:?} enqueued as regular waiter #{order}, need={need}");
        }

        let cleanup = self.ticket_cleanup_guard(QueueKind::Regular, order);
        let mut has_waited_once = false;
        let granted;
        {
            let mut state = self.state.lock();
            loop {
                // Grant check always runs fresh before any wait, so a notification
                // arriving in the gap between enqueueing and actually parking on the
                // condvar is never lost.
                let is_head = state.queues.is_head(QueueKind::Regular, order);
                if is_head && state.ledger.acquired() <= capacity - need {
                    state.queues.remove(QueueKind::Regular, order);
                    state.ledger.grant(actor, need);
                    debug!("try_acquire_exclusive: {actor:?} granted {need} after waiting");
                    granted = need;
                    break;
                }
                // Unlike `acquire_exclusive`, a blocked waiter here never promotes
                // into the exclusive queue; it only downgrades when that queue is
                // already occupied, to avoid piling onto it. An empty exclusive
                // queue means no one else is budget-less and waiting indefinitely,
                // so this waiter just keeps competing as a regular acquirer until
                // its own budget runs out. The gate on `has_waited_once` only keeps
                // this from firing on the very first pass, before any real wait.
                if has_waited_once && is_head && need > 1 && !state.queues.is_empty(QueueKind::Exclusive) {
                    warn!("try_acquire_exclusive: {actor:?} downgrading waiter #{order} (exclusive queue contention)");
                    need = 1;
                }

                // `remaining` is always recomputed from the single `started` baseline
                // (never a mutated countdown variable), so a downgrade never buys a
                // fresh budget: once `need` reaches 1 with the budget already spent,
                // the very next pass through this match applies the `need == 1`
                // timeout rule below and returns 0, matching spec.md scenario 6.
                match timeout.checked_sub(started.elapsed()).filter(|r| !r.is_zero()) {
                    Some(remaining) => {
                        self.condvar.wait_for(&mut state, remaining);
                    }
                    None if need == 1 => {
                        warn!("try_acquire_exclusive: {actor:?} timed out waiting for waiter #{order}");
                        state.queues.remove(QueueKind::Regular, order);
                        self.condvar.notify_all();
                        granted = 0;
                        break;
                    }
                    None => {
                        warn!("try_acquire_exclusive: {actor:?} timed out, downgrading waiter #{order} to a single permit");
                        need = 1;
                        continue;
                    }
                }
                has_waited_once = true;
            }
        }
        scopeguard::ScopeGuard::into_inner(cleanup);
        Ok(granted)
    }

    /// High-level dispatch used by callers: routes a transaction through the
    /// blocking, best-effort, or regular path depending on its exclusivity
    /// flags, and records the outcome back onto the transaction.
    pub fn acquire_for<T, C>(&self, txn: &mut T, config: &C) -> DispatchResult<()>
    where
        T: TransactionHandle<A>,
        C: ConfigBridge,
    {
        let actor = txn.creating_actor();
        if txn.is_exclusive() {
            if txn.was_created_exclusive() && !txn.is_gc_transaction() {
                let granted = self.acquire_exclusive(&actor)?;
                txn.set_acquired_permits(granted);
                return Ok(());
            }

            let timeout_ms =
                if txn.is_gc_transaction() { config.gc_transaction_acquire_timeout() } else { config.env_txn_replay_timeout() };
            let granted = self.try_acquire_exclusive(&actor, Duration::from_millis(timeout_ms))?;
            if granted > 0 {
                txn.set_acquired_permits(granted);
                if granted == 1 {
                    txn.set_exclusive(false);
                }
                return Ok(());
            }
            // Timed out: fall through to the regular path below.
        }

        self.acquire(&actor)?;
        txn.set_acquired_permits(1);
        Ok(())
    }

    /// Debits `permits` from `actor` and wakes every waiter so they can
    /// re-check their eligibility predicate.
    pub fn release(&self, actor: &A, permits: u32) -> DispatchResult<()> {
        {
            let mut state = self.state.lock();
            state.ledger.release(actor, permits)?;
            #[cfg(debug_assertions)]
            state.ledger.assert_invariants();
        }
        self.condvar.notify_all();
        Ok(())
    }

    /// Builds the RAII cleanup guard that removes an enqueued ticket and
    /// broadcasts if the calling thread never reaches the success path, so
    /// no enqueue outlives a failed or unwound acquisition. `cell` tracks
    /// which queue currently holds the ticket, since exclusive acquisitions
    /// may move it via promotion.
    fn ticket_cleanup_guard(
        &self,
        kind: QueueKind,
        order: u64,
    ) -> scopeguard::ScopeGuard<Cell<(QueueKind, u64)>, impl FnOnce(Cell<(QueueKind, u64)>) + '_> {
        scopeguard::guard(Cell::new((kind, order)), move |cell| {
            let (kind, order) = cell.get();
            let mut state = self.state.lock();
            if state.queues.remove(kind, order).is_some() {
                drop(state);
                self.condvar.notify_all();
            }
        })
    }
}
