//! A fair, bounded-permit, reentrant transaction dispatcher.
//!
//! [`Dispatcher`] governs how many concurrent transactions may be live
//! against a shared resource, distinguishing single-permit *regular*
//! acquisitions from full-capacity *exclusive* ones, while staying
//! reentrant: an actor already holding permits may acquire more without
//! deadlocking against itself.
//!
//! This crate owns no threads and performs no I/O; it is purely an
//! in-process accounting structure that callers consult before touching
//! whatever resource the permits actually gate.

mod actor;
mod config;
mod dispatcher;
mod errors;
mod ledger;
mod queue;
mod transaction;

pub use actor::{current_thread_actor, ActorIdentity};
pub use config::{ConfigBridge, StaticConfig};
pub use dispatcher::Dispatcher;
pub use errors::{DispatchError, DispatchResult};
pub use transaction::{SimpleTransaction, TransactionHandle};
