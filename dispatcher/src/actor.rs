use std::fmt::Debug;
use std::hash::Hash;

/// Marker bound for anything that can serve as a reentrancy key for the
/// [`crate::Dispatcher`].
///
/// The dispatcher never inspects the value beyond equality and hashing; it
/// is whatever the host runtime uses to name one concurrent execution
/// (a thread id, an async task id, a transaction's originating session...).
/// Blanket-implemented for every eligible type so callers never implement
/// it by hand.
pub trait ActorIdentity: Clone + Eq + Hash + Debug + Send + 'static {}

impl<T: Clone + Eq + Hash + Debug + Send + 'static> ActorIdentity for T {}

/// Convenience actor type for callers that want "one actor per OS thread"
/// without defining their own identity type.
pub fn current_thread_actor() -> std::thread::ThreadId {
    std::thread::current().id()
}
