use thiserror::Error;

/// Errors returned by [`crate::Dispatcher`] operations.
///
/// Every variant here is a programmer error rather than a transient
/// condition: none of them are retried internally, and all state mutated
/// before the failure is rolled back before the error is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("dispatcher capacity must be at least 1, got {0}")]
    InvalidCapacity(u32),

    #[error("actor already holds {held} of {capacity} permits; cannot acquire more")]
    CapacityExhausted { held: u32, capacity: u32 },

    #[error("cannot release {requested} permits, actor only holds {held}")]
    OverRelease { requested: u32, held: u32 },

    #[error("wait for a permit was interrupted")]
    WaitInterrupted,
}

pub type DispatchResult<T> = Result<T, DispatchError>;
