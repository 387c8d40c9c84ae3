pub mod deadline;
pub mod keyed_lock;
pub mod retry;

pub use deadline::with_deadline;
pub use keyed_lock::KeyedLocks;
pub use retry::{retry_on_transient, IsTransient, RetryConfig, RetryResult};
