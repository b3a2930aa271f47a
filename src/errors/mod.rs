pub mod types;
pub mod classification;
pub mod retry;

pub use types::ListingError;
pub use classification::ErrorClassification;
pub use retry::{backoff_delay, next_action, RetryAction, MAX_BACKOFF_SECS};
