pub mod registry;
pub mod executor;
pub mod description;
pub mod image;
pub mod ecommerce;

use async_trait::async_trait;
use crate::config::AgentConfig;
use crate::errors::ListingError;
use crate::models::Payload;

pub use registry::{AgentRegistry, StageId, STAGE_REGISTRY};
pub use executor::AgentExecutor;

/// One pipeline stage behind a uniform contract.
///
/// The executor calls `validate_input`, `execute` and `validate_output` in
/// that order on every attempt. Implementations must keep `execute`
/// reentrant: a single instance is shared by concurrent pipeline runs.
#[async_trait]
pub trait Agent: Send + Sync {
    fn stage(&self) -> StageId;

    fn config(&self) -> &AgentConfig;

    fn stage_number(&self) -> u8 {
        self.stage().number()
    }

    /// Reject input missing required keys. Must not have side effects.
    fn validate_input(&self, input: &Payload) -> Result<(), ListingError>;

    /// The stage's transformation; the only place that may await external I/O.
    async fn execute(&self, input: &Payload) -> Result<Payload, ListingError>;

    /// Reject output missing mandatory fields or below stage minimums.
    fn validate_output(&self, output: &Payload) -> Result<(), ListingError>;
}
