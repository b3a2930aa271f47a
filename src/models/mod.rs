pub mod payload;
pub mod product;
pub mod result;
pub mod listing;

pub use payload::Payload;
pub use product::ProductInput;
pub use result::{AgentResult, StageStatus};
pub use listing::{EnhancedProductDescription, GeneratedImage, MarketplaceListing};
