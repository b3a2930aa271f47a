pub mod formatter;
pub mod response;

pub use formatter::{format_health, format_run_summary};
pub use response::{format_response, ListingResponse, StageSummary};
