use serde::{Deserialize, Serialize};
use crate::agents::registry::StageId;
use crate::models::{
    AgentResult, EnhancedProductDescription, GeneratedImage, MarketplaceListing, StageStatus,
};
use crate::pipeline::PipelineRun;

/// Per-stage line of a [`ListingResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: StageId,
    pub stage_number: u8,
    pub status: StageStatus,
    pub retry_count: u32,
    pub execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&AgentResult> for StageSummary {
    fn from(result: &AgentResult) -> Self {
        Self {
            stage: result.stage,
            stage_number: result.stage_number,
            status: result.status,
            retry_count: result.retry_count,
            execution_time_ms: result.execution_time_ms,
            error: result.error_message.clone(),
        }
    }
}

/// Caller-facing view of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingResponse {
    pub success: bool,
    pub pipeline_id: String,
    pub execution_time_ms: u64,
    pub stages_completed: usize,
    pub total_stages: usize,
    pub stages: Vec<StageSummary>,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_description: Option<EnhancedProductDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_image: Option<GeneratedImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketplace_listing: Option<MarketplaceListing>,
}

pub fn format_response(run: &PipelineRun) -> ListingResponse {
    ListingResponse {
        success: run.is_success(),
        pipeline_id: run.run_id.clone(),
        execution_time_ms: run.total_execution_time_ms.unwrap_or(0),
        stages_completed: run.completed_stages(),
        total_stages: StageId::ORDERED.len(),
        stages: run.stage_results.iter().map(StageSummary::from).collect(),
        errors: run.errors.clone(),
        product_description: run.product_description.clone(),
        generated_image: run.generated_image.clone(),
        marketplace_listing: run.marketplace_listing.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Payload, ProductInput};

    #[test]
    fn test_format_failed_run() {
        let mut run = PipelineRun::new(ProductInput::from_url("https://shop.example.com/w"));
        run.record_stage_result(AgentResult::failed(StageId::DescriptionGenerator, "scrape failed", 120, 3))
            .unwrap();
        run.record_stage_result(AgentResult::completed(StageId::ImageGenerator, Payload::new(), 40, 0))
            .unwrap();
        run.settle();
        run.total_execution_time_ms = Some(160);

        let response = format_response(&run);
        assert!(!response.success);
        assert_eq!(response.pipeline_id, run.run_id);
        assert_eq!(response.stages_completed, 1);
        assert_eq!(response.total_stages, 3);
        assert_eq!(response.stages[0].retry_count, 3);
        assert_eq!(response.stages[0].error.as_deref(), Some("scrape failed"));
        assert_eq!(response.errors.len(), 1);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["stages"][0]["status"], "failed");
        assert_eq!(json["stages"][1]["stage"], "image_generator");
        assert!(json["stages"][1].get("error").is_none());
        assert!(json.get("marketplace_listing").is_none());
    }
}
