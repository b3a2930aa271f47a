use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::agents::registry::StageId;
use crate::errors::ListingError;
use crate::models::{
    AgentResult, EnhancedProductDescription, GeneratedImage, MarketplaceListing, ProductInput,
    StageStatus,
};

/// One execution of the three-stage pipeline over a single product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: String,
    pub input: ProductInput,
    /// At most one entry per stage, in ascending stage order.
    pub stage_results: Vec<AgentResult>,
    pub status: StageStatus,
    pub product_description: Option<EnhancedProductDescription>,
    pub generated_image: Option<GeneratedImage>,
    pub marketplace_listing: Option<MarketplaceListing>,
    pub total_execution_time_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub errors: Vec<String>,
}

impl PipelineRun {
    pub fn new(input: ProductInput) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            input,
            stage_results: Vec::new(),
            status: StageStatus::InProgress,
            product_description: None,
            generated_image: None,
            marketplace_listing: None,
            total_execution_time_ms: None,
            created_at: Utc::now(),
            completed_at: None,
            errors: Vec::new(),
        }
    }

    pub fn record_stage_result(&mut self, result: AgentResult) -> Result<(), ListingError> {
        if let Some(last) = self.stage_results.last() {
            if last.stage >= result.stage {
                return Err(ListingError::Internal(format!(
                    "Stage result for {} recorded after {}",
                    result.stage, last.stage
                )));
            }
        }
        self.stage_results.push(result);
        Ok(())
    }

    pub fn stage_result(&self, stage: StageId) -> Option<&AgentResult> {
        self.stage_results.iter().find(|r| r.stage == stage)
    }

    pub fn completed_stages(&self) -> usize {
        self.stage_results.iter().filter(|r| r.is_completed()).count()
    }

    pub fn is_success(&self) -> bool {
        self.status == StageStatus::Completed
    }

    /// Failed with exactly the given errors, replacing any collected so far.
    pub(crate) fn fail_with(&mut self, error: impl Into<String>) {
        self.status = StageStatus::Failed;
        self.errors = vec![error.into()];
    }

    /// Derive the final status from the recorded stage results.
    pub(crate) fn settle(&mut self) {
        self.errors = self
            .stage_results
            .iter()
            .filter(|r| r.status == StageStatus::Failed)
            .map(|r| {
                format!(
                    "{}: {}",
                    r.stage,
                    r.error_message.as_deref().unwrap_or("unknown error")
                )
            })
            .collect();
        self.status = if self.errors.is_empty() {
            StageStatus::Completed
        } else {
            StageStatus::Failed
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Payload;

    fn run() -> PipelineRun {
        PipelineRun::new(ProductInput::from_description("Widget", "A widget."))
    }

    #[test]
    fn test_new_run_in_progress() {
        let run = run();
        assert_eq!(run.status, StageStatus::InProgress);
        assert!(Uuid::parse_str(&run.run_id).is_ok());
        assert!(run.completed_at.is_none());
        assert_ne!(run.run_id, super::PipelineRun::new(ProductInput::default()).run_id);
    }

    #[test]
    fn test_record_enforces_ascending_order() {
        let mut run = run();
        run.record_stage_result(AgentResult::completed(StageId::DescriptionGenerator, Payload::new(), 1, 0))
            .unwrap();
        run.record_stage_result(AgentResult::skipped(StageId::EcommerceIntegrator, "off")).unwrap();

        let out_of_order = run.record_stage_result(AgentResult::skipped(StageId::ImageGenerator, "off"));
        assert!(matches!(out_of_order, Err(ListingError::Internal(_))));
        let duplicate = run.record_stage_result(AgentResult::skipped(StageId::EcommerceIntegrator, "off"));
        assert!(duplicate.is_err());
        assert_eq!(run.stage_results.len(), 2);
    }

    #[test]
    fn test_settle_collects_failures() {
        let mut run = run();
        run.record_stage_result(AgentResult::failed(StageId::DescriptionGenerator, "boom", 5, 3))
            .unwrap();
        run.record_stage_result(AgentResult::completed(StageId::ImageGenerator, Payload::new(), 5, 0))
            .unwrap();
        run.settle();

        assert_eq!(run.status, StageStatus::Failed);
        assert_eq!(run.errors, vec!["description_generator: boom".to_string()]);
        assert_eq!(run.completed_stages(), 1);
        assert!(run.stage_result(StageId::ImageGenerator).is_some());
        assert!(run.stage_result(StageId::EcommerceIntegrator).is_none());
    }

    #[test]
    fn test_settle_skipped_is_not_failure() {
        let mut run = run();
        run.record_stage_result(AgentResult::skipped(StageId::DescriptionGenerator, "Agent is disabled"))
            .unwrap();
        run.settle();
        assert!(run.is_success());
        assert!(run.errors.is_empty());
    }
}
