use crate::pipeline::HealthSnapshot;
use super::response::ListingResponse;

/// Short plain-text summary of a run for terminal output.
pub fn format_run_summary(response: &ListingResponse) -> String {
    let mut out = format!(
        "Pipeline {} {} in {} ms ({}/{} stages completed)\n",
        response.pipeline_id,
        if response.success { "completed" } else { "failed" },
        response.execution_time_ms,
        response.stages_completed,
        response.total_stages,
    );

    for stage in &response.stages {
        out.push_str(&format!(
            "  [{}] {:<22} {:<10} retries={} {} ms\n",
            stage.stage_number, stage.stage.as_str(), stage.status.as_str(), stage.retry_count, stage.execution_time_ms
        ));
        if let Some(error) = &stage.error {
            out.push_str(&format!("      {}\n", error));
        }
    }

    if let Some(listing) = &response.marketplace_listing {
        out.push_str(&format!("Listing: {} (/{})\n", listing.title, listing.handle));
    }
    if let Some(image) = &response.generated_image {
        out.push_str(&format!("Image: {}\n", image.image_url));
    }
    for error in &response.errors {
        out.push_str(&format!("Error: {}\n", error));
    }
    out
}

pub fn format_health(snapshot: &HealthSnapshot) -> String {
    let status = serde_json::to_value(snapshot.orchestrator.status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    let mut out = format!(
        "Orchestrator: {} ({} agents initialized, {} active pipelines)\n",
        status, snapshot.orchestrator.agents_initialized, snapshot.orchestrator.active_pipelines
    );
    for agent in snapshot.agents.values() {
        out.push_str(&format!(
            "  [{}] {:<22} {} retries={} timeout={}s{}\n",
            agent.stage_number,
            agent.stage.as_str(),
            if !agent.config_valid {
                "invalid"
            } else if agent.enabled {
                "enabled"
            } else {
                "disabled"
            },
            agent.max_retries,
            agent.timeout_secs,
            agent.error.as_deref().map(|e| format!(" ({})", e)).unwrap_or_default(),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::registry::StageId;
    use crate::models::StageStatus;
    use crate::reporting::response::StageSummary;

    #[test]
    fn test_run_summary_lists_stages_and_errors() {
        let response = ListingResponse {
            success: false,
            pipeline_id: "abc".into(),
            execution_time_ms: 12,
            stages_completed: 0,
            total_stages: 3,
            stages: vec![StageSummary {
                stage: StageId::DescriptionGenerator,
                stage_number: 1,
                status: StageStatus::Failed,
                retry_count: 3,
                execution_time_ms: 12,
                error: Some("boom".into()),
            }],
            errors: vec!["description_generator: boom".into()],
            product_description: None,
            generated_image: None,
            marketplace_listing: None,
        };
        let text = format_run_summary(&response);
        assert!(text.starts_with("Pipeline abc failed in 12 ms (0/3 stages completed)"));
        assert!(text.contains("description_generator"));
        assert!(text.contains("retries=3"));
        assert!(text.contains("Error: description_generator: boom"));
    }
}
