use crate::cli::commands::HealthArgs;
use crate::cli::run::load_checked_config;
use crate::errors::ListingError;
use crate::pipeline::PipelineOrchestrator;
use crate::reporting::format_health;

/// Returns whether every agent initialized with a valid config.
pub async fn handle_health(args: HealthArgs) -> Result<bool, ListingError> {
    let config = load_checked_config(args.config.as_deref()).await?;
    let orchestrator = PipelineOrchestrator::from_config(config);
    let snapshot = orchestrator.health();

    if args.as_json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!(
            "listingflow {} (build {}, {})",
            env!("CARGO_PKG_VERSION"),
            option_env!("GIT_HASH").unwrap_or("unknown"),
            option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        );
        print!("{}", format_health(&snapshot));
    }
    Ok(snapshot.is_healthy())
}
