use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::commands::RunArgs;
use crate::config::{self, SystemConfig};
use crate::errors::ListingError;
use crate::models::ProductInput;
use crate::pipeline::PipelineOrchestrator;
use crate::reporting::{format_response, format_run_summary};
use tracing::{info, warn};

/// Returns whether the pipeline completed.
pub async fn handle_run(args: RunArgs, quiet: bool) -> Result<bool, ListingError> {
    let config = load_checked_config(args.config.as_deref()).await?;
    let input = build_input(&args).await?;
    input.validate()?;

    let orchestrator = Arc::new(PipelineOrchestrator::from_config(config));

    // Ctrl-C cancels the in-flight run instead of killing the process mid-stage
    let interrupt = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling pipeline");
                orchestrator.shutdown_with_grace(Duration::ZERO).await;
            }
        })
    };

    let run = orchestrator.execute_pipeline(input).await;
    interrupt.abort();
    let run = run?;
    orchestrator.shutdown().await;

    let response = format_response(&run);
    let json = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{}", json);
    if !quiet {
        eprint!("{}", format_run_summary(&response));
    }

    info!(pipeline_id = %response.pipeline_id, success = response.success, "Run finished");
    Ok(response.success)
}

/// Load file and env settings, rejecting configs with hard issues.
pub async fn load_checked_config(path: Option<&str>) -> Result<SystemConfig, ListingError> {
    let path = path.map(PathBuf::from);
    let config = config::load_config(path.as_deref()).await?;

    let report = config::validate_config(&config);
    for warning in &report.warnings {
        warn!("{}", warning);
    }
    if !report.valid {
        return Err(ListingError::Config(report.issues.join("; ")));
    }
    Ok(config)
}

async fn build_input(args: &RunArgs) -> Result<ProductInput, ListingError> {
    let mut input = match &args.input {
        Some(path) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ListingError::InvalidInput(format!("{}: {}", path, e)))?;
            serde_json::from_str::<ProductInput>(&content)
                .map_err(|e| ListingError::InvalidInput(format!("{}: {}", path, e)))?
        }
        None => ProductInput::default(),
    };

    let overrides = [
        (&mut input.url, &args.url),
        (&mut input.title, &args.title),
        (&mut input.description, &args.description),
        (&mut input.brand, &args.brand),
        (&mut input.category, &args.category),
        (&mut input.additional_context, &args.context),
    ];
    for (field, flag) in overrides {
        if flag.is_some() {
            field.clone_from(flag);
        }
    }
    if args.price.is_some() {
        input.price = args.price;
    }
    Ok(input)
}
