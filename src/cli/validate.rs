use std::path::PathBuf;

use crate::cli::commands::ValidateArgs;
use crate::config;
use crate::errors::ListingError;

pub async fn handle_validate(args: ValidateArgs) -> Result<bool, ListingError> {
    let path = PathBuf::from(&args.config);
    let parsed = config::parse_config(&path).await?;
    let report = config::validate_config(&parsed);

    for warning in &report.warnings {
        println!("warning: {}", warning);
    }
    if !report.valid {
        for issue in &report.issues {
            println!("error: {}", issue);
        }
        return Err(ListingError::Config(format!(
            "{} has {} issue(s)",
            args.config,
            report.issues.len()
        )));
    }

    println!("Configuration is valid: {}", args.config);
    Ok(true)
}
