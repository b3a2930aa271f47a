use std::path::PathBuf;

use clap::Parser;
use listingflow::{cli, config, errors};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize logging
    let log_level = match (cli.verbose, cli.quiet) {
        (0, true) => "warn".to_string(),
        (0, false) => configured_log_level(&cli.command).await.unwrap_or_else(|| "info".to_string()),
        (1, _) => "debug".to_string(),
        _ => "trace".to_string(),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .with_writer(std::io::stderr);
    if cli.json {
        builder.json().init();
    } else {
        builder.init();
    }

    let result = match cli.command {
        cli::Commands::Run(args) => cli::run::handle_run(args, cli.quiet).await,
        cli::Commands::Health(args) => cli::health::handle_health(args).await,
        cli::Commands::Validate(args) => cli::validate::handle_validate(args).await,
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            let exit_code = match &e {
                errors::ListingError::Config(_) | errors::ListingError::Yaml(_) => 2,
                errors::ListingError::InvalidInput(_) => 3,
                _ => 1,
            };
            std::process::exit(exit_code);
        }
    }
}

/// `log_level` from the command's config file or `LOG_LEVEL`, if set.
async fn configured_log_level(command: &cli::Commands) -> Option<String> {
    let path = match command {
        cli::Commands::Run(args) => args.config.as_deref(),
        cli::Commands::Health(args) => args.config.as_deref(),
        cli::Commands::Validate(args) => Some(args.config.as_str()),
    }
    .map(PathBuf::from);

    config::load_config(path.as_deref()).await.ok()?.log_level
}
