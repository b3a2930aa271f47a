use clap::{Parser, Subcommand, Args};

#[derive(Parser)]
#[command(name = "listingflow", version, about = "Turn raw product data into marketplace-ready listings")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline for one product
    Run(RunArgs),
    /// Show orchestrator and agent health
    Health(HealthArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone, Default)]
pub struct RunArgs {
    /// Product page URL
    #[arg(short, long)]
    pub url: Option<String>,

    /// Product title
    #[arg(short, long)]
    pub title: Option<String>,

    /// Product description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Price in store currency
    #[arg(long)]
    pub price: Option<f64>,

    /// Brand name
    #[arg(long)]
    pub brand: Option<String>,

    /// Product category
    #[arg(long)]
    pub category: Option<String>,

    /// Extra context appended to the description
    #[arg(long)]
    pub context: Option<String>,

    /// JSON file with product fields (flags override its values)
    #[arg(short, long)]
    pub input: Option<String>,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Pretty-print the response JSON
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Args, Clone, Default)]
pub struct HealthArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Print the snapshot as JSON
    #[arg(long = "as-json")]
    pub as_json: bool,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Config file to validate
    pub config: String,
}
