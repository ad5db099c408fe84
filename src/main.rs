mod cli;
mod fetch;

use clap::Parser;
use cli::{Cli, Commands};
use snapfetch::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("snapfetch=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch(args) => fetch::run(args).await?,
        Commands::Config => {
            let config = Config::load()?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
