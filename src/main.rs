use clap::Parser;
use flux_processor::cli::{run, Cli};
use flux_processor::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli).await
}
