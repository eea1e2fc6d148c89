use anyhow::Result;
use dilemma::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
