use polsig::cli;
use polsig::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    cli::Cli::run().await
}
