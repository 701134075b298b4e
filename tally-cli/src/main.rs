use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tally_cli::run_app().await
}
