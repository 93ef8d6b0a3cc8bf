use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    newsdesk_cli::cli::cli().await
}
