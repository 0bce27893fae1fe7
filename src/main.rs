use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    syllabus_events::cli::run().await
}
