use anyhow::Result;

use image_analysis::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = telemetry::init("image-analysis")?;
    image_analysis::server::run().await
}
