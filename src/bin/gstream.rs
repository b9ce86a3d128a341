use anyhow::Result;
use gcode_streamer::cli::run;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    run().await
}
