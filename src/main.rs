//! Periodic metrics demo entry point.

use periodic_metrics::cli::{self, Cli};
use periodic_metrics::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    // Execute the demo
    cli::execute(cli).await
}
