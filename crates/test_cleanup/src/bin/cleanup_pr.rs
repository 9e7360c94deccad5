//! Cleanup test containers created by a specific PR.
//!
//! Removes every test container whose name carries the `pr<number>` workflow
//! context, regardless of age. Run it when a PR is closed or merged.
//!
//! Usage:
//!   cleanup-pr <pr_number>

use anyhow::Context;
use std::env;
use test_cleanup::ContainerCleanup;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    test_cleanup::init_logging();

    let pr_number: u32 = env::args()
        .nth(1)
        .context("Usage: cleanup-pr <pr_number>")?
        .parse()
        .context("PR number must be a positive integer")?;
    let context = format!("pr{}", pr_number);

    println!("🧹 docker-stacks PR-Based Test Container Cleanup");
    println!("================================================");
    println!();
    println!("   PR Number: #{}", pr_number);
    println!();

    let cleanup = ContainerCleanup::connect()?;

    println!("🔍 Searching for test containers from PR #{}...", pr_number);
    let removed = cleanup.cleanup_context_containers(&context).await?;

    println!();
    println!("✅ Cleanup completed!");
    println!("   Removed {} containers", removed.len());

    for name in &removed {
        println!("   - {}", name);
    }

    Ok(())
}
