//! Run with: cargo run --package server --bin generate-types --features typescript

use std::fs;
use std::path::Path;

fn main() -> anyhow::Result<()> {
    println!("Generating TypeScript types...");

    let out_dir = Path::new("frontend/src/types/generated");
    fs::create_dir_all(out_dir)?;

    #[cfg(feature = "typescript")]
    {
        use ts_rs::TS;

        campaign_core::SignalAnalysis::export_all_to(out_dir)?;
        campaign_core::PlanGenerationResult::export_all_to(out_dir)?;
        campaign_core::SagaSnapshot::export_all_to(out_dir)?;
        campaign_core::SessionContext::export_all_to(out_dir)?;

        events::Event::export_all_to(out_dir)?;
        events::DeadLetter::export_all_to(out_dir)?;

        orchestrator::PlanningRequest::export_all_to(out_dir)?;
        orchestrator::PlanningOutcome::export_all_to(out_dir)?;

        server::routes::ProcessResponse::export_all_to(out_dir)?;
    }

    println!("TypeScript types written to {}", out_dir.display());
    Ok(())
}
