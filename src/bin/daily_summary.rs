//! `daily_summary`: narrate the last 24 hours of raw telemetry and save it.

use chrono::Utc;
use std::process::ExitCode;

use waterguard_service::app;
use waterguard_service::pipeline::{run_daily_summary, PipelineSettings};

fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let services = match app::bootstrap() {
        Ok(services) => services,
        Err(e) => {
            eprintln!("✗ Startup failed: {}", e);
            return e.exit_code();
        }
    };

    let settings = PipelineSettings::from_config(&services.config);

    println!("Fetching telemetry…");
    let (summary, key) =
        run_daily_summary(&services.store, services.generator.as_ref(), &settings, Utc::now());

    println!("\n====== SUMMARY ======");
    println!("{}", summary.summary);
    println!("=====================");

    if key.is_some() {
        println!("Summary saved.");
    }

    ExitCode::SUCCESS
}
