//! `waterguard`: one report run, then exit.
//!
//! Exit status: 0 on completion (including "no data"), 2 on configuration
//! errors, 1 if the store cannot be reached at startup.

use chrono::Utc;
use std::process::ExitCode;

use waterguard_service::app;
use waterguard_service::model::Report;
use waterguard_service::pipeline::{run_pipeline, PipelineOutcome, PipelineSettings};

fn print_report(report: &Report) {
    let anomalies = if report.anomalies.is_empty() {
        "none".to_string()
    } else {
        report.anomalies.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
    };

    println!("\n============== AI REPORT ==============");
    println!("Generated:  {}", report.timestamp.to_rfc3339());
    println!("Forecast:   {}", report.forecast);
    println!("Anomalies:  {}", anomalies);
    println!(
        "Level:      avg {:.1} cm (min {:.1}, max {:.1}) over {} samples",
        report.stats.avg_level, report.stats.min_level, report.stats.max_level, report.stats.sample_count
    );
    println!(
        "Flow:       avg {:.2} L/min | TDS avg {:.0} ppm",
        report.stats.avg_flow, report.stats.avg_quality
    );
    if report.stale {
        println!("Freshness:  STALE (sensor feed may be down)");
    }
    println!("---------------------------------------");
    println!("{}", report.narrative);
    println!("========================================\n");
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();

    println!("\n===================================");
    println!("       Running Full AI Pipeline    ");
    println!("===================================\n");

    let services = match app::bootstrap() {
        Ok(services) => services,
        Err(e) => {
            eprintln!("✗ Startup failed: {}", e);
            return e.exit_code();
        }
    };

    let settings = PipelineSettings::from_config(&services.config);

    match run_pipeline(&services.store, services.generator.as_ref(), &settings, Utc::now()) {
        PipelineOutcome::NoData => {
            println!("No data available. Cannot continue.");
        }
        PipelineOutcome::Completed { report, persisted_key } => {
            print_report(&report);
            match persisted_key {
                Some(key) => println!("Report saved as {}.", key),
                None => println!("Report could not be saved; see log for details."),
            }
            println!("AI Pipeline completed.\n");
        }
    }

    ExitCode::SUCCESS
}
