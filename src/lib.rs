//! Water tank telemetry analysis service.
//!
//! Fetches a rolling window of tank telemetry from the realtime store,
//! forecasts when the tank runs empty, flags sensor anomalies, summarizes the
//! window, has a local language model narrate the findings, and appends the
//! resulting report back to the store.

pub mod analysis;
pub mod app;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod narrate;
pub mod pipeline;
