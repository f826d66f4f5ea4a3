/// Telemetry analysis for the tank monitoring service.
///
/// Every function here is pure: it takes a `Window` (and limits) and returns
/// a value. I/O lives in `ingest`, `narrate` and `pipeline`.
///
/// Submodules:
/// - `window`   : lookback filtering, ordering, and the elapsed-time axis.
/// - `forecast` : least-squares trend and emptying-time projection.
/// - `anomaly`  : spike, fast-depletion and stuck-sensor heuristics.
/// - `stats`    : window summary statistics.
/// - `freshness`: age check on the newest sample.

pub mod anomaly;
pub mod forecast;
pub mod freshness;
pub mod stats;
pub mod window;
