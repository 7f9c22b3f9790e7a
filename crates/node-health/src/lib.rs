//! Node Health - health events, health-check server and metrics
//!
//! The node pushes configuration snapshots and component status into a
//! bounded [`HealthSink`]. The health-check server consumes that stream and
//! serves it over HTTP:
//! - `/health`: JSON snapshot, 503 when any component reports unhealthy
//! - `/metrics`: Prometheus exposition when a recorder is installed

pub mod event;
pub mod server;
pub mod sink;
pub mod telemetry;

pub use event::{HealthEvent, HealthValue};
pub use server::{start_node_health_check, HealthReport, HealthState};
pub use sink::{health_channel, HealthSink, LARGE_CHANNEL_BUFFER};
pub use telemetry::MetricsConfig;
