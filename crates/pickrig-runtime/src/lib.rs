//! `pickrig-runtime` – Cycle Orchestration
//!
//! Ties the drivers, the planner and the timing kernel into one pick cycle.
//!
//! # Modules
//!
//! - [`controller`] – [`RigMotionController`][controller::RigMotionController]:
//!   pre-flight, observation, planning, verification and the timed schedule
//!   for one cycle at a time.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to export cycle spans.

pub mod controller;
pub mod telemetry;

pub use controller::{ControllerConfig, CycleReport, RigMotionController, VISION_POLL};
pub use telemetry::{TracerProviderGuard, init_tracing};
