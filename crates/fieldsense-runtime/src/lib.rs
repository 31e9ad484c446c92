//! `fieldsense-runtime` – the running vision pipeline.
//!
//! # Modules
//!
//! - [`vision_filter`] – [`VisionFilter`][vision_filter::VisionFilter]: the
//!   fusion orchestrator. Ingests camera detection frames and geometry,
//!   merges per-camera trackers, refines the ball and publishes one
//!   [`FusedFrame`][fieldsense_perception::FusedFrame] per cycle from a
//!   cancellable periodic Tokio task (or inline, per accepted frame).
//! - [`config`] – [`VisionFilterConfig`][config::VisionFilterConfig]: every
//!   tunable of the pipeline, deserialisable with defaults.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter. Set
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` to export spans to any OTLP collector.

pub mod config;
pub mod telemetry;
pub mod vision_filter;

pub use config::VisionFilterConfig;
pub use telemetry::{LogFormat, TelemetryOptions, TracerProviderGuard, init_tracing, init_tracing_with};
pub use vision_filter::VisionFilter;
