//! Observability for Parley: tracing subscriber setup and the OpenTelemetry
//! GenAI attribute names used on completion spans.

pub mod genai_attrs;
pub mod tracing_setup;
