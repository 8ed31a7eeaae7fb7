//! Application Layer - Use Cases
//!
//! Wires calibration, band optimization and simulation into the research
//! pipeline run by the CLI.

pub mod pipeline;

pub use pipeline::{
    BandEvaluation, PipelineError, PipelineReport, PipelineSettings, ResearchPipeline, SweepSettings,
};
