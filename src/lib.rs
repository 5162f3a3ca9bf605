//! Demand-response flexibility analysis for data-center loads.
//!
//! The pipeline decomposes a 15-minute facility load into IT, cooling and
//! other components, simulates seasonal shed/up windows, standardizes the
//! result into hourly events and measures how reliably a committed capacity
//! would have been delivered.

pub mod calendar;
pub mod config;
pub mod decompose;
pub mod error;
pub mod events;
pub mod io;
/// End-to-end orchestration of all stages.
pub mod pipeline;
pub mod potential;
pub mod profile;
pub mod qc;
pub mod regression;
pub mod reliability;
pub mod series;
pub mod stats;
pub mod summary;
pub mod telemetry;
pub mod weather;

pub use error::{Error, Result};
