//! End-to-end run of decomposition, simulation, standardization, and reliability.

use std::fmt;

use tracing::info;

use crate::calendar::WindowCalendar;
use crate::config::AnalysisConfig;
use crate::decompose::Decomposition;
use crate::error::Result;
use crate::events::{self, EventCounts, HourlyEvent, PriceIndex, QminTable};
use crate::potential::{self, PotentialSample};
use crate::qc::{self, QcReport};
use crate::reliability::{self, ReliabilityMetric};
use crate::series::{PricePoint, Sample};
use crate::summary::PotentialSummary;

/// Pipeline owning the configuration and the window calendar built from it.
pub struct Pipeline {
    config: AnalysisConfig,
    calendar: WindowCalendar,
}

impl Pipeline {
    /// Creates a pipeline. The configuration is expected to be validated.
    pub fn new(config: AnalysisConfig) -> Self {
        let calendar = config.calendar.build();
        Self { config, calendar }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn calendar(&self) -> &WindowCalendar {
        &self.calendar
    }

    /// Runs every stage over a contiguous 15-minute series.
    ///
    /// # Arguments
    ///
    /// * `samples` - Load and weather series, gap-free at 15-minute cadence
    /// * `prices` - Optional market prices joined by interval timestamp
    ///
    /// # Errors
    ///
    /// Fails if the series is empty or not contiguous, or if a reliability
    /// lookup misses.
    pub fn run(&self, samples: &[Sample], prices: Option<&[PricePoint]>) -> Result<PipelineOutput> {
        let decomposition = Decomposition::run(samples, &self.config.decomposition)?;

        let potentials = potential::simulate(
            &decomposition.rows,
            &self.calendar,
            &self.config.potential,
        );
        let qc = qc::check(&potentials, &self.calendar, &self.config.qc);
        let summary = PotentialSummary::from_samples(&potentials, &self.config.potential);

        let price_index = prices.map(PriceIndex::new);
        if let Some(index) = &price_index {
            info!(prices = index.len(), "price series joined");
        }
        let (hourly, qmin) = events::standardize(&potentials, price_index.as_ref(), &self.config.events);

        let reliability = reliability::analyze(
            &hourly,
            &self.config.reliability,
            self.config.potential.ess_fixed_kw,
        )?;

        Ok(PipelineOutput {
            decomposition,
            potentials,
            hourly,
            qmin,
            reliability,
            qc,
            summary,
        })
    }
}

/// Every table and report produced by one run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub decomposition: Decomposition,
    pub potentials: Vec<PotentialSample>,
    pub hourly: Vec<HourlyEvent>,
    pub qmin: QminTable,
    pub reliability: Vec<ReliabilityMetric>,
    pub qc: QcReport,
    pub summary: PotentialSummary,
}

impl PipelineOutput {
    pub fn event_counts(&self) -> EventCounts {
        EventCounts::from_hours(&self.hourly)
    }
}

impl fmt::Display for PipelineOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.decomposition)?;
        writeln!(f)?;
        writeln!(f, "{}", self.qc)?;
        writeln!(f)?;
        writeln!(f, "{}", self.summary)?;
        writeln!(f)?;
        writeln!(f, "{}", self.event_counts())?;
        writeln!(f, "{}", self.qmin)?;
        writeln!(f)?;
        write!(f, "--- Reliability ---")?;
        if self.reliability.is_empty() {
            write!(f, "\nNo qualifying shed events")?;
        }
        for metric in &self.reliability {
            write!(f, "\n{metric}")?;
        }
        Ok(())
    }
}
