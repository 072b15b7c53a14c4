//! # Media Spend Normalizer
//!
//! A library for turning raw advertising-spend exports into one normalized,
//! deduplicated dataset with a real (currency- and duplication-adjusted)
//! investment figure per placement.
//!
//! ## Core Concepts
//!
//! - **Monitor**: pipe-delimited broadcast/print export (TV, cable, radio,
//!   magazines, newspapers). Spend is scaled by a per-medium factor.
//! - **OutView**: out-of-home sightings (billboards, LED screens, bus stops).
//!   Each sighting carries the element's full tariff, so the tariff is
//!   converted to USD, spread over the sightings of the same slot, capped per
//!   element type and prorated back to every row.
//! - **Consolidation**: both sources are projected onto one 27-column shape,
//!   Monitor rows first, then sorted by date and brand.
//! - **Quality report**: row-level problems never abort a batch; they are
//!   collected as warnings and returned with the result.
//!
//! ## Example
//!
//! ```rust,ignore
//! use media_spend_normalizer::*;
//!
//! let monitor = std::fs::read("monitor.txt")?;
//! let outview = std::fs::read("outview.xlsx")?;
//!
//! let outcome = process_media_spend(
//!     &SourceInputs::new().with_monitor(&monitor).with_outview(&outview),
//!     &EngineConfig::default(),
//! )?;
//!
//! for warning in outcome.report.iter() {
//!     println!("{}", warning);
//! }
//! export::write_canonical_csv(&outcome.consolidated, std::io::stdout())?;
//! ```

pub mod config;
pub mod consolidation;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod keys;
pub mod monitor;
pub mod overrides;
pub mod report;
pub mod schema;
pub mod summary;
pub mod tariff;
pub mod utils;
pub mod validation;

pub use config::{EngineConfig, MonitorFactors, OutViewTariffs};
pub use consolidation::{
    consolidate, CanonicalRecord, ConsolidatedDataset, FieldValue, CANONICAL_COLUMNS,
};
pub use error::{FormatError, MediaSpendError, Result};
pub use ingestion::{parse_monitor, parse_outview, ParsedMonitor, ParsedOutView};
pub use monitor::{FactorEngine, FactoredInsertion};
pub use overrides::{ConfigModification, ConfigOverrides};
pub use report::{DataQualityWarning, QualityReport};
pub use schema::*;
pub use summary::{DatasetSummary, DateRange, OutViewSummary};
pub use tariff::{AllocatedSighting, TariffAllocator, TariffDerivation};
pub use validation::ValidationFinding;

use log::{debug, info};
use serde::Serialize;

/// The raw payloads of one batch. Either may be absent, not both.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceInputs<'a> {
    pub monitor: Option<&'a [u8]>,
    pub outview: Option<&'a [u8]>,
}

impl<'a> SourceInputs<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_monitor(mut self, bytes: &'a [u8]) -> Self {
        self.monitor = Some(bytes);
        self
    }

    pub fn with_outview(mut self, bytes: &'a [u8]) -> Self {
        self.outview = Some(bytes);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorOutput {
    /// Metadata lines preceding the Monitor header, verbatim
    pub metadata_lines: Vec<String>,
    pub insertions: Vec<FactoredInsertion>,
    pub summary: DatasetSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutViewOutput {
    pub sightings: Vec<AllocatedSighting>,
    pub summary: OutViewSummary,
}

/// Everything a batch produces.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingOutcome {
    pub monitor: Option<MonitorOutput>,
    pub outview: Option<OutViewOutput>,
    pub consolidated: ConsolidatedDataset,
    pub report: QualityReport,
    pub summary: DatasetSummary,
}

pub struct MediaSpendProcessor;

impl MediaSpendProcessor {
    pub fn process(inputs: &SourceInputs, config: &EngineConfig) -> Result<ProcessingOutcome> {
        if inputs.monitor.is_none() && inputs.outview.is_none() {
            return Err(MediaSpendError::MissingSources);
        }
        config.validate()?;

        let mut report = QualityReport::new();

        let monitor = inputs
            .monitor
            .map(|bytes| Self::process_monitor(bytes, config, &mut report))
            .transpose()?;
        let outview = inputs
            .outview
            .map(|bytes| Self::process_outview(bytes, config, &mut report))
            .transpose()?;

        let consolidated = consolidate(
            monitor.as_ref().map(|m| m.insertions.as_slice()),
            outview.as_ref().map(|o| o.sightings.as_slice()),
        )?;
        report.extend_findings(validation::validate_consolidated(&consolidated));

        let summary = DatasetSummary::from_records(&consolidated.records);

        match report.summary() {
            Some(line) => info!("Batch finished with {}", line),
            None => info!("Batch finished without warnings"),
        }
        for warning in report.iter() {
            debug!("Data quality: {}", warning);
        }

        Ok(ProcessingOutcome {
            monitor,
            outview,
            consolidated,
            report,
            summary,
        })
    }

    pub fn process_monitor(
        bytes: &[u8],
        config: &EngineConfig,
        report: &mut QualityReport,
    ) -> Result<MonitorOutput> {
        info!("Processing Monitor payload ({} bytes)", bytes.len());
        let parsed = parse_monitor(bytes, report)?;
        report.extend_findings(validation::validate_monitor(&parsed));

        let ParsedMonitor {
            metadata_lines,
            records,
            ..
        } = parsed;
        let insertions = FactorEngine::new(&config.monitor).apply(records, report);
        let summary = DatasetSummary::from_monitor(&insertions);

        Ok(MonitorOutput {
            metadata_lines,
            insertions,
            summary,
        })
    }

    pub fn process_outview(
        bytes: &[u8],
        config: &EngineConfig,
        report: &mut QualityReport,
    ) -> Result<OutViewOutput> {
        info!("Processing OutView payload ({} bytes)", bytes.len());
        let parsed = parse_outview(bytes, report)?;

        let input_rows = parsed.records.len();
        let sightings = TariffAllocator::new(&config.outview).allocate(parsed.records, report);
        report.extend_findings(validation::validate_allocation(input_rows, sightings.len()));

        let summary = OutViewSummary::from_sightings(&sightings);
        Ok(OutViewOutput { sightings, summary })
    }
}

pub fn process_media_spend(
    inputs: &SourceInputs,
    config: &EngineConfig,
) -> Result<ProcessingOutcome> {
    MediaSpendProcessor::process(inputs, config)
}
