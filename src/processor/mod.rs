//! Analysis runner.
//!
//! Orchestrates one analysis run: input discovery, concurrent loading,
//! family preparation, window choice, the analysis itself, and export.
//! Exports are only written once the whole analysis has succeeded.

pub mod discovery;
pub mod loader;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::{discovery::FileDiscovery, loader::LogLoader, writer::ReportWriter};

use crate::config::AnalysisConfig;
use crate::correction::load_exception_list;
use crate::error::{Result, SorterError};
use crate::mapping::DestinationMap;
use crate::pipeline::{
    PreparedTable, analyze_destinations, analyze_induction_rate, analyze_sort, prepare_family,
};
use crate::report::{AnalysisReport, destination_report, rate_report, sort_report};
use crate::schema::MessageFamily;
use crate::window::{DatasetBounds, ResolvedWindow, Timestamped, WindowRequest, resolve_window};

use colored::*;
use std::path::PathBuf;
use std::time::Instant;
use tracing::warn;

/// Which log analysis to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    Sort,
    Rate,
    Destinations,
}

impl AnalysisKind {
    pub fn family(&self) -> MessageFamily {
        match self {
            AnalysisKind::Sort => MessageFamily::SortOutcome,
            AnalysisKind::Rate => MessageFamily::ItemsInducted,
            AnalysisKind::Destinations => MessageFamily::DestinationRequest,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AnalysisKind::Sort => "sort-outcome analysis",
            AnalysisKind::Rate => "induction rate analysis",
            AnalysisKind::Destinations => "destination-request analysis",
        }
    }
}

/// Where the destination mapping comes from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MappingSource {
    #[default]
    None,
    /// `<mapping dir>/<SITE>_Destination_Mapping.csv`
    Site(String),
    File(PathBuf),
}

/// Choices made while a run is in progress
///
/// The window is chosen once dataset bounds are known; the exception list
/// is asked for right before corrections would apply.
pub trait RunChoices {
    fn window(&mut self, bounds: &DatasetBounds) -> Result<WindowRequest>;

    fn exception_list(&mut self) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// Choices fixed up front, e.g. from command-line flags
#[derive(Debug, Clone, Default)]
pub struct PresetChoices {
    pub window: WindowRequest,
    pub exceptions: Option<PathBuf>,
}

impl RunChoices for PresetChoices {
    fn window(&mut self, _bounds: &DatasetBounds) -> Result<WindowRequest> {
        Ok(self.window.clone())
    }

    fn exception_list(&mut self) -> Result<Option<PathBuf>> {
        Ok(self.exceptions.clone())
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default)]
pub struct ProcessingStats {
    pub files_read: usize,
    pub records_read: usize,
    pub malformed_lines: usize,
    pub family_records: usize,
    pub clean_rows: usize,
    pub written: Vec<PathBuf>,
    pub processing_time_ms: u128,
}

#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    pub report: AnalysisReport,
    pub stats: ProcessingStats,
}

/// Runs one analysis over a set of log inputs
#[derive(Debug)]
pub struct LogProcessor {
    config: AnalysisConfig,
    mapping: MappingSource,
    export: bool,
    file_discovery: FileDiscovery,
    loader: LogLoader,
    writer: ReportWriter,
}

impl LogProcessor {
    pub fn new(inputs: Vec<PathBuf>) -> Result<Self> {
        if let Some(missing) = inputs.iter().find(|input| !input.exists()) {
            return Err(SorterError::InputNotFound {
                path: missing.clone(),
            });
        }

        let config = AnalysisConfig::default();
        Ok(Self {
            mapping: MappingSource::None,
            export: true,
            file_discovery: FileDiscovery::new(inputs),
            loader: LogLoader::new(config.loader_concurrency),
            writer: ReportWriter::from_config(&config.export),
            config,
        })
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.loader = LogLoader::new(config.loader_concurrency);
        self.writer = ReportWriter::from_config(&config.export);
        self.config = config;
        self
    }

    pub fn with_mapping(mut self, mapping: MappingSource) -> Self {
        self.mapping = mapping;
        self
    }

    /// Skip writing tables; the report is still returned
    pub fn without_export(mut self) -> Self {
        self.export = false;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn load_mapping(&self) -> Result<DestinationMap> {
        let path = match &self.mapping {
            MappingSource::None => {
                warn!("No destination mapping given, destination names stay empty");
                return Ok(DestinationMap::default());
            }
            MappingSource::Site(site) => self.config.mapping.path_for_site(site),
            MappingSource::File(path) => path.clone(),
        };
        println!(
            "  {} {}",
            "Mapping:".bright_cyan(),
            path.display()
        );
        DestinationMap::load(&path)
    }

    fn choose_window<T: Timestamped>(
        &self,
        events: &[T],
        choices: &mut dyn RunChoices,
    ) -> Result<ResolvedWindow> {
        let bounds = DatasetBounds::from_events(events)?;
        println!(
            "  {} {} to {}",
            "Dataset spans".bright_cyan(),
            bounds.start.to_string().bright_white(),
            bounds.end.to_string().bright_white()
        );

        let request = choices.window(&bounds)?;
        let window = resolve_window(&bounds, &request, self.config.window_minutes)?;
        if window.empty {
            println!(
                "  {}",
                "Window holds no data, all metrics will be zero".bright_yellow()
            );
        } else {
            println!(
                "  {} {} to {} ({:.1} min)",
                "Window:".bright_cyan(),
                window.start,
                window.end,
                window.duration_minutes()
            );
        }
        Ok(window)
    }

    /// Run one analysis end to end
    pub async fn process(
        &mut self,
        kind: AnalysisKind,
        choices: &mut dyn RunChoices,
    ) -> Result<ProcessingOutcome> {
        let start_time = Instant::now();
        println!(
            "{}",
            format!("Starting {}", kind.title()).bright_green().bold()
        );

        // Step 1: Resolve inputs and load the mapping early so bad paths fail fast
        println!("\n{}", "Discovering input files...".bright_yellow());
        let files = self.file_discovery.discover_log_files()?;
        println!(
            "  {} {} log files",
            "Found".bright_green(),
            files.len().to_string().bright_white().bold()
        );
        let mapping = match kind {
            AnalysisKind::Sort => self.load_mapping()?,
            _ => DestinationMap::default(),
        };

        // Step 2: Read all files
        println!("\n{}", "Reading log files...".bright_yellow());
        let loaded = self.loader.load(&files).await?;
        let mut stats = ProcessingStats {
            files_read: loaded.files_read,
            records_read: loaded.records.len(),
            malformed_lines: loaded.stats.malformed_lines,
            ..ProcessingStats::default()
        };

        // Step 3: Keep the family, decode, normalize and prune
        let family = kind.family();
        println!(
            "\n{} {}",
            "Preparing".bright_yellow(),
            family.label().bright_yellow()
        );
        let prepared = prepare_family(loaded.records, family, &self.config);
        stats.family_records = prepared.filter.kept;
        stats.clean_rows = prepared.clean.len();
        println!(
            "  {} {} of {} records with messageCode {}",
            "Kept".bright_green(),
            prepared.filter.kept.to_string().bright_white().bold(),
            prepared.filter.total,
            family.code(&self.config.message_codes)
        );

        // Step 4: Window and analysis
        let report = self.analyze(kind, &prepared, &mapping, choices)?;

        // Step 5: Export
        if self.export {
            println!("\n{}", "Writing reports...".bright_yellow());
            stats.written = self.writer.write_report(&report)?;
            println!(
                "  {} {} tables to {}",
                "Wrote".bright_green(),
                stats.written.len().to_string().bright_white().bold(),
                self.writer.directory().display()
            );
        }

        stats.processing_time_ms = start_time.elapsed().as_millis();
        Ok(ProcessingOutcome { report, stats })
    }

    fn analyze(
        &self,
        kind: AnalysisKind,
        prepared: &PreparedTable,
        mapping: &DestinationMap,
        choices: &mut dyn RunChoices,
    ) -> Result<AnalysisReport> {
        match kind {
            AnalysisKind::Sort => {
                let events = prepared.clean.to_sort_events();
                let window = self.choose_window(&events, choices)?;
                let exceptions = match choices.exception_list()? {
                    Some(path) => Some(load_exception_list(&path)?),
                    None => None,
                };
                let analysis =
                    analyze_sort(&events, window, mapping, exceptions.as_deref(), &self.config);
                sort_report(prepared, &analysis)
            }
            AnalysisKind::Rate => {
                let events = prepared.clean.to_induction_events(&self.config.rate);
                let window = self.choose_window(&events, choices)?;
                let analysis = analyze_induction_rate(&events, window, &self.config);
                rate_report(prepared, &analysis)
            }
            AnalysisKind::Destinations => {
                let events = prepared.clean.to_destination_requests();
                let window = self.choose_window(&events, choices)?;
                let analysis = analyze_destinations(&events, window);
                destination_report(prepared, &analysis)
            }
        }
    }
}
