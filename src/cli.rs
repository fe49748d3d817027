//! Command-line interface components.

pub mod commands;

use crate::alarms::DeviceKind;
use crate::config::{AnalysisConfig, ExportFormat};
use crate::processor::MappingSource;
use crate::window::WindowRequest;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sorter-log-processor")]
#[command(about = "Throughput, defect, recirculation and alarm analytics for sorter controller logs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// TOML config file (default: <config dir>/sorter-log-processor/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sort outcomes: scanner, sort codes, defects, recirculation, jackpot
    Sort(SortArgs),
    /// Induction throughput against PPH targets
    Rate(RateArgs),
    /// Destination requests per destination and repeated barcodes
    Destinations(DestinationArgs),
    /// Summaries of HMI alarm exports
    Alarms(AlarmArgs),
}

/// Log inputs shared by the log analyses
#[derive(ClapArgs, Debug, Clone)]
pub struct InputArgs {
    /// Log export file or directory (repeatable)
    #[arg(short, long = "input", value_name = "PATH", required = true)]
    pub inputs: Vec<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct WindowArgs {
    /// Analyze the whole dataset
    #[arg(long, conflicts_with_all = ["start", "end"])]
    pub full: bool,

    /// Window start: HH, HH:MM[:SS] or YYYY-MM-DD HH:MM[:SS]
    #[arg(long)]
    pub start: Option<String>,

    /// Window end; defaults to start plus the window length
    #[arg(long)]
    pub end: Option<String>,

    /// Window length in minutes when no end is given
    #[arg(long)]
    pub window_minutes: Option<i64>,

    /// Ask for the window (and exception list) on the terminal
    #[arg(long, conflicts_with_all = ["full", "start", "end"])]
    pub interactive: bool,
}

impl WindowArgs {
    pub fn request(&self) -> WindowRequest {
        if self.full {
            WindowRequest::Full
        } else {
            WindowRequest::Range {
                start: self.start.clone(),
                end: self.end.clone(),
            }
        }
    }
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ExportArgs {
    /// Report directory
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Report table format
    #[arg(long, value_enum)]
    pub format: Option<ExportFormat>,

    /// Print the summary only, write no tables
    #[arg(long)]
    pub no_export: bool,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct MappingArgs {
    /// Site code; reads <mapping dir>/<SITE>_Destination_Mapping.csv
    #[arg(long, conflicts_with = "mapping")]
    pub site: Option<String>,

    /// Destination mapping CSV
    #[arg(long, value_name = "FILE")]
    pub mapping: Option<PathBuf>,

    /// Directory holding site mapping files
    #[arg(long, value_name = "DIR")]
    pub mapping_dir: Option<PathBuf>,
}

impl MappingArgs {
    pub fn source(&self) -> MappingSource {
        match (&self.mapping, &self.site) {
            (Some(path), _) => MappingSource::File(path.clone()),
            (None, Some(site)) => MappingSource::Site(site.clone()),
            (None, None) => MappingSource::None,
        }
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SortArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub mapping: MappingArgs,

    #[command(flatten)]
    pub window: WindowArgs,

    /// False-positive exception list (ID, comment)
    #[arg(long, value_name = "FILE")]
    pub exceptions: Option<PathBuf>,

    /// Gap in seconds that starts a new package for a repeated item id
    #[arg(long)]
    pub package_gap_secs: Option<i64>,

    #[command(flatten)]
    pub export: ExportArgs,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RateArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub window: WindowArgs,

    /// Target PPH for SPS-only windows
    #[arg(long, conflicts_with = "no_sps")]
    pub sps_target: Option<f64>,

    /// Leave SPS inductions out of rate analysis
    #[arg(long)]
    pub no_sps: bool,

    #[command(flatten)]
    pub export: ExportArgs,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct DestinationArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub window: WindowArgs,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Alarm export shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AlarmKind {
    /// Chute jam durations per Beumer chute
    Chute,
    Dbs,
    Ias,
    /// Emergency stop durations (ES group only)
    Estop,
    /// Jam occurrence counts per chute
    Jams,
    /// Alarm amounts per category text
    Categories,
}

impl AlarmKind {
    /// Duration-history device, if this kind reads a duration history
    pub fn device(&self) -> Option<DeviceKind> {
        match self {
            AlarmKind::Chute => Some(DeviceKind::Chute),
            AlarmKind::Dbs => Some(DeviceKind::Dbs),
            AlarmKind::Ias => Some(DeviceKind::Ias),
            AlarmKind::Estop => Some(DeviceKind::Estop),
            AlarmKind::Jams | AlarmKind::Categories => None,
        }
    }

    pub fn uses_mapping(&self) -> bool {
        matches!(self, AlarmKind::Chute | AlarmKind::Jams)
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct AlarmArgs {
    /// Alarm export to summarize
    #[arg(long, value_enum)]
    pub kind: AlarmKind,

    /// Alarm export file
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    #[command(flatten)]
    pub mapping: MappingArgs,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Apply export flags over the loaded configuration
pub fn apply_export_args(mut config: AnalysisConfig, export: &ExportArgs) -> AnalysisConfig {
    if let Some(output) = &export.output {
        config = config.with_export_dir(output.clone());
    }
    if let Some(format) = export.format {
        config = config.with_export_format(format);
    }
    config
}

/// Apply the mapping directory flag over the loaded configuration
pub fn apply_mapping_args(mut config: AnalysisConfig, mapping: &MappingArgs) -> AnalysisConfig {
    if let Some(directory) = &mapping.mapping_dir {
        config = config.with_mapping_dir(directory.clone());
    }
    config
}

/// Terminal prompts for interactive runs
pub mod prompts {
    use crate::processor::RunChoices;
    use crate::window::{DatasetBounds, WindowRequest};
    use anyhow::{Context, Result};
    use colored::*;
    use std::io::{self, BufRead, Write};
    use std::path::PathBuf;

    /// Answer run choices by asking on the terminal
    pub struct InteractiveChoices<R> {
        input: R,
        ask_exceptions: bool,
        exceptions: Option<PathBuf>,
    }

    impl InteractiveChoices<io::StdinLock<'static>> {
        pub fn stdin(ask_exceptions: bool) -> Self {
            Self::new(io::stdin().lock(), ask_exceptions)
        }
    }

    impl<R: BufRead> InteractiveChoices<R> {
        pub fn new(input: R, ask_exceptions: bool) -> Self {
            Self {
                input,
                ask_exceptions,
                exceptions: None,
            }
        }

        /// Use this exception list instead of asking for one
        pub fn with_exception_list(mut self, path: Option<PathBuf>) -> Self {
            self.exceptions = path;
            self
        }

        fn ask(&mut self, question: &str) -> Result<String> {
            print!("{}", question.bright_white());
            io::stdout().flush().context("Failed to flush stdout")?;

            let mut answer = String::new();
            let read = self
                .input
                .read_line(&mut answer)
                .context("Failed to read user input")?;
            if read == 0 {
                anyhow::bail!("Input closed while waiting for an answer");
            }
            Ok(answer.trim().to_string())
        }

        fn ask_window(&mut self, bounds: &DatasetBounds) -> Result<WindowRequest> {
            println!();
            println!(
                "{} {} {} {}",
                "Data available from".bright_green(),
                bounds.start.to_string().bright_cyan(),
                "to".bright_green(),
                bounds.end.to_string().bright_cyan()
            );
            println!(
                "  Times may be {} or {}; enter {} for the whole dataset",
                bounds.start.format("%H:%M").to_string().bright_yellow(),
                bounds
                    .start
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
                    .bright_yellow(),
                "Full".bright_yellow().bold()
            );

            let start = self.ask("Start time (blank for data start): ")?;
            if start.eq_ignore_ascii_case("full") {
                return Ok(WindowRequest::Full);
            }
            let end = self.ask("End time (blank for start + window length): ")?;

            Ok(WindowRequest::Range {
                start: Some(start).filter(|s| !s.is_empty()),
                end: Some(end).filter(|s| !s.is_empty()),
            })
        }

        fn prompt_exception_list(&mut self) -> Result<Option<PathBuf>> {
            loop {
                let answer = self.ask("Apply a false-positive exception list? [y/N]: ")?;
                match answer.to_lowercase().as_str() {
                    "y" | "yes" => break,
                    "" | "n" | "no" => return Ok(None),
                    _ => println!("{}", "Please answer y or n".bright_red()),
                }
            }

            let path = self.ask("Exception list path: ")?;
            if path.is_empty() {
                anyhow::bail!("No exception list path given");
            }
            Ok(Some(PathBuf::from(path)))
        }
    }

    impl<R: BufRead> RunChoices for InteractiveChoices<R> {
        fn window(&mut self, bounds: &DatasetBounds) -> crate::error::Result<WindowRequest> {
            self.ask_window(bounds).map_err(prompt_error)
        }

        fn exception_list(&mut self) -> crate::error::Result<Option<PathBuf>> {
            if self.exceptions.is_some() || !self.ask_exceptions {
                return Ok(self.exceptions.clone());
            }
            self.prompt_exception_list().map_err(prompt_error)
        }
    }

    fn prompt_error(error: anyhow::Error) -> crate::error::SorterError {
        crate::error::SorterError::Io(io::Error::other(format!("{:#}", error)))
    }

}
