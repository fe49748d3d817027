//! Command implementations for the sorter log processor CLI
//!
//! Sets up logging and configuration, runs the requested analysis through
//! the processor, and prints a colored summary of the report.

use crate::alarms::{
    summarize_alarm_categories, summarize_duration_history, summarize_jam_occurrences,
};
use crate::cli::prompts::InteractiveChoices;
use crate::cli::{
    AlarmArgs, AlarmKind, Args, Command, DestinationArgs, ExportArgs, RateArgs, SortArgs,
    WindowArgs, apply_export_args, apply_mapping_args,
};
use crate::config::AnalysisConfig;
use crate::mapping::DestinationMap;
use crate::processor::writer::ReportWriter;
use crate::processor::{
    AnalysisKind, LogProcessor, MappingSource, PresetChoices, ProcessingOutcome, RunChoices,
};
use crate::report::{AnalysisReport, category_report, duration_alarm_report, jam_report};

use anyhow::{Context, Result};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Main command runner
pub async fn run(args: Args) -> Result<()> {
    setup_logging(&args)?;
    debug!("Command line arguments: {:?}", args);

    let config = AnalysisConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;

    let Some(command) = args.command else {
        anyhow::bail!("No command given, see --help");
    };

    match command {
        Command::Sort(sort) => run_sort(config, sort).await,
        Command::Rate(rate) => run_rate(config, rate).await,
        Command::Destinations(destinations) => run_destinations(config, destinations).await,
        Command::Alarms(alarms) => run_alarms(config, alarms),
    }
}

/// Set up structured logging based on CLI arguments
fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sorter_log_processor={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
            .context("Failed to install log subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .context("Failed to install log subscriber")?;
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Layer window and export flags over the loaded configuration
fn configure(
    config: AnalysisConfig,
    window: &WindowArgs,
    export: &ExportArgs,
) -> Result<AnalysisConfig> {
    let mut config = apply_export_args(config, export);
    if let Some(minutes) = window.window_minutes {
        config = config.with_window_minutes(minutes);
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn choices(
    window: &WindowArgs,
    exceptions: Option<PathBuf>,
    ask_exceptions: bool,
) -> Box<dyn RunChoices> {
    if window.interactive {
        Box::new(InteractiveChoices::stdin(ask_exceptions).with_exception_list(exceptions))
    } else {
        Box::new(PresetChoices {
            window: window.request(),
            exceptions,
        })
    }
}

async fn run_log_analysis(
    processor: LogProcessor,
    kind: AnalysisKind,
    choices: &mut dyn RunChoices,
    export: &ExportArgs,
) -> Result<ProcessingOutcome> {
    let mut processor = if export.no_export {
        processor.without_export()
    } else {
        processor
    };

    let outcome = processor
        .process(kind, choices)
        .await
        .with_context(|| format!("The {} failed", kind.title()))?;

    print_report(&outcome.report);
    print_processing_stats(&outcome);
    Ok(outcome)
}

async fn run_sort(config: AnalysisConfig, args: SortArgs) -> Result<()> {
    let mut config = apply_mapping_args(config, &args.mapping);
    if let Some(gap) = args.package_gap_secs {
        config = config.with_package_gap_secs(gap);
    }
    let config = configure(config, &args.window, &args.export)?;

    let processor = LogProcessor::new(args.input.inputs.clone())?
        .with_config(config)
        .with_mapping(args.mapping.source());
    let mut choices = choices(&args.window, args.exceptions.clone(), true);

    run_log_analysis(processor, AnalysisKind::Sort, choices.as_mut(), &args.export).await?;
    Ok(())
}

async fn run_rate(config: AnalysisConfig, args: RateArgs) -> Result<()> {
    let mut config = configure(config, &args.window, &args.export)?;
    if args.no_sps {
        config = config.with_sps_target(None);
    } else if let Some(target) = args.sps_target {
        config = config.with_sps_target(Some(target));
    }

    let processor = LogProcessor::new(args.input.inputs.clone())?.with_config(config);
    let mut choices = choices(&args.window, None, false);

    let outcome =
        run_log_analysis(processor, AnalysisKind::Rate, choices.as_mut(), &args.export).await?;
    print_rate_lines(&outcome.report);
    Ok(())
}

async fn run_destinations(config: AnalysisConfig, args: DestinationArgs) -> Result<()> {
    let config = configure(config, &args.window, &args.export)?;

    let processor = LogProcessor::new(args.input.inputs.clone())?.with_config(config);
    let mut choices = choices(&args.window, None, false);

    run_log_analysis(
        processor,
        AnalysisKind::Destinations,
        choices.as_mut(),
        &args.export,
    )
    .await?;
    Ok(())
}

fn run_alarms(config: AnalysisConfig, args: AlarmArgs) -> Result<()> {
    let start_time = Instant::now();
    let config = apply_export_args(apply_mapping_args(config, &args.mapping), &args.export);
    println!(
        "{} {}",
        "Summarizing alarm export".bright_green().bold(),
        args.input.display()
    );

    let mapping = if args.kind.uses_mapping() {
        load_alarm_mapping(&config, &args.mapping.source())?
    } else {
        None
    };

    let report = match (args.kind, args.kind.device()) {
        (_, Some(device)) => {
            let summary = summarize_duration_history(&args.input, device, mapping.as_ref())?;
            duration_alarm_report(&summary)?
        }
        (AlarmKind::Jams, None) => {
            jam_report(&summarize_jam_occurrences(&args.input, mapping.as_ref())?)?
        }
        (_, None) => category_report(&summarize_alarm_categories(&args.input)?)?,
    };

    print_report(&report);

    if !args.export.no_export {
        let writer = ReportWriter::from_config(&config.export);
        let written = writer.write_report(&report)?;
        println!(
            "\n{} {} tables to {}",
            "Wrote".bright_green(),
            written.len().to_string().bright_white().bold(),
            writer.directory().display()
        );
    }

    info!("Alarm summary finished in {:.2?}", start_time.elapsed());
    Ok(())
}

fn load_alarm_mapping(
    config: &AnalysisConfig,
    source: &MappingSource,
) -> Result<Option<DestinationMap>> {
    let path = match source {
        MappingSource::None => return Ok(None),
        MappingSource::Site(site) => config.mapping.path_for_site(site),
        MappingSource::File(path) => path.clone(),
    };
    let mapping = DestinationMap::load(&path)
        .with_context(|| format!("Failed to load destination mapping {}", path.display()))?;
    Ok(Some(mapping))
}

/// Summary values plus the size of every table
fn print_report(report: &AnalysisReport) {
    println!("\n{}", "Summary".bright_green().bold());
    let width = report
        .summary
        .iter()
        .map(|(metric, _)| metric.len())
        .max()
        .unwrap_or(0);
    for (metric, value) in &report.summary {
        let metric = format!("{:width$}", metric, width = width);
        println!("  {}  {}", metric.bright_cyan(), value.bright_white());
    }

    println!("\n{}", "Tables".bright_green().bold());
    for table in &report.tables {
        println!(
            "  {} ({} rows)",
            table.name.bright_cyan(),
            table.frame.height()
        );
    }
}

fn print_rate_lines(report: &AnalysisReport) {
    let Some(frame) = report.table("rate") else {
        return;
    };
    let Ok(lines) = frame.column("summary_line").and_then(|column| column.str()) else {
        return;
    };

    println!("\n{}", "Induction rates".bright_green().bold());
    for line in lines.into_iter().flatten() {
        println!("  {}", line);
    }
}

fn print_processing_stats(outcome: &ProcessingOutcome) {
    let stats = &outcome.stats;
    println!(
        "\n{} {} files, {} records ({} malformed lines dropped), {} rows analyzed in {} ms",
        "Processed".bright_green().bold(),
        stats.files_read,
        stats.records_read,
        stats.malformed_lines,
        stats.clean_rows,
        stats.processing_time_ms
    );
}
