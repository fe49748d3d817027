use clap::Parser;
use sorter_log_processor::cli::{Args, commands};
use std::process;

fn main() {
    let args = Args::parse();

    // No subcommand: show help and available commands
    if args.command.is_none() {
        show_help_and_commands();
        process::exit(0);
    }

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        // Ctrl+C drops the running analysis before anything is exported
        tokio::select! {
            result = commands::run(args) => result,
            signal = tokio::signal::ctrl_c() => {
                eprintln!("\nReceived CTRL+C, stopping without writing reports");
                match signal {
                    Ok(()) => Err(anyhow::anyhow!("Processing interrupted by user")),
                    Err(e) => Err(anyhow::anyhow!("Failed to listen for CTRL+C: {}", e)),
                }
            }
        }
    });

    match result {
        Ok(()) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("Sorter Log Processor - conveyor sorter log analytics");
    println!("=====================================================");
    println!();
    println!("Parse sorter controller log exports and report throughput, sort");
    println!("outcomes, defects, recirculation and alarm summaries.");
    println!();
    println!("USAGE:");
    println!("    sorter-log-processor <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    sort           Sort-outcome analysis (scanner, sort codes, defects, recirculation)");
    println!("    rate           Induction throughput against PPH targets");
    println!("    destinations   Destination requests and repeated barcodes");
    println!("    alarms         Summaries of HMI alarm exports");
    println!("    help           Show this help message or help for specific commands");
    println!();
    println!("OPTIONS:");
    println!("    --config <FILE>  TOML configuration file");
    println!("    -v, --verbose    Enable debug logging");
    println!("    -q, --quiet      Only log warnings and errors");
    println!("    -h, --help       Show help information");
    println!("    -V, --version    Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    # Sort outcomes for a 30 minute window from 10:00 with the SAT9 mapping:");
    println!("    sorter-log-processor sort -i logs/ --site sat9 --start 10:00");
    println!();
    println!("    # Whole-dataset induction rate, SPS inductions left out:");
    println!("    sorter-log-processor rate -i export.csv --full --no-sps");
    println!();
    println!("    # Choose the window and exception list at the terminal:");
    println!("    sorter-log-processor sort -i export.csv --mapping map.csv --interactive");
    println!();
    println!("    # Emergency stop durations from an alarm history export:");
    println!("    sorter-log-processor alarms --kind estop -i HistoryAlarms.csv");
    println!();
    println!("For detailed help on any command, use:");
    println!("    sorter-log-processor <COMMAND> --help");
}
