//! SignPipe CLI - Concurrent Hashing Pipeline
//!
//! Runs integers through the SingleHash -> MultiHash -> Combine pipeline.

use clap::Parser;
use signpipe::config::{CliArgs, Commands, OutputFormat, PipelineConfig};
use signpipe::core::compute_signature;
use signpipe::error::Result;
use signpipe::stages::{combine, MultiHashStage, SingleHashStage};
use tracing_subscriber::EnvFilter;

fn main() {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Initialize logging
    init_logging(&args);

    // Handle result
    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(args: &CliArgs) {
    let level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn run(args: CliArgs) -> Result<()> {
    // Build configuration
    let config = PipelineConfig::from_cli(&args)?;

    let Some(command) = &args.command else {
        eprintln!("Usage: signpipe run <INPUT>... [OPTIONS]");
        eprintln!("       signpipe --help for more information");
        eprintln!("       signpipe single-hash <VALUE>  - Hash one integer");
        eprintln!("       signpipe show-config          - Print effective configuration");
        std::process::exit(1);
    };

    // Print configuration if verbose
    if args.verbose > 0 && args.output_format == OutputFormat::Text {
        print_config(&config);
    }

    match command {
        Commands::Run { inputs } => cmd_run(inputs, &config, &args),
        Commands::SingleHash { value } => cmd_single_hash(*value, &config),
        Commands::MultiHash { data } => cmd_multi_hash(data, &config),
        Commands::Combine { parts } => {
            println!("{}", combine(parts.clone()));
            Ok(())
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn cmd_run(inputs: &[i64], config: &PipelineConfig, args: &CliArgs) -> Result<()> {
    let report = compute_signature(inputs, config)?;

    match args.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text if args.quiet => println!("{}", report.signature),
        OutputFormat::Text => report.print_summary(),
    }

    Ok(())
}

fn cmd_single_hash(value: i64, config: &PipelineConfig) -> Result<()> {
    let stage = SingleHashStage::new(config.build_signer(), config.fan_out());
    println!("{}", stage.hash_item(value)?);
    Ok(())
}

fn cmd_multi_hash(data: &str, config: &PipelineConfig) -> Result<()> {
    let stage = MultiHashStage::new(config.build_signer(), config.fan_out());
    println!("{}", stage.hash_item(data)?);
    Ok(())
}

fn print_config(config: &PipelineConfig) {
    println!("=== Configuration ===");
    println!("Buffer:      {}", config.buffer_size);
    println!("Fan-out:     {:?}", config.fan_out());
    println!("Signer:      {:?}", config.signer);
    println!("Checksum:    {}", humantime::format_duration(config.checksum_latency));
    println!("Digest:      {}", humantime::format_duration(config.digest_latency));
    println!();
}
