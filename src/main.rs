use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use miette::{IntoDiagnostic, Result, WrapErr};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

use classshrink::config::Config;
use classshrink::discovery::{load_snapshot, SnapshotFinder};
use classshrink::keep::KeepRule;
use classshrink::model::{Linker, Snapshot};
use classshrink::report::{ReportFormat, Reporter, UsageReport};
use classshrink::shrink::{ShrinkError, ShrinkPipeline};

/// classshrink - Remove unused classes, members and metadata from a class path
#[derive(Parser, Debug)]
#[command(name = "classshrink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Snapshot file, or a directory of *.json snapshots
    input: PathBuf,

    /// Where to write the shrunk snapshot
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep rule, `class[#member]` (can be specified multiple times)
    #[arg(short, long, value_name = "PATTERN")]
    keep: Vec<String>,

    /// Strip Kotlin metadata instead of shrinking it
    #[arg(long)]
    no_kotlin_metadata: bool,

    /// Write the removed classes and members to this file
    #[arg(long, value_name = "FILE")]
    print_usage: Option<PathBuf>,

    /// Explain why matching classes or members are kept
    #[arg(long, value_name = "PATTERN")]
    why_are_you_keeping: Vec<String>,

    /// Write the output even if nothing is kept
    #[arg(long)]
    ignore_warnings: bool,

    /// Report format
    #[arg(short, long, value_enum)]
    format: Option<ReportFormat>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - only output results
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    info!("classshrink v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;
    run(&config, &cli)
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::from_default_locations(&std::env::current_dir().into_diagnostic()?)?
    };

    // Override with CLI arguments
    for pattern in &cli.keep {
        let rule: KeepRule = pattern
            .parse()
            .into_diagnostic()
            .wrap_err_with(|| format!("Invalid --keep option: {pattern}"))?;
        config.keep.push(rule);
    }
    if cli.no_kotlin_metadata {
        config.shrink.keep_kotlin_metadata = false;
    }
    if cli.ignore_warnings {
        config.shrink.ignore_warnings = true;
    }
    if let Some(path) = &cli.print_usage {
        config.report.print_usage = Some(path.clone());
    }
    config
        .report
        .why_are_you_keeping
        .extend(cli.why_are_you_keeping.iter().cloned());
    if let Some(format) = cli.format {
        config.report.format = format;
    }

    Ok(config)
}

fn run(config: &Config, cli: &Cli) -> Result<()> {
    let start_time = Instant::now();

    let mut finder = SnapshotFinder::new();
    if let Some(output) = &cli.output {
        finder = finder.exclude(output);
    }
    let snapshot = load_snapshot(&cli.input, &finder)?;
    info!(
        program = snapshot.program.len(),
        library = snapshot.library.len(),
        "Loaded snapshot"
    );

    let mut path = snapshot.into_class_path();
    Linker {
        link_class_strings: config.shrink.link_class_strings,
    }
    .link(&mut path);

    let keep = config.keep_matcher().into_diagnostic()?;
    let queries = config
        .explanation_queries()
        .into_diagnostic()
        .wrap_err("Invalid --why-are-you-keeping option")?;

    let spinner = if cli.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .into_diagnostic()?,
    );
    spinner.set_message("Shrinking...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut usage = UsageReport::new();
    let result = {
        let mut pipeline = ShrinkPipeline::new(config.shrink.clone()).why_are_you_keeping(queries);
        if config.report.print_usage.is_some() {
            pipeline = pipeline.with_usage_sink(&mut usage);
        }
        pipeline.run(&mut path, &keep)
    };
    spinner.finish_and_clear();
    let summary = result.map_err(diagnostic)?;

    if let Some(usage_path) = &config.report.print_usage {
        usage.write(usage_path)?;
        info!("Usage written to: {}", usage_path.display());
    }

    if let Some(output) = &cli.output {
        let json = Snapshot::from_class_path(&path).to_json().into_diagnostic()?;
        std::fs::write(output, json)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to write output: {}", output.display()))?;
        info!("Output written to: {}", output.display());
    }

    Reporter::new(config.report.format, None).report(&summary)?;

    if !cli.quiet && config.report.format == ReportFormat::Terminal {
        let elapsed = start_time.elapsed();
        println!(
            "{}",
            format!(
                "Shrunk {} classes in {:.2}s",
                summary.original_classes,
                elapsed.as_secs_f64()
            )
            .dimmed()
        );
    }

    Ok(())
}

fn diagnostic(error: ShrinkError) -> miette::Report {
    miette::miette!(help = error.help(), "{}", error)
}
