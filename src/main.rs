use std::io::Read;
use std::path::PathBuf;

use adsearch_render::parallel_executor::ParallelConfig;
use adsearch_render::{parse_record_dump, OutputConfig, RecordRenderer};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

/// Render captured directory query results
#[derive(Debug, Parser)]
#[command(name = "adsearch-render", version, about)]
struct Cli {
    /// JSON record dump to render ("-" reads stdin)
    #[arg(default_value = "-")]
    input: String,

    /// Show all attributes for each returned item
    #[arg(short, long)]
    full: bool,

    /// Attributes to show, comma separated
    #[arg(short, long, default_value = "cn")]
    attributes: String,

    /// Output results in JSON format
    #[arg(long)]
    json: bool,

    /// File path to write the results to
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Worker threads used to decode large result sets
    #[arg(long, default_value_t = 1)]
    threads: usize,
}

impl Cli {
    fn output_config(&self) -> OutputConfig {
        OutputConfig {
            full: self.full,
            json: self.json,
            output: self.output.clone(),
            parallel: ParallelConfig {
                max_concurrency: self.threads,
                ..ParallelConfig::default()
            },
            ..OutputConfig::default()
        }
        .with_attribute_csv(&self.attributes)
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // rendered results own stdout
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .init();
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read record dump from stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read record dump {}", input))
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.output_config();
    config.validate()?;

    let records = parse_record_dump(&read_input(&cli.input)?)?;
    info!("Loaded {} records from {}", records.len(), cli.input);

    let mut sink = config.open_destination()?;
    let renderer = RecordRenderer::new(config);
    let stats = renderer.render_batch(&records, &mut sink)?;

    info!(
        "Rendered {} records ({} attribute errors) in {}ms",
        stats.total_records, stats.failed_attributes, stats.total_duration_ms
    );
    Ok(())
}

fn main() {
    init_tracing();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
