//! surprisal-rs CLI: bits of information in a text

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use surprisal_rs::config::{Method, OutputFormat, RunConfig, SAMPLE_TEXT};
use surprisal_rs::report::{
    format_trace_line, render_error_json, render_word_frequency_json,
    render_word_frequency_text, Report,
};
use surprisal_rs::{
    OverflowPolicy, ShannonAnalysis, ShannonEstimator, SurprisalEstimator, SurprisalModel,
    TextEstimator, WordFrequencyAnalysis,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "surprisal-rs")]
#[command(about = "Estimate the information content of text under a language model")]
#[command(version)]
struct Cli {
    /// Model ID from `HuggingFace` or a local model directory
    #[arg(short, long)]
    model: Option<String>,

    /// Estimation method
    #[arg(long, value_enum)]
    method: Option<Method>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Text to analyze (default: stdin when piped, else a built-in sample)
    #[arg(short, long)]
    text: Option<String>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Force CPU mode
    #[arg(long)]
    cpu: bool,

    /// Print per-token surprisal to stderr
    #[arg(long)]
    debug: bool,

    /// Fail instead of clamping when the model reports p > 1
    #[arg(long)]
    reject_overflow: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// File configuration (or defaults) with command-line overrides applied
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        if let Some(model) = &self.model {
            config.model.clone_from(model);
        }
        if let Some(method) = self.method {
            config.method = method;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        config.cpu |= self.cpu;
        config.debug |= self.debug;
        if self.reject_overflow {
            config.overflow = OverflowPolicy::Reject;
        }
        Ok(config)
    }
}

/// Explicit text, else piped stdin, else the sample; always trimmed
fn read_input(explicit: Option<&str>) -> Result<String> {
    if let Some(text) = explicit {
        return Ok(text.trim().to_string());
    }
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(SAMPLE_TEXT.to_string());
    }
    let mut buf = String::new();
    stdin
        .lock()
        .read_to_string(&mut buf)
        .context("Failed to read stdin")?;
    Ok(buf.trim().to_string())
}

fn run(config: &RunConfig, text: &str) -> Result<String> {
    anyhow::ensure!(!text.is_empty(), "No input text provided");

    match config.method {
        Method::Model => {
            info!("Loading model...");
            let model = SurprisalModel::from_pretrained_with_device(&config.model, config.cpu)?;
            info!(
                "Model: {} layers, {} hidden, {} vocab",
                model.n_layers(),
                model.d_model(),
                model.vocab_size()
            );

            let estimator =
                SurprisalEstimator::new(&model, &model).with_overflow_policy(config.overflow);
            let estimate = if config.debug {
                estimator.estimate_with_trace(text, |entry| eprintln!("{}", format_trace_line(entry)))?
            } else {
                estimator.estimate(text)?
            };
            render(config, Report::new(text, Method::Model.as_str(), estimate))
        }
        Method::Shannon => {
            let analysis = ShannonAnalysis::analyze(text);
            let report = Report::new(text, ShannonEstimator.method(), analysis.to_estimate())
                .with_token_count(analysis.total_words);
            render(config, report)
        }
        Method::WordFrequency => {
            let analysis = WordFrequencyAnalysis::analyze(text);
            match config.format {
                OutputFormat::Text => Ok(render_word_frequency_text(text, &analysis)),
                OutputFormat::Json => render_word_frequency_json(text, &analysis),
            }
        }
    }
}

fn render(config: &RunConfig, report: Report<'_>) -> Result<String> {
    match config.format {
        OutputFormat::Text => Ok(report.render_text()),
        OutputFormat::Json => report.render_json(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = cli.run_config()?;
    let outcome = read_input(cli.text.as_deref()).and_then(|text| run(&config, &text));

    match outcome {
        Ok(output) => {
            println!("{output}");
            Ok(())
        }
        Err(e) => {
            match config.format {
                OutputFormat::Text => println!("Error: {e:#}"),
                OutputFormat::Json => println!("{}", render_error_json(&format!("{e:#}"))),
            }
            std::process::exit(1);
        }
    }
}
