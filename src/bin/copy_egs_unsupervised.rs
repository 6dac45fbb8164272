//! Copy examples for discriminative unsupervised training.
//!
//! With several outputs, examples are written round robin (or randomly
//! with `--random`).
//!
//! e.g.
//!   copy-egs-unsupervised train.egs.jsonl copy.egs.jsonl
//!   copy-egs-unsupervised train.egs.jsonl 1.egs.jsonl 2.egs.jsonl

use anyhow::{Context, Result};
use clap::Parser;
use rustfst_egs::{CopyConfig, JsonLinesReader, JsonLinesWriter, Pipeline, ScalePair};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Status when an error escapes the pipeline
const FATAL_EXIT_CODE: u8 = 255;

#[derive(Parser, Debug)]
#[command(name = "copy-egs-unsupervised")]
#[command(about = "Copy examples for discriminative unsupervised training")]
struct Args {
    /// Input examples ("-" for stdin)
    egs_rspecifier: String,

    /// Output archives ("-" for stdout)
    #[arg(required = true, num_args = 1..)]
    egs_wspecifiers: Vec<String>,

    /// Write examples to outputs randomly, not round robin
    #[arg(long)]
    random: bool,

    /// If <1.0, randomly keep this proportion of the input examples. If
    /// >1.0, copy an example this many times in expectation: either
    /// floor(keep-proportion) or ceil(keep-proportion) times.
    #[arg(long, default_value_t = 1.0)]
    keep_proportion: f64,

    /// Seed for the random number generator (only relevant with --random
    /// or --keep-proportion != 1.0)
    #[arg(long, default_value_t = 0)]
    srand: u64,

    /// Write as supervised example
    #[arg(long)]
    write_as_supervised_eg: bool,

    /// Replace alignments by the lattice best path, weighted by posteriors
    #[arg(long)]
    add_best_path_weights: bool,

    /// Acoustic scale applied before computing the best path
    #[arg(long, default_value_t = 1.0)]
    acoustic_scale: f32,

    /// LM scale applied before computing the best path
    #[arg(long, default_value_t = 1.0)]
    lm_scale: f32,
}

impl Args {
    fn config(&self) -> CopyConfig {
        CopyConfig {
            keep_proportion: self.keep_proportion,
            random: self.random,
            seed: self.srand,
            write_as_supervised: self.write_as_supervised_eg,
            add_best_path_weights: self.add_best_path_weights,
            scale: ScalePair::new(self.acoustic_scale, self.lm_scale),
        }
    }
}

fn run(args: &Args) -> Result<u8> {
    let mut pipeline = Pipeline::new(args.config(), args.egs_wspecifiers.len())?;
    let mut reader = JsonLinesReader::open(&args.egs_rspecifier)
        .with_context(|| format!("opening input {}", args.egs_rspecifier))?;
    let mut writers = args
        .egs_wspecifiers
        .iter()
        .map(|spec| {
            JsonLinesWriter::create(spec).with_context(|| format!("opening output {}", spec))
        })
        .collect::<Result<Vec<_>>>()?;
    let stats = pipeline.run(&mut reader, &mut writers)?;
    Ok(stats.exit_code())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}
