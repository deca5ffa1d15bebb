//! # Hit Recorder CLI
//!
//! Replay the toy SPECT source through a recording configuration.
//!
//! ## Usage
//!
//! ```bash
//! # Default SPECT chain, single thread
//! cargo run -- --events 1000 --output-dir out/
//!
//! # Four workers merged into one file per output
//! cargo run -- --threads 4 --events 10000 --output-dir out/
//!
//! # Custom configuration
//! cargo run -- --dump-config > recorder.json
//! cargo run -- --config recorder.json
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use hit_recorder::synthetic::SpectSource;
use hit_recorder::{RecorderConfig, RecorderResult, RecordingEngine, TupleStore};

#[derive(Parser, Debug)]
#[command(name = "hit_recorder")]
#[command(about = "Record, aggregate and window simulated detector hits")]
struct Args {
    /// JSON recording configuration (default: built-in SPECT chain)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Worker threads (0 = run everything on the master)
    #[arg(short, long)]
    threads: Option<usize>,

    #[arg(long, default_value_t = 1)]
    runs: usize,

    /// Events per run
    #[arg(short, long, default_value_t = 1000)]
    events: usize,

    #[arg(long)]
    seed: Option<u64>,

    /// Directory for relative output paths (default: keep results in memory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    dump_config: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> RecorderResult<()> {
    let mut config = match &args.config {
        Some(path) => RecorderConfig::from_json_file(path)?,
        None => RecorderConfig::spect(),
    };
    if let Some(threads) = args.threads {
        config.number_of_threads = threads;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    if args.dump_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    let store = match &args.output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            config = config.with_output_dir(dir);
            TupleStore::on_disk()
        }
        None => TupleStore::in_memory(),
    };

    let source = SpectSource::new(args.runs, args.events, config.seed);
    let engine = RecordingEngine::new(config, Arc::new(store.clone()))?;
    let summary = engine.run(&source)?;

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                      Recording Summary                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!("Events processed: {}", summary.events_processed);
    println!("Worker threads:   {}", summary.threads);
    println!();
    for path in store.files() {
        let Some(file) = store.file(&path) else {
            continue;
        };
        println!("📂 {}", path.display());
        for name in file.tuple_names() {
            if let Some(tuple) = file.tuple(name) {
                println!(
                    "   └─ {:<16} {:>8} rows  {:>3} fields",
                    name,
                    tuple.row_count(),
                    tuple.fields.len()
                );
            }
        }
    }
    println!();
    println!("{}", summary.statistics);
    Ok(())
}
