use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use brc_pipeline::{Config, Engine, ParseMode, ProfileConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EngineArg {
    Pipeline,
    Mapped
}

#[derive(Parser, Debug)]
#[command(version, about = "Min/mean/max per station over a measurements file", long_about = None)]
struct Args {
    /// Path to measurements file
    #[arg(default_value = "measurements.txt")]
    input_file: PathBuf,

    /// Upper bound on worker threads (never above the default of min(8, cores))
    #[arg(short, long)]
    workers: Option<usize>,

    /// Read buffer size in bytes; must exceed the longest line
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Reject records that are not `KEY;[-]D+.D` instead of skipping stray bytes
    #[arg(long)]
    strict: bool,

    #[arg(long, value_enum, default_value_t = EngineArg::Pipeline)]
    engine: EngineArg,

    /// Write a timing profile to `file`
    #[arg(long, value_name = "file")]
    cpuprofile: Option<PathBuf>,

    /// Write a memory profile to `file`
    #[arg(long, value_name = "file")]
    memprofile: Option<PathBuf>,

    /// Print elapsed time to stderr
    #[arg(long)]
    timings: bool
}

impl Args {
    fn config(&self) -> Config {
        let mut config = Config::default()
            .with_parse_mode(match self.strict {
                true => ParseMode::Strict,
                false => ParseMode::Lenient,
            })
            .with_engine(match self.engine {
                EngineArg::Pipeline => Engine::Pipeline,
                EngineArg::Mapped => Engine::Mapped,
            })
            .with_profile(ProfileConfig {
                cpu: self.cpuprofile.clone(),
                memory: self.memprofile.clone()
            });
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if let Some(buffer_size) = self.buffer_size {
            config = config.with_buffer_size(buffer_size);
        }
        config
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(| _ | EnvFilter::new("warn"))
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.config();

    let timer = Instant::now();
    let stdout = std::io::stdout();
    let mut lock = BufWriter::new(stdout.lock());
    brc_pipeline::run(&args.input_file, &config, &mut lock)?;

    if args.timings {
        eprintln!("{:?}", timer.elapsed());
    }
    Ok(())
}
