mod bench;
mod config;
mod error;
mod ext;
mod format;
mod inputs;
mod render;
mod run;
mod stats;

use std::{fs, num::NonZeroUsize, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use self::{
  bench::Bench,
  config::{BenchConfig, FailurePolicy, SizeCatalog, DEFAULT_ITERATIONS, DEFAULT_THREADS},
  render::ChartStyle,
  run::ProcessInvoker,
  stats::{Program, Summary},
};

#[derive(Parser)]
#[command(version, about = "Latency benchmark for AES-128 encryption executables")]
struct Args {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Time every program on every input size and print the summary as JSON.
  Bench {
    /// Directory holding the `bench_cpu`, `bench_cl` and `bench_ni` executables.
    #[arg(long, default_value = "./bin")]
    bin_dir: PathBuf,
    /// Which programs to benchmark.
    #[arg(short, long, value_enum, value_delimiter = ',', default_values_t = Program::ALL.to_vec())]
    programs: Vec<Program>,
    /// Number of measured runs per program and size.
    #[arg(short = 'n', long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,
    /// Worker threads each program may use.
    #[arg(short, long, default_value_t = DEFAULT_THREADS)]
    threads: NonZeroUsize,
    /// Directory holding `<size>.bin` input files.
    #[arg(long, default_value = "./input")]
    input_dir: PathBuf,
    /// Input sizes such as `1K,4M`. Defaults to every power of two from 1K to 2G.
    #[arg(short, long, value_delimiter = ',')]
    sizes: Vec<String>,
    /// File the programs write ciphertext to. Defaults to a scratch directory.
    #[arg(long)]
    output_file: Option<PathBuf>,
    /// Discarded runs per program and size before measuring.
    #[arg(long, default_value_t = 0)]
    warmup: usize,
    /// Kill a program after this many seconds. Timed out runs are not recorded.
    #[arg(long)]
    timeout: Option<u64>,
    /// What to do with runs that exit with a non-zero status.
    #[arg(long, value_enum, default_value_t = FailurePolicy::Ignore)]
    on_failure: FailurePolicy,
    /// Also write the summary JSON to this file.
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Draw a log-log chart of a summary as SVG.
  Render {
    /// Summary JSON written by `bench`. Defaults to the published measurements.
    #[arg(short, long)]
    summary: Option<PathBuf>,
    /// Where to write the SVG, `-` for stdout.
    #[arg(short, long, default_value = "chart.svg")]
    output: PathBuf,
    /// Number of runs each average was taken over, shown on the y axis.
    #[arg(short = 'n', long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,
    /// Replace the chart title.
    #[arg(long)]
    title: Option<String>,
  },
  /// Create the input files `bench` reads.
  Inputs {
    #[arg(long, default_value = "./input")]
    input_dir: PathBuf,
    /// Input sizes such as `1K,4M`. Defaults to every power of two from 1K to 2G.
    #[arg(short, long, value_delimiter = ',')]
    sizes: Vec<String>,
  },
}

fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("aes_bench=info"));

  tracing_subscriber::registry()
    .with(filter)
    .with(
      tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact(),
    )
    .init();
}

fn catalog(sizes: &[String]) -> Result<SizeCatalog> {
  if sizes.is_empty() {
    return Ok(SizeCatalog::reference());
  }

  SizeCatalog::from_labels(sizes).context("sizes")
}

fn main() -> Result<()> {
  init_tracing();

  match Args::parse().command {
    Command::Bench {
      bin_dir,
      programs,
      iterations,
      threads,
      input_dir,
      sizes,
      output_file,
      warmup,
      timeout,
      on_failure,
      output,
    } => {
      let config = BenchConfig {
        catalog: catalog(&sizes)?,
        programs,
        iterations,
        threads,
        input_dir,
        output_file,
        warmup,
        timeout: timeout.map(Duration::from_secs),
        on_failure,
        ..BenchConfig::reference(&bin_dir)
      };

      let invoker = ProcessInvoker::new(config.recipes.clone(), config.timeout);
      let summary = Bench::new(&config, invoker).context("Bench::new")?.run().context("bench")?;

      eprint!("{}", format::format(&summary).context("format")?);

      let json = summary.to_json()?;
      if let Some(path) = output {
        fs::write(&path, format!("{json}\n")).with_context(|| format!("write {path:?}"))?;
        info!("summary written to {path:?}");
      }
      println!("{json}");
    }
    Command::Render {
      summary,
      output,
      iterations,
      title,
    } => {
      let summary = match summary {
        Some(path) => {
          let json = fs::read_to_string(&path).with_context(|| format!("read {path:?}"))?;
          Summary::from_json(&json).with_context(|| format!("{path:?}"))?
        }
        None => Summary::reference()?,
      };

      let mut style = ChartStyle::reference(iterations);
      if let Some(title) = title {
        style.title = title;
      }

      let svg = render::render(&summary, &style).context("render")?;

      if output.as_os_str() == "-" {
        print!("{svg}");
      } else {
        fs::write(&output, svg).with_context(|| format!("write {output:?}"))?;
        info!("chart written to {output:?}");
      }
    }
    Command::Inputs { input_dir, sizes } => {
      let written = inputs::generate(&catalog(&sizes)?, &input_dir).context("inputs")?;
      info!("{} input files written to {input_dir:?}", written.len());
    }
  }

  Ok(())
}
