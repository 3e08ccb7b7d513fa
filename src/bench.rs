use std::{
  path::PathBuf,
  time::{Duration, Instant},
};

use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::{
  config::{BenchConfig, FailurePolicy},
  error::TrialError,
  run::Invoker,
  stats::{Program, Summary, Trials},
};

/// Sequential benchmark sweep. Trials never overlap: each invocation blocks
/// until the child exits before the next one starts.
pub struct Bench<'a, I> {
  config: &'a BenchConfig,
  invoker: I,
  /// Raw latencies collected so far.
  trials: Trials,
  /// File the programs write their ciphertext to.
  output: PathBuf,
  /// Holds the scratch output directory alive for the duration of the run.
  _scratch: Option<TempDir>,
}

impl<'a, I: Invoker> Bench<'a, I> {
  /// Validates `config`, failing before anything is spawned if it is unusable.
  pub fn new(config: &'a BenchConfig, invoker: I) -> Result<Self> {
    config.validate().context("invalid configuration")?;

    let (output, scratch) = match &config.output_file {
      Some(path) => (path.clone(), None),
      None => {
        let scratch = TempDir::with_prefix("aes-bench-").context("tempdir")?;
        (scratch.path().join("out.bin"), Some(scratch))
      }
    };

    Ok(Self {
      config,
      invoker,
      trials: Trials::default(),
      output,
      _scratch: scratch,
    })
  }

  /// Runs warm-up, then every iteration over every program and size, and
  /// reduces the results. Nothing is returned until the whole sweep is done.
  pub fn run(mut self) -> Result<Summary> {
    let config = self.config;

    self.warm_up().context("warm up")?;

    for iteration in 0..config.iterations {
      info!("iteration {}/{}", iteration + 1, config.iterations);

      for &program in &config.programs {
        info!("  running {program}");

        for (label, bytes) in config.catalog.iter() {
          if let Some(elapsed) = self
            .measure(program, label)
            .with_context(|| format!("{program} {label} iteration {iteration}"))?
          {
            debug!(%program, label, iteration, ?elapsed, "trial");
            self.trials.record(program, bytes, elapsed);
          } else {
            warn!(%program, label, iteration, "skipped trial");
          }
        }
      }
    }

    self.trials.summarize(&config.programs, &config.catalog)
  }

  fn warm_up(&mut self) -> Result<()> {
    let config = self.config;
    if config.warmup == 0 {
      return Ok(());
    }

    info!("warming up ({} runs per program and size)", config.warmup);

    for &program in &config.programs {
      for (label, _) in config.catalog.iter() {
        for _ in 0..config.warmup {
          self.measure(program, label).with_context(|| format!("{program} {label}"))?;
        }
      }
    }

    Ok(())
  }

  /// Times one blocking invocation. `Ok(None)` is a trial the failure policy
  /// leaves out of the mean.
  fn measure(&mut self, program: Program, label: &str) -> Result<Option<Duration>> {
    let input = self.config.input_path(label);

    let start = Instant::now();
    let result = self.invoker.invoke(program, &input, &self.output, self.config.threads);
    let elapsed = start.elapsed();

    match (result, self.config.on_failure) {
      (Ok(()), _) => Ok(Some(elapsed)),
      (Err(err @ TrialError::Status(_)), FailurePolicy::Ignore) => {
        debug!(%program, label, "{err}, recording anyway");
        Ok(Some(elapsed))
      }
      (Err(err @ TrialError::Timeout(_)), FailurePolicy::Ignore) | (Err(err), FailurePolicy::Skip) => {
        warn!(%program, label, "{:#}", anyhow::Error::from(err));
        Ok(None)
      }
      (Err(err), _) => Err(err.into()),
    }
  }
}
