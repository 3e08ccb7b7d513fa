use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::stats::Program;

/// Rejected configuration. Raised before any child process is spawned.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
  #[error("iteration count must be at least 1")]
  NoIterations,
  #[error("size catalog is empty")]
  EmptyCatalog,
  #[error("no programs selected")]
  NoPrograms,
  #[error("size {label:?} ({bytes} bytes) does not follow the previous entry")]
  UnorderedSize { label: String, bytes: u64 },
  #[error("duplicate size label {0:?}")]
  DuplicateLabel(String),
  #[error("invalid size label {0:?}")]
  InvalidLabel(String),
  #[error("program {0} has no invocation recipe")]
  MissingRecipe(Program),
  #[error("program {0} is selected more than once")]
  DuplicateProgram(Program),
}

/// A single trial that did not produce a usable measurement.
#[derive(Error, Debug)]
pub enum TrialError {
  #[error("failed to spawn {path:?}")]
  Spawn {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to wait for child")]
  Wait(#[source] std::io::Error),
  #[error("exited with non-zero status {0}")]
  Status(String),
  #[error("timed out after {0:?}")]
  Timeout(Duration),
}

/// Summary table that cannot be drawn.
#[derive(Error, Debug, PartialEq)]
pub enum RenderError {
  #[error("summary table is empty")]
  Empty,
  #[error("program {0} has no measurements")]
  EmptySeries(Program),
  #[error("program {program} has {len} sizes but {reference} has {expected}")]
  LengthMismatch {
    program: Program,
    len: usize,
    reference: Program,
    expected: usize,
  },
  #[error("program {program} has size {size} where {reference} has {expected}")]
  SizeMismatch {
    program: Program,
    size: u64,
    reference: Program,
    expected: u64,
  },
  #[error("program {program} has non-positive latency {latency} at size {size}")]
  NonPositiveLatency { program: Program, size: u64, latency: f64 },

  #[error("program {program} has non-positive size {size}")]
  NonPositiveSize { program: Program, size: u64 },
}
