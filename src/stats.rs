use std::{collections::BTreeMap, fmt, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::SizeCatalog;

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// Published measurements: 10 executions of each program, 1K to 2G.
const REFERENCE_SUMMARY: &str = include_str!("../data/reference_summary.json");

/// One of the encryption executables under comparison. The variant order is
/// the order series appear in tables and chart legends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum Program {
  /// Plain C implementation.
  #[serde(rename = "bench_cpu")]
  #[value(name = "bench_cpu")]
  Cpu,
  /// OpenCL implementation, offloaded to the GPU.
  #[serde(rename = "bench_cl")]
  #[value(name = "bench_cl")]
  OpenCl,
  /// AES-NI instructions.
  #[serde(rename = "bench_ni")]
  #[value(name = "bench_ni")]
  AesNi,
}

impl Program {
  pub const ALL: [Program; 3] = [Program::Cpu, Program::OpenCl, Program::AesNi];

  /// Executable name, also the key used in the serialized summary.
  pub fn id(self) -> &'static str {
    match self {
      Program::Cpu => "bench_cpu",
      Program::OpenCl => "bench_cl",
      Program::AesNi => "bench_ni",
    }
  }
}

impl fmt::Display for Program {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.id())
  }
}

/// Raw per-trial latencies, keyed by program and input size in bytes.
#[derive(Default, Debug)]
pub struct Trials {
  raw_ns: BTreeMap<Program, BTreeMap<u64, Vec<u128>>>,
}

impl Trials {
  pub fn record(&mut self, program: Program, size: u64, elapsed: Duration) {
    self
      .raw_ns
      .entry(program)
      .or_default()
      .entry(size)
      .or_default()
      .push(elapsed.as_nanos());
  }

  pub fn samples(&self, program: Program, size: u64) -> &[u128] {
    self
      .raw_ns
      .get(&program)
      .and_then(|sizes| sizes.get(&size))
      .map(Vec::as_slice)
      .unwrap_or_default()
  }

  /// Reduces the raw records to a summary covering exactly `programs` ×
  /// `catalog`. Fails if any cell has no samples.
  pub fn summarize(self, programs: &[Program], catalog: &SizeCatalog) -> Result<Summary> {
    let mut table = BTreeMap::new();

    for &program in programs {
      let mut series = BTreeMap::new();

      for (label, bytes) in catalog.iter() {
        let mean = mean_ms(self.samples(program, bytes))
          .with_context(|| format!("no samples for {program} at {label} ({bytes} bytes)"))?;

        series.insert(bytes, mean);
      }

      table.insert(program, series);
    }

    Ok(Summary(table))
  }
}

/// Arithmetic mean of nanosecond samples, in milliseconds. The sum is taken
/// over integers so the result does not depend on sample order.
pub fn mean_ms(samples_ns: &[u128]) -> Option<f64> {
  if samples_ns.is_empty() {
    return None;
  }

  let total: u128 = samples_ns.iter().sum();
  let mean_ns = total as f64 / samples_ns.len() as f64;

  Some(mean_ns / NANOS_PER_MILLI)
}

/// Average latency in milliseconds per program and input size. This is the
/// only value passed from a benchmark run to the chart renderer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Summary(BTreeMap<Program, BTreeMap<u64, f64>>);

impl Summary {
  pub fn programs(&self) -> impl Iterator<Item = Program> + '_ {
    self.0.keys().copied()
  }

  pub fn series(&self, program: Program) -> Option<&BTreeMap<u64, f64>> {
    self.0.get(&program)
  }

  pub fn iter(&self) -> impl Iterator<Item = (Program, &BTreeMap<u64, f64>)> {
    self.0.iter().map(|(program, series)| (*program, series))
  }

  pub fn to_json(&self) -> Result<String> {
    serde_json::to_string_pretty(self).context("serialize summary")
  }

  pub fn from_json(json: &str) -> Result<Self> {
    serde_json::from_str(json).context("parse summary")
  }

  /// The summary shipped with the binary.
  pub fn reference() -> Result<Self> {
    Self::from_json(REFERENCE_SUMMARY).context("reference summary")
  }
}

impl From<BTreeMap<Program, BTreeMap<u64, f64>>> for Summary {
  fn from(table: BTreeMap<Program, BTreeMap<u64, f64>>) -> Self {
    Self(table)
  }
}
