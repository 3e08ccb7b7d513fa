use std::{
  collections::BTreeMap,
  num::NonZeroUsize,
  ops::RangeInclusive,
  path::{Path, PathBuf},
  time::Duration,
};

use crate::{error::ConfigError, stats::Program};

pub const DEFAULT_ITERATIONS: usize = 10;
pub const DEFAULT_THREADS: NonZeroUsize = match NonZeroUsize::new(4) {
  Some(threads) => threads,
  None => unreachable!(),
};
pub const REFERENCE_EXPONENTS: RangeInclusive<u32> = 10..=31;

const UNITS: [(char, u32); 3] = [('G', 30), ('M', 20), ('K', 10)];

/// Ordered `label -> bytes` sweep. Byte counts are strictly increasing and
/// labels are unique; iteration yields entries in insertion order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SizeCatalog {
  entries: Vec<(String, u64)>,
}

impl SizeCatalog {
  pub fn new<I: IntoIterator<Item = (String, u64)>>(entries: I) -> Result<Self, ConfigError> {
    let entries: Vec<_> = entries.into_iter().collect();

    if entries.is_empty() {
      return Err(ConfigError::EmptyCatalog);
    }

    let mut previous = 0;
    for (i, (label, bytes)) in entries.iter().enumerate() {
      if *bytes <= previous {
        return Err(ConfigError::UnorderedSize {
          label: label.clone(),
          bytes: *bytes,
        });
      }
      if entries[..i].iter().any(|(other, _)| other == label) {
        return Err(ConfigError::DuplicateLabel(label.clone()));
      }

      previous = *bytes;
    }

    Ok(Self { entries })
  }

  /// The 22 sizes from 1K to 2G.
  pub fn reference() -> Self {
    Self {
      entries: REFERENCE_EXPONENTS
        .map(|exp| {
          let bytes = 1_u64 << exp;
          (label_for(bytes), bytes)
        })
        .collect(),
    }
  }

  /// Builds a catalog from labels such as `1K`, `512M` or `2G`.
  pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self, ConfigError> {
    let entries = labels
      .iter()
      .map(|label| {
        let label = label.as_ref().trim();
        Ok((label.to_string(), parse_label(label)?))
      })
      .collect::<Result<Vec<_>, ConfigError>>()?;

    Self::new(entries)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
    self.entries.iter().map(|(label, bytes)| (label.as_str(), *bytes))
  }
}

/// Parses `<n>[K|M|G]` into a byte count with binary multipliers.
pub fn parse_label(label: &str) -> Result<u64, ConfigError> {
  let invalid = || ConfigError::InvalidLabel(label.to_string());

  let (digits, shift) = match label.chars().last() {
    Some(unit) if unit.is_ascii_alphabetic() => {
      let (_, shift) = UNITS
        .iter()
        .find(|(u, _)| *u == unit.to_ascii_uppercase())
        .ok_or_else(invalid)?;
      (&label[..label.len() - 1], *shift)
    }
    _ => (label, 0),
  };

  if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
    return Err(invalid());
  }

  let count: u64 = digits.parse().map_err(|_| invalid())?;

  count.checked_mul(1 << shift).filter(|bytes| *bytes > 0).ok_or_else(invalid)
}

/// Shortest label for `bytes` using the largest unit that divides it evenly.
pub fn label_for(bytes: u64) -> String {
  for (unit, shift) in UNITS {
    if bytes >= 1 << shift && bytes % (1 << shift) == 0 {
      return format!("{}{unit}", bytes >> shift);
    }
  }

  bytes.to_string()
}

/// What the runner does with a trial that did not exit successfully.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FailurePolicy {
  /// Record the duration whatever the exit status. Spawn failures are fatal.
  #[default]
  Ignore,
  /// Leave the trial out of the mean and log it.
  Skip,
  /// Stop the whole run.
  Abort,
}

/// How to invoke one program: `executable <input> <output> <threads>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipe {
  pub executable: PathBuf,
}

impl Recipe {
  pub fn new<P: Into<PathBuf>>(executable: P) -> Self {
    Self {
      executable: executable.into(),
    }
  }
}

/// Everything a benchmark run needs, fixed before the first invocation.
#[derive(Clone, Debug)]
pub struct BenchConfig {
  pub catalog: SizeCatalog,
  pub programs: Vec<Program>,
  pub recipes: BTreeMap<Program, Recipe>,
  pub iterations: usize,
  pub threads: NonZeroUsize,
  pub input_dir: PathBuf,
  /// Where children write ciphertext. `None` uses a scratch directory.
  pub output_file: Option<PathBuf>,
  pub warmup: usize,
  pub timeout: Option<Duration>,
  pub on_failure: FailurePolicy,
}

impl BenchConfig {
  /// Reference sweep with every program found as `<bin_dir>/<program id>`.
  pub fn reference<P: AsRef<Path>>(bin_dir: P) -> Self {
    let bin_dir = bin_dir.as_ref();

    Self {
      catalog: SizeCatalog::reference(),
      programs: Program::ALL.to_vec(),
      recipes: Program::ALL
        .iter()
        .map(|program| (*program, Recipe::new(bin_dir.join(program.id()))))
        .collect(),
      iterations: DEFAULT_ITERATIONS,
      threads: DEFAULT_THREADS,
      input_dir: PathBuf::from("input"),
      output_file: None,
      warmup: 0,
      timeout: None,
      on_failure: FailurePolicy::default(),
    }
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.iterations == 0 {
      return Err(ConfigError::NoIterations);
    }
    if self.programs.is_empty() {
      return Err(ConfigError::NoPrograms);
    }

    for (i, program) in self.programs.iter().enumerate() {
      if self.programs[..i].contains(program) {
        return Err(ConfigError::DuplicateProgram(*program));
      }
      if !self.recipes.contains_key(program) {
        return Err(ConfigError::MissingRecipe(*program));
      }
    }

    Ok(())
  }

  pub fn input_path(&self, label: &str) -> PathBuf {
    input_path(&self.input_dir, label)
  }
}

/// Input artifact for a size label: `<input_dir>/<label>.bin`.
pub fn input_path<P: AsRef<Path>>(input_dir: P, label: &str) -> PathBuf {
  input_dir.as_ref().join(format!("{label}.bin"))
}
