use std::{
  collections::BTreeMap,
  num::NonZeroUsize,
  path::Path,
  process::{Command, Stdio},
  time::Duration,
};

use crate::{
  config::Recipe,
  error::TrialError,
  ext::{ChildExt, ExitStatusExt},
  stats::Program,
};

/// Something that can encrypt `input` into `output` using up to `threads`
/// worker threads, blocking until it is done.
///
/// `Err(TrialError::Status(_))` means the program ran to completion but
/// reported failure. Every other error means it did not run to completion.
pub trait Invoker {
  fn invoke(&mut self, program: Program, input: &Path, output: &Path, threads: NonZeroUsize) -> Result<(), TrialError>;
}

/// Runs the real executables as child processes.
pub struct ProcessInvoker {
  recipes: BTreeMap<Program, Recipe>,
  timeout: Option<Duration>,
}

impl ProcessInvoker {
  pub fn new(recipes: BTreeMap<Program, Recipe>, timeout: Option<Duration>) -> Self {
    Self { recipes, timeout }
  }

  fn command(
    &self,
    program: Program,
    input: &Path,
    output: &Path,
    threads: NonZeroUsize,
  ) -> Result<Command, TrialError> {
    let recipe = self.recipes.get(&program).ok_or_else(|| TrialError::Spawn {
      path: program.id().into(),
      source: std::io::Error::new(std::io::ErrorKind::NotFound, "no recipe"),
    })?;

    let mut command = Command::new(&recipe.executable);
    command
      .arg(input)
      .arg(output)
      .arg(threads.to_string())
      .stdin(Stdio::null())
      .stdout(Stdio::null());

    Ok(command)
  }
}

impl Invoker for ProcessInvoker {
  fn invoke(&mut self, program: Program, input: &Path, output: &Path, threads: NonZeroUsize) -> Result<(), TrialError> {
    let mut command = self.command(program, input, output, threads)?;

    let mut child = command.spawn().map_err(|source| TrialError::Spawn {
      path: command.get_program().into(),
      source,
    })?;

    match child.wait_bounded(self.timeout).map_err(TrialError::Wait)? {
      Some(status) => status.check_success(),
      None => Err(TrialError::Timeout(self.timeout.unwrap_or_default())),
    }
  }
}
