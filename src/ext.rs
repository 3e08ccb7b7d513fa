use std::{
  path::Path,
  process::{Child, ExitStatus},
  time::Duration,
};

use anyhow::{Context, Result};
use tempfile::{Builder, NamedTempFile};
use wait_timeout::ChildExt as WaitExt;

use crate::error::TrialError;

#[extend::ext]
pub impl ExitStatus {
  fn check_success(&self) -> Result<(), TrialError> {
    if !self.success() {
      return Err(TrialError::Status(self.to_string()));
    }

    Ok(())
  }
}

#[extend::ext]
pub impl Child {
  /// Blocks until the child exits. With a timeout, a child still running
  /// afterwards is killed and reaped, and `Ok(None)` is returned.
  fn wait_bounded(&mut self, timeout: Option<Duration>) -> std::io::Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
      return self.wait().map(Some);
    };

    if let Some(status) = self.wait_timeout(timeout)? {
      return Ok(Some(status));
    }

    self.kill()?;
    self.wait()?;

    Ok(None)
  }
}

#[extend::ext]
pub impl NamedTempFile {
  /// Temp file next to its final destination so that `persist` is a rename
  /// within one filesystem.
  fn in_dir_with_suffix<P: AsRef<Path>>(dir: P, suffix: &str) -> Result<NamedTempFile> {
    Builder::new().suffix(suffix).tempfile_in(dir).context("tempfile")
  }
}
