use std::{
  fs,
  io::{BufWriter, Write},
  path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::{
  config::{input_path, SizeCatalog},
  ext::NamedTempFileExt,
};

const CHUNK_SIZE: usize = 1 << 16;

/// Makes sure `<input_dir>/<label>.bin` exists with exactly the catalog size
/// for every entry. Returns the files that had to be (re)written.
pub fn generate<P: AsRef<Path>>(catalog: &SizeCatalog, input_dir: P) -> Result<Vec<PathBuf>> {
  let input_dir = input_dir.as_ref();
  fs::create_dir_all(input_dir).with_context(|| format!("create_dir_all {input_dir:?}"))?;

  let mut written = Vec::new();

  for (label, bytes) in catalog.iter() {
    let path = input_path(input_dir, label);

    if fs::metadata(&path).is_ok_and(|meta| meta.is_file() && meta.len() == bytes) {
      debug!("{path:?} already has {bytes} bytes");
      continue;
    }

    info!("writing {path:?} ({bytes} bytes)");
    write_random(input_dir, &path, bytes).with_context(|| format!("write {path:?}"))?;
    written.push(path);
  }

  Ok(written)
}

/// Fills a temp file with `bytes` pseudo-random bytes, then moves it to `path`.
fn write_random(dir: &Path, path: &Path, bytes: u64) -> Result<()> {
  let file = NamedTempFile::in_dir_with_suffix(dir, ".part")?;
  let mut rng = StdRng::seed_from_u64(bytes);
  let mut chunk = vec![0; CHUNK_SIZE];

  {
    let mut writer = BufWriter::new(file.as_file());
    let mut remaining = bytes;

    while remaining > 0 {
      let len = remaining.min(CHUNK_SIZE as u64) as usize;
      rng.fill_bytes(&mut chunk[..len]);
      writer.write_all(&chunk[..len]).context("write")?;
      remaining -= len as u64;
    }

    writer.flush().context("flush")?;
  }

  file.persist(path).context("persist")?;

  Ok(())
}
