use std::{collections::BTreeSet, fmt::Write};

use anyhow::Result;

use crate::{config::label_for, stats::Summary};

const COLUMN_WIDTH: usize = 14;
const COLUMN_PADDING: &str = "  ";

fn format_header<'a, I: IntoIterator<Item = &'a str>>(programs: I) -> String {
  let header = ["size", "bytes"]
    .into_iter()
    .chain(programs)
    .map(|col| format!("{col:<COLUMN_WIDTH$}"))
    .collect::<Vec<_>>()
    .join(COLUMN_PADDING);

  format!("{header}\n{}", "=".repeat(header.len()))
}

fn format_rows(summary: &Summary) -> Result<String> {
  let sizes: BTreeSet<u64> = summary.iter().flat_map(|(_, series)| series.keys().copied()).collect();

  let mut rows = String::new();

  for size in sizes {
    let row = [label_for(size), size.to_string()]
      .into_iter()
      .map(|col| format!("{col:<COLUMN_WIDTH$}"))
      .chain(summary.iter().map(|(_, series)| match series.get(&size) {
        Some(ms) => format!("{ms:>COLUMN_WIDTH$.3}"),
        None => format!("{:>COLUMN_WIDTH$}", "-"),
      }))
      .collect::<Vec<_>>()
      .join(COLUMN_PADDING);

    writeln!(rows, "{row}")?;
  }

  Ok(rows)
}

/// Fixed-width table with one row per input size and one column of average
/// milliseconds per program.
pub fn format(summary: &Summary) -> Result<String> {
  let mut table = String::new();

  writeln!(table, "average latency (msec)")?;
  writeln!(table, "======================")?;
  writeln!(table)?;

  writeln!(table, "{}", format_header(summary.programs().map(|p| p.id())))?;
  write!(table, "{}", format_rows(summary)?)?;

  Ok(table)
}
