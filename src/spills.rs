use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{bail, Context, Result};

use crate::som::SpillTable;

/// Name of the spill report inside a run directory.
pub const SPILLS_FILENAME: &str = "spills.dat";

/// Parses a spill report as written by [`crate::format::format_spills`].
pub fn parse_spills(text: &str) -> Result<SpillTable> {
  let mut table = SpillTable::new();
  let mut benchmark: Option<String> = None;

  for (lineno, line) in text.lines().enumerate() {
    let line = line.trim();

    if line.is_empty() || line.starts_with("Sum:") || line.starts_with("Total:") {
      continue;
    }

    // `---------` closes a benchmark, `------------` the whole file.
    if line.chars().all(|c| c == '-') {
      benchmark = None;
      continue;
    }

    if let Some(name) = &benchmark {
      if let Some((spills, function)) = function_line(line) {
        table.entry(name.clone()).or_default().insert(function.to_string(), spills);
        continue;
      }
    }

    if let Some(name) = line.strip_suffix(':') {
      table.entry(name.to_string()).or_default();
      benchmark = Some(name.to_string());
      continue;
    }

    bail!("line {}: unexpected {line:?}", lineno + 1);
  }

  Ok(table)
}

fn function_line(line: &str) -> Option<(u64, &str)> {
  let (spills, function) = line.split_once(char::is_whitespace)?;
  let function = function.trim();
  if function.is_empty() {
    return None;
  }

  Some((spills.parse().ok()?, function))
}

pub fn read_spills<P: AsRef<Path>>(path: P) -> Result<SpillTable> {
  let path = path.as_ref();
  let text = fs::read_to_string(path).with_context(|| format!("read {path:?}"))?;

  parse_spills(&text).with_context(|| format!("parse {path:?}"))
}

/// Reads the spill report of every run directory, keyed by directory name.
/// Directories that cannot be read are returned separately so the comparison
/// can go on without them.
pub fn read_runs<P: AsRef<Path>>(dirs: &[P]) -> (BTreeMap<String, SpillTable>, Vec<anyhow::Error>) {
  let mut runs = BTreeMap::new();
  let mut errors = Vec::new();

  for dir in dirs {
    let dir = dir.as_ref();
    let name = match dir.file_name() {
      Some(name) => name.to_string_lossy().into_owned(),
      None => dir.to_string_lossy().into_owned(),
    };

    match read_spills(dir.join(SPILLS_FILENAME)) {
      Ok(table) => {
        runs.insert(name, table);
      }
      Err(err) => errors.push(err.context(format!("run {name}"))),
    }
  }

  (runs, errors)
}
