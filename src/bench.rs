use std::{
  collections::{btree_map::Entry, BTreeMap},
  fs,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::{
  aggregate::RunAggregate,
  parse::{self, BenchmarkLog, LogFormat},
};

/// The logs of one run, one per benchmark.
pub struct Bench {
  format: LogFormat,
  /// Parsed logs, keyed by benchmark name.
  pub logs: BTreeMap<String, BenchmarkLog>,
}

impl Bench {
  pub fn new(format: LogFormat) -> Self {
    Self {
      format,
      logs: BTreeMap::new(),
    }
  }

  /// Parses every log. A log that cannot be read is reported and left out of
  /// the run. Logs of the same benchmark are merged.
  pub fn bench_all(&mut self, logs: &[PathBuf]) -> usize {
    let mut failed = 0;
    for log in logs {
      if let Err(err) = self.bench_log(log) {
        warn!("{err:#}");
        failed += 1;
      }
    }

    failed
  }

  pub fn bench_log<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
    let path = path.as_ref();
    let name = benchmark_name(path).with_context(|| format!("benchmark name of {path:?}"))?;
    info!("parsing {name} from {path:?}");

    let text = fs::read_to_string(path).with_context(|| format!("read {path:?}"))?;
    let log = parse::parse_log(&text, &self.format);
    info!(
      "  {} blocks, {} unparsed regions, {} functions with spill counts",
      log.blocks.len(),
      log.warnings.len(),
      log.function_spills.len()
    );

    match self.logs.entry(name) {
      Entry::Occupied(mut entry) => {
        warn!("{} is named by more than one log, merging {path:?} into it", entry.key());
        entry.get_mut().merge(log);
      }
      Entry::Vacant(entry) => {
        entry.insert(log);
      }
    }

    Ok(())
  }

  pub fn aggregate(&self) -> RunAggregate {
    RunAggregate::new(&self.logs)
  }
}

/// `CPU2006.001.log` is benchmark `CPU2006`.
fn benchmark_name(path: &Path) -> Option<String> {
  let file_name = path.file_name()?.to_string_lossy();
  let name = file_name.split('.').next().unwrap_or_default();

  (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::TempDir;

  use super::*;

  const LOG: &str = "\
INFO: ********** Opt Scheduling **********
INFO: Processing DAG main:bb.1 with 4 insts and max latency 1.
INFO: List scheduling failed
   7 total seconds elapsed
";

  #[test]
  fn names_benchmarks_by_file_stem() {
    assert_eq!(benchmark_name(Path::new("logs/mcf.1.log")).as_deref(), Some("mcf"));
    assert_eq!(benchmark_name(Path::new(".hidden")), None);
  }

  #[test]
  fn logs_of_one_benchmark_are_merged() {
    let dir = TempDir::new().unwrap();
    let logs = [dir.path().join("mcf.1.log"), dir.path().join("mcf.2.log")];
    for log in &logs {
      fs::write(log, LOG).unwrap();
    }

    let mut bench = Bench::new(LogFormat::optsched().unwrap());
    assert_eq!(bench.bench_all(&logs), 0);
    assert_eq!(bench.logs.len(), 1);

    let run = bench.aggregate();
    assert_eq!(run.blocks().blocks, 2);
    assert_eq!(run.elapsed_secs(), 14);
  }

  #[test]
  fn unreadable_logs_do_not_stop_the_run() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("mcf.log");
    fs::write(&good, LOG).unwrap();

    let mut bench = Bench::new(LogFormat::optsched().unwrap());
    let failed = bench.bench_all(&[dir.path().join("gcc.log"), good]);

    assert_eq!(failed, 1);
    assert_eq!(bench.logs.keys().collect::<Vec<_>>(), vec!["mcf"]);

    let run = bench.aggregate();
    assert_eq!(run.blocks().blocks, 1);
    assert_eq!(run.blocks().successful, 0);
    assert_eq!(run.elapsed_secs(), 7);
  }
}
