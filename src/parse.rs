use std::collections::BTreeMap;

use anyhow::{ensure, Result};
use log::{debug, warn};

use crate::{
  classify::{self, function_name, BlockPressure, BlockResult, RegionWarning},
  ext::CapturesExt,
  extract::{Field, PatternTable},
  slil::{self, SlilBlock},
  split::{self, OPTSCHED_DELIMITER},
};

/// How to read a scheduler log: the region delimiter and the field patterns.
#[derive(Clone, Debug)]
pub struct LogFormat {
  delimiter: String,
  pub patterns: PatternTable,
}

impl LogFormat {
  pub fn optsched() -> Result<Self> {
    Ok(Self {
      delimiter: OPTSCHED_DELIMITER.to_string(),
      patterns: PatternTable::optsched()?,
    })
  }

  pub fn with_delimiter(mut self, delimiter: String) -> Result<Self> {
    ensure!(!delimiter.is_empty(), "region delimiter must not be empty");
    self.delimiter = delimiter;

    Ok(self)
  }
}

/// Everything extracted from the log of a single benchmark.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BenchmarkLog {
  /// Classified regions, in log order.
  pub blocks: Vec<BlockResult>,
  /// Register pressure reports, in log order.
  pub pressure: Vec<BlockPressure>,
  /// Spills reported by the register allocator, per function.
  pub function_spills: BTreeMap<String, u64>,
  /// Lower-bound statistics, in log order.
  pub slil: Vec<SlilBlock>,
  /// Compile time reported by the harness.
  pub elapsed_secs: Option<u64>,
  /// Regions left out because they could not be classified.
  pub warnings: Vec<RegionWarning>,
}

impl BenchmarkLog {
  /// Appends another log of the same benchmark. Spill counts and elapsed
  /// times add up.
  pub fn merge(&mut self, other: BenchmarkLog) {
    self.blocks.extend(other.blocks);
    self.pressure.extend(other.pressure);
    for (function, spills) in other.function_spills {
      *self.function_spills.entry(function).or_default() += spills;
    }
    self.slil.extend(other.slil);
    self.elapsed_secs = match (self.elapsed_secs, other.elapsed_secs) {
      (Some(a), Some(b)) => Some(a + b),
      (a, b) => a.or(b),
    };
    self.warnings.extend(other.warnings);
  }
}

/// Parses a whole log. Regions that cannot be classified are logged and kept
/// in [`BenchmarkLog::warnings`]; they never stop the rest of the log from
/// being read.
pub fn parse_log(text: &str, format: &LogFormat) -> BenchmarkLog {
  let table = &format.patterns;
  let mut log = BenchmarkLog::default();

  for region in split::regions(text, &format.delimiter) {
    match classify::classify(&region, table) {
      Ok(Some(block)) => log.blocks.push(block),
      Ok(None) => debug!("skipping region #{} without a DAG", region.index),
      Err(warning) => {
        warn!("{warning}");
        log.warnings.push(warning);
      }
    }

    if let Some(pressure) = classify::pressure(&region, table) {
      log.pressure.push(pressure);
    }
  }

  log.function_spills = allocator_spills(text, table);
  log.slil = slil::slil_blocks(text, table);
  log.elapsed_secs = table.first(Field::Elapsed, text).and_then(|secs| secs.parse().ok());

  log
}

/// Spills reported by the register allocator, per function. Lines naming their
/// function are used when the log has any. Otherwise each count goes to the
/// function of the closest DAG before it.
fn allocator_spills(text: &str, table: &PatternTable) -> BTreeMap<String, u64> {
  let mut spills = BTreeMap::new();

  let named = table.all(Field::FunctionSpills, text);
  if !named.is_empty() {
    for captures in &named {
      if let (Some(function), Some(count)) = (captures.text(1), captures.number(2)) {
        *spills.entry(function.to_string()).or_default() += count;
      }
    }

    return spills;
  }

  let dags: Vec<(usize, &str)> = table
    .all(Field::Region, text)
    .iter()
    .filter_map(|captures| Some((captures.get(0)?.start(), captures.text(1)?)))
    .collect();

  for captures in table.all(Field::AllocatorSpills, text) {
    let (Some(line), Some(count)) = (captures.get(0), captures.number(1)) else {
      continue;
    };

    let dag = dags.iter().rev().find(|&&(start, _)| start < line.start());
    match dag {
      Some(&(_, dag)) => *spills.entry(function_name(dag).to_string()).or_default() += count,
      None => warn!("{count} spills reported before any DAG at byte {}, ignoring them", line.start()),
    }
  }

  spills
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::classify::BlockState;

  const LOG: &str = "\
INFO: Starting the scheduler
INFO: ********** Opt Scheduling **********
INFO: -------------------------------------------------- (Time = 100 ms)
INFO: Processing DAG main:bb.0 with 12 insts and max latency 3. (Time = 100 ms)
INFO: The list schedule is of length 14 and spill cost 0. Tot cost = 55 (Time = 101 ms)
INFO: DAG solved optimally in 19 ms with length=12, spill cost = 0, tot cost = 40, cost imp=15. (Time = 120 ms)
INFO: OPT_SCHED LOCAL RA: DAG Name: main:bb.0 Number of spills: 1 (Time = 120 ms)
INFO: LLVM max pressure after scheduling for BB main:bb.0
INFO: PeakRegPresAfter  Index 0 Name GR32 Peak 9 Limit 7
INFO: ********** Opt Scheduling **********
INFO: Processing DAG main:bb.1 with 4 insts and max latency 1. (Time = 130 ms)
INFO: List scheduling failed
INFO: ********** Opt Scheduling **********
INFO: Processing DAG main:bb.2 with 99999999999999999999999 insts and max latency 1. (Time = 140 ms)
INFO: ********** Opt Scheduling **********
INFO: -------------------------------------------------- (Time = 150 ms)
INFO: Processing DAG helper:bb.0 with 30 insts and max latency 3. (Time = 150 ms)
INFO: The list schedule is of length 31 and spill cost 2. Tot cost = 70 (Time = 151 ms)
INFO: DAG timed out with length=31, spill cost = 2, tot cost = 70, cost imp=0. (Time = 160 ms)
Function: main
END FAST RA: Number of spills: 3
Function: helper
END FAST RA: Number of spills: 0
   42 total seconds elapsed
";

  #[test]
  fn parses_every_region() {
    let log = parse_log(LOG, &LogFormat::optsched().unwrap());

    let states: Vec<_> = log.blocks.iter().map(|b| (b.name.as_str(), b.state)).collect();
    assert_eq!(
      states,
      vec![
        ("main:bb.0", BlockState::EnumeratedOptimal),
        ("main:bb.1", BlockState::Failed),
        ("helper:bb.0", BlockState::EnumeratedTimedOut),
      ]
    );

    assert_eq!(log.warnings, vec![RegionWarning::Malformed { index: 3, missing: Field::Size }]);
    assert_eq!(log.pressure.len(), 1);
    assert_eq!(log.pressure[0].excess["GR32"], 2);
    assert_eq!(
      log.function_spills,
      BTreeMap::from([("helper".to_string(), 0), ("main".to_string(), 3)])
    );
    assert_eq!(log.elapsed_secs, Some(42));
  }

  const GREEDY_LOG: &str = "\
GREEDY RA: Number of spilled live ranges: 5
INFO: ********** Opt Scheduling **********
INFO: Processing DAG main:bb.0 with 3 insts and max latency 1. (Time = 10 ms)
INFO: List scheduling failed
GREEDY RA: Number of spilled live ranges: 7
INFO: ********** Opt Scheduling **********
INFO: Processing DAG helper:bb.0 with 2 insts and max latency 1. (Time = 20 ms)
INFO: List scheduling failed
GREEDY RA: Number of spilled live ranges: 3
INFO: ********** Opt Scheduling **********
INFO: Processing DAG main:bb.1 with 2 insts and max latency 1. (Time = 30 ms)
INFO: List scheduling failed
GREEDY RA: Number of spilled live ranges: 1
";

  #[test]
  fn greedy_spills_go_to_the_preceding_dag() {
    let log = parse_log(GREEDY_LOG, &LogFormat::optsched().unwrap());

    // The first count comes before any DAG and is dropped.
    assert_eq!(
      log.function_spills,
      BTreeMap::from([("helper".to_string(), 3), ("main".to_string(), 8)])
    );
  }

  #[test]
  fn named_spill_lines_take_precedence() {
    let text = format!("{GREEDY_LOG}Function: main\nEND FAST RA: Number of spills: 2\n");
    let log = parse_log(&text, &LogFormat::optsched().unwrap());

    assert_eq!(log.function_spills, BTreeMap::from([("main".to_string(), 2)]));
  }

  #[test]
  fn fast_ra_spills_without_function_line() {
    let text = "INFO: Processing DAG lbm:bb.0 with 3 insts\nEND FAST RA: Number of spills: 4\n";
    let log = parse_log(text, &LogFormat::optsched().unwrap());

    assert_eq!(log.function_spills, BTreeMap::from([("lbm".to_string(), 4)]));
  }

  #[test]
  fn merged_logs_add_up() {
    let format = LogFormat::optsched().unwrap();
    let mut log = parse_log(LOG, &format);
    log.merge(parse_log(LOG, &format));

    assert_eq!(log.blocks.len(), 6);
    assert_eq!(log.pressure.len(), 2);
    assert_eq!(log.function_spills["main"], 6);
    assert_eq!(log.elapsed_secs, Some(84));
    assert_eq!(log.warnings.len(), 2);

    let mut without_time = BenchmarkLog::default();
    without_time.merge(parse_log(LOG, &format));
    assert_eq!(without_time.elapsed_secs, Some(42));
  }

  #[test]
  fn custom_delimiter() {
    let format = LogFormat::optsched().unwrap().with_delimiter("=== region ===".to_string()).unwrap();
    let log = parse_log(
      "=== region ===\nProcessing DAG f:b with 3 insts\nList scheduling failed\n",
      &format,
    );

    assert_eq!(log.blocks.len(), 1);
    assert!(log.elapsed_secs.is_none());
  }

  #[test]
  fn empty_delimiter_is_rejected() {
    assert!(LogFormat::optsched().unwrap().with_delimiter(String::new()).is_err());
  }
}
