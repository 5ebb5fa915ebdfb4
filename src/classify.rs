use std::collections::BTreeMap;

use log::debug;

use crate::{
  ext::CapturesExt,
  extract::{Field, PatternTable},
  split::Region,
};

/// Outcome of scheduling one region, in order of precedence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockState {
  /// List scheduling failed, fell back on a register-pressure mismatch, or the
  /// region's timing is incomplete.
  Failed,
  /// The list schedule was provably optimal or the search had no time budget.
  NotEnumerated,
  EnumeratedTimedOut,
  EnumeratedOptimal,
}

/// The classified outcome of one scheduling region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockResult {
  /// `function:block`.
  pub name: String,
  /// Instruction count.
  pub size: u64,
  pub state: BlockState,
  pub time_taken_ms: u64,
  pub heuristic_cost: u64,
  /// Cost improvement reported by enumeration.
  pub improvement: u64,
  pub spills_in_region: Option<u64>,
}

impl BlockResult {
  pub fn failed(name: String, size: u64) -> Self {
    Self {
      name,
      size,
      state: BlockState::Failed,
      time_taken_ms: 0,
      heuristic_cost: 0,
      improvement: 0,
      spills_in_region: None,
    }
  }

  pub fn success(&self) -> bool {
    self.state != BlockState::Failed
  }

  pub fn is_enumerated(&self) -> bool {
    matches!(self.state, BlockState::EnumeratedTimedOut | BlockState::EnumeratedOptimal)
  }

  pub fn is_optimal(&self) -> bool {
    self.state == BlockState::EnumeratedOptimal
  }

  pub fn function(&self) -> &str {
    function_name(&self.name)
  }
}

/// The function part of a `function:block` region name.
pub fn function_name(name: &str) -> &str {
  name.split_once(':').map_or(name, |(function, _)| function)
}

/// A region that could not be classified. The region is left out of every
/// aggregate.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegionWarning {
  #[error("could not parse region #{index}: no {missing} line")]
  Malformed { index: usize, missing: Field },
  #[error("could not parse region #{index} ({name}): truncated before its {missing} line")]
  Truncated { index: usize, name: String, missing: Field },
}

/// Classifies one region. Returns `Ok(None)` for regions that do not describe
/// a scheduling problem at all (banners and setup text).
pub fn classify(region: &Region<'_>, table: &PatternTable) -> Result<Option<BlockResult>, RegionWarning> {
  let text = region.info_text();
  let fields = table.extract(&text);
  let index = region.index;

  let (name, size) = match (fields.get(Field::Region), fields.number(Field::Size)) {
    (None, None) => return Ok(None),
    (Some(name), Some(size)) => (name.to_string(), size),
    (Some(_), None) => return Err(RegionWarning::Malformed { index, missing: Field::Size }),
    (None, Some(_)) => return Err(RegionWarning::Malformed { index, missing: Field::Region }),
  };

  if fields.has(Field::ListFailed) || fields.has(Field::RpMismatch) {
    return Ok(Some(BlockResult::failed(name, size)));
  }

  let (Some(start), Some(end)) = (fields.number(Field::StartTime), fields.number(Field::EndTime)) else {
    debug!("region #{index} ({name}) has no complete timing, counting it as failed");
    return Ok(Some(BlockResult::failed(name, size)));
  };

  let Some(heuristic_cost) = fields.number(Field::HeuristicCost) else {
    return Err(RegionWarning::Truncated { index, name, missing: Field::HeuristicCost });
  };

  let state = if fields.has(Field::ListOptimal) || fields.has(Field::ZeroTimeLimit) {
    BlockState::NotEnumerated
  } else if fields.has(Field::SolvedOptimally) {
    BlockState::EnumeratedOptimal
  } else {
    BlockState::EnumeratedTimedOut
  };

  // No improvement line means the search found nothing better.
  let improvement = match state {
    BlockState::EnumeratedTimedOut | BlockState::EnumeratedOptimal => fields.number(Field::Improvement).unwrap_or(0),
    _ => 0,
  };

  Ok(Some(BlockResult {
    name,
    size,
    state,
    time_taken_ms: end.saturating_sub(start),
    heuristic_cost,
    improvement,
    spills_in_region: fields.number(Field::RegionSpills),
  }))
}

/// Peak register pressure above the limit, per register class, for one block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockPressure {
  /// `function:block`.
  pub name: String,
  pub excess: BTreeMap<String, u64>,
}

impl BlockPressure {
  pub fn function(&self) -> &str {
    function_name(&self.name)
  }
}

/// Collects the peak pressure lines of a region. Returns `None` if the region
/// has no pressure report.
pub fn pressure(region: &Region<'_>, table: &PatternTable) -> Option<BlockPressure> {
  let text = region.info_text();
  let name = table.first(Field::PressureBlock, &text)?.to_string();

  let mut excess = BTreeMap::new();
  for captures in table.all(Field::PeakPressure, &text) {
    let (Some(class), Some(peak), Some(limit)) = (captures.text(1), captures.number(2), captures.number(3)) else {
      continue;
    };

    *excess.entry(class.to_string()).or_default() += peak.saturating_sub(limit);
  }

  if excess.is_empty() {
    return None;
  }

  Some(BlockPressure { name, excess })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn classify_text(text: &str) -> Result<Option<BlockResult>, RegionWarning> {
    let table = PatternTable::optsched().unwrap();
    classify(&Region { index: 3, text }, &table)
  }

  const HEADER: &str = "INFO: -------------------------------------------------- (Time = 100 ms)\n\
                        INFO: Processing DAG main:bb.4 with 17 insts and max latency 5. (Time = 100 ms)\n\
                        INFO: The list schedule is of length 20 and spill cost 3. Tot cost = 55 (Time = 101 ms)\n";

  #[test]
  fn solved_optimally() {
    let text = format!(
      "{HEADER}INFO: DAG solved optimally in 19 ms with length=18, spill cost = 1, tot cost = 40, cost imp=15. (Time = 120 ms)\n\
       INFO: OPT_SCHED LOCAL RA: DAG Name: main:bb.4 Number of spills: 2 (Time = 120 ms)\n"
    );

    let block = classify_text(&text).unwrap().unwrap();
    assert_eq!(block.name, "main:bb.4");
    assert_eq!(block.function(), "main");
    assert_eq!(block.size, 17);
    assert_eq!(block.state, BlockState::EnumeratedOptimal);
    assert!(block.is_enumerated() && block.is_optimal());
    assert_eq!(block.heuristic_cost, 55);
    assert_eq!(block.improvement, 15);
    assert_eq!(block.time_taken_ms, 20);
    assert_eq!(block.spills_in_region, Some(2));
  }

  #[test]
  fn missing_improvement_line_means_no_improvement() {
    let text = format!("{HEADER}INFO: DAG solved optimally in 19 ms with length=18, tot cost = 40. (Time = 120 ms)\n");

    let block = classify_text(&text).unwrap().unwrap();
    assert_eq!(block.state, BlockState::EnumeratedOptimal);
    assert_eq!(block.improvement, 0);
    assert_eq!(block.spills_in_region, None);
  }

  #[test]
  fn timed_out_without_improvement_line() {
    let text = format!(
      "{HEADER}INFO: Enumeration timedout at length 20.\n\
       INFO: Schedule verified successfully (Time = 600 ms)\n"
    );

    let block = classify_text(&text).unwrap().unwrap();
    assert_eq!(block.state, BlockState::EnumeratedTimedOut);
    assert!(block.is_enumerated() && !block.is_optimal());
    assert_eq!(block.improvement, 0);
    assert_eq!(block.time_taken_ms, 500);
  }

  #[test]
  fn list_schedule_optimal_is_not_enumerated() {
    let text = format!(
      "{HEADER}INFO: The list schedule of length 20 and cost 55 is optimal. (Time = 102 ms)\n\
       INFO: Schedule verified successfully (Time = 103 ms)\n"
    );

    let block = classify_text(&text).unwrap().unwrap();
    assert_eq!(block.state, BlockState::NotEnumerated);
    assert!(!block.is_enumerated() && !block.is_optimal());
    assert_eq!(block.improvement, 0);
    assert_eq!(block.time_taken_ms, 3);
  }

  #[test]
  fn zero_time_limit_is_not_enumerated() {
    let text = format!(
      "{HEADER}INFO: Bypassing optimal scheduling due to zero time limit (Time = 101 ms)\n\
       INFO: Schedule verified successfully (Time = 101 ms)\n"
    );

    let block = classify_text(&text).unwrap().unwrap();
    assert_eq!(block.state, BlockState::NotEnumerated);
  }

  #[test]
  fn list_scheduling_failed() {
    let text = "INFO: Processing DAG main:bb.1 with 8 insts and max latency 2.\nINFO: List scheduling failed\n";

    let block = classify_text(text).unwrap().unwrap();
    assert_eq!(block, BlockResult::failed("main:bb.1".to_string(), 8));
    assert!(!block.success());
    assert!(!block.is_enumerated() && !block.is_optimal());
    assert_eq!(block.time_taken_ms, 0);
    assert_eq!(block.improvement, 0);
  }

  #[test]
  fn rp_mismatch_overrides_other_markers() {
    let text = format!("{HEADER}INFO: DAG solved optimally in 1 ms with tot cost = 40, cost imp=15. (Time = 120 ms)\nINFO: RP-mismatch falling back!\n");

    let block = classify_text(&text).unwrap().unwrap();
    assert_eq!(block.state, BlockState::Failed);
    assert_eq!(block.improvement, 0);
  }

  #[test]
  fn missing_timestamp_counts_as_failed() {
    let text = "INFO: Processing DAG main:bb.2 with 8 insts\n\
                INFO: The list schedule is of length 20 and spill cost 3. Tot cost = 55\n";

    let block = classify_text(text).unwrap().unwrap();
    assert_eq!(block.state, BlockState::Failed);
  }

  #[test]
  fn banner_is_skipped() {
    assert_eq!(classify_text("INFO: Starting up\n").unwrap(), None);
  }

  #[test]
  fn name_without_size_is_malformed() {
    let err = classify_text("Processing DAG main:bb.2 with 99999999999999999999999 insts\n").unwrap_err();

    assert_eq!(err, RegionWarning::Malformed { index: 3, missing: Field::Size });
  }

  #[test]
  fn missing_heuristic_cost_is_truncated() {
    let text = "INFO: -------------------------------------------------- (Time = 100 ms)\n\
                INFO: Processing DAG main:bb.4 with 17 insts (Time = 100 ms)\n\
                INFO: Schedule verified successfully (Time = 103 ms)\n";

    let err = classify_text(text).unwrap_err();
    assert!(matches!(err, RegionWarning::Truncated { index: 3, missing: Field::HeuristicCost, .. }));
    assert!(err.to_string().contains("main:bb.4"));
  }

  #[test]
  fn optimal_implies_enumerated_in_every_state() {
    let texts = [
      "Processing DAG f:b with 1 insts\nList scheduling failed".to_string(),
      format!("{HEADER}INFO: The list schedule of length 20 and cost 55 is optimal. (Time = 102 ms)\n"),
      format!("{HEADER}INFO: DAG timed out with length=3, tot cost = 50, cost imp=5. (Time = 900 ms)\n"),
      format!("{HEADER}INFO: DAG solved optimally in 1 ms with tot cost = 40. (Time = 120 ms)\n"),
    ];

    let states: Vec<_> = texts
      .iter()
      .map(|text| {
        let block = classify_text(text).unwrap().unwrap();
        assert!(!block.is_optimal() || block.is_enumerated());
        block.state
      })
      .collect();

    assert_eq!(
      states,
      vec![
        BlockState::Failed,
        BlockState::NotEnumerated,
        BlockState::EnumeratedTimedOut,
        BlockState::EnumeratedOptimal
      ]
    );
  }

  #[test]
  fn pressure_excess_is_clamped_at_zero() {
    let table = PatternTable::optsched().unwrap();
    let text = "INFO: LLVM max pressure after scheduling for BB main:bb.4\n\
                INFO: PeakRegPresAfter  Index 0 Name GR32 Peak 9 Limit 7\n\
                INFO: PeakRegPresAfter  Index 1 Name FR32 Peak 3 Limit 16\n";

    let pressure = pressure(&Region { index: 1, text }, &table).unwrap();
    assert_eq!(pressure.function(), "main");
    assert_eq!(pressure.excess, BTreeMap::from([("FR32".to_string(), 0), ("GR32".to_string(), 2)]));
  }

  #[test]
  fn no_pressure_report() {
    let table = PatternTable::optsched().unwrap();

    assert_eq!(pressure(&Region { index: 1, text: "Processing DAG f:b with 1 insts" }, &table), None);
  }
}
