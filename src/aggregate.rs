use std::collections::BTreeMap;

use crate::{
  classify::{BlockResult, BlockState},
  parse::BenchmarkLog,
  slil::SlilBlock,
  stats::{merge_counts, percent, Counts, Summary},
};

/// Block outcome counters and size statistics. Every field is a sum, minimum
/// or maximum, so [`BlockStats::merge`] does not depend on the order in which
/// blocks are folded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockStats {
  pub blocks: u64,
  pub successful: u64,
  pub enumerated: u64,
  pub optimal_improved: u64,
  pub optimal_not_improved: u64,
  pub timed_out_improved: u64,
  pub timed_out_not_improved: u64,
  pub heuristic_cost: u64,
  pub improvement: u64,
  pub region_spills: u64,
  /// Sizes of all successful blocks.
  pub sizes: Summary,
  pub enumerated_sizes: Summary,
  pub optimal_sizes: Summary,
  pub timed_out_sizes: Summary,
  pub improved_sizes: Summary,
  /// Solution times of optimally scheduled blocks, in milliseconds.
  pub optimal_times: Summary,
}

impl BlockStats {
  pub fn of(block: &BlockResult) -> Self {
    let mut stats = Self {
      blocks: 1,
      ..Self::default()
    };

    if !block.success() {
      return stats;
    }

    let size = Summary::of(block.size);
    let improved = block.improvement > 0;

    stats.successful = 1;
    stats.heuristic_cost = block.heuristic_cost;
    stats.region_spills = block.spills_in_region.unwrap_or(0);
    stats.sizes = size;

    match block.state {
      BlockState::Failed | BlockState::NotEnumerated => {}
      BlockState::EnumeratedOptimal => {
        stats.optimal_sizes = size;
        stats.optimal_times = Summary::of(block.time_taken_ms);
        if improved {
          stats.optimal_improved = 1;
        } else {
          stats.optimal_not_improved = 1;
        }
      }
      BlockState::EnumeratedTimedOut => {
        stats.timed_out_sizes = size;
        if improved {
          stats.timed_out_improved = 1;
        } else {
          stats.timed_out_not_improved = 1;
        }
      }
    }

    if block.is_enumerated() {
      stats.enumerated = 1;
      stats.improvement = block.improvement;
      stats.enumerated_sizes = size;
      if improved {
        stats.improved_sizes = size;
      }
    }

    stats
  }

  pub fn merge(self, other: Self) -> Self {
    Self {
      blocks: self.blocks + other.blocks,
      successful: self.successful + other.successful,
      enumerated: self.enumerated + other.enumerated,
      optimal_improved: self.optimal_improved + other.optimal_improved,
      optimal_not_improved: self.optimal_not_improved + other.optimal_not_improved,
      timed_out_improved: self.timed_out_improved + other.timed_out_improved,
      timed_out_not_improved: self.timed_out_not_improved + other.timed_out_not_improved,
      heuristic_cost: self.heuristic_cost + other.heuristic_cost,
      improvement: self.improvement + other.improvement,
      region_spills: self.region_spills + other.region_spills,
      sizes: self.sizes.merge(other.sizes),
      enumerated_sizes: self.enumerated_sizes.merge(other.enumerated_sizes),
      optimal_sizes: self.optimal_sizes.merge(other.optimal_sizes),
      timed_out_sizes: self.timed_out_sizes.merge(other.timed_out_sizes),
      improved_sizes: self.improved_sizes.merge(other.improved_sizes),
      optimal_times: self.optimal_times.merge(other.optimal_times),
    }
  }

  pub fn fold<'a, I: IntoIterator<Item = &'a BlockResult>>(blocks: I) -> Self {
    blocks.into_iter().map(Self::of).fold(Self::default(), Self::merge)
  }

  pub fn optimal(&self) -> u64 {
    self.optimal_improved + self.optimal_not_improved
  }

  pub fn timed_out(&self) -> u64 {
    self.timed_out_improved + self.timed_out_not_improved
  }

  /// Total cost after branch and bound.
  pub fn bnb_cost(&self) -> u64 {
    self.heuristic_cost.saturating_sub(self.improvement)
  }

  pub fn successful_percent(&self) -> f64 {
    percent(self.successful, self.blocks)
  }

  /// Share of successful blocks that were enumerated.
  pub fn enumerated_percent(&self) -> f64 {
    percent(self.enumerated, self.successful)
  }

  /// Share of enumerated blocks in a bucket.
  pub fn of_enumerated_percent(&self, count: u64) -> f64 {
    percent(count, self.enumerated)
  }

  pub fn improvement_percent(&self) -> f64 {
    percent(self.improvement, self.heuristic_cost)
  }
}

/// Per-function rollup within one benchmark.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FunctionAggregate {
  pub blocks: u64,
  pub spills: u64,
  /// Excess register pressure per register class.
  pub pressure: Counts,
}

impl FunctionAggregate {
  pub fn merge(self, other: Self) -> Self {
    Self {
      blocks: self.blocks + other.blocks,
      spills: self.spills + other.spills,
      pressure: merge_counts(self.pressure, other.pressure),
    }
  }
}

/// Static lower bound statistics of a set of blocks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SlilStats {
  pub gap_sizes: Summary,
  pub gap_percent_sum: f64,
  pub max_gap_percent: f64,
  pub enumerated: u64,
  pub optimal: u64,
  /// Enumerated blocks scheduled at their lower bound.
  pub enumerated_zero_gap: u64,
  pub perp_higher: u64,
  pub perp_higher_optimal: u64,
}

impl SlilStats {
  pub fn of(block: &SlilBlock) -> Self {
    let gap_percent = block.gap_percent();

    Self {
      gap_sizes: Summary::of(block.gap_size),
      gap_percent_sum: gap_percent,
      max_gap_percent: gap_percent,
      enumerated: block.enumerated.into(),
      optimal: block.optimal.into(),
      enumerated_zero_gap: (block.enumerated && block.gap_size == 0).into(),
      perp_higher: block.perp_higher.into(),
      perp_higher_optimal: (block.perp_higher && block.optimal).into(),
    }
  }

  pub fn merge(self, other: Self) -> Self {
    Self {
      gap_sizes: self.gap_sizes.merge(other.gap_sizes),
      gap_percent_sum: self.gap_percent_sum + other.gap_percent_sum,
      max_gap_percent: self.max_gap_percent.max(other.max_gap_percent),
      enumerated: self.enumerated + other.enumerated,
      optimal: self.optimal + other.optimal,
      enumerated_zero_gap: self.enumerated_zero_gap + other.enumerated_zero_gap,
      perp_higher: self.perp_higher + other.perp_higher,
      perp_higher_optimal: self.perp_higher_optimal + other.perp_higher_optimal,
    }
  }

  /// Stats per function.
  pub fn by_function<'a, I: IntoIterator<Item = &'a SlilBlock>>(blocks: I) -> BTreeMap<String, SlilStats> {
    let mut functions: BTreeMap<String, SlilStats> = BTreeMap::new();
    for block in blocks {
      let entry = functions.entry(block.function().to_string()).or_default();
      *entry = std::mem::take(entry).merge(Self::of(block));
    }

    functions
  }

  pub fn blocks(&self) -> u64 {
    self.gap_sizes.count
  }

  pub fn avg_gap_percent(&self) -> f64 {
    if self.blocks() == 0 {
      return 0.0;
    }

    self.gap_percent_sum / self.blocks() as f64
  }
}

/// Rollup of one benchmark's log.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BenchmarkAggregate {
  pub blocks: BlockStats,
  pub functions: BTreeMap<String, FunctionAggregate>,
  /// Lower bound statistics per function.
  pub slil: BTreeMap<String, SlilStats>,
  pub elapsed_secs: Option<u64>,
  /// Regions that could not be classified.
  pub skipped: u64,
}

impl BenchmarkAggregate {
  /// Spill counts come from the allocator's per-function lines when the log
  /// has them, otherwise from the regions' own spill counts.
  pub fn new(log: &BenchmarkLog) -> Self {
    let mut functions: BTreeMap<String, FunctionAggregate> = BTreeMap::new();
    let mut add = |name: &str, function: FunctionAggregate| {
      let entry = functions.entry(name.to_string()).or_default();
      *entry = std::mem::take(entry).merge(function);
    };

    let region_spills = log.function_spills.is_empty();
    for block in &log.blocks {
      let spills = if region_spills && block.success() {
        block.spills_in_region.unwrap_or(0)
      } else {
        0
      };
      add(block.function(), FunctionAggregate { blocks: 1, spills, ..Default::default() });
    }

    for (function, &spills) in &log.function_spills {
      add(function, FunctionAggregate { spills, ..Default::default() });
    }

    for pressure in &log.pressure {
      add(
        pressure.function(),
        FunctionAggregate {
          pressure: pressure.excess.clone(),
          ..Default::default()
        },
      );
    }

    Self {
      blocks: BlockStats::fold(&log.blocks),
      functions,
      slil: SlilStats::by_function(&log.slil),
      elapsed_secs: log.elapsed_secs,
      skipped: log.warnings.len() as u64,
    }
  }

  pub fn spills(&self) -> u64 {
    self.functions.values().map(|f| f.spills).sum()
  }

  pub fn pressure(&self) -> Counts {
    self
      .functions
      .values()
      .map(|f| f.pressure.clone())
      .fold(Counts::new(), merge_counts)
  }

  /// Spill count per function, the input of a cross-run comparison.
  pub fn function_spills(&self) -> BTreeMap<String, u64> {
    self.functions.iter().map(|(name, f)| (name.clone(), f.spills)).collect()
  }
}

/// Rollup of every benchmark of one run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunAggregate {
  pub benchmarks: BTreeMap<String, BenchmarkAggregate>,
}

impl RunAggregate {
  pub fn new<'a, I: IntoIterator<Item = (&'a String, &'a BenchmarkLog)>>(logs: I) -> Self {
    let benchmarks = logs
      .into_iter()
      .map(|(name, log)| (name.clone(), BenchmarkAggregate::new(log)))
      .collect();

    Self { benchmarks }
  }

  pub fn blocks(&self) -> BlockStats {
    self
      .benchmarks
      .values()
      .map(|b| b.blocks.clone())
      .fold(BlockStats::default(), BlockStats::merge)
  }

  pub fn spills(&self) -> u64 {
    self.benchmarks.values().map(BenchmarkAggregate::spills).sum()
  }

  pub fn pressure(&self) -> Counts {
    self
      .benchmarks
      .values()
      .map(BenchmarkAggregate::pressure)
      .fold(Counts::new(), merge_counts)
  }

  pub fn elapsed_secs(&self) -> u64 {
    self.benchmarks.values().filter_map(|b| b.elapsed_secs).sum()
  }

  /// `benchmark → function → spills`.
  pub fn spill_table(&self) -> BTreeMap<String, BTreeMap<String, u64>> {
    self
      .benchmarks
      .iter()
      .map(|(name, bench)| (name.clone(), bench.function_spills()))
      .collect()
  }
}
