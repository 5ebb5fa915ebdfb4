use std::collections::{BTreeMap, BTreeSet};

use log::warn;

use crate::stats::percent;

/// `benchmark → function → spills` for one run.
pub type SpillTable = BTreeMap<String, BTreeMap<String, u64>>;

/// A benchmark or function that is not reported the same way by every run.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum KeySetMismatch {
  #[error("benchmark {benchmark} does not exist in run {run}")]
  MissingBenchmark { benchmark: String, run: String },
  #[error("function {function} of benchmark {benchmark} does not exist in run {run}")]
  MissingFunction { benchmark: String, function: String, run: String },
  #[error("benchmark {benchmark} has {found} functions in run {run} but {expected} in run {reference}")]
  FunctionCount {
    benchmark: String,
    run: String,
    found: usize,
    reference: String,
    expected: usize,
  },
}

/// The best spill count of one function across runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SomEntry {
  pub benchmark: String,
  pub function: String,
  pub min_spills: u64,
  /// Every run reaching `min_spills`.
  pub winners: BTreeSet<String>,
  /// Number of runs reporting the function.
  pub reported_by: usize,
}

impl SomEntry {
  /// False when every run reports zero spills for the function.
  pub fn is_nontrivial(&self) -> bool {
    self.min_spills > 0 || self.winners.len() < self.reported_by
  }

  pub fn won_by_all(&self) -> bool {
    self.winners.len() == self.reported_by
  }
}

/// A function where a run spilled more than the best run did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Excess {
  pub benchmark: String,
  pub function: String,
  /// Spills above `min_spills`.
  pub excess: u64,
  pub min_spills: u64,
}

impl Excess {
  /// `excess` relative to `min_spills`. `None` when the best run did not
  /// spill at all.
  pub fn percent(&self) -> Option<f64> {
    (self.min_spills > 0).then(|| percent(self.excess, self.min_spills))
  }
}

/// How one run fares against the per-function minima.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunComparison {
  pub name: String,
  pub total_spills: u64,
  /// Functions where the run reaches the minimum.
  pub wins: u64,
  /// Wins among functions with spills.
  pub nontrivial_wins: u64,
  /// The function with the largest excess.
  pub worst: Option<Excess>,
}

impl RunComparison {
  /// Spills above the sum of minimums.
  pub fn extra_spills(&self, som: u64) -> u64 {
    self.total_spills.saturating_sub(som)
  }

  pub fn extra_spills_percent(&self, som: u64) -> f64 {
    percent(self.extra_spills(som), som)
  }

  fn record(&mut self, entry: &SomEntry, spills: u64) {
    self.total_spills += spills;

    if spills == entry.min_spills {
      self.wins += 1;
      if entry.is_nontrivial() {
        self.nontrivial_wins += 1;
      }
      return;
    }

    let excess = spills - entry.min_spills;
    if self.worst.as_ref().map_or(true, |worst| excess > worst.excess) {
      self.worst = Some(Excess {
        benchmark: entry.benchmark.clone(),
        function: entry.function.clone(),
        excess,
        min_spills: entry.min_spills,
      });
    }
  }
}

/// The result of comparing several runs function by function.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Comparison {
  /// One entry per function, ordered by benchmark then function.
  pub entries: Vec<SomEntry>,
  /// Sum of minimums per benchmark.
  pub benchmark_som: BTreeMap<String, u64>,
  /// Sum of minimums over every function.
  pub som: u64,
  pub functions: u64,
  /// Functions where at least one run spills.
  pub functions_with_spills: u64,
  /// Runs ranked by ascending total spills.
  pub runs: Vec<RunComparison>,
  pub mismatches: Vec<KeySetMismatch>,
}

impl Comparison {
  /// Share of the functions with spills where `run` reaches the minimum.
  pub fn at_min_percent(&self, run: &RunComparison) -> f64 {
    percent(run.nontrivial_wins, self.functions_with_spills)
  }

  pub fn benchmark_entries<'a>(&'a self, benchmark: &'a str) -> impl Iterator<Item = &'a SomEntry> {
    self.entries.iter().filter(move |entry| entry.benchmark == benchmark)
  }
}

/// Compares the spill tables of several runs. Keys missing from some runs are
/// reported in [`Comparison::mismatches`] and compared among the runs that do
/// have them.
pub fn compare(runs: &BTreeMap<String, SpillTable>) -> Comparison {
  let mut comparison = Comparison::default();
  let mut results: BTreeMap<&str, RunComparison> = runs
    .keys()
    .map(|name| (name.as_str(), RunComparison { name: name.clone(), ..Default::default() }))
    .collect();

  let benchmarks: BTreeSet<&String> = runs.values().flat_map(|table| table.keys()).collect();
  for benchmark in benchmarks {
    let present = check_benchmark(runs, benchmark, &mut comparison.mismatches);

    let functions: BTreeSet<&String> = present.iter().flat_map(|(_, functions)| functions.keys()).collect();
    let mut benchmark_som = 0;
    for function in functions {
      let spills: Vec<(&str, u64)> = present
        .iter()
        .filter_map(|(run, functions)| match functions.get(function) {
          Some(&spills) => Some((*run, spills)),
          None => {
            comparison.mismatches.push(KeySetMismatch::MissingFunction {
              benchmark: benchmark.clone(),
              function: function.clone(),
              run: run.to_string(),
            });
            None
          }
        })
        .collect();

      let Some(min_spills) = spills.iter().map(|&(_, spills)| spills).min() else {
        continue;
      };

      let entry = SomEntry {
        benchmark: benchmark.clone(),
        function: function.clone(),
        min_spills,
        winners: spills
          .iter()
          .filter(|&&(_, spills)| spills == min_spills)
          .map(|&(run, _)| run.to_string())
          .collect(),
        reported_by: spills.len(),
      };

      for &(run, spills) in &spills {
        if let Some(result) = results.get_mut(run) {
          result.record(&entry, spills);
        }
      }

      benchmark_som += min_spills;
      comparison.functions += 1;
      if entry.is_nontrivial() {
        comparison.functions_with_spills += 1;
      }
      comparison.entries.push(entry);
    }

    comparison.benchmark_som.insert(benchmark.clone(), benchmark_som);
    comparison.som += benchmark_som;
  }

  for mismatch in &comparison.mismatches {
    warn!("{mismatch}");
  }

  comparison.runs = results.into_values().collect();
  comparison
    .runs
    .sort_by(|a, b| a.total_spills.cmp(&b.total_spills).then_with(|| a.name.cmp(&b.name)));

  comparison
}

/// The runs reporting `benchmark`. Runs without it, or with a different
/// number of functions than the first run that has it, are reported.
fn check_benchmark<'a>(
  runs: &'a BTreeMap<String, SpillTable>,
  benchmark: &str,
  mismatches: &mut Vec<KeySetMismatch>,
) -> Vec<(&'a str, &'a BTreeMap<String, u64>)> {
  let mut present: Vec<(&str, &BTreeMap<String, u64>)> = Vec::new();

  for (run, table) in runs {
    let Some(functions) = table.get(benchmark) else {
      mismatches.push(KeySetMismatch::MissingBenchmark {
        benchmark: benchmark.to_string(),
        run: run.clone(),
      });
      continue;
    };

    if let Some(&(reference, expected)) = present.first() {
      if functions.len() != expected.len() {
        mismatches.push(KeySetMismatch::FunctionCount {
          benchmark: benchmark.to_string(),
          run: run.clone(),
          found: functions.len(),
          reference: reference.to_string(),
          expected: expected.len(),
        });
      }
    }

    present.push((run.as_str(), functions));
  }

  present
}
