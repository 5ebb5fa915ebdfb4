use std::{collections::BTreeMap, fmt, str::FromStr};

use anyhow::{Context, Result};
use regex::{Captures, Regex};

/// A logical field of the scheduler's log output. A field may be described by
/// several pattern variants, one per log format version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
  Region,
  Size,
  ListFailed,
  RpMismatch,
  ListOptimal,
  ZeroTimeLimit,
  SolvedOptimally,
  HeuristicCost,
  BestCost,
  Improvement,
  StartTime,
  EndTime,
  RegionSpills,
  PressureBlock,
  PeakPressure,
  FunctionSpills,
  AllocatorSpills,
  Elapsed,
  BestSchedule,
  Slil,
}

impl Field {
  pub const ALL: [Field; 20] = [
    Field::Region,
    Field::Size,
    Field::ListFailed,
    Field::RpMismatch,
    Field::ListOptimal,
    Field::ZeroTimeLimit,
    Field::SolvedOptimally,
    Field::HeuristicCost,
    Field::BestCost,
    Field::Improvement,
    Field::StartTime,
    Field::EndTime,
    Field::RegionSpills,
    Field::PressureBlock,
    Field::PeakPressure,
    Field::FunctionSpills,
    Field::AllocatorSpills,
    Field::Elapsed,
    Field::BestSchedule,
    Field::Slil,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Field::Region => "region",
      Field::Size => "size",
      Field::ListFailed => "list-failed",
      Field::RpMismatch => "rp-mismatch",
      Field::ListOptimal => "list-optimal",
      Field::ZeroTimeLimit => "zero-time-limit",
      Field::SolvedOptimally => "solved-optimally",
      Field::HeuristicCost => "heuristic-cost",
      Field::BestCost => "best-cost",
      Field::Improvement => "improvement",
      Field::StartTime => "start-time",
      Field::EndTime => "end-time",
      Field::RegionSpills => "region-spills",
      Field::PressureBlock => "pressure-block",
      Field::PeakPressure => "peak-pressure",
      Field::FunctionSpills => "function-spills",
      Field::AllocatorSpills => "allocator-spills",
      Field::Elapsed => "elapsed",
      Field::BestSchedule => "best-schedule",
      Field::Slil => "slil",
    }
  }
}

impl fmt::Display for Field {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for Field {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self> {
    Field::ALL
      .into_iter()
      .find(|field| field.name() == s)
      .with_context(|| format!("unknown field {s:?}"))
  }
}

/// Patterns for the OptSched log format, in priority order per field.
const OPTSCHED_PATTERNS: &[(Field, &[&str])] = &[
  (Field::Region, &[r"Processing DAG (\S+) with \d+ insts"]),
  (Field::Size, &[r"Processing DAG \S+ with (\d+) insts"]),
  (Field::ListFailed, &[r"List scheduling failed"]),
  (Field::RpMismatch, &[r"RP-mismatch falling back!"]),
  (Field::ListOptimal, &[r"The list schedule .* is optimal"]),
  (Field::ZeroTimeLimit, &[r"Bypassing optimal scheduling due to zero time limit"]),
  (Field::SolvedOptimally, &[r"DAG solved optimally"]),
  (
    Field::HeuristicCost,
    &[r"list schedule is of length \d+ and spill cost \d+\. Tot cost = (\d+)"],
  ),
  (
    Field::BestCost,
    &[
      r"DAG solved optimally .*tot cost = (\d+)",
      r"DAG timed out .*tot cost = (\d+)",
      r"The list schedule of length \d+ and cost (\d+) is optimal",
    ],
  ),
  (Field::Improvement, &[r"cost imp=(\d+)"]),
  (Field::StartTime, &[r"-{20} \(Time = (\d+) ms\)"]),
  (
    Field::EndTime,
    &[
      r"verified successfully \(Time = (\d+) ms\)",
      r"DAG solved optimally .*\(Time = (\d+) ms\)",
      r"DAG timed out .*\(Time = (\d+) ms\)",
      r"is optimal\. \(Time = (\d+) ms\)",
    ],
  ),
  (
    Field::RegionSpills,
    &[r"OPT_SCHED LOCAL RA: DAG Name: \S+ Number of spills: (\d+)"],
  ),
  (Field::PressureBlock, &[r"LLVM max pressure after scheduling for BB (\S+)"]),
  (
    Field::PeakPressure,
    &[r"PeakRegPresAfter\s+Index \d+ Name (\S+) Peak (\d+) Limit (\d+)"],
  ),
  (
    Field::FunctionSpills,
    &[
      r"Function: (\S+)\s*\n(?:INFO: )?END FAST RA: Number of spills: (\d+)",
      r"Function: (\S+)\s*\n(?:INFO: )?GREEDY RA: Number of spilled live ranges: (\d+)",
    ],
  ),
  (
    Field::AllocatorSpills,
    &[
      r"GREEDY RA: Number of spilled live ranges: (\d+)",
      r"END FAST RA: Number of spills: (\d+)",
    ],
  ),
  (Field::Elapsed, &[r"(\d+) total seconds elapsed"]),
  (
    Field::BestSchedule,
    &[r"Best schedule for DAG (\S+) has cost (\d+) and length (\d+)\. The schedule is (.*?) \(Time"],
  ),
  (
    Field::Slil,
    &[r"SLIL stats: DAG (\S+) static LB (\d+) gap size (\d+) enumerated (\w+) optimal (\w+) PERP higher (\w+) \("],
  ),
];

/// Named, priority-ordered regex variants per field. The first variant that
/// matches a text wins.
#[derive(Clone, Debug, Default)]
pub struct PatternTable {
  patterns: BTreeMap<Field, Vec<Regex>>,
}

impl PatternTable {
  /// The default table for OptSched logs.
  pub fn optsched() -> Result<Self> {
    let mut table = Self::default();
    for (field, variants) in OPTSCHED_PATTERNS {
      for pattern in *variants {
        table.push(*field, pattern)?;
      }
    }

    Ok(table)
  }

  /// Adds a variant with the lowest priority for `field`.
  pub fn push(&mut self, field: Field, pattern: &str) -> Result<()> {
    let regex = compile(field, pattern)?;
    self.patterns.entry(field).or_default().push(regex);

    Ok(())
  }

  /// Adds a variant with the highest priority for `field`.
  pub fn prepend(&mut self, field: Field, pattern: &str) -> Result<()> {
    let regex = compile(field, pattern)?;
    self.patterns.entry(field).or_default().insert(0, regex);

    Ok(())
  }

  pub fn variants(&self, field: Field) -> &[Regex] {
    self.patterns.get(&field).map(Vec::as_slice).unwrap_or_default()
  }

  /// Captures of the first variant of `field` matching `text`.
  pub fn captures<'t>(&self, field: Field, text: &'t str) -> Option<Captures<'t>> {
    self.variants(field).iter().find_map(|regex| regex.captures(text))
  }

  /// The first capture group of the first matching variant. Marker patterns
  /// without groups yield the whole match.
  pub fn first<'t>(&self, field: Field, text: &'t str) -> Option<&'t str> {
    let captures = self.captures(field, text)?;

    captures.get(1).or_else(|| captures.get(0)).map(|m| m.as_str())
  }

  /// Every match of the first variant that matches `text` at all.
  pub fn all<'t>(&self, field: Field, text: &'t str) -> Vec<Captures<'t>> {
    for regex in self.variants(field) {
      let matches: Vec<_> = regex.captures_iter(text).collect();
      if !matches.is_empty() {
        return matches;
      }
    }

    Vec::new()
  }

  /// Extracts every field of the table from `text`.
  pub fn extract<'t>(&self, text: &'t str) -> Fields<'t> {
    let values = self
      .patterns
      .keys()
      .filter_map(|&field| self.first(field, text).map(|value| (field, value)))
      .collect();

    Fields { values }
  }
}

fn compile(field: Field, pattern: &str) -> Result<Regex> {
  Regex::new(pattern).with_context(|| format!("invalid pattern for {field}: {pattern:?}"))
}

/// Extracted fields of one text. Fields whose patterns did not match are
/// absent.
#[derive(Debug, Default)]
pub struct Fields<'t> {
  values: BTreeMap<Field, &'t str>,
}

impl<'t> Fields<'t> {
  pub fn get(&self, field: Field) -> Option<&'t str> {
    self.values.get(&field).copied()
  }

  pub fn has(&self, field: Field) -> bool {
    self.values.contains_key(&field)
  }

  pub fn number(&self, field: Field) -> Option<u64> {
    self.get(field)?.parse().ok()
  }
}
