use std::fmt::Write;

use anyhow::Result;

use crate::{
  aggregate::{BlockStats, RunAggregate},
  som::{Comparison, Excess},
  stats::Counts,
};

const COLUMN_WIDTH: usize = 12;
const COLUMN_PADDING: &str = "  ";

fn format_header<'a, I: IntoIterator<Item = &'a str>>(columns: I) -> String {
  let header = format_row(columns);

  format!("{header}\n{}", "=".repeat(header.len()))
}

fn format_row<S: AsRef<str>, I: IntoIterator<Item = S>>(columns: I) -> String {
  columns
    .into_iter()
    .enumerate()
    .map(|(i, col)| {
      let col = col.as_ref();
      if i == 0 {
        format!("{col:<COLUMN_WIDTH$}")
      } else {
        format!("{col:>COLUMN_WIDTH$}")
      }
    })
    .collect::<Vec<_>>()
    .join(COLUMN_PADDING)
}

/// Writes `  label: count (percent%)`.
macro_rules! writeln_share {
  ($out:ident, $label:expr, $count:expr, $percent:expr) => {
    writeln!($out, "  {}: {} ({:.2}%)", $label, $count, $percent)?
  };
}

fn or_none(value: Option<u64>) -> String {
  value.map_or_else(|| "none".to_string(), |value| value.to_string())
}

/// The spill report, one section per benchmark. This is the format read back
/// by [`crate::spills::parse_spills`].
pub fn format_spills(run: &RunAggregate) -> Result<String> {
  let mut out = String::new();

  for (name, bench) in &run.benchmarks {
    writeln!(out, "{name}:")?;
    for (function, aggregate) in &bench.functions {
      writeln!(out, "      {:5} {function}", aggregate.spills)?;
    }
    writeln!(out, "  ---------")?;
    writeln!(out, "  Sum:{:5}", bench.spills())?;
    writeln!(out)?;
  }

  writeln!(out, "------------")?;
  writeln!(out, "Total:{:5}", run.spills())?;

  Ok(out)
}

pub fn format_times(run: &RunAggregate) -> Result<String> {
  let mut out = String::new();

  for (name, bench) in &run.benchmarks {
    writeln!(out, "{name:>10}:{:5} seconds", bench.elapsed_secs.unwrap_or(0))?;
  }
  writeln!(out, "---------------------------")?;
  writeln!(out, "     Total:{:5} seconds", run.elapsed_secs())?;

  Ok(out)
}

fn format_block_counts(out: &mut String, stats: &BlockStats) -> Result<()> {
  writeln!(out, "  Blocks: {}", stats.blocks)?;
  writeln_share!(out, "Successful", stats.successful, stats.successful_percent());
  writeln_share!(out, "Enumerated", stats.enumerated, stats.enumerated_percent());
  writeln_share!(
    out,
    "Optimal and Improved",
    stats.optimal_improved,
    stats.of_enumerated_percent(stats.optimal_improved)
  );
  writeln_share!(
    out,
    "Optimal but not Improved",
    stats.optimal_not_improved,
    stats.of_enumerated_percent(stats.optimal_not_improved)
  );
  writeln_share!(
    out,
    "Non-Optimal and Improved",
    stats.timed_out_improved,
    stats.of_enumerated_percent(stats.timed_out_improved)
  );
  writeln_share!(
    out,
    "Non-Optimal and not Improved",
    stats.timed_out_not_improved,
    stats.of_enumerated_percent(stats.timed_out_not_improved)
  );
  writeln!(out, "  Heuristic cost: {}", stats.heuristic_cost)?;
  writeln!(out, "  B&B cost: {}", stats.bnb_cost())?;
  writeln_share!(out, "Cost improvement", stats.improvement, stats.improvement_percent());
  writeln!(out, "  Region Spills: {}", stats.region_spills)?;

  Ok(())
}

pub fn format_blocks(run: &RunAggregate) -> Result<String> {
  let mut out = String::new();

  for (name, bench) in &run.benchmarks {
    writeln!(out, "{name}:")?;
    format_block_counts(&mut out, &bench.blocks)?;
    if bench.skipped > 0 {
      writeln!(out, "  Unparsed regions: {}", bench.skipped)?;
    }
  }

  let total = run.blocks();
  writeln!(out, "{}", "-".repeat(50))?;
  writeln!(out, "Total:")?;
  format_block_counts(&mut out, &total)?;

  writeln!(out, "  Smallest block size: {}", or_none(total.sizes.min))?;
  writeln!(out, "  Largest block size: {}", or_none(total.sizes.max))?;
  writeln!(out, "  Average block size: {:.1}", total.sizes.avg())?;
  writeln!(out, "  Smallest enumerated block size: {}", or_none(total.enumerated_sizes.min))?;
  writeln!(out, "  Largest enumerated block size: {}", or_none(total.enumerated_sizes.max))?;
  writeln!(out, "  Average enumerated block size: {:.1}", total.enumerated_sizes.avg())?;
  writeln!(out, "  Largest optimal block size: {}", or_none(total.optimal_sizes.max))?;
  writeln!(out, "  Average optimal block size: {:.1}", total.optimal_sizes.avg())?;
  writeln!(out, "  Largest improved block size: {}", or_none(total.improved_sizes.max))?;
  writeln!(out, "  Smallest timed out block size: {}", or_none(total.timed_out_sizes.min))?;
  writeln!(out, "  Average timed out block size: {:.1}", total.timed_out_sizes.avg())?;
  writeln!(out, "  Average optimal solution time: {:.0} ms", total.optimal_times.avg())?;

  Ok(out)
}

fn format_pressure(out: &mut String, indent: &str, pressure: &Counts) -> Result<()> {
  for (class, excess) in pressure {
    writeln!(out, "{indent}{excess:5} {class}")?;
  }

  Ok(())
}

pub fn format_regp(run: &RunAggregate) -> Result<String> {
  let mut out = String::new();

  for (name, bench) in &run.benchmarks {
    writeln!(out, "Benchmark {name}:")?;
    for (function, aggregate) in &bench.functions {
      if aggregate.pressure.is_empty() {
        continue;
      }
      writeln!(out, "  Pressure Set Sums for Function {function}:")?;
      format_pressure(&mut out, "    ", &aggregate.pressure)?;
    }
    writeln!(out, "Pressure Set Sums for Benchmark {name}:")?;
    format_pressure(&mut out, "", &bench.pressure())?;
    writeln!(out, "------------")?;
  }

  writeln!(out, "Pressure Set Sums for Run:")?;
  format_pressure(&mut out, "", &run.pressure())?;

  Ok(out)
}

pub fn format_slil(run: &RunAggregate) -> Result<String> {
  let mut out = String::new();
  let rule = "=".repeat(20);

  for (name, bench) in &run.benchmarks {
    writeln!(out, "{rule}\nBenchmark {name}\n{rule}")?;
    for (function, stats) in &bench.slil {
      writeln!(out, "  Function {function}\n  {}", "-".repeat(16))?;
      writeln!(out, "    Total blocks: {}", stats.blocks())?;
      writeln!(out, "    Total gap size: {}", stats.gap_sizes.sum)?;
      writeln!(out, "    Average gap size: {:.2}", stats.gap_sizes.avg())?;
      writeln!(out, "    Average percent gap size: {:.2}%", stats.avg_gap_percent())?;
      writeln!(out, "    Maximum percent gap size: {:.2}%", stats.max_gap_percent)?;
      writeln!(out, "    Enumerated: {}", stats.enumerated)?;
      writeln!(out, "    Optimal: {}", stats.optimal)?;
      writeln!(out, "    Enumerated and zero cost: {}", stats.enumerated_zero_gap)?;
      writeln!(out, "    Higher PERP: {}", stats.perp_higher)?;
      writeln!(out, "    Higher PERP and optimal: {}", stats.perp_higher_optimal)?;
    }
  }

  Ok(out)
}

/// `+4 (50.00%) main`, without the percentage when the minimum is 0.
fn format_excess(excess: &Excess) -> String {
  match excess.percent() {
    Some(percent) => format!("+{} ({percent:.2}%) {}", excess.excess, excess.function),
    None => format!("+{} {}", excess.excess, excess.function),
  }
}

pub fn format_comparison(comparison: &Comparison) -> Result<String> {
  let mut out = String::new();

  for (benchmark, som) in &comparison.benchmark_som {
    writeln!(out, "{benchmark}:")?;
    for entry in comparison.benchmark_entries(benchmark) {
      let winners = if entry.won_by_all() {
        "[All]".to_string()
      } else {
        format!("{:?}", entry.winners)
      };
      writeln!(out, "          {} {} {winners}", entry.min_spills, entry.function)?;
    }
    writeln!(out, "  ---------")?;
    writeln!(out, "Sum: {som}")?;
    writeln!(out)?;
  }

  writeln!(out, "{}", "-".repeat(12))?;
  writeln!(out, "Total:{}", comparison.som)?;
  writeln!(
    out,
    "Functions: {} ({} with spills)",
    comparison.functions, comparison.functions_with_spills
  )?;
  writeln!(out)?;

  writeln!(
    out,
    "{}",
    format_header(["run", "spills", "extra", "extra %", "at min %", "worst"])
  )?;
  for run in &comparison.runs {
    let worst = run.worst.as_ref().map_or_else(|| "-".to_string(), format_excess);

    let row = format_row([
      run.name.clone(),
      run.total_spills.to_string(),
      run.extra_spills(comparison.som).to_string(),
      format!("{:.2}", run.extra_spills_percent(comparison.som)),
      format!("{:.2}", comparison.at_min_percent(run)),
      worst,
    ]);
    writeln!(out, "{row}")?;
  }

  if !comparison.mismatches.is_empty() {
    writeln!(out)?;
    writeln!(out, "Mismatched keys:")?;
    for mismatch in &comparison.mismatches {
      writeln!(out, "  {mismatch}")?;
    }
  }

  Ok(out)
}
