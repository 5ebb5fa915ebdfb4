use std::{
  fs,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::{error, info, warn};

use optsched_stats::{
  bench::Bench,
  check,
  extract::Field,
  format,
  parse::LogFormat,
  som, spills,
  split::OPTSCHED_DELIMITER,
};

#[derive(Parser)]
struct Args {
  /// Enable verbose output. Repeat for more detail.
  #[arg(short, long, action = ArgAction::Count, global = true)]
  verbose: u8,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Collect block, spill, time and register pressure stats from scheduler
  /// logs, one log per benchmark.
  Blocks {
    /// Logs to parse. The benchmark name is the file name up to its first dot.
    #[arg(required = true)]
    logs: Vec<PathBuf>,
    /// Marker starting each scheduling region.
    #[arg(long, default_value = OPTSCHED_DELIMITER)]
    delimiter: String,
    /// Extra pattern for a field, tried before the built-in ones
    /// (`FIELD=REGEX`).
    #[arg(short, long, value_parser = parse_pattern)]
    pattern: Vec<(Field, String)>,
    /// Where to write the spill counts.
    #[arg(short, long, default_value = "spills.dat")]
    spills: PathBuf,
    /// Where to write the compile times.
    #[arg(short, long, default_value = "times.dat")]
    times: PathBuf,
    /// Where to write the block stats.
    #[arg(short = 'k', long, default_value = "blocks.dat")]
    blocks: PathBuf,
    /// Where to write the register pressure stats.
    #[arg(short, long, default_value = "regp.dat")]
    regp: PathBuf,
  },
  /// Find the sum of minimum spills across runs. Each run directory must
  /// contain a `spills.dat` written by `blocks`.
  Som {
    #[arg(required = true)]
    runs: Vec<PathBuf>,
    /// Write the comparison to a file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Summarize how far schedules land from their static lower bound, per
  /// function, from the scheduler's SLIL stats lines.
  Slil {
    #[arg(required = true)]
    logs: Vec<PathBuf>,
    #[arg(short, long, default_value = "slil.dat")]
    output: PathBuf,
  },
  /// Check that two logs of the same input agree on the best schedule costs.
  Check { first: PathBuf, second: PathBuf },
}

fn parse_pattern(s: &str) -> Result<(Field, String), String> {
  let (field, pattern) = s.split_once('=').ok_or("expected FIELD=REGEX")?;
  let field = field.parse::<Field>().map_err(|err| err.to_string())?;

  Ok((field, pattern.to_string()))
}

fn init_logging(verbose: u8) -> Result<()> {
  let level = match verbose {
    0 => simplelog::LevelFilter::Warn,
    1 => simplelog::LevelFilter::Info,
    2 => simplelog::LevelFilter::Debug,
    _ => simplelog::LevelFilter::Trace,
  };

  let mut config = simplelog::ConfigBuilder::new();
  config
    .set_time_level(simplelog::LevelFilter::Off)
    .set_location_level(simplelog::LevelFilter::Off)
    .set_target_level(simplelog::LevelFilter::Off)
    .set_thread_level(simplelog::LevelFilter::Off);

  simplelog::TermLogger::init(
    level,
    config.build(),
    simplelog::TerminalMode::Stderr,
    simplelog::ColorChoice::Auto,
  )
  .context("init logger")
}

fn write_report(path: &Path, report: String) -> Result<()> {
  fs::write(path, report).with_context(|| format!("write {path:?}"))?;
  info!("wrote {path:?}");

  Ok(())
}

fn main() -> Result<()> {
  let args = Args::parse();
  init_logging(args.verbose)?;

  match args.command {
    Command::Blocks {
      logs,
      delimiter,
      pattern,
      spills,
      times,
      blocks,
      regp,
    } => {
      let mut log_format = LogFormat::optsched().context("LogFormat::optsched")?.with_delimiter(delimiter)?;
      for (field, regex) in &pattern {
        log_format.patterns.prepend(*field, regex)?;
      }

      let mut bench = Bench::new(log_format);
      if bench.bench_all(&logs) == logs.len() {
        anyhow::bail!("none of the {} logs could be parsed", logs.len());
      }

      let run = bench.aggregate();
      write_report(&spills, format::format_spills(&run).context("format spills")?)?;
      write_report(&times, format::format_times(&run).context("format times")?)?;
      write_report(&blocks, format::format_blocks(&run).context("format blocks")?)?;
      write_report(&regp, format::format_regp(&run).context("format regp")?)?;
    }
    Command::Som { runs, output } => {
      let (tables, errors) = spills::read_runs(&runs);
      for err in &errors {
        error!("{err:#}");
      }
      if tables.is_empty() {
        anyhow::bail!("no spill reports could be read");
      }

      let comparison = som::compare(&tables);
      let report = format::format_comparison(&comparison).context("format comparison")?;
      match output {
        Some(path) => write_report(&path, report)?,
        None => print!("{report}"),
      }
    }
    Command::Slil { logs, output } => {
      let mut bench = Bench::new(LogFormat::optsched().context("LogFormat::optsched")?);
      if bench.bench_all(&logs) == logs.len() {
        anyhow::bail!("none of the {} logs could be parsed", logs.len());
      }

      write_report(&output, format::format_slil(&bench.aggregate()).context("format slil")?)?;
    }
    Command::Check { first, second } => {
      let table = LogFormat::optsched()?.patterns;
      let read = |path: &Path| fs::read_to_string(path).with_context(|| format!("read {path:?}"));

      let mismatches = check::check(
        &check::dag_costs(&read(&first)?, &table),
        &check::dag_costs(&read(&second)?, &table),
      );
      for mismatch in &mismatches {
        println!("{mismatch}");
      }
      if !mismatches.is_empty() {
        warn!("{} mismatches", mismatches.len());
      }
    }
  }

  Ok(())
}
