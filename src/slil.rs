use std::collections::BTreeSet;

use log::warn;
use regex::Captures;

use crate::{
  classify::function_name,
  ext::CapturesExt,
  extract::{Field, PatternTable},
  stats::percent,
};

/// How close one block's schedule came to its static lower bound (SLIL).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlilBlock {
  /// `function:block`.
  pub name: String,
  /// Static lower bound on the schedule length.
  pub static_lb: u64,
  /// Schedule length above `static_lb`.
  pub gap_size: u64,
  pub enumerated: bool,
  pub optimal: bool,
  /// The peak excess register pressure is above the heuristic's.
  pub perp_higher: bool,
}

impl SlilBlock {
  pub fn function(&self) -> &str {
    function_name(&self.name)
  }

  /// `gap_size` as a percentage of `static_lb`.
  pub fn gap_percent(&self) -> f64 {
    percent(self.gap_size, self.static_lb)
  }
}

fn flag(text: &str) -> Option<bool> {
  match text {
    "True" | "true" | "1" => Some(true),
    "False" | "false" | "0" => Some(false),
    _ => None,
  }
}

fn slil_block(captures: &Captures<'_>) -> Option<SlilBlock> {
  Some(SlilBlock {
    name: captures.text(1)?.to_string(),
    static_lb: captures.number(2)?,
    gap_size: captures.number(3)?,
    enumerated: flag(captures.text(4)?)?,
    optimal: flag(captures.text(5)?)?,
    perp_higher: flag(captures.text(6)?)?,
  })
}

/// Every SLIL record of a log, in log order. Unreadable records and repeated
/// blocks are logged and skipped.
pub fn slil_blocks(text: &str, table: &PatternTable) -> Vec<SlilBlock> {
  let mut seen = BTreeSet::new();
  let mut blocks = Vec::new();

  for captures in table.all(Field::Slil, text) {
    let Some(block) = slil_block(&captures) else {
      warn!("could not parse SLIL record {:?}", &captures[0]);
      continue;
    };

    if !seen.insert(block.name.clone()) {
      warn!("{} has more than one SLIL record, keeping the first", block.name);
      continue;
    }

    blocks.push(block);
  }

  blocks
}
