use std::borrow::Cow;

use crate::ext::InfoLines;

/// Marker the scheduler logs at the start of every scheduling region.
pub const OPTSCHED_DELIMITER: &str = "Opt Scheduling **********";

/// One delimiter-bounded segment of a log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region<'t> {
  /// 1-based position of the region in the log.
  pub index: usize,
  pub text: &'t str,
}

impl<'t> Region<'t> {
  /// The region's logger lines without their `INFO:` prefix.
  pub fn info_text(&self) -> Cow<'t, str> {
    self.text.info_lines()
  }
}

/// Splits `text` into regions. Anything before the first `delimiter` is
/// discarded. An empty `delimiter` yields no regions.
pub fn regions<'t>(text: &'t str, delimiter: &'t str) -> impl Iterator<Item = Region<'t>> {
  (!delimiter.is_empty())
    .then(|| text.split(delimiter))
    .into_iter()
    .flatten()
    .skip(1)
    .enumerate()
    .map(|(i, text)| Region { index: i + 1, text })
}
