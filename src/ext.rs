use std::borrow::Cow;

use regex::Captures;

#[extend::ext(name = CapturesExt)]
pub impl<'t> Captures<'t> {
  /// Text of capture group `i`, if it participated in the match.
  fn text(&self, i: usize) -> Option<&'t str> {
    self.get(i).map(|m| m.as_str())
  }

  /// Capture group `i` parsed as a count. Returns `None` if the group is
  /// missing or does not fit in a `u64`.
  fn number(&self, i: usize) -> Option<u64> {
    self.text(i)?.parse().ok()
  }
}

#[extend::ext(name = InfoLines)]
pub impl str {
  /// Keeps only the lines written by the scheduler's logger, with the
  /// `INFO:` prefix removed. Text without any such line is returned as-is.
  fn info_lines(&self) -> Cow<'_, str> {
    if !self.lines().any(|line| line.starts_with("INFO:")) {
      return Cow::Borrowed(self);
    }

    let lines: Vec<&str> = self
      .lines()
      .filter_map(|line| line.strip_prefix("INFO:"))
      .map(|line| line.strip_prefix(' ').unwrap_or(line))
      .collect();

    Cow::Owned(lines.join("\n"))
  }
}
