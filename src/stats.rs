use std::collections::BTreeMap;

/// `100 * numerator / denominator`, or 0 when there is nothing to divide by.
pub fn percent(numerator: u64, denominator: u64) -> f64 {
  if denominator == 0 {
    return 0.0;
  }

  100.0 * numerator as f64 / denominator as f64
}

/// Count, sum and extrema of a set of values. Merging is associative and
/// commutative, so summaries can be built in any order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
  pub count: u64,
  pub sum: u64,
  pub min: Option<u64>,
  pub max: Option<u64>,
}

impl Summary {
  pub fn of(value: u64) -> Self {
    Self {
      count: 1,
      sum: value,
      min: Some(value),
      max: Some(value),
    }
  }

  pub fn merge(self, other: Self) -> Self {
    Self {
      count: self.count + other.count,
      sum: self.sum + other.sum,
      min: merge_with(self.min, other.min, u64::min),
      max: merge_with(self.max, other.max, u64::max),
    }
  }

  /// Mean of the values, 0 for an empty set.
  pub fn avg(&self) -> f64 {
    if self.count == 0 {
      return 0.0;
    }

    self.sum as f64 / self.count as f64
  }
}

fn merge_with(a: Option<u64>, b: Option<u64>, f: fn(u64, u64) -> u64) -> Option<u64> {
  match (a, b) {
    (Some(a), Some(b)) => Some(f(a, b)),
    (a, b) => a.or(b),
  }
}

/// Per-key counters, e.g. excess register pressure per register class.
pub type Counts = BTreeMap<String, u64>;

pub fn merge_counts(mut a: Counts, b: Counts) -> Counts {
  for (key, value) in b {
    *a.entry(key).or_default() += value;
  }

  a
}
