use std::collections::BTreeMap;

use log::info;

use crate::{
  ext::CapturesExt,
  extract::{Field, PatternTable},
};

/// The best schedule the scheduler reported for one DAG.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DagCost {
  pub cost: u64,
  pub length: u64,
  pub optimal: bool,
}

/// Best schedule per DAG, from the scheduler's summary lines.
pub fn dag_costs(text: &str, table: &PatternTable) -> BTreeMap<String, DagCost> {
  table
    .all(Field::BestSchedule, text)
    .iter()
    .filter_map(|captures| {
      let cost = DagCost {
        cost: captures.number(2)?,
        length: captures.number(3)?,
        optimal: captures.text(4)? == "optimal",
      };

      Some((captures.text(1)?.to_string(), cost))
    })
    .collect()
}

/// Two logs of the same input that cannot both be right.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CostMismatch {
  #[error("different number of DAGs: {first} in the first log, {second} in the second")]
  DagCount { first: usize, second: usize },
  #[error("could not find {dag} in the second log")]
  Missing { dag: String },
  #[error("mismatch for {dag}: both optimal with costs {first} and {second}")]
  OptimalCosts { dag: String, first: u64, second: u64 },
  #[error("mismatch for {dag}: optimal cost {optimal} is worse than {other}")]
  OptimalWorse { dag: String, optimal: u64, other: u64 },
}

/// Cross-checks the best costs of two logs. An optimal schedule can never cost
/// more than any other schedule of the same DAG.
pub fn check(first: &BTreeMap<String, DagCost>, second: &BTreeMap<String, DagCost>) -> Vec<CostMismatch> {
  let mut mismatches = Vec::new();

  if first.len() != second.len() {
    mismatches.push(CostMismatch::DagCount {
      first: first.len(),
      second: second.len(),
    });
  }

  for (dag, a) in first {
    let Some(b) = second.get(dag) else {
      mismatches.push(CostMismatch::Missing { dag: dag.clone() });
      continue;
    };

    let (optimal, other) = match (a.optimal, b.optimal) {
      (true, true) => {
        if a.cost != b.cost {
          mismatches.push(CostMismatch::OptimalCosts {
            dag: dag.clone(),
            first: a.cost,
            second: b.cost,
          });
        }
        continue;
      }
      (true, false) => {
        info!("{dag} is optimal in the first log only");
        (a, b)
      }
      (false, true) => {
        info!("{dag} is optimal in the second log only");
        (b, a)
      }
      (false, false) => continue,
    };

    if optimal.cost > other.cost {
      mismatches.push(CostMismatch::OptimalWorse {
        dag: dag.clone(),
        optimal: optimal.cost,
        other: other.cost,
      });
    }
  }

  mismatches
}

#[cfg(test)]
mod tests {
  use super::*;

  fn costs(log: &str) -> BTreeMap<String, DagCost> {
    dag_costs(log, &PatternTable::optsched().unwrap())
  }

  #[test]
  fn extracts_best_schedules() {
    let costs = costs(
      "INFO: Best schedule for DAG main:bb.0 has cost 40 and length 12. The schedule is optimal (Time = 120 ms)\n\
       INFO: Best schedule for DAG main:bb.1 has cost 7 and length 3. The schedule is not optimal (Time = 900 ms)\n",
    );

    assert_eq!(costs["main:bb.0"], DagCost { cost: 40, length: 12, optimal: true });
    assert!(!costs["main:bb.1"].optimal);
  }

  fn dag(cost: u64, optimal: bool) -> DagCost {
    DagCost { cost, length: 1, optimal }
  }

  #[test]
  fn consistent_logs() {
    let first = BTreeMap::from([("a".to_string(), dag(4, true)), ("b".to_string(), dag(9, false))]);
    let second = BTreeMap::from([("a".to_string(), dag(4, true)), ("b".to_string(), dag(7, true))]);

    assert!(check(&first, &second).is_empty());
  }

  #[test]
  fn reports_every_kind_of_mismatch() {
    let first = BTreeMap::from([
      ("a".to_string(), dag(4, true)),
      ("b".to_string(), dag(6, true)),
      ("c".to_string(), dag(3, false)),
      ("d".to_string(), dag(1, false)),
    ]);
    let second = BTreeMap::from([
      ("a".to_string(), dag(5, true)),
      ("b".to_string(), dag(5, false)),
      ("c".to_string(), dag(8, true)),
    ]);

    assert_eq!(
      check(&first, &second),
      vec![
        CostMismatch::DagCount { first: 4, second: 3 },
        CostMismatch::OptimalCosts { dag: "a".to_string(), first: 4, second: 5 },
        CostMismatch::OptimalWorse { dag: "b".to_string(), optimal: 6, other: 5 },
        CostMismatch::OptimalWorse { dag: "c".to_string(), optimal: 8, other: 3 },
        CostMismatch::Missing { dag: "d".to_string() },
      ]
    );
  }
}
