//! Insertion-ordered collection of outstanding timers

use std::fmt;

use itertools::Itertools;

use crate::host::TimerId;
use crate::record::{TimerKind, TimerRecord};

/// The single source of truth about which timers are outstanding. Lookups are
/// linear; the number of live timers in a process is expected to be small.
#[derive(Clone, Debug, Default)]
pub struct Registry {
  records: Vec<TimerRecord>,
}

fn matches(record: &TimerRecord, filter: Option<TimerKind>) -> bool {
  filter.map_or(true, |kind| record.kind() == kind)
}

impl Registry {
  /// Create an empty registry
  #[must_use]
  pub fn new() -> Self { Self::default() }

  /// Append a record. The id assigned by the host is trusted to be unique.
  pub fn add(&mut self, record: TimerRecord) { self.records.push(record) }

  /// First record with the given id
  pub fn find_by_id(&self, id: TimerId) -> Option<&TimerRecord> {
    self.records.iter().find(|r| r.id() == id)
  }

  /// Remove the first record with the given id. Absent ids are not an error.
  pub fn remove_by_id(&mut self, id: TimerId) -> Option<TimerRecord> {
    let idx = self.records.iter().position(|r| r.id() == id)?;
    Some(self.records.remove(idx))
  }

  /// Snapshot of the records of the given kind, or all records, in insertion
  /// order
  pub fn all(&self, filter: Option<TimerKind>) -> Vec<TimerRecord> {
    self.iter().filter(|r| matches(r, filter)).cloned().collect()
  }

  /// Number of records of the given kind, or all records
  pub fn count(&self, filter: Option<TimerKind>) -> usize {
    self.iter().filter(|r| matches(r, filter)).count()
  }

  /// Iterate over the records in insertion order
  pub fn iter(&self) -> impl Iterator<Item = &TimerRecord> + '_ { self.records.iter() }

  /// Whether there are no outstanding timers
  pub fn is_empty(&self) -> bool { self.records.is_empty() }
}

impl fmt::Display for Registry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.records.iter().join("\n"))
  }
}

#[cfg(test)]
mod test {
  use std::time::Duration;

  use super::Registry;
  use crate::host::TimerId;
  use crate::record::{TimerKind, TimerRecord};

  fn rec(id: u64, kind: TimerKind) -> TimerRecord {
    TimerRecord::new(TimerId(id), kind, format!("t{id}"), Duration::from_millis(id))
  }

  fn sample() -> Registry {
    let mut reg = Registry::new();
    reg.add(rec(1, TimerKind::Timeout));
    reg.add(rec(2, TimerKind::Interval));
    reg.add(rec(3, TimerKind::Timeout));
    reg
  }

  fn ids(records: &[TimerRecord]) -> Vec<u64> { records.iter().map(|r| r.id().0).collect() }

  #[test]
  fn filters_by_kind_in_insertion_order() {
    let reg = sample();
    assert_eq!(ids(&reg.all(None)), [1, 2, 3]);
    assert_eq!(ids(&reg.all(Some(TimerKind::Timeout))), [1, 3]);
    assert_eq!(reg.count(Some(TimerKind::Interval)), 1);
    assert_eq!(reg.count(None), 3);
  }

  #[test]
  fn removal_is_by_first_match() {
    let mut reg = sample();
    reg.add(rec(1, TimerKind::Interval));
    let removed = reg.remove_by_id(TimerId(1)).expect("present");
    assert_eq!(removed.kind(), TimerKind::Timeout);
    assert_eq!(reg.find_by_id(TimerId(1)).map(|r| r.kind()), Some(TimerKind::Interval));
    assert!(reg.remove_by_id(TimerId(42)).is_none());
    assert_eq!(reg.count(None), 3);
  }

  #[test]
  fn snapshots_are_detached() {
    let mut reg = sample();
    let snapshot = reg.all(None);
    for r in &snapshot {
      reg.remove_by_id(r.id());
    }
    assert!(reg.is_empty());
    assert_eq!(ids(&snapshot), [1, 2, 3]);
  }

  #[test]
  fn display_lists_one_timer_per_line() {
    assert_eq!(sample().to_string(), "#1 timeout t1 1ms\n#2 interval t2 2ms\n#3 timeout t3 3ms");
  }
}
