//! Description of a single outstanding timer

use std::any::type_name;
use std::error::Error;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use crate::host::TimerId;

/// Whether a timer fires once or repeatedly
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
  /// Fires once after its delay and retires
  Timeout,
  /// Fires every period until cleared
  Interval,
}

impl TimerKind {
  /// The name host environments use for this kind of timer
  pub fn name(self) -> &'static str {
    match self {
      Self::Timeout => "timeout",
      Self::Interval => "interval",
    }
  }
}

impl fmt::Display for TimerKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

/// Error produced when parsing a string that doesn't name a [TimerKind]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownKind(pub String);
impl fmt::Display for UnknownKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:?} is not a timer kind, expected \"timeout\" or \"interval\"", self.0)
  }
}
impl Error for UnknownKind {}

impl FromStr for TimerKind {
  type Err = UnknownKind;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "timeout" => Ok(Self::Timeout),
      "interval" => Ok(Self::Interval),
      _ => Err(UnknownKind(s.to_string())),
    }
  }
}

/// Best-effort name of a callback derived from its type. Function items and
/// methods yield their name, closures and anything else without a usable name
/// yield an empty string.
pub fn label_of<F: ?Sized>(_: &F) -> String {
  let name = type_name::<F>();
  // boxed trait objects and closures, wherever they are nested
  if name.contains("dyn ") || name.contains("{{closure}}") {
    return String::new();
  }
  // drop generic arguments wherever they appear, eg. `crate::Foo<u8>::bar<T>`
  let mut path = String::new();
  let (mut depth, mut prev) = (0usize, ' ');
  for c in name.chars() {
    match c {
      '<' => depth += 1,
      // the arrow of a fn pointer type inside generic arguments
      '>' if prev == '-' => (),
      '>' => depth = depth.saturating_sub(1),
      c if depth == 0 => path.push(c),
      _ => (),
    }
    prev = c;
  }
  if path.contains(['(', ' ', '&', '*', '[']) {
    return String::new();
  }
  path.rsplit("::").next().unwrap_or_default().to_string()
}

/// An outstanding timer as registered by the interception layer. Records are
/// immutable; they only ever enter and leave a [crate::Registry].
#[derive(Clone, Debug)]
pub struct TimerRecord {
  id: TimerId,
  kind: TimerKind,
  label: String,
  delay: Duration,
  created_at: SystemTime,
}

impl TimerRecord {
  /// Describe a timer the host just accepted
  pub fn new(id: TimerId, kind: TimerKind, label: impl Into<String>, delay: Duration) -> Self {
    Self { id, kind, label: label.into(), delay, created_at: SystemTime::now() }
  }

  /// The host's handle
  pub fn id(&self) -> TimerId { self.id }
  /// One-shot or repeating
  pub fn kind(&self) -> TimerKind { self.kind }
  /// Display name of the callback, empty if it had none
  pub fn label(&self) -> &str { &self.label }
  /// Delay or period exactly as requested by the caller
  pub fn delay(&self) -> Duration { self.delay }
  /// Wall clock time of registration
  pub fn created_at(&self) -> SystemTime { self.created_at }
}

impl fmt::Display for TimerRecord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = if self.label.is_empty() { "<anonymous>" } else { &self.label };
    write!(f, "{} {} {} {}ms", self.id, self.kind, label, self.delay.as_millis())
  }
}
