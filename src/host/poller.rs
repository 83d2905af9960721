//! Deadline-ordered timer heap driving [super::EventLoop]

use std::collections::BinaryHeap;
use std::mem;
use std::thread::sleep;
use std::time::{Duration, Instant};

use super::delete_cell::DeleteCell;

/// How an event loop measures the passage of time
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClockMode {
  /// Deadlines follow the wall clock and waiting puts the thread to sleep
  #[default]
  Realtime,
  /// Time stands still until the owner advances it, and waiting for a timer
  /// jumps straight to its deadline. Deterministic, meant for tests and
  /// offline rendering.
  Manual,
}

enum Clock {
  Realtime(Instant),
  Manual(Duration),
}
impl Clock {
  fn new(mode: ClockMode) -> Self {
    match mode {
      ClockMode::Realtime => Self::Realtime(Instant::now()),
      ClockMode::Manual => Self::Manual(Duration::ZERO),
    }
  }

  fn now(&self) -> Duration {
    match self {
      Self::Realtime(origin) => origin.elapsed(),
      Self::Manual(now) => *now,
    }
  }

  /// Return once the clock reads at least `t`
  fn wait_until(&mut self, t: Duration) {
    match self {
      Self::Realtime(origin) =>
        if let Some(rest) = t.checked_sub(origin.elapsed()) {
          sleep(rest)
        },
      Self::Manual(now) => *now = (*now).max(t),
    }
  }
}

enum TimerKind<TOnce, TRec> {
  Once(DeleteCell<TOnce>),
  Recurring { period: Duration, data_cell: DeleteCell<TRec> },
}
impl<TOnce, TRec> TimerKind<TOnce, TRec> {
  fn is_live(&self) -> bool {
    match self {
      Self::Once(c) => c.is_live(),
      Self::Recurring { data_cell, .. } => data_cell.is_live(),
    }
  }
}

/// An entry in the heap.
///
/// [BinaryHeap] is a max heap, so the [Ord] implementation is reversed; it
/// orders by urgency. Timers sharing a deadline are ordered by `seq`, which
/// makes them fire in the order they were scheduled.
struct Timer<TOnce, TRec> {
  expires: Duration,
  seq: u64,
  kind: TimerKind<TOnce, TRec>,
}
impl<TOnce, TRec> Eq for Timer<TOnce, TRec> {}
impl<TOnce, TRec> PartialEq for Timer<TOnce, TRec> {
  fn eq(&self, other: &Self) -> bool { (self.expires, self.seq) == (other.expires, other.seq) }
}
impl<TOnce, TRec> PartialOrd for Timer<TOnce, TRec> {
  fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> { Some(self.cmp(other)) }
}
impl<TOnce, TRec> Ord for Timer<TOnce, TRec> {
  fn cmp(&self, other: &Self) -> std::cmp::Ordering {
    (other.expires, other.seq).cmp(&(self.expires, self.seq))
  }
}

/// Cancellation side of a scheduled timer
pub struct TimerHandle<T>(DeleteCell<T>);
impl<T> TimerHandle<T> {
  /// Cancel the timer. Cancelling a timer that already fired does nothing.
  pub fn cancel(self) { mem::drop(self.0.take()) }
}

/// Events produced by [Poller]
pub enum PollEvent<TOnce, TRec> {
  /// A single-fire timer expired
  Once(TOnce),
  /// A recurring timer ticked
  Recurring(TRec),
}

/// Timer heap with a pluggable clock. The poller never runs callbacks itself,
/// it only yields the payloads of expired timers.
pub struct Poller<TOnce, TRec: Clone> {
  timers: BinaryHeap<Timer<TOnce, TRec>>,
  clock: Clock,
  seq: u64,
}

impl<TOnce, TRec: Clone> Poller<TOnce, TRec> {
  pub fn new(mode: ClockMode) -> Self {
    Self { timers: BinaryHeap::new(), clock: Clock::new(mode), seq: 0 }
  }

  /// Time elapsed since the poller was created, or the manual clock reading
  pub fn now(&self) -> Duration { self.clock.now() }

  fn push(&mut self, expires: Duration, kind: TimerKind<TOnce, TRec>) {
    let seq = self.seq;
    self.seq += 1;
    self.timers.push(Timer { expires, seq, kind })
  }

  /// Set a single-fire timer. Deadlines past the end of representable time
  /// saturate.
  pub fn set_timeout(&mut self, delay: Duration, data: TOnce) -> TimerHandle<TOnce> {
    let data_cell = DeleteCell::new(data);
    self.push(self.now().saturating_add(delay), TimerKind::Once(data_cell.clone()));
    TimerHandle(data_cell)
  }

  /// Set a recurring timer
  pub fn set_interval(&mut self, period: Duration, data: TRec) -> TimerHandle<TRec> {
    let data_cell = DeleteCell::new(data);
    let kind = TimerKind::Recurring { period, data_cell: data_cell.clone() };
    self.push(self.now().saturating_add(period), kind);
    TimerHandle(data_cell)
  }

  /// Discard cancelled timers from the top of the heap
  fn drop_cancelled(&mut self) {
    while self.timers.peek().is_some_and(|t| !t.kind.is_live()) {
      self.timers.pop();
    }
  }

  /// Deadline of the most urgent live timer
  pub fn next_deadline(&mut self) -> Option<Duration> {
    self.drop_cancelled();
    self.timers.peek().map(|t| t.expires)
  }

  /// Process a timer popped from the heap. Returns [None] if the timer had
  /// been cancelled.
  fn process_next_timer(
    &mut self,
    Timer { expires, kind, .. }: Timer<TOnce, TRec>,
  ) -> Option<PollEvent<TOnce, TRec>> {
    Some(match kind {
      TimerKind::Once(data) => PollEvent::Once(data.take()?),
      TimerKind::Recurring { period, data_cell } => {
        let data = data_cell.clone_out()?;
        // a tick past the end of representable time never comes
        if let Some(next) = expires.checked_add(period) {
          self.push(next, TimerKind::Recurring { period, data_cell });
        }
        PollEvent::Recurring(data)
      },
    })
  }

  /// Pop the most urgent timer if its deadline is not after `t`. A manual
  /// clock is moved forward to the deadline of the returned timer.
  pub fn poll_until(&mut self, t: Duration) -> Option<PollEvent<TOnce, TRec>> {
    loop {
      let expires = self.next_deadline().filter(|expires| *expires <= t)?;
      self.clock.wait_until(expires);
      let timer = self.timers.pop()?;
      if let Some(ev) = self.process_next_timer(timer) {
        return Some(ev);
      }
    }
  }

  /// Wait for the most urgent timer and pop it. Returns [None] if there are
  /// no live timers left.
  pub fn run(&mut self) -> Option<PollEvent<TOnce, TRec>> {
    let expires = self.next_deadline()?;
    self.clock.wait_until(expires);
    self.poll_until(expires)
  }

  /// Move the clock forward to `t`. Waits on a realtime clock.
  pub fn advance_to(&mut self, t: Duration) { self.clock.wait_until(t) }
}
