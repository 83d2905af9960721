//! Single-threaded [Host] whose timers fire when the owner turns the loop

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use hashbrown::HashMap;
use tracing::trace;

pub use super::poller::ClockMode;
use super::poller::{PollEvent, Poller, TimerHandle};
use super::{Host, OnceTask, RepeatTask, TimerId};

/// Shortest period an interval can have. Shorter periods, zero included, are
/// rounded up so a repeating timer cannot starve the loop.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

struct OnceEntry {
  id: TimerId,
  task: OnceTask,
}

#[derive(Clone)]
struct RecurringEntry {
  id: TimerId,
  task: Rc<RefCell<RepeatTask>>,
}

enum Slot {
  Once(TimerHandle<OnceEntry>),
  Recurring(TimerHandle<RecurringEntry>),
}
impl Slot {
  fn cancel(self) {
    match self {
      Self::Once(h) => h.cancel(),
      Self::Recurring(h) => h.cancel(),
    }
  }
}

struct LoopState {
  poller: Poller<OnceEntry, RecurringEntry>,
  slots: HashMap<TimerId, Slot>,
  next_id: u64,
}
impl LoopState {
  fn alloc_id(&mut self) -> TimerId {
    self.next_id += 1;
    TimerId(self.next_id)
  }
}

/// A timer host driven explicitly by its owner through [EventLoop::run_once],
/// [EventLoop::poll], [EventLoop::advance] and [EventLoop::run_until_idle].
///
/// Handles are cheap to clone and all refer to the same loop. Ids count up
/// from 1 and are never reused. Either clear function stops either kind of
/// timer, the same leniency browsers show.
#[derive(Clone)]
pub struct EventLoop(Rc<RefCell<LoopState>>);

impl EventLoop {
  /// Create a loop measuring time with the wall clock
  #[must_use]
  pub fn new() -> Self { Self::with_clock(ClockMode::default()) }

  /// Create a loop with the given clock
  #[must_use]
  pub fn with_clock(mode: ClockMode) -> Self {
    Self(Rc::new(RefCell::new(LoopState {
      poller: Poller::new(mode),
      slots: HashMap::new(),
      next_id: 0,
    })))
  }

  /// Time elapsed on the loop's clock since it was created
  pub fn now(&self) -> Duration { self.0.borrow().poller.now() }

  /// Number of timers that are scheduled and not yet finished
  pub fn pending(&self) -> usize { self.0.borrow().slots.len() }

  /// Whether no timer is left to fire
  pub fn is_idle(&self) -> bool { self.pending() == 0 }

  fn dispatch(&self, ev: PollEvent<OnceEntry, RecurringEntry>) {
    match ev {
      PollEvent::Once(OnceEntry { id, task }) => {
        self.0.borrow_mut().slots.remove(&id);
        trace!(%id, "timeout fired");
        task()
      },
      PollEvent::Recurring(RecurringEntry { id, task }) => {
        trace!(%id, "interval ticked");
        // an interval that turns the loop from its own callback misses the
        // nested tick
        if let Ok(mut task) = task.try_borrow_mut() {
          (*task)()
        }
      },
    }
  }

  /// Fire the next timer, waiting for its deadline if necessary. Returns
  /// false if there is nothing left to wait for.
  pub fn run_once(&self) -> bool {
    let ev = self.0.borrow_mut().poller.run();
    match ev {
      Some(ev) => {
        self.dispatch(ev);
        true
      },
      None => false,
    }
  }

  fn fire_until(&self, t: Duration) -> usize {
    let mut fired = 0;
    loop {
      let ev = self.0.borrow_mut().poller.poll_until(t);
      let Some(ev) = ev else { return fired };
      self.dispatch(ev);
      fired += 1;
    }
  }

  /// Fire every timer that is already due without waiting. Returns the
  /// number of callbacks run.
  pub fn poll(&self) -> usize { self.fire_until(self.now()) }

  /// Let `by` elapse on the loop's clock, firing every timer that falls due
  /// in deadline order. Returns the number of callbacks run.
  pub fn advance(&self, by: Duration) -> usize {
    let target = self.now().saturating_add(by);
    let fired = self.fire_until(target);
    self.0.borrow_mut().poller.advance_to(target);
    fired
  }

  /// Call [EventLoop::run_once] until the loop is idle or `limit` callbacks
  /// have run. Intervals keep the loop busy forever, hence the limit.
  pub fn run_until_idle(&self, limit: usize) -> usize {
    let mut fired = 0;
    while fired < limit && self.run_once() {
      fired += 1;
    }
    fired
  }

  fn clear(&self, id: TimerId) {
    let slot = self.0.borrow_mut().slots.remove(&id);
    if let Some(slot) = slot {
      slot.cancel()
    }
  }
}

impl Default for EventLoop {
  fn default() -> Self { Self::new() }
}

impl Host for EventLoop {
  fn set_timeout(&self, delay: Duration, task: OnceTask) -> TimerId {
    let mut state = self.0.borrow_mut();
    let id = state.alloc_id();
    let handle = state.poller.set_timeout(delay, OnceEntry { id, task });
    state.slots.insert(id, Slot::Once(handle));
    id
  }

  fn set_interval(&self, period: Duration, task: RepeatTask) -> TimerId {
    let mut state = self.0.borrow_mut();
    let id = state.alloc_id();
    let entry = RecurringEntry { id, task: Rc::new(RefCell::new(task)) };
    let handle = state.poller.set_interval(period.max(MIN_PERIOD), entry);
    state.slots.insert(id, Slot::Recurring(handle));
    id
  }

  fn clear_timeout(&self, id: TimerId) { self.clear(id) }
  fn clear_interval(&self, id: TimerId) { self.clear(id) }
}

#[cfg(test)]
mod test {
  use std::cell::RefCell;
  use std::rc::Rc;
  use std::time::Duration;

  use super::{ClockMode, EventLoop};
  use crate::host::{Host, TimerId};

  fn ms(n: u64) -> Duration { Duration::from_millis(n) }

  fn log() -> Rc<RefCell<Vec<&'static str>>> { Rc::default() }

  #[test]
  fn timeouts_fire_once_in_order() {
    let ev = EventLoop::with_clock(ClockMode::Manual);
    let seen = log();
    for (name, delay) in [("b", 20), ("a", 10), ("c", 30)] {
      let seen = seen.clone();
      ev.set_timeout(ms(delay), Box::new(move || seen.borrow_mut().push(name)));
    }
    assert_eq!(ev.pending(), 3);
    assert_eq!(ev.run_until_idle(10), 3);
    assert_eq!(*seen.borrow(), ["a", "b", "c"]);
    assert!(ev.is_idle());
    assert_eq!(ev.now(), ms(30));
  }

  #[test]
  fn either_clear_stops_either_kind() {
    let ev = EventLoop::with_clock(ClockMode::Manual);
    let seen = log();
    let s1 = seen.clone();
    let t = ev.set_timeout(ms(5), Box::new(move || s1.borrow_mut().push("timeout")));
    let s2 = seen.clone();
    let i = ev.set_interval(ms(5), Box::new(move || s2.borrow_mut().push("interval")));
    ev.clear_interval(t);
    ev.clear_timeout(i);
    assert!(ev.is_idle());
    assert_eq!(ev.advance(ms(50)), 0);
    assert!(seen.borrow().is_empty());
    // unknown and repeated clears are ignored
    ev.clear_timeout(t);
    ev.clear_interval(TimerId(999));
  }

  #[test]
  fn advance_runs_intervals_repeatedly() {
    let ev = EventLoop::with_clock(ClockMode::Manual);
    let ticks = Rc::new(RefCell::new(0));
    let t2 = ticks.clone();
    let id = ev.set_interval(ms(10), Box::new(move || *t2.borrow_mut() += 1));
    assert_eq!(ev.advance(ms(35)), 3);
    assert_eq!(*ticks.borrow(), 3);
    assert_eq!(ev.now(), ms(35));
    assert_eq!(ev.pending(), 1);
    ev.clear_interval(id);
    assert_eq!(ev.advance(ms(100)), 0);
  }

  #[test]
  fn zero_period_interval_is_clamped() {
    let ev = EventLoop::with_clock(ClockMode::Manual);
    ev.set_interval(Duration::ZERO, Box::new(|| ()));
    assert_eq!(ev.advance(ms(3)), 3);
  }

  #[test]
  fn callbacks_may_schedule_and_clear() {
    let ev = EventLoop::with_clock(ClockMode::Manual);
    let seen = log();
    let (ev2, s2) = (ev.clone(), seen.clone());
    ev.set_timeout(
      ms(1),
      Box::new(move || {
        let s3 = s2.clone();
        ev2.set_timeout(ms(1), Box::new(move || s3.borrow_mut().push("nested")));
        s2.borrow_mut().push("outer");
      }),
    );
    assert_eq!(ev.run_until_idle(10), 2);
    assert_eq!(*seen.borrow(), ["outer", "nested"]);
  }

  #[test]
  fn realtime_clock_waits_for_deadline() {
    let ev = EventLoop::new();
    let fired = Rc::new(RefCell::new(false));
    let f2 = fired.clone();
    ev.set_timeout(ms(2), Box::new(move || *f2.borrow_mut() = true));
    assert!(ev.run_once());
    assert!(*fired.borrow());
    assert!(ev.now() >= ms(2));
  }

  #[test]
  fn huge_delays_never_fire() {
    let ev = EventLoop::with_clock(ClockMode::Manual);
    ev.advance(ms(1));
    let fired = Rc::new(RefCell::new(0));
    let f2 = fired.clone();
    ev.set_timeout(Duration::MAX, Box::new(move || *f2.borrow_mut() += 1));
    let f3 = fired.clone();
    let period = Duration::MAX / 2 + Duration::from_secs(1);
    ev.set_interval(period, Box::new(move || *f3.borrow_mut() += 10));
    assert_eq!(ev.advance(Duration::from_secs(3600)), 0);
    assert!(ev.run_once());
    assert_eq!(*fired.borrow(), 10);
    assert_eq!(ev.pending(), 2);
    // saturates instead of overflowing; the timeout fires at the very end
    assert_eq!(ev.advance(Duration::MAX), 1);
    assert_eq!(*fired.borrow(), 11);
    assert_eq!(ev.now(), Duration::MAX);
  }
}
