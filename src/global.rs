//! The interceptor the program schedules its timers through.
//!
//! Install it once at startup over the host that runs the program's timers,
//! then use the free functions of this module in place of the host's
//! primitives. The host, the interceptor and every timer callback live on the
//! one thread that drives the host, so the installed layer is stored per
//! thread; for that thread it is the process-wide state.

use std::cell::RefCell;
use std::error::Error;
use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::host::{Host, TimerId};
use crate::intercept::{Interceptor, IntervalFn, TimeoutFn};
use crate::record::{TimerKind, TimerRecord};

thread_local! {
  static LAYER: RefCell<Option<Interceptor>> = const { RefCell::new(None) };
}

/// Error returned when scheduling before [install] was called
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NotInstalled;
impl fmt::Display for NotInstalled {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "No timer interceptor is installed on this thread")
  }
}
impl Error for NotInstalled {}

/// Install an interceptor over `host`. If one is already installed this does
/// nothing and returns false, so timers are never tracked twice.
pub fn install(host: impl Host + 'static) -> bool {
  LAYER.with(|layer| {
    let mut layer = layer.borrow_mut();
    if layer.is_some() {
      debug!("timer interceptor already installed");
      return false;
    }
    *layer = Some(Interceptor::new(host));
    debug!("timer interceptor installed");
    true
  })
}

/// Whether [install] has been called
pub fn is_installed() -> bool { LAYER.with(|layer| layer.borrow().is_some()) }

/// Remove the installed interceptor and return it. Timers it scheduled keep
/// running on the host, but can no longer be listed through this module.
pub fn uninstall() -> Option<Interceptor> { LAYER.with(|layer| layer.borrow_mut().take()) }

/// The installed interceptor
pub fn current() -> Option<Interceptor> { LAYER.with(|layer| layer.borrow().clone()) }

fn installed() -> Result<Interceptor, NotInstalled> { current().ok_or(NotInstalled) }

/// Run `callback` once after `delay`
pub fn set_timeout(
  callback: impl FnOnce() + 'static,
  delay: Duration,
) -> Result<TimerId, NotInstalled> {
  Ok(installed()?.set_timeout(callback, delay))
}

/// Run `callback` with `args` once after `delay`
pub fn set_timeout_with<A: 'static>(
  callback: impl TimeoutFn<A>,
  delay: Duration,
  args: A,
) -> Result<TimerId, NotInstalled> {
  Ok(installed()?.set_timeout_with(callback, delay, args))
}

/// Run `callback` every `period` until cleared
pub fn set_interval(
  callback: impl FnMut() + 'static,
  period: Duration,
) -> Result<TimerId, NotInstalled> {
  Ok(installed()?.set_interval(callback, period))
}

/// Run `callback` with a copy of `args` every `period` until cleared
pub fn set_interval_with<A: Clone + 'static>(
  callback: impl IntervalFn<A>,
  period: Duration,
  args: A,
) -> Result<TimerId, NotInstalled> {
  Ok(installed()?.set_interval_with(callback, period, args))
}

/// Stop a timer. Does nothing if the id is unknown or nothing is installed.
pub fn clear_timeout(id: TimerId) {
  if let Some(layer) = current() {
    layer.clear_timeout(id)
  }
}

/// Stop a timer. Does nothing if the id is unknown or nothing is installed.
pub fn clear_interval(id: TimerId) {
  if let Some(layer) = current() {
    layer.clear_interval(id)
  }
}

/// Stop a tracked timer of either kind. Returns whether it was tracked.
pub fn clear_timer(id: TimerId) -> bool { current().is_some_and(|layer| layer.clear_timer(id)) }

/// Stop every tracked timer of the given kind, or all of them, and return how
/// many there were
pub fn clear_all_timers(filter: Option<TimerKind>) -> usize {
  current().map_or(0, |layer| layer.clear_all(filter))
}

/// Outstanding timers of the given kind, or all of them, oldest first
pub fn timers(filter: Option<TimerKind>) -> Vec<TimerRecord> {
  current().map(|layer| layer.timers(filter)).unwrap_or_default()
}

/// Number of outstanding timers of the given kind, or all of them
pub fn timer_count(filter: Option<TimerKind>) -> usize {
  current().map_or(0, |layer| layer.count(filter))
}

#[cfg(test)]
mod test {
  use std::time::Duration;

  use super::{
    clear_all_timers, clear_interval, clear_timeout, clear_timer, install, is_installed,
    set_interval, set_timeout, set_timeout_with, timer_count, timers, uninstall, NotInstalled,
  };
  use crate::host::{ClockMode, EventLoop, TimerId};
  use crate::record::TimerKind;

  fn ping() {}

  // every test runs on its own thread, so each starts with nothing installed

  #[test]
  fn nothing_installed() {
    assert!(!is_installed());
    assert_eq!(set_timeout(ping, Duration::ZERO), Err(NotInstalled));
    clear_timeout(TimerId(1));
    clear_interval(TimerId(1));
    assert!(!clear_timer(TimerId(1)));
    assert_eq!(clear_all_timers(None), 0);
    assert!(timers(None).is_empty());
  }

  #[test]
  fn second_install_is_ignored() {
    let ev = EventLoop::with_clock(ClockMode::Manual);
    assert!(install(ev.clone()));
    assert!(!install(ev.clone()));
    assert!(is_installed());
    set_timeout(ping, Duration::from_millis(3)).expect("installed");
    assert_eq!(timer_count(None), 1);
    // one timer and the eviction timer behind it, nothing more
    assert_eq!(ev.pending(), 2);
  }

  #[test]
  fn ping_scenario() {
    let ev = EventLoop::with_clock(ClockMode::Manual);
    install(ev.clone());
    set_timeout(ping, Duration::ZERO).expect("installed");
    let listed = timers(None);
    assert_eq!(listed.len(), 1);
    assert_eq!((listed[0].kind(), listed[0].label()), (TimerKind::Timeout, "ping"));
    assert_eq!(listed[0].delay(), Duration::ZERO);
    ev.poll();
    assert!(timers(None).is_empty());
  }

  #[test]
  fn bulk_clear_by_kind() {
    let ev = EventLoop::with_clock(ClockMode::Manual);
    install(ev.clone());
    let sum = std::rc::Rc::new(std::cell::Cell::new(0));
    let s2 = sum.clone();
    set_timeout_with(move |n: i32| s2.set(s2.get() + n), Duration::from_millis(30), 5)
      .expect("installed");
    for period in [10, 20] {
      set_interval(|| (), Duration::from_millis(period)).expect("installed");
    }
    assert_eq!(clear_all_timers(Some(TimerKind::Interval)), 2);
    assert_eq!(timer_count(Some(TimerKind::Interval)), 0);
    assert_eq!(timer_count(Some(TimerKind::Timeout)), 1);
    assert_eq!(ev.advance(Duration::from_millis(40)), 2);
    assert_eq!(sum.get(), 5);
    assert_eq!(timer_count(None), 0);
  }

  #[test]
  fn uninstall_resets() {
    let ev = EventLoop::with_clock(ClockMode::Manual);
    install(ev.clone());
    set_interval(ping, Duration::from_millis(1)).expect("installed");
    let layer = uninstall().expect("was installed");
    assert!(!is_installed());
    assert!(timers(None).is_empty());
    assert_eq!(layer.count(None), 1);
    assert!(install(EventLoop::with_clock(ClockMode::Manual)));
    assert_eq!(timer_count(None), 0);
  }
}
