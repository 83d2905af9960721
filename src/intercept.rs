//! Wrappers around the timer primitives of a [Host] that keep a [Registry] of
//! every outstanding timer.
//!
//! Timers created or cleared through the host directly are invisible to the
//! interceptor. The registry then goes stale: it may list timers that no
//! longer exist or miss ones that do. This is not detected or repaired.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use hashbrown::HashMap;
use tracing::{debug, trace};
use trait_set::trait_set;

use crate::host::{Host, TimerId};
use crate::record::{label_of, TimerKind, TimerRecord};
use crate::registry::Registry;

trait_set! {
  /// Callback of a one-shot timer. It receives the arguments given when the
  /// timer was scheduled.
  pub trait TimeoutFn<A> = FnOnce(A) + 'static;
  /// Callback of a repeating timer. It receives a copy of the arguments given
  /// when the timer was scheduled on every tick.
  pub trait IntervalFn<A> = FnMut(A) + 'static;
}

#[derive(Default)]
struct Tracking {
  registry: Registry,
  /// one-shot timer -> the timer that evicts its record
  evictions: HashMap<TimerId, TimerId>,
}

/// Called by the host once a one-shot timer has had its chance to fire
fn evict(tracking: &Weak<RefCell<Tracking>>, id: TimerId) {
  let Some(tracking) = tracking.upgrade() else { return };
  let mut tracking = tracking.borrow_mut();
  tracking.evictions.remove(&id);
  if tracking.registry.remove_by_id(id).is_some() {
    trace!(%id, "timeout retired");
  }
}

/// Schedules timers on a [Host] while keeping track of them, so they can be
/// listed and cleared in bulk.
///
/// Scheduling returns exactly the id the host returned, so the interceptor
/// can stand in for the host wherever its ids are passed around. Clones share
/// the same registry.
#[derive(Clone)]
pub struct Interceptor {
  host: Rc<dyn Host>,
  tracking: Rc<RefCell<Tracking>>,
}

impl Interceptor {
  /// Start tracking the timers scheduled on `host` through this object
  pub fn new(host: impl Host + 'static) -> Self {
    Self { host: Rc::new(host), tracking: Rc::default() }
  }

  /// The underlying primitives. Timers scheduled or cleared through this
  /// bypass the registry.
  pub fn host(&self) -> &dyn Host { &*self.host }

  /// Schedule timers under an explicit label instead of the one derived from
  /// the callback
  pub fn named(&self, label: impl Into<String>) -> Named<'_> {
    Named { layer: self, label: label.into() }
  }

  /// Run `callback` once after `delay`
  pub fn set_timeout(&self, callback: impl FnOnce() + 'static, delay: Duration) -> TimerId {
    self.named(label_of(&callback)).set_timeout(callback, delay)
  }

  /// Run `callback` with `args` once after `delay`
  pub fn set_timeout_with<A: 'static>(
    &self,
    callback: impl TimeoutFn<A>,
    delay: Duration,
    args: A,
  ) -> TimerId {
    self.named(label_of(&callback)).set_timeout_with(callback, delay, args)
  }

  /// Run `callback` every `period` until cleared
  pub fn set_interval(&self, callback: impl FnMut() + 'static, period: Duration) -> TimerId {
    self.named(label_of(&callback)).set_interval(callback, period)
  }

  /// Run `callback` with a copy of `args` every `period` until cleared
  pub fn set_interval_with<A: Clone + 'static>(
    &self,
    callback: impl IntervalFn<A>,
    period: Duration,
    args: A,
  ) -> TimerId {
    self.named(label_of(&callback)).set_interval_with(callback, period, args)
  }

  fn register(&self, record: TimerRecord) {
    debug!(
      id = %record.id(),
      kind = %record.kind(),
      delay_ms = record.delay().as_millis(),
      label = record.label(),
      "timer scheduled"
    );
    self.tracking.borrow_mut().registry.add(record)
  }

  /// Stop the timer with the given id if it is tracked, using the host
  /// primitive that matches the kind it was created with. Returns whether the
  /// timer was tracked.
  pub fn clear_timer(&self, id: TimerId) -> bool {
    let (record, shadow) = {
      let mut tracking = self.tracking.borrow_mut();
      let Some(record) = tracking.registry.remove_by_id(id) else { return false };
      (record, tracking.evictions.remove(&id))
    };
    match record.kind() {
      TimerKind::Timeout => self.host.clear_timeout(id),
      TimerKind::Interval => self.host.clear_interval(id),
    }
    if let Some(shadow) = shadow {
      self.host.clear_timeout(shadow)
    }
    debug!(%id, kind = %record.kind(), "timer cleared");
    true
  }

  /// Stop a timer. Untracked ids are still passed on to the host.
  pub fn clear_timeout(&self, id: TimerId) {
    if !self.clear_timer(id) {
      trace!(%id, "clearing untracked timeout");
      self.host.clear_timeout(id)
    }
  }

  /// Stop a timer. Untracked ids are still passed on to the host.
  pub fn clear_interval(&self, id: TimerId) {
    if !self.clear_timer(id) {
      trace!(%id, "clearing untracked interval");
      self.host.clear_interval(id)
    }
  }

  /// Stop every tracked timer of the given kind, or all of them. Returns how
  /// many timers were listed when the call started.
  pub fn clear_all(&self, filter: Option<TimerKind>) -> usize {
    let snapshot = self.tracking.borrow().registry.all(filter);
    for record in &snapshot {
      self.clear_timer(record.id());
    }
    debug!(count = snapshot.len(), "cleared timers in bulk");
    snapshot.len()
  }

  /// Outstanding timers of the given kind, or all of them, oldest first
  pub fn timers(&self, filter: Option<TimerKind>) -> Vec<TimerRecord> {
    self.tracking.borrow().registry.all(filter)
  }

  /// Number of outstanding timers of the given kind, or all of them
  pub fn count(&self, filter: Option<TimerKind>) -> usize {
    self.tracking.borrow().registry.count(filter)
  }

  /// The record of an outstanding timer
  pub fn find(&self, id: TimerId) -> Option<TimerRecord> {
    self.tracking.borrow().registry.find_by_id(id).cloned()
  }
}

impl fmt::Display for Interceptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.tracking.borrow().registry)
  }
}

/// Scheduling with an explicit label, see [Interceptor::named]
pub struct Named<'a> {
  layer: &'a Interceptor,
  label: String,
}

impl<'a> Named<'a> {
  /// Run `callback` once after `delay`
  pub fn set_timeout(self, callback: impl FnOnce() + 'static, delay: Duration) -> TimerId {
    self.set_timeout_with(move |()| callback(), delay, ())
  }

  /// Run `callback` with `args` once after `delay`. The record is evicted by a
  /// second host timer with the same delay, scheduled right after the first so
  /// that it fires after it.
  pub fn set_timeout_with<A: 'static>(
    self,
    callback: impl TimeoutFn<A>,
    delay: Duration,
    args: A,
  ) -> TimerId {
    let Self { layer, label } = self;
    let id = layer.host.set_timeout(delay, Box::new(move || callback(args)));
    layer.register(TimerRecord::new(id, TimerKind::Timeout, label, delay));
    let tracking = Rc::downgrade(&layer.tracking);
    let shadow = layer.host.set_timeout(delay, Box::new(move || evict(&tracking, id)));
    let mut tracking = layer.tracking.borrow_mut();
    // a host that runs due tasks synchronously has already evicted the record
    if tracking.registry.find_by_id(id).is_some() {
      tracking.evictions.insert(id, shadow);
    }
    id
  }

  /// Run `callback` every `period` until cleared
  pub fn set_interval(self, mut callback: impl FnMut() + 'static, period: Duration) -> TimerId {
    self.set_interval_with(move |()| callback(), period, ())
  }

  /// Run `callback` with a copy of `args` every `period` until cleared
  pub fn set_interval_with<A: Clone + 'static>(
    self,
    mut callback: impl IntervalFn<A>,
    period: Duration,
    args: A,
  ) -> TimerId {
    let Self { layer, label } = self;
    let id = layer.host.set_interval(period, Box::new(move || callback(args.clone())));
    layer.register(TimerRecord::new(id, TimerKind::Interval, label, period));
    id
  }
}
