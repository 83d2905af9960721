//! The timer primitives of the environment timers are intercepted from.
//!
//! A [Host] hands out opaque [TimerId]s and offers no way to enumerate the
//! timers behind them. [EventLoop] is the host shipped with this crate, but
//! anything that can run delayed and periodic callbacks on the current thread
//! can implement the trait.

mod delete_cell;
pub mod event_loop;
mod poller;

use std::fmt;
use std::time::Duration;

pub use event_loop::{ClockMode, EventLoop};

/// A callback that runs at most once
pub type OnceTask = Box<dyn FnOnce()>;
/// A callback that runs on every tick of a repeating timer
pub type RepeatTask = Box<dyn FnMut()>;

/// Opaque handle assigned by a [Host] to a scheduled timer. Hosts may reuse a
/// handle once the timer it referred to has fired or been cleared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// The four timer primitives of a scheduling environment.
///
/// All methods take `&self` because callbacks run by the host are free to
/// schedule and clear timers on the same host.
pub trait Host {
  /// Run `task` once after `delay`
  fn set_timeout(&self, delay: Duration, task: OnceTask) -> TimerId;
  /// Run `task` every `period` until cleared
  fn set_interval(&self, period: Duration, task: RepeatTask) -> TimerId;
  /// Stop a timer created by [Host::set_timeout]. Unknown ids are ignored.
  fn clear_timeout(&self, id: TimerId);
  /// Stop a timer created by [Host::set_interval]. Unknown ids are ignored.
  fn clear_interval(&self, id: TimerId);
}

impl<H: Host + ?Sized> Host for std::rc::Rc<H> {
  fn set_timeout(&self, delay: Duration, task: OnceTask) -> TimerId {
    (**self).set_timeout(delay, task)
  }
  fn set_interval(&self, period: Duration, task: RepeatTask) -> TimerId {
    (**self).set_interval(period, task)
  }
  fn clear_timeout(&self, id: TimerId) { (**self).clear_timeout(id) }
  fn clear_interval(&self, id: TimerId) { (**self).clear_interval(id) }
}
