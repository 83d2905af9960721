#![warn(missing_docs)]
//! Timers that can be listed and cleared in bulk.
//!
//! Timer handles handed out by a scheduler are usually opaque: nothing tells
//! you which timers are still waiting to fire. This crate layers an
//! [Interceptor] over the four primitives of a [Host] (schedule once,
//! schedule repeatedly and the two matching clears) and keeps a [Registry] of
//! every outstanding timer in sync with them. One-shot timers leave the
//! registry by themselves once they fire; repeating timers stay until cleared.
//!
//! ```
//! use std::time::Duration;
//! use timerwatch::{global, ClockMode, EventLoop, TimerKind};
//!
//! fn ping() {}
//!
//! let event_loop = EventLoop::with_clock(ClockMode::Manual);
//! global::install(event_loop.clone());
//! global::set_timeout(ping, Duration::ZERO).unwrap();
//! global::set_interval(|| (), Duration::from_millis(10)).unwrap();
//! assert_eq!(global::timers(Some(TimerKind::Timeout))[0].label(), "ping");
//! event_loop.poll();
//! assert_eq!(global::timer_count(None), 1);
//! assert_eq!(global::clear_all_timers(None), 1);
//! ```

pub mod global;
pub mod host;
pub mod intercept;
pub mod record;
pub mod registry;

pub use global::NotInstalled;
pub use host::{ClockMode, EventLoop, Host, TimerId};
pub use intercept::{Interceptor, Named};
pub use record::{TimerKind, TimerRecord, UnknownKind};
pub use registry::Registry;
