//! # Route Scheduler (sr-05)
//!
//! One recurring timer per time-aggregated route.
//!
//! ## Lifecycle
//!
//! ```text
//!            start()                 stop()
//! Stopped ───────────▶ Running ───────────────▶ Stopped
//!                        │  ▲
//!                 tick   │  │ on_tick(route) completes
//!                        ▼  │
//!                     TickHandler
//! ```
//!
//! `stop` is idempotent and no tick fires after it returns. Stopping does
//! not cancel a tick handler that is already running; it only prevents the
//! next one.

pub mod scheduler;

pub use scheduler::{RouteScheduler, SchedulerRegistry, TickHandler, MAX_PERIOD};
