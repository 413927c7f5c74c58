//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Failed reconciliation pass:
//!     → backoff.rs (delay the listener's next pass, exponential + jitter)
//!     → next tick after the delay retries the whole pass
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every registry call has a deadline
//! - Retries happen per pass in the control loop, never per registry call
//! - Jittered backoff prevents thundering herd against a recovering registry

pub mod backoff;
