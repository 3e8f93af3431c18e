//! Time and sleeping, injected so the loop can be driven without real delays.

use chrono::{DateTime, Utc};
use std::time::Duration;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

pub trait Sleeper {
    /// Block for up to `duration`. Returns early (false) when shutdown has
    /// been requested, true when the full duration elapsed.
    fn sleep(&self, duration: Duration) -> bool;
}
