//! Wall clock and an interruptible sleeper.

use crate::ports::clock_port::{Clock, Sleeper};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const SLICE: Duration = Duration::from_millis(200);

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Sleeps in short slices, waking early once `shutdown` is set.
pub struct ThreadSleeper {
    shutdown: Arc<AtomicBool>,
}

impl ThreadSleeper {
    pub fn new(shutdown: Arc<AtomicBool>) -> Self {
        Self { shutdown }
    }
}

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(SLICE.min(deadline - now));
        }
    }
}

/// Never waits; only reports whether shutdown has been requested. Used
/// when replaying history, where one cycle is one bar.
pub struct ImmediateSleeper {
    shutdown: Arc<AtomicBool>,
}

impl ImmediateSleeper {
    pub fn new(shutdown: Arc<AtomicBool>) -> Self {
        Self { shutdown }
    }
}

impl Sleeper for ImmediateSleeper {
    fn sleep(&self, _duration: Duration) -> bool {
        !self.shutdown.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleeper_completes_short_sleep() {
        let sleeper = ThreadSleeper::new(Arc::new(AtomicBool::new(false)));
        assert!(sleeper.sleep(Duration::from_millis(5)));
    }

    #[test]
    fn sleeper_returns_early_on_shutdown() {
        let flag = Arc::new(AtomicBool::new(true));
        let sleeper = ThreadSleeper::new(flag);
        let start = Instant::now();
        assert!(!sleeper.sleep(Duration::from_secs(60)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn immediate_sleeper_reports_shutdown() {
        let flag = Arc::new(AtomicBool::new(false));
        let sleeper = ImmediateSleeper::new(flag.clone());
        assert!(sleeper.sleep(Duration::from_secs(3600)));
        flag.store(true, Ordering::SeqCst);
        assert!(!sleeper.sleep(Duration::from_secs(3600)));
    }
}
