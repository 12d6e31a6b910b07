use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock time, in seconds since the Unix epoch.
///
/// One-way samples compare stamps taken on two machines, so they need a
/// shared epoch rather than a monotonic clock.
pub trait WallClock {
    fn now_secs(&self) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_secs(&self) -> f64 {
        // A clock set before 1970 reads as negative time.
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs_f64(),
            Err(before) => -before.duration().as_secs_f64(),
        }
    }
}

impl<C: WallClock + ?Sized> WallClock for &C {
    fn now_secs(&self) -> f64 {
        (**self).now_secs()
    }
}
