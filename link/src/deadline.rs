use std::time::{Duration, Instant};

/// Upper bound used when a timeout is too large to add to the clock
const MAX_WAIT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Monotonic point in time after which a waiting operation gives up.
///
/// Deadlines are plain values: arming one is creating it, and there is
/// nothing to disarm. Nested operations receive the caller's deadline
/// instead of arming their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        let now = Instant::now();
        let at = now
            .checked_add(timeout)
            .or_else(|| now.checked_add(MAX_WAIT))
            .unwrap_or(now);
        Self { at }
    }

    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    /// A deadline that has already passed.
    pub fn expired() -> Self {
        Self { at: Instant::now() }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Sleep for `delay`, cut short at the deadline. Returns `false` when the
    /// deadline has passed on wake-up.
    pub fn sleep(&self, delay: Duration) -> bool {
        let nap = delay.min(self.remaining());
        if !nap.is_zero() {
            std::thread::sleep(nap);
        }
        !self.is_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_is_already_expired() {
        assert!(Deadline::after(Duration::ZERO).is_expired());
        assert!(Deadline::expired().is_expired());
        assert_eq!(Deadline::expired().remaining(), Duration::ZERO);
    }

    #[test]
    fn huge_timeouts_do_not_overflow() {
        let deadline = Deadline::after(Duration::MAX);
        assert!(!deadline.is_expired());
        assert!(deadline.remaining() > Duration::from_secs(3600));
    }

    #[test]
    fn sleep_is_clamped_to_the_deadline() {
        let deadline = Deadline::after(Duration::from_millis(200));
        let started = Instant::now();
        assert!(deadline.sleep(Duration::from_millis(1)));
        assert!(!deadline.sleep(Duration::from_secs(5)));
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
