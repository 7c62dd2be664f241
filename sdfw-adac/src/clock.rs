//! Time source for the polling loops.

use std::time::{Duration, Instant};

/// Provides the current time and a way to wait.
///
/// The mailbox polls status registers in bounded busy-wait loops. Going through this
/// trait lets tests run those loops against virtual time.
pub trait Clock {
    /// The current point in time.
    fn now(&self) -> Instant;

    /// Suspend the caller for `duration`.
    fn sleep(&self, duration: Duration);
}

/// The wall clock, backed by [`Instant::now`] and [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StdClock;

impl Clock for StdClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

#[cfg(any(test, feature = "test"))]
pub use fake::FakeClock;

#[cfg(any(test, feature = "test"))]
mod fake {
    use std::{
        cell::Cell,
        time::{Duration, Instant},
    };

    use super::Clock;

    /// A clock that only moves when somebody sleeps on it.
    #[derive(Debug)]
    pub struct FakeClock {
        origin: Instant,
        elapsed: Cell<Duration>,
        sleeps: Cell<usize>,
    }

    impl FakeClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                elapsed: Cell::new(Duration::ZERO),
                sleeps: Cell::new(0),
            }
        }

        /// Virtual time that passed since the clock was created.
        pub fn elapsed(&self) -> Duration {
            self.elapsed.get()
        }

        /// Number of times `sleep` was called.
        pub fn sleeps(&self) -> usize {
            self.sleeps.get()
        }
    }

    impl Default for FakeClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            self.origin + self.elapsed.get()
        }

        fn sleep(&self, duration: Duration) {
            self.elapsed.set(self.elapsed.get() + duration);
            self.sleeps.set(self.sleeps.get() + 1);
        }
    }
}
