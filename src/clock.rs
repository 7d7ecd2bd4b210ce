use embassy_time::{Duration, Instant};

/// Monotonic time source used for every bounded wait on the link.
///
/// `pause` is the only way the poll loop yields; on hardware it busy-waits,
/// in tests it advances simulated time.
pub trait Clock {
    fn now(&self) -> Instant;
    fn pause(&mut self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &mut C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn pause(&mut self, duration: Duration) {
        (**self).pause(duration)
    }
}

#[cfg(feature = "std")]
pub use self::std_clock::StdClock;

#[cfg(feature = "std")]
mod std_clock {
    use super::{Clock, Duration, Instant};

    /// Wall clock for hosted builds, anchored at construction.
    #[derive(Clone, Copy, Debug)]
    pub struct StdClock {
        origin: std::time::Instant,
    }

    impl StdClock {
        pub fn new() -> Self {
            Self {
                origin: std::time::Instant::now(),
            }
        }
    }

    impl Default for StdClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for StdClock {
        fn now(&self) -> Instant {
            let elapsed = self.origin.elapsed();
            Instant::from_micros(elapsed.as_micros() as u64)
        }

        fn pause(&mut self, duration: Duration) {
            std::thread::sleep(std::time::Duration::from_micros(duration.as_micros()));
        }
    }

}
