use std::sync::atomic::{AtomicU64, Ordering};

/// Time source, injectable for tests
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_ms(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Issues order nonces that track wall-clock milliseconds but are guaranteed
/// strictly increasing, even when the clock stalls or regresses or when two
/// signals arrive in the same millisecond. The venue rejects any nonce that is
/// not greater than the last one it saw for the account.
pub struct NonceSource<C: Clock = SystemClock> {
    last: AtomicU64,
    clock: C,
}

impl NonceSource<SystemClock> {
    pub fn wall_clock() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> NonceSource<C> {
    pub fn new(clock: C) -> Self {
        let now = clock.now_ms();
        Self {
            last: AtomicU64::new(now),
            clock,
        }
    }

    /// Next nonce: `max(last + 1, now_ms)`, via CAS so concurrent callers
    /// never receive duplicates
    pub fn next(&self) -> u64 {
        let target = self.clock.now_ms();

        loop {
            let current = self.last.load(Ordering::Acquire);
            let next_val = current.saturating_add(1).max(target);

            match self.last.compare_exchange_weak(
                current,
                next_val,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next_val,
                Err(_) => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    struct FixedClock {
        time_ms: AtomicU64,
    }

    impl FixedClock {
        fn new(initial_ms: u64) -> Self {
            Self {
                time_ms: AtomicU64::new(initial_ms),
            }
        }

        fn set(&self, time_ms: u64) {
            self.time_ms.store(time_ms, Ordering::Release);
        }
    }

    impl Clock for FixedClock {
        fn now_ms(&self) -> u64 {
            self.time_ms.load(Ordering::Acquire)
        }
    }

    impl Clock for Arc<FixedClock> {
        fn now_ms(&self) -> u64 {
            self.time_ms.load(Ordering::Acquire)
        }
    }

    const BASE_MS: u64 = 1_700_000_000_000;

    #[test]
    fn test_strictly_increasing() {
        let source = NonceSource::new(FixedClock::new(BASE_MS));

        let mut prev = 0u64;
        for _ in 0..1000 {
            let nonce = source.next();
            assert!(nonce > prev, "nonce must be strictly increasing");
            prev = nonce;
        }
    }

    #[test]
    fn test_tracks_wall_clock() {
        let clock = Arc::new(FixedClock::new(BASE_MS));
        let source = NonceSource::new(Arc::clone(&clock));

        assert!(source.next() > BASE_MS);

        clock.set(BASE_MS + 60_000);
        assert!(source.next() >= BASE_MS + 60_000);
    }

    #[test]
    fn test_clock_regression_never_decreases() {
        let clock = Arc::new(FixedClock::new(BASE_MS));
        let source = NonceSource::new(Arc::clone(&clock));

        let n1 = source.next();
        clock.set(BASE_MS - 10_000);
        let n2 = source.next();
        let n3 = source.next();

        assert!(n2 > n1);
        assert!(n3 > n2);
    }

    #[test]
    fn test_concurrent_no_duplicates() {
        let clock = Arc::new(FixedClock::new(BASE_MS));
        let source = Arc::new(NonceSource::new(Arc::clone(&clock)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let source = Arc::clone(&source);
                thread::spawn(move || (0..500).map(|_| source.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        all.sort_unstable();
        let before = all.len();
        all.dedup();
        assert_eq!(all.len(), before, "all nonces must be unique");
    }
}
