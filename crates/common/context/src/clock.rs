use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use weisyn_types::timestamp::ClockTimestamp;

/// Logical clock private to one execution context.
///
/// Timestamps advance by a fixed tick per `now()` call from a configured
/// base, so the sequence is monotonically increasing and deterministic with
/// respect to call order. The wall clock is never consulted.
#[derive(Debug)]
pub struct DeterministicClock {
    execution_start: ClockTimestamp,
    tick_interval: Duration,
    ticks: AtomicU64,
}

impl DeterministicClock {
    pub fn new(execution_start: ClockTimestamp, tick_interval: Duration) -> Self {
        Self {
            execution_start,
            tick_interval,
            ticks: AtomicU64::new(0),
        }
    }

    /// The base timestamp, captured once at context creation.
    pub fn execution_start(&self) -> ClockTimestamp {
        self.execution_start
    }

    /// Next timestamp in the logical sequence.
    pub fn now(&self) -> ClockTimestamp {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let offset_nanos = self.tick_interval.as_nanos() as u64 * tick;
        ClockTimestamp::from_unix_nanos(self.execution_start.unix_nanos() + offset_nanos)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_monotonic_and_deterministic() {
        let base = ClockTimestamp::from_unix_seconds(1_700_000_000);
        let clock_a = DeterministicClock::new(base, Duration::from_micros(1));
        let clock_b = DeterministicClock::new(base, Duration::from_micros(1));

        let sequence_a: Vec<_> = (0..5).map(|_| clock_a.now()).collect();
        let sequence_b: Vec<_> = (0..5).map(|_| clock_b.now()).collect();
        assert_eq!(sequence_a, sequence_b);
        assert!(sequence_a.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_execution_start_is_stable() {
        let base = ClockTimestamp::from_unix_nanos(42);
        let clock = DeterministicClock::new(base, Duration::from_millis(1));
        let _ = clock.now();
        assert_eq!(clock.execution_start(), base);
    }
}
