//! Backoff policy — pure mapping from a cycle outcome to a sleep.
//!
//! The three tiers are the core scheduling invariant of the worker:
//! a productive cycle re-polls immediately so bursts drain fast, an
//! idle or fully-disabled cycle waits the idle interval to avoid
//! hot-looping an empty broker, and a failed cycle waits longer still
//! so a broken broker is not hammered in a tight retry loop.

use std::time::Duration;

use plateful_common::types::CycleOutcome;

/// Sleep duration for the next iteration given this cycle's outcome.
pub fn backoff_for(outcome: CycleOutcome, idle_sleep: Duration, error_sleep: Duration) -> Duration {
    match outcome {
        CycleOutcome::Productive => Duration::ZERO,
        CycleOutcome::Idle | CycleOutcome::BothDisabled => idle_sleep,
        CycleOutcome::Error => error_sleep,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDLE: Duration = Duration::from_millis(2000);
    const ERROR: Duration = Duration::from_millis(10000);

    #[test]
    fn test_productive_repolls_immediately() {
        assert_eq!(backoff_for(CycleOutcome::Productive, IDLE, ERROR), Duration::ZERO);
    }

    #[test]
    fn test_idle_sleeps_idle_interval() {
        assert_eq!(backoff_for(CycleOutcome::Idle, IDLE, ERROR), IDLE);
    }

    #[test]
    fn test_disabled_sleeps_idle_interval() {
        assert_eq!(backoff_for(CycleOutcome::BothDisabled, IDLE, ERROR), IDLE);
    }

    #[test]
    fn test_error_sleeps_longest() {
        assert_eq!(backoff_for(CycleOutcome::Error, IDLE, ERROR), ERROR);
    }
}
