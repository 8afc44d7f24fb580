//! Retry policy, failure classification and the mirror/attempt state machine.
//!
//! Nothing here performs I/O; [`crate::Scraper`] drives the machine and does
//! the sleeping and fetching.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::error::{Error, Result};

pub const MAX_ATTEMPTS_PER_URL: u32 = 4;
pub const MAX_URL_CYCLES: u32 = 2;

/// Statuses treated as transient blocking or overload.
pub const RETRYABLE_STATUSES: &[u16] = &[0, 403, 408, 425, 429, 500, 502, 503, 520, 522, 524];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Transport failure or transient status: try the same URL again.
    Retryable,
    /// Conclusive failure for this URL: move to the next one.
    Terminal,
}

impl Outcome {
    pub fn classify(status: u16) -> Self {
        if (200..300).contains(&status) {
            Outcome::Success
        } else if RETRYABLE_STATUSES.contains(&status) {
            Outcome::Retryable
        } else {
            Outcome::Terminal
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts_per_url: u32,
    pub max_url_cycles: u32,
    /// Jitter range slept before the first attempt on a URL.
    pub initial_jitter_ms: (u64, u64),
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_jitter_ms: u64,
    pub min_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts_per_url: MAX_ATTEMPTS_PER_URL,
            max_url_cycles: MAX_URL_CYCLES,
            initial_jitter_ms: (100, 400),
            base_delay_ms: 1000,
            backoff_factor: 1.5,
            max_jitter_ms: 800,
            min_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Same attempt budget, no sleeping. Used by tests and offline tooling.
    pub fn no_delay() -> Self {
        Self {
            initial_jitter_ms: (0, 0),
            base_delay_ms: 0,
            max_jitter_ms: 0,
            min_delay_ms: 0,
            ..Self::default()
        }
    }

    /// One attempt per URL, one cycle.
    pub fn probe(&self) -> Self {
        Self {
            max_attempts_per_url: 1,
            max_url_cycles: 1,
            ..self.clone()
        }
    }

    /// Delay to sleep before `attempt` on a URL.
    ///
    /// Attempt 0 gets a short random jitter; later attempts back off
    /// exponentially with symmetric jitter, floored at `min_delay_ms`.
    pub fn delay_for<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        if attempt == 0 {
            let (lo, hi) = self.initial_jitter_ms;
            let ms = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
            return Duration::from_millis(ms);
        }
        let base = self.base_delay_ms as f64 * self.backoff_factor.powi(attempt as i32);
        let jitter = if self.max_jitter_ms > 0 {
            let j = self.max_jitter_ms as i64;
            rng.gen_range(-j..=j) as f64
        } else {
            0.0
        };
        let ms = (base + jitter).max(self.min_delay_ms as f64);
        Duration::from_millis(ms as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Attempt { url_index: usize, attempt: u32 },
    Done,
    Exhausted,
}

/// Position in the `cycle -> base url -> attempt` sequence.
#[derive(Debug, Clone)]
pub struct RetryState {
    url_count: usize,
    max_attempts: u32,
    max_cycles: u32,
    cycle: u32,
    url_index: usize,
    attempt: u32,
    attempts_made: u32,
    finished: Option<Step>,
}

impl RetryState {
    pub fn new(url_count: usize, policy: &RetryPolicy) -> Self {
        let empty =
            url_count == 0 || policy.max_attempts_per_url == 0 || policy.max_url_cycles == 0;
        let finished = if empty { Some(Step::Exhausted) } else { None };
        Self {
            url_count,
            max_attempts: policy.max_attempts_per_url,
            max_cycles: policy.max_url_cycles,
            cycle: 0,
            url_index: 0,
            attempt: 0,
            attempts_made: 0,
            finished,
        }
    }

    pub fn current(&self) -> Step {
        match self.finished {
            Some(step) => step,
            None => Step::Attempt {
                url_index: self.url_index,
                attempt: self.attempt,
            },
        }
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    /// Records the outcome of the current attempt and returns the next step.
    pub fn advance(&mut self, outcome: Outcome) -> Step {
        if self.finished.is_some() {
            return self.current();
        }
        self.attempts_made += 1;
        match outcome {
            Outcome::Success => self.finished = Some(Step::Done),
            Outcome::Retryable if self.attempt + 1 < self.max_attempts => self.attempt += 1,
            Outcome::Retryable | Outcome::Terminal => self.next_url(),
        }
        self.current()
    }

    fn next_url(&mut self) {
        self.attempt = 0;
        if self.url_index + 1 < self.url_count {
            self.url_index += 1;
        } else if self.cycle + 1 < self.max_cycles {
            self.cycle += 1;
            self.url_index = 0;
        } else {
            self.finished = Some(Step::Exhausted);
        }
    }
}

/// Cloneable cancellation flag checked at the top of every attempt.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn drive(
        url_count: usize,
        outcomes: impl Fn(usize, u32) -> Outcome,
    ) -> (Vec<(usize, u32)>, Step) {
        let policy = RetryPolicy::default();
        let mut state = RetryState::new(url_count, &policy);
        let mut visited = Vec::new();
        loop {
            match state.current() {
                Step::Attempt { url_index, attempt } => {
                    visited.push((url_index, attempt));
                    state.advance(outcomes(url_index, attempt));
                }
                end => return (visited, end),
            }
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(Outcome::classify(200), Outcome::Success);
        assert_eq!(Outcome::classify(204), Outcome::Success);
        for s in [0, 403, 408, 425, 429, 500, 502, 503, 520, 522, 524] {
            assert_eq!(Outcome::classify(s), Outcome::Retryable, "status {s}");
        }
        for s in [301, 400, 401, 404, 410, 501, 521] {
            assert_eq!(Outcome::classify(s), Outcome::Terminal, "status {s}");
        }
    }

    #[test]
    fn test_retryable_exhausts_attempts_before_next_url() {
        let (visited, end) = drive(2, |idx, _| {
            if idx == 0 {
                Outcome::Retryable
            } else {
                Outcome::Success
            }
        });
        assert_eq!(visited, vec![(0, 0), (0, 1), (0, 2), (0, 3), (1, 0)]);
        assert_eq!(end, Step::Done);
    }

    #[test]
    fn test_terminal_moves_on_immediately() {
        let (visited, end) = drive(2, |idx, _| {
            if idx == 0 {
                Outcome::Terminal
            } else {
                Outcome::Success
            }
        });
        assert_eq!(visited, vec![(0, 0), (1, 0)]);
        assert_eq!(end, Step::Done);
    }

    #[test]
    fn test_cycles_restart_from_first_url() {
        let (visited, end) = drive(2, |_, _| Outcome::Terminal);
        assert_eq!(visited, vec![(0, 0), (1, 0), (0, 0), (1, 0)]);
        assert_eq!(end, Step::Exhausted);
    }

    #[test]
    fn test_all_retryable_is_bounded() {
        let (visited, end) = drive(1, |_, _| Outcome::Retryable);
        assert_eq!(visited.len() as u32, MAX_ATTEMPTS_PER_URL * MAX_URL_CYCLES);
        assert!(visited.iter().all(|(_, a)| *a < MAX_ATTEMPTS_PER_URL));
        assert_eq!(end, Step::Exhausted);
    }

    #[test]
    fn test_empty_url_list_is_exhausted() {
        let state = RetryState::new(0, &RetryPolicy::default());
        assert_eq!(state.current(), Step::Exhausted);
    }

    #[test]
    fn test_probe_policy_single_pass() {
        let policy = RetryPolicy::default().probe();
        let mut state = RetryState::new(3, &policy);
        state.advance(Outcome::Retryable);
        state.advance(Outcome::Retryable);
        assert_eq!(state.current(), Step::Attempt { url_index: 2, attempt: 0 });
        assert_eq!(state.advance(Outcome::Retryable), Step::Exhausted);
        assert_eq!(state.attempts_made(), 3);
    }

    #[test]
    fn test_first_attempt_jitter_range() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let d = policy.delay_for(0, &mut rng).as_millis();
            assert!((100..=400).contains(&d), "{d}");
        }
    }

    #[test]
    fn test_backoff_bounds() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(42);
        for attempt in 1..MAX_ATTEMPTS_PER_URL {
            let base = 1000.0 * 1.5f64.powi(attempt as i32);
            for _ in 0..200 {
                let d = policy.delay_for(attempt, &mut rng).as_millis() as f64;
                assert!(d >= 500.0);
                assert!(d <= base + 800.0);
                assert!(d >= (base - 800.0).max(500.0).floor());
            }
        }
    }

    #[test]
    fn test_no_delay_policy_is_zero() {
        let policy = RetryPolicy::no_delay();
        let mut rng = StdRng::seed_from_u64(1);
        for attempt in 0..4 {
            assert_eq!(policy.delay_for(attempt, &mut rng), Duration::ZERO);
        }
    }

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(token.check().is_ok());
        other.cancel();
        assert!(matches!(token.check(), Err(Error::Cancelled)));
    }
}
