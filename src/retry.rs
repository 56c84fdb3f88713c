//! Per-call retry budget and failure classification.
//!
//! A `RetryConfig` is handed to every `QuizGenerator::generate` call by
//! reference; the generator keeps its own attempt counters on the stack, so
//! one request's failures never eat into another request's budget.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Coarse classification of an attempt failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    RateLimit,
    Http,
    Timeout,
    /// Server-side (5xx) or empty model response.
    Api,
    JsonParse,
    Validation,
    Authentication,
    /// Request rejected by the API (4xx other than 401/403/429).
    Client,
    Blocked,
    Internal,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::Http => "http_error",
            Self::Timeout => "timeout",
            Self::Api => "api_error",
            Self::JsonParse => "json_parse_error",
            Self::Validation => "validation_error",
            Self::Authentication => "authentication",
            Self::Client => "client_error",
            Self::Blocked => "blocked",
            Self::Internal => "internal",
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Http | Self::Timeout | Self::Api | Self::JsonParse | Self::Validation
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: usize,
    /// Optional per-kind retry caps. A cap only narrows the budget; kinds
    /// without one may retry until `max_attempts` is used up.
    pub max_retries: HashMap<FailureKind, usize>,
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_retries: HashMap::new(),
            initial_backoff: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryConfig {
    /// Default budget without any delay between attempts.
    pub fn immediate() -> Self {
        Self {
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Allow at most `retries` retries for failures of `kind`.
    #[must_use]
    pub fn with_retry_cap(mut self, kind: FailureKind, retries: usize) -> Self {
        self.max_retries.insert(kind, retries);
        self
    }

    /// Retries allowed for `kind`, never more than the attempt budget leaves.
    pub fn retries_for(&self, kind: FailureKind) -> usize {
        let budget = self.max_attempts.max(1) - 1;
        self.max_retries.get(&kind).map_or(budget, |&cap| cap.min(budget))
    }

    /// Delay before attempt `attempt + 1`, where `attempt` is 1-based and has just failed.
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        if self.initial_backoff.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let nanos = self.initial_backoff.as_nanos() as f64 * self.backoff_multiplier.powi(exponent);
        if !nanos.is_finite() || nanos >= self.max_backoff.as_nanos() as f64 {
            return self.max_backoff;
        }
        Duration::from_nanos(nanos as u64)
    }
}

/// Attempt bookkeeping for a single `generate` call.
#[derive(Debug)]
pub(crate) struct RetryState<'a> {
    config: &'a RetryConfig,
    attempts: usize,
    retries_used: HashMap<FailureKind, usize>,
}

/// What the loop should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Retry(Duration),
    Exhausted,
    Fatal,
}

impl<'a> RetryState<'a> {
    pub(crate) fn new(config: &'a RetryConfig) -> Self {
        Self {
            config,
            attempts: 0,
            retries_used: HashMap::new(),
        }
    }

    /// Whether another attempt may start. Always true for the first attempt.
    pub(crate) fn can_attempt(&self) -> bool {
        self.attempts < self.config.max_attempts.max(1)
    }

    pub(crate) fn begin_attempt(&mut self) -> usize {
        self.attempts += 1;
        self.attempts
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts
    }

    pub(crate) fn on_failure(&mut self, kind: FailureKind) -> Decision {
        if !kind.is_retryable() {
            return Decision::Fatal;
        }
        if !self.can_attempt() {
            return Decision::Exhausted;
        }
        let used = self.retries_used.entry(kind).or_insert(0);
        if *used >= self.config.retries_for(kind) {
            return Decision::Exhausted;
        }
        *used += 1;
        Decision::Retry(self.config.backoff_for(self.attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_allows_exactly_max_attempts() {
        let config = RetryConfig::immediate().with_max_attempts(3);
        let mut state = RetryState::new(&config);
        let mut made = 0;
        while state.can_attempt() {
            state.begin_attempt();
            made += 1;
            if state.on_failure(FailureKind::Http) != Decision::Retry(Duration::ZERO) {
                break;
            }
        }
        assert_eq!(made, 3);
        assert_eq!(state.attempts(), 3);
    }

    #[test]
    fn zero_attempts_still_makes_one() {
        let config = RetryConfig::immediate().with_max_attempts(0);
        let mut state = RetryState::new(&config);
        assert!(state.can_attempt());
        state.begin_attempt();
        assert_eq!(state.on_failure(FailureKind::Http), Decision::Exhausted);
    }

    #[test]
    fn fatal_kinds_are_not_retried() {
        let config = RetryConfig::immediate();
        let mut state = RetryState::new(&config);
        state.begin_attempt();
        assert_eq!(state.on_failure(FailureKind::Authentication), Decision::Fatal);
        assert_eq!(state.on_failure(FailureKind::Blocked), Decision::Fatal);
    }

    #[test]
    fn per_kind_cap_stops_before_total_budget() {
        let config = RetryConfig::immediate()
            .with_max_attempts(5)
            .with_retry_cap(FailureKind::Api, 1);
        let mut state = RetryState::new(&config);

        state.begin_attempt();
        assert!(matches!(state.on_failure(FailureKind::Api), Decision::Retry(_)));
        state.begin_attempt();
        assert_eq!(state.on_failure(FailureKind::Api), Decision::Exhausted);
    }

    #[test]
    fn default_caps_never_undercut_max_attempts() {
        for max_attempts in [3, 5, 8] {
            let config = RetryConfig::immediate().with_max_attempts(max_attempts);
            for kind in [FailureKind::Api, FailureKind::Http, FailureKind::Validation] {
                let mut state = RetryState::new(&config);
                let mut made = 0;
                loop {
                    state.begin_attempt();
                    made += 1;
                    if !matches!(state.on_failure(kind), Decision::Retry(_)) {
                        break;
                    }
                }
                assert_eq!(made, max_attempts, "{kind} with max_attempts = {max_attempts}");
            }
        }
    }

    #[test]
    fn explicit_cap_larger_than_budget_is_bounded() {
        let config = RetryConfig::immediate()
            .with_max_attempts(2)
            .with_retry_cap(FailureKind::Http, 10);
        assert_eq!(config.retries_for(FailureKind::Http), 1);
        assert_eq!(config.retries_for(FailureKind::Timeout), 1);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = RetryConfig {
            initial_backoff: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_millis(350),
            ..RetryConfig::default()
        };
        assert_eq!(config.backoff_for(1), Duration::from_millis(100));
        assert_eq!(config.backoff_for(2), Duration::from_millis(200));
        assert_eq!(config.backoff_for(3), Duration::from_millis(350));
        assert_eq!(config.backoff_for(40), Duration::from_millis(350));
    }

    #[test]
    fn kind_names_match_config_keys() {
        assert_eq!(FailureKind::JsonParse.to_string(), "json_parse_error");
        assert_eq!(FailureKind::RateLimit.as_str(), "rate_limit");
        assert!(!FailureKind::Client.is_retryable());
    }
}
