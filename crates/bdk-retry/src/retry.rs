//! Retry with recovery.
//!
//! Runs a remote call, classifies its failure and either recovers (refresh
//! the bound session, or wait with exponential backoff) and tries again, or
//! surfaces the failure unchanged.
//!
//! # Example
//!
//! ```ignore
//! use bdk_retry::{RetryPolicy, RetryWithRecovery};
//!
//! let retry = RetryWithRecovery::new(Arc::new(RetryPolicy::default())).with_session(session);
//!
//! let signal = retry
//!     .execute_authenticated("getSignal", |tokens| api.get_signal(tokens, "1234"))
//!     .await?;
//! ```

use std::{future::Future, sync::Arc, time::Duration};

use bdk_core::{
    AuthSession, BdkError, Clock, FailureKind, RetryConfig, SessionTokens, SystemClock,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What to do before retrying a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Refresh the bound session, then retry immediately.
    RefreshSession,
    /// Wait for the backoff delay, then retry.
    Backoff,
}

/// Maps one failure kind to a recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRule {
    pub kind: FailureKind,
    pub action: RecoveryAction,
}

/// Backoff settings plus an ordered rule table.
///
/// Failures whose kind matches no rule are surfaced on the first occurrence.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    rules: Vec<RecoveryRule>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Policy that refreshes on unauthorized failures and backs off on
    /// transient ones.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self::without_rules(config)
            .with_rule(FailureKind::Unauthorized, RecoveryAction::RefreshSession)
            .with_rule(FailureKind::Transient, RecoveryAction::Backoff)
    }

    /// Policy that never retries until rules are added.
    #[must_use]
    pub const fn without_rules(config: RetryConfig) -> Self {
        Self {
            config,
            rules: Vec::new(),
        }
    }

    /// Append a rule. The first rule matching a failure wins.
    #[must_use]
    pub fn with_rule(mut self, kind: FailureKind, action: RecoveryAction) -> Self {
        self.rules.push(RecoveryRule { kind, action });
        self
    }

    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    #[must_use]
    pub fn rules(&self) -> &[RecoveryRule] {
        &self.rules
    }

    /// Recovery action for a failure kind, if any rule matches.
    #[must_use]
    pub fn action_for(&self, kind: FailureKind) -> Option<RecoveryAction> {
        self.rules
            .iter()
            .find(|rule| rule.kind == kind)
            .map(|rule| rule.action)
    }

    /// Delay after the given failed attempt (1-based).
    ///
    /// `initial_interval * multiplier^(attempt - 1)`, capped at
    /// `max_interval`, plus up to `jitter` of itself at random.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_ms = self.config.initial_interval_ms as f64 * self.config.multiplier.powi(exponent);
        let capped_ms = base_ms.min(self.config.max_interval_ms as f64).max(0.0);

        let jitter = self.config.jitter.clamp(0.0, 1.0);
        let total_ms = if jitter > 0.0 && capped_ms > 0.0 {
            capped_ms + capped_ms * rand::thread_rng().gen_range(0.0..=jitter)
        } else {
            capped_ms
        };

        Duration::from_millis(total_ms as u64)
    }
}

/// Executes remote calls under a [`RetryPolicy`].
///
/// Cheap to clone; clones share the policy, the session and the clock.
#[derive(Clone)]
pub struct RetryWithRecovery {
    policy: Arc<RetryPolicy>,
    session: Option<Arc<AuthSession>>,
    clock: Arc<dyn Clock>,
}

impl RetryWithRecovery {
    /// Create an engine with no bound session.
    #[must_use]
    pub fn new(policy: Arc<RetryPolicy>) -> Self {
        Self {
            policy,
            session: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Bind the session refreshed on unauthorized failures and handed to
    /// authenticated operations.
    #[must_use]
    pub fn with_session(mut self, session: Arc<AuthSession>) -> Self {
        self.session = Some(session);
        self
    }

    /// Replace the clock used for backoff waits.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    #[must_use]
    pub const fn session(&self) -> Option<&Arc<AuthSession>> {
        self.session.as_ref()
    }

    /// Run an operation that needs no credentials of its own.
    ///
    /// A bound session is still refreshed on unauthorized failures.
    ///
    /// # Errors
    /// Returns the last failure once no rule applies or the budget is spent.
    pub async fn execute<T, F, Fut>(&self, name: &str, mut operation: F) -> Result<T, BdkError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BdkError>>,
    {
        self.run(name, true, |_| operation()).await
    }

    /// Run an operation that sends the bound session's tokens.
    ///
    /// Each attempt receives the current token snapshot, so an attempt made
    /// after a refresh uses the new pair.
    ///
    /// # Errors
    /// Returns `Configuration` without attempting anything when no session is
    /// bound; otherwise as [`execute`](Self::execute).
    pub async fn execute_authenticated<T, F, Fut>(
        &self,
        name: &str,
        operation: F,
    ) -> Result<T, BdkError>
    where
        F: FnMut(Arc<SessionTokens>) -> Fut,
        Fut: Future<Output = Result<T, BdkError>>,
    {
        self.run_authenticated(name, true, operation).await
    }

    /// Run an authenticated operation that must not be repeated once the
    /// server may have acted on it, such as a create or a delete.
    ///
    /// Rejected credentials are still refreshed and the call sent again,
    /// since the server refused it. Failures that would back off (timeouts,
    /// dropped connections, 5xx) are surfaced after the first attempt.
    ///
    /// # Errors
    /// As [`execute_authenticated`](Self::execute_authenticated).
    pub async fn execute_non_idempotent<T, F, Fut>(
        &self,
        name: &str,
        operation: F,
    ) -> Result<T, BdkError>
    where
        F: FnMut(Arc<SessionTokens>) -> Fut,
        Fut: Future<Output = Result<T, BdkError>>,
    {
        self.run_authenticated(name, false, operation).await
    }

    async fn run_authenticated<T, F, Fut>(
        &self,
        name: &str,
        idempotent: bool,
        mut operation: F,
    ) -> Result<T, BdkError>
    where
        F: FnMut(Arc<SessionTokens>) -> Fut,
        Fut: Future<Output = Result<T, BdkError>>,
    {
        let Some(session) = self.session.clone() else {
            return Err(BdkError::Configuration(format!(
                "{name} requires an authenticated session but none is bound"
            )));
        };

        self.run(name, idempotent, |tokens| {
            operation(tokens.unwrap_or_else(|| session.tokens()))
        })
        .await
    }

    async fn run<T, F, Fut>(
        &self,
        name: &str,
        idempotent: bool,
        mut operation: F,
    ) -> Result<T, BdkError>
    where
        F: FnMut(Option<Arc<SessionTokens>>) -> Fut,
        Fut: Future<Output = Result<T, BdkError>>,
    {
        let config = self.policy.config();
        let mut attempt: u32 = 0;
        let mut refreshed_before_attempt = false;

        loop {
            attempt += 1;
            let tokens = self.session.as_ref().map(|s| s.tokens());
            let generation = tokens.as_ref().map(|t| t.generation());

            let err = match with_deadline(operation(tokens), config.attempt_timeout()).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = name, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let Some(action) = self.policy.action_for(err.kind()) else {
                return Err(err);
            };

            if !config.allows_another(attempt) {
                warn!(operation = name, attempt, error = %err, "retry budget exhausted");
                return Err(err);
            }

            match action {
                RecoveryAction::RefreshSession => {
                    let (Some(session), Some(generation)) = (self.session.as_ref(), generation)
                    else {
                        return Err(err);
                    };
                    // A rejection right after a refresh means the fresh
                    // credential is refused too.
                    if refreshed_before_attempt {
                        return Err(err);
                    }

                    warn!(operation = name, attempt, "credential rejected, refreshing session");
                    session.refresh_after(generation).await?;
                    refreshed_before_attempt = true;
                }
                RecoveryAction::Backoff if !idempotent => {
                    warn!(operation = name, attempt, error = %err, "not repeating non-idempotent call");
                    return Err(err);
                }
                RecoveryAction::Backoff => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(
                        operation = name,
                        attempt,
                        max_attempts = ?config.max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "retrying after transient error"
                    );
                    self.clock.sleep(delay).await;
                    refreshed_before_attempt = false;
                }
            }
        }
    }
}

impl std::fmt::Debug for RetryWithRecovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryWithRecovery")
            .field("policy", &self.policy)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

async fn with_deadline<T>(
    attempt: impl Future<Output = Result<T, BdkError>>,
    deadline: Option<Duration>,
) -> Result<T, BdkError> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, attempt)
            .await
            .unwrap_or(Err(BdkError::Timeout(limit))),
        None => attempt.await,
    }
}
