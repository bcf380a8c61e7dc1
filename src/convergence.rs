//! Asynchronous state convergence.
//!
//! Generated lifecycle operations wait for a remote object to settle by
//! polling a probe until the reported state is a target state. This module
//! is the same protocol for Rust callers (drivers, acceptance harnesses).
//!
//! Every state a probe can report must be declared: pending states keep the
//! wait going, target states end it successfully, failure states end it with
//! [`ConvergenceError::FailedState`]. Anything else is
//! [`ConvergenceError::UnexpectedState`].
//!
//! Timing: an initial delay before the first poll, then an interval that
//! starts at the minimum poll interval and doubles up to the maximum. The
//! whole wait, initial delay included, is bounded by the timeout. A
//! cancellation future aborts the wait immediately, even mid-sleep.
//!
//! Probe errors are either transient (keep polling, up to a bound on
//! consecutive failures) or permanent (fail at once).

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, trace, warn};

use crate::error::ConvergenceError;
use crate::schema::WaitSpec;

/// Settings for one wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergenceSpec {
    /// States in which the operation is still in progress.
    pub pending_states: BTreeSet<String>,
    /// States that complete the operation.
    pub target_states: BTreeSet<String>,
    /// States that end the operation with a failure.
    pub failure_states: BTreeSet<String>,
    /// Overall bound on the wait.
    pub timeout: Duration,
    /// Delay before the first poll.
    pub initial_delay: Duration,
    /// Interval after the first pending poll.
    pub min_poll_interval: Duration,
    /// Upper bound of the backoff interval.
    pub max_poll_interval: Duration,
    /// Consecutive transient probe errors tolerated before failing.
    pub max_transient_errors: usize,
}

impl ConvergenceSpec {
    /// Create a spec with default timings: 20 minute timeout, no initial
    /// delay, polls backing off from 5 to 10 seconds, and up to 3
    /// consecutive transient probe errors.
    pub fn new<I, J, S, T>(pending: I, target: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            pending_states: pending.into_iter().map(Into::into).collect(),
            target_states: target.into_iter().map(Into::into).collect(),
            failure_states: BTreeSet::new(),
            timeout: Duration::from_secs(20 * 60),
            initial_delay: Duration::ZERO,
            min_poll_interval: Duration::from_secs(5),
            max_poll_interval: Duration::from_secs(10),
            max_transient_errors: 3,
        }
    }

    /// Build a spec from the wait settings of a schema operation.
    ///
    /// The maximum poll interval is raised to the minimum if needed.
    pub fn from_wait_spec(wait: &WaitSpec) -> Self {
        let min = wait.min_poll_interval();
        let spec = Self::new(wait.pending.iter().cloned(), wait.target.iter().cloned())
            .with_failure_states(wait.failure.iter().cloned())
            .with_timeout(wait.timeout())
            .with_initial_delay(wait.delay())
            .with_min_poll_interval(min);
        let max = spec.max_poll_interval.max(min);
        spec.with_max_poll_interval(max)
    }

    /// Set the failure states.
    pub fn with_failure_states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failure_states = states.into_iter().map(Into::into).collect();
        self
    }

    /// Set the overall timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the delay before the first poll.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the minimum poll interval.
    pub fn with_min_poll_interval(mut self, interval: Duration) -> Self {
        self.min_poll_interval = interval;
        self
    }

    /// Set the maximum poll interval.
    pub fn with_max_poll_interval(mut self, interval: Duration) -> Self {
        self.max_poll_interval = interval;
        self
    }

    /// Set how many consecutive transient probe errors are tolerated.
    pub fn with_max_transient_errors(mut self, count: usize) -> Self {
        self.max_transient_errors = count;
        self
    }

    /// Check that the state sets partition cleanly and the timings are usable.
    pub fn validate(&self) -> Result<(), ConvergenceError> {
        if self.target_states.is_empty() {
            return Err(ConvergenceError::InvalidSpec(
                "at least one target state is required".to_string(),
            ));
        }
        let sets = [
            ("pending", &self.pending_states),
            ("target", &self.target_states),
            ("failure", &self.failure_states),
        ];
        for (i, (a_name, a)) in sets.iter().enumerate() {
            for (b_name, b) in &sets[i + 1..] {
                if let Some(state) = a.intersection(b).next() {
                    return Err(ConvergenceError::InvalidSpec(format!(
                        "state '{}' is both {} and {}",
                        state, a_name, b_name
                    )));
                }
            }
        }
        if self.min_poll_interval.is_zero() {
            return Err(ConvergenceError::InvalidSpec(
                "minimum poll interval must be positive".to_string(),
            ));
        }
        if self.max_poll_interval < self.min_poll_interval {
            return Err(ConvergenceError::InvalidSpec(format!(
                "maximum poll interval {:?} is below the minimum {:?}",
                self.max_poll_interval, self.min_poll_interval
            )));
        }
        Ok(())
    }

    fn declared_states(&self) -> Vec<String> {
        self.pending_states
            .iter()
            .chain(&self.target_states)
            .chain(&self.failure_states)
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// One observation of the remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observed<T> {
    /// Whatever the probe fetched.
    pub value: T,
    /// The state label of the observation.
    pub state: String,
}

impl<T> Observed<T> {
    /// Create an observation.
    pub fn new(value: T, state: impl Into<String>) -> Self {
        Self {
            value,
            state: state.into(),
        }
    }
}

/// A failed probe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeError {
    /// What went wrong.
    pub message: String,
    /// Whether polling may continue.
    pub transient: bool,
}

impl ProbeError {
    /// An error worth retrying, such as a timeout or a 5xx response.
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
        }
    }

    /// An error that ends the wait, such as an authorization failure.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
        }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProbeError {}

/// Fetches the current state of the remote object.
///
/// Implemented for any `Fn() -> impl Future<Output = Result<Observed<T>, ProbeError>>`
/// whose future owns its data, so a closure returning an `async move` block
/// works as a probe.
#[async_trait]
pub trait StateProbe: Send + Sync {
    /// What each observation carries.
    type Output: Send;

    /// Poll the remote object once.
    async fn probe(&self) -> Result<Observed<Self::Output>, ProbeError>;
}

#[async_trait]
impl<F, Fut, T> StateProbe for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Observed<T>, ProbeError>> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    async fn probe(&self) -> Result<Observed<T>, ProbeError> {
        (self)().await
    }
}

/// Poll `probe` until it reports a target state.
pub async fn await_state<P>(
    spec: &ConvergenceSpec,
    probe: &P,
) -> Result<Observed<P::Output>, ConvergenceError>
where
    P: StateProbe + ?Sized,
{
    await_state_with_cancel(spec, probe, std::future::pending::<()>()).await
}

/// Poll `probe` until it reports a target state or `cancel` completes.
///
/// Cancellation returns [`ConvergenceError::Cancelled`] without waiting for
/// an in-flight sleep or probe call to finish.
pub async fn await_state_with_cancel<P, C>(
    spec: &ConvergenceSpec,
    probe: &P,
    cancel: C,
) -> Result<Observed<P::Output>, ConvergenceError>
where
    P: StateProbe + ?Sized,
    C: Future<Output = ()>,
{
    spec.validate()?;
    // A timeout past the end of the clock never expires.
    let deadline = Instant::now().checked_add(spec.timeout);
    let mut last_state: Option<String> = None;

    let polling = poll(spec, probe, &mut last_state);
    let bounded = async move {
        match deadline {
            Some(deadline) => timeout_at(deadline, polling).await.ok(),
            None => Some(polling.await),
        }
    };
    let outcome = tokio::select! {
        result = bounded => Some(result),
        _ = cancel => None,
    };

    match outcome {
        None => {
            debug!(last_state = ?last_state, "wait cancelled");
            Err(ConvergenceError::Cancelled)
        },
        Some(None) => {
            warn!(timeout = ?spec.timeout, last_state = ?last_state, "timed out waiting for state");
            Err(ConvergenceError::Timeout {
                timeout: spec.timeout,
                last_state,
            })
        },
        Some(Some(result)) => result,
    }
}

/// Next backoff interval: doubled, capped at `max`.
fn next_interval(interval: Duration, max: Duration) -> Duration {
    interval.saturating_mul(2).min(max)
}

async fn poll<P>(
    spec: &ConvergenceSpec,
    probe: &P,
    last_state: &mut Option<String>,
) -> Result<Observed<P::Output>, ConvergenceError>
where
    P: StateProbe + ?Sized,
{
    if !spec.initial_delay.is_zero() {
        trace!(delay = ?spec.initial_delay, "initial delay");
        sleep(spec.initial_delay).await;
    }

    let mut interval = spec.min_poll_interval;
    let mut transient_errors = 0;
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match probe.probe().await {
            Ok(observed) => {
                transient_errors = 0;
                *last_state = Some(observed.state.clone());
                let state = observed.state.as_str();
                if spec.target_states.contains(state) {
                    debug!(attempt, state, "reached target state");
                    return Ok(observed);
                }
                if spec.failure_states.contains(state) {
                    debug!(attempt, state, "reached failure state");
                    return Err(ConvergenceError::FailedState {
                        state: observed.state,
                    });
                }
                if !spec.pending_states.contains(state) {
                    return Err(ConvergenceError::UnexpectedState {
                        state: observed.state,
                        expected: spec.declared_states(),
                    });
                }
                debug!(attempt, state, "still pending");
            },
            Err(e) if e.transient && transient_errors < spec.max_transient_errors => {
                transient_errors += 1;
                debug!(attempt, error = %e, transient_errors, "transient probe error");
            },
            Err(e) => {
                debug!(attempt, error = %e, transient = e.transient, "probe failed");
                return Err(ConvergenceError::Probe { message: e.message });
            },
        }

        trace!(?interval, "sleeping before next poll");
        sleep(interval).await;
        interval = next_interval(interval, spec.max_poll_interval);
    }
}
