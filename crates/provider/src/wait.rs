//! Polling a remote object until a condition holds or it disappears.
//!
//! Both waits share one loop: look the object up, test it, give up once the
//! deadline has passed, otherwise sleep for the poll interval. A zero timeout
//! checks exactly once. Lookup errors end the wait immediately.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

use crate::duration::SignedDuration;
use crate::jsonpath::JsonPath;
use crate::{Error, Result};

/// Upper bound used when a negative timeout asks to wait indefinitely
pub const INDEFINITE_WAIT: Duration = Duration::from_hours(7 * 24);

/// Default timeout of both waits
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between lookups
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Terminal state of a wait
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// The condition held
    Satisfied,
    /// The object was confirmed gone
    ResourceAbsent,
    /// The deadline passed first
    TimedOut,
}

/// How long to wait and how often to look
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitTiming {
    /// Deadline measured from the start of the wait, zero checks once
    pub timeout: Duration,
    /// Sleep between two lookups
    pub poll_interval: Duration,
}

impl Default for WaitTiming {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

impl WaitTiming {
    /// Timing with explicit values
    #[must_use]
    pub const fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Timing from configured durations, a negative timeout becomes [`INDEFINITE_WAIT`]
    ///
    /// # Errors
    /// Returns [`Error::Duration`] for a negative poll interval, or a zero one
    /// when the wait can last longer than a single check
    pub fn from_signed(timeout: SignedDuration, poll_interval: SignedDuration) -> Result<Self> {
        if poll_interval.is_negative() {
            return Err(Error::Duration(format!(
                "poll interval must not be negative, got {poll_interval}"
            )));
        }
        let deadline = if timeout.is_negative() {
            INDEFINITE_WAIT
        } else {
            timeout.magnitude()
        };
        if poll_interval.magnitude().is_zero() && !deadline.is_zero() {
            return Err(Error::Duration(format!(
                "poll interval must be positive with a {timeout} timeout"
            )));
        }
        Ok(Self::new(deadline, poll_interval.magnitude()))
    }

    fn expired(&self, start: Instant) -> bool {
        self.timeout.is_zero() || start.elapsed() > self.timeout
    }
}

/// A field that must be present, and optionally equal to a value
#[derive(Clone, Debug, PartialEq)]
pub struct UpsertCondition {
    path: JsonPath,
    value: Option<String>,
}

impl UpsertCondition {
    /// Condition on `path`, matching `value` when given, else any non-empty value
    #[must_use]
    pub fn new(path: JsonPath, value: Option<String>) -> Self {
        Self { path, value }
    }

    /// Tests an object representation
    #[must_use]
    pub fn is_satisfied_by(&self, object: &Value) -> bool {
        match (self.path.first_string(object), &self.value) {
            (Some(actual), Some(expected)) => actual == *expected,
            (Some(actual), None) => !actual.is_empty(),
            (None, _) => false,
        }
    }
}

impl fmt::Display for UpsertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={value:?}", self.path),
            None => write!(f, "{}", self.path),
        }
    }
}

/// Point lookup of the current remote object, `None` when it does not exist
///
/// Implementations must be safe to call repeatedly.
pub trait ObjectLookup {
    /// Fetches the object
    fn lookup(&self) -> impl Future<Output = Result<Option<Value>>>;
}

impl<F, Fut> ObjectLookup for F
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Option<Value>>>,
{
    fn lookup(&self) -> impl Future<Output = Result<Option<Value>>> {
        self()
    }
}

/// Polls `getter` until `condition` holds or `timing` runs out
///
/// A missing object counts as "not yet".
///
/// # Errors
/// Propagates the first lookup error
#[instrument(skip_all, fields(condition = %condition, timeout = ?timing.timeout))]
pub async fn wait_for_upsert_condition<G: ObjectLookup>(
    getter: &G,
    condition: &UpsertCondition,
    timing: WaitTiming,
) -> Result<PollOutcome> {
    let start = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let object = getter.lookup().await?;
        if object.is_some_and(|o| condition.is_satisfied_by(&o)) {
            info!(attempts, "wait condition satisfied");
            return Ok(PollOutcome::Satisfied);
        }
        if timing.expired(start) {
            warn!(attempts, "wait condition not satisfied before timeout");
            return Ok(PollOutcome::TimedOut);
        }
        debug!(attempts, "wait condition not yet satisfied");
        sleep(timing.poll_interval).await;
    }
}

/// Polls `getter` until it reports the object gone or `timing` runs out
///
/// # Errors
/// Propagates the first lookup error other than absence
#[instrument(skip_all, fields(timeout = ?timing.timeout))]
pub async fn wait_for_delete_completion<G: ObjectLookup>(
    getter: &G,
    timing: WaitTiming,
) -> Result<PollOutcome> {
    let start = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        if getter.lookup().await?.is_none() {
            info!(attempts, "resource is gone");
            return Ok(PollOutcome::ResourceAbsent);
        }
        if timing.expired(start) {
            warn!(attempts, "resource still present at timeout");
            return Ok(PollOutcome::TimedOut);
        }
        debug!(attempts, "resource still present");
        sleep(timing.poll_interval).await;
    }
}
