//! A loop that repeats a tick until a value is returned, a stop signal is received, or a bound is reached.

use std::time::Duration;

use tracing::{debug, error};

use super::{Clock, State};

/// Bounds and pacing of a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// The delay between two ticks.
    pub interval: Duration,
    /// The maximum number of ticks.
    pub max_attempts: u32,
    /// The maximum time spent polling, measured from the first tick.
    pub max_wait: Option<Duration>,
}

impl PollPolicy {
    /// A policy bounded by a number of attempts only.
    pub fn attempts(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            max_wait: None,
        }
    }

    /// A policy bounded by a wall-clock duration only.
    pub fn deadline(interval: Duration, max_wait: Duration) -> Self {
        Self {
            interval,
            max_attempts: u32::MAX,
            max_wait: Some(max_wait),
        }
    }
}

/// Why a polling loop ended without a value.
#[derive(Debug, PartialEq, Eq)]
pub enum PollError<E> {
    /// A tick returned [`State::Stop`].
    Stopped(E),
    /// The loop hit one of its bounds.
    Exhausted {
        /// The number of ticks performed.
        attempts: u32,
        /// The time elapsed since the first tick.
        waited: Duration,
    },
}

/// Calls `tick` with the 1-based attempt number until it returns [`State::Success`] or [`State::Stop`], sleeping
/// [`PollPolicy::interval`] on `clock` between two ticks.
///
/// `tick` is never called more than [`PollPolicy::max_attempts`] times.
///
/// # Errors
///
/// Returns [`PollError::Stopped`] with the tick's error, or [`PollError::Exhausted`] once a bound is reached.
pub async fn poll<T, E, F, Fut>(clock: &dyn Clock, policy: &PollPolicy, mut tick: F) -> Result<T, PollError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = State<T, E>>,
{
    let started = clock.now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match tick(attempt).await {
            State::Success(value) => return Ok(value),
            State::Stop(err) => return Err(PollError::Stopped(err)),
            State::Retry => {}
        }

        let waited = clock.elapsed_since(started);
        let out_of_time = policy.max_wait.is_some_and(|max_wait| waited >= max_wait);
        if attempt >= policy.max_attempts || out_of_time {
            error!("gave up after {attempt} attempts ({}s)", waited.as_secs());
            return Err(PollError::Exhausted {
                attempts: attempt,
                waited,
            });
        }

        debug!("attempt {attempt} pending, waiting {}s…", policy.interval.as_secs());
        clock.sleep(policy.interval).await;
    }
}
