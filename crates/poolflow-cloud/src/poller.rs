//! Bounded completion polling
//!
//! Every wait in the engine (pool provisioning, data source connection,
//! add-column jobs, deletion) goes through [`wait_for`].

use crate::client::ClientError;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep_until, timeout_at};
use tokio_util::sync::CancellationToken;

/// Something with a status that can be refreshed and observed
pub trait Observation: Send {
    type Status: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    fn status(&self) -> Self::Status;

    /// Server-supplied explanation when the status signals a failure
    fn failure_message(&self) -> Option<String> {
        None
    }
}

/// What counts as completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Wait for a target status
    Status,
    /// Wait for the entity to disappear; a NotFound refresh is success
    Deletion,
}

/// Cadence of a poll loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTiming {
    /// Wait before the first refresh
    pub delay: Duration,
    pub poll_interval: Duration,
    /// Floor for the wait between refreshes
    pub min_timeout: Duration,
    /// Consecutive observations of one target status required before success
    pub settle_count: u32,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(5),
            min_timeout: Duration::from_secs(3),
            settle_count: 1,
        }
    }
}

impl PollTiming {
    pub fn tick(&self) -> Duration {
        self.poll_interval.max(self.min_timeout)
    }
}

/// Parameters of one wait
#[derive(Debug, Clone)]
pub struct PollSpec<S> {
    pub pending: Vec<S>,
    pub target: Vec<S>,
    pub timeout: Duration,
    pub timing: PollTiming,
    pub mode: PollMode,
}

impl<S: Copy + Eq> PollSpec<S> {
    pub fn new(pending: Vec<S>, target: Vec<S>, timeout: Duration) -> Self {
        Self {
            pending,
            target,
            timeout,
            timing: PollTiming::default(),
            mode: PollMode::Status,
        }
    }

    /// Wait until the entity no longer exists
    ///
    /// `pending` lists every status the entity may report while teardown
    /// is in progress.
    pub fn deletion(pending: Vec<S>, timeout: Duration) -> Self {
        Self {
            pending,
            target: Vec::new(),
            timeout,
            timing: PollTiming::default(),
            mode: PollMode::Deletion,
        }
    }

    pub fn with_timing(mut self, timing: PollTiming) -> Self {
        self.timing = timing;
        self
    }
}

/// Terminal result of a successful wait
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    /// Target status observed; carries the last observation
    Reached(T),
    /// Entity no longer exists (deletion mode only)
    Gone,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PollError {
    #[error("timed out after {elapsed:?}, last status: {}", .last_status.as_deref().unwrap_or("none"))]
    Timeout {
        last_status: Option<String>,
        elapsed: Duration,
    },

    #[error("unexpected status {status}")]
    UnexpectedStatus {
        status: String,
        message: Option<String>,
    },

    #[error("refresh failed: {0}")]
    Refresh(ClientError),

    #[error("cancelled")]
    Cancelled,
}

/// Refresh until a target status settles, the entity disappears (deletion
/// mode), the timeout elapses, or `cancel` fires.
///
/// A status outside both `pending` and `target` fails immediately. Only
/// consecutive observations of the same target status count towards
/// `settle_count`; a pending or different target status restarts the count.
pub async fn wait_for<T, F, Fut>(
    spec: &PollSpec<T::Status>,
    cancel: &CancellationToken,
    mut refresh: F,
) -> Result<PollOutcome<T>, PollError>
where
    T: Observation,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let started = Instant::now();
    let deadline = started + spec.timeout;
    let settle_count = spec.timing.settle_count.max(1);
    let mut last_status: Option<T::Status> = None;
    let mut settled = 0u32;
    let mut settling: Option<T::Status> = None;

    let timed_out = |last: Option<T::Status>| PollError::Timeout {
        last_status: last.map(|s| s.to_string()),
        elapsed: Instant::now().duration_since(started),
    };

    if !spec.timing.delay.is_zero() {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = sleep_until((started + spec.timing.delay).min(deadline)) => {}
        }
    }

    loop {
        if Instant::now() >= deadline {
            return Err(timed_out(last_status));
        }

        let refreshed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            result = timeout_at(deadline, refresh()) => result,
        };

        let observation = match refreshed {
            Err(_) => return Err(timed_out(last_status)),
            Ok(Err(e)) if spec.mode == PollMode::Deletion && e.is_not_found() => {
                tracing::debug!("entity no longer exists");
                return Ok(PollOutcome::Gone);
            }
            Ok(Err(e)) => return Err(PollError::Refresh(e)),
            Ok(Ok(observation)) => observation,
        };

        let status = observation.status();
        last_status = Some(status);

        if spec.target.contains(&status) {
            if settling == Some(status) {
                settled += 1;
            } else {
                settling = Some(status);
                settled = 1;
            }
            tracing::debug!(%status, settled, settle_count, "target status observed");
            if settled >= settle_count {
                return Ok(PollOutcome::Reached(observation));
            }
        } else if spec.pending.contains(&status) {
            settling = None;
            settled = 0;
            tracing::debug!(%status, "still pending");
        } else {
            return Err(PollError::UnexpectedStatus {
                status: status.to_string(),
                message: observation.failure_message(),
            });
        }

        let wake = (Instant::now() + spec.timing.tick()).min(deadline);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = sleep_until(wake) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Phase {
        Pending,
        Live,
        Broken,
    }

    impl fmt::Display for Phase {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl Observation for Phase {
        type Status = Phase;

        fn status(&self) -> Phase {
            *self
        }
    }

    fn timing(settle_count: u32) -> PollTiming {
        PollTiming {
            delay: Duration::ZERO,
            poll_interval: Duration::from_secs(5),
            min_timeout: Duration::from_secs(1),
            settle_count,
        }
    }

    fn pool_spec(timeout: Duration, settle_count: u32) -> PollSpec<Phase> {
        PollSpec::new(vec![Phase::Pending], vec![Phase::Live], timeout)
            .with_timing(timing(settle_count))
    }

    /// Pending for `pending_ticks` refreshes, live afterwards
    fn scripted(pending_ticks: u32, calls: Arc<AtomicU32>) -> impl FnMut() -> std::future::Ready<Result<Phase, ClientError>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let phase = if n < pending_ticks { Phase::Pending } else { Phase::Live };
            std::future::ready(Ok(phase))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaches_target_after_settle_count() {
        let calls = Arc::new(AtomicU32::new(0));
        let spec = pool_spec(Duration::from_secs(600), 3);

        let outcome = wait_for(&spec, &CancellationToken::new(), scripted(4, calls.clone()))
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::Reached(Phase::Live));
        // 4 pending observations, then exactly 3 consecutive live ones
        assert_eq!(calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_observation_is_enough_by_default() {
        let calls = Arc::new(AtomicU32::new(0));
        let spec = pool_spec(Duration::from_secs(600), 1);

        wait_for(&spec, &CancellationToken::new(), scripted(2, calls.clone()))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flapping_resets_settle_counter() {
        let script = [
            Phase::Live,
            Phase::Pending,
            Phase::Live,
            Phase::Live,
        ];
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let spec = pool_spec(Duration::from_secs(600), 2);

        let outcome = wait_for(&spec, &CancellationToken::new(), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) as usize;
            std::future::ready(Ok::<_, ClientError>(script[n.min(script.len() - 1)]))
        })
        .await
        .unwrap();

        assert_eq!(outcome, PollOutcome::Reached(Phase::Live));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_target_status_restarts_settle_count() {
        let script = [Phase::Live, Phase::Broken, Phase::Broken];
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let spec = PollSpec::new(
            vec![Phase::Pending],
            vec![Phase::Live, Phase::Broken],
            Duration::from_secs(600),
        )
        .with_timing(timing(2));

        let outcome = wait_for(&spec, &CancellationToken::new(), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) as usize;
            std::future::ready(Ok::<_, ClientError>(script[n.min(script.len() - 1)]))
        })
        .await
        .unwrap();

        assert_eq!(outcome, PollOutcome::Reached(Phase::Broken));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_never_leaving_pending() {
        let timeout = Duration::from_secs(60);
        let spec = pool_spec(timeout, 1);
        let started = Instant::now();

        let err = wait_for(&spec, &CancellationToken::new(), || {
            std::future::ready(Ok::<_, ClientError>(Phase::Pending))
        })
        .await
        .unwrap_err();

        match err {
            PollError::Timeout {
                last_status,
                elapsed,
            } => {
                assert_eq!(last_status.as_deref(), Some("Pending"));
                assert!(elapsed >= timeout);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(started.elapsed() >= timeout);
        assert!(started.elapsed() < timeout + Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_status_fails_fast() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let spec = pool_spec(Duration::from_secs(600), 1);

        let err = wait_for(&spec, &CancellationToken::new(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok::<_, ClientError>(Phase::Broken))
        })
        .await
        .unwrap_err();

        assert_eq!(
            err,
            PollError::UnexpectedStatus {
                status: "Broken".to_string(),
                message: None
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_error_is_not_swallowed() {
        let spec = pool_spec(Duration::from_secs(600), 1);

        let err = wait_for(&spec, &CancellationToken::new(), || {
            std::future::ready(Err::<Phase, _>(ClientError::NotFound("DPO01".into())))
        })
        .await
        .unwrap_err();

        assert_eq!(
            err,
            PollError::Refresh(ClientError::NotFound("DPO01".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletion_treats_not_found_as_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let spec = PollSpec::deletion(vec![Phase::Live, Phase::Pending], Duration::from_secs(300))
            .with_timing(timing(1));

        let outcome = wait_for(&spec, &CancellationToken::new(), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n < 2 {
                Ok(Phase::Pending)
            } else {
                Err(ClientError::NotFound("DPO01".into()))
            })
        })
        .await
        .unwrap();

        assert_eq!(outcome, PollOutcome::Gone);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletion_fails_on_other_errors() {
        let spec = PollSpec::deletion(vec![Phase::Live], Duration::from_secs(300))
            .with_timing(timing(1));

        let err = wait_for(&spec, &CancellationToken::new(), || {
            std::future::ready(Err::<Phase, _>(ClientError::Transport("reset".into())))
        })
        .await
        .unwrap_err();

        assert_eq!(err, PollError::Refresh(ClientError::Transport("reset".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_promptly() {
        let spec = pool_spec(Duration::from_secs(3600), 1);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let started = Instant::now();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            trigger.cancel();
        });

        let err = wait_for(&spec, &cancel, || {
            std::future::ready(Ok::<_, ClientError>(Phase::Pending))
        })
        .await
        .unwrap_err();

        assert_eq!(err, PollError::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(20));
    }
}
