//! Consumer polling.
//!
//! Each display surface (summary bar, live station view) runs its own
//! `spawn_poller` with its own cadence. There is no coordination between
//! pollers and no shared state beyond what each one publishes on its
//! `watch` channel.
//!
//! Contract:
//! - the first request goes out immediately, then one per `interval`;
//! - requests may overlap; each carries a sequence number and a completion
//!   older than the newest applied one is discarded;
//! - a failure keeps the last-known-good value and marks the view stale;
//!   the next tick is the retry;
//! - dropping the `PollerHandle` (or calling `shutdown`) stops the timer and
//!   aborts every in-flight request.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use crate::logging::{self, DataSource};
use crate::model::StatusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// A request still pending after this long counts as failed.
    pub fetch_timeout: Duration,
}

/// What a consumer currently shows.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerView<T> {
    /// Last successfully fetched value, kept across failures.
    pub latest: Option<T>,
    /// Sequence number of the request `latest` came from (0 = none yet).
    pub applied_seq: u64,
    /// Set when the most recent applicable request failed.
    pub stale: bool,
    pub last_error: Option<StatusError>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for ConsumerView<T> {
    fn default() -> Self {
        Self {
            latest: None,
            applied_seq: 0,
            stale: false,
            last_error: None,
            updated_at: None,
        }
    }
}

impl<T> ConsumerView<T> {
    /// Applies the outcome of request `seq`. Returns `false` when the outcome
    /// is older than what is already displayed and was discarded.
    pub fn apply(&mut self, seq: u64, outcome: Result<T, StatusError>, now: DateTime<Utc>) -> bool {
        if seq <= self.applied_seq {
            return false;
        }
        match outcome {
            Ok(value) => {
                self.latest = Some(value);
                self.applied_seq = seq;
                self.stale = false;
                self.last_error = None;
                self.updated_at = Some(now);
            }
            // applied_seq stays put: a later success from an older request
            // still carries newer data than what is on screen.
            Err(err) => {
                self.stale = true;
                self.last_error = Some(err);
            }
        }
        true
    }
}

/// Owns a running poller. Dropping it cancels the poller.
pub struct PollerHandle<T> {
    task: JoinHandle<()>,
    view: watch::Receiver<ConsumerView<T>>,
}

impl<T: Clone> PollerHandle<T> {
    /// Snapshot of the current view.
    pub fn view(&self) -> ConsumerView<T> {
        self.view.borrow().clone()
    }
}

impl<T> PollerHandle<T> {
    /// Additional receiver for the same view.
    pub fn subscribe(&self) -> watch::Receiver<ConsumerView<T>> {
        self.view.clone()
    }

    /// Waits until the view changes.
    pub async fn changed(&mut self) -> Result<(), StatusError> {
        self.view
            .changed()
            .await
            .map_err(|_| StatusError::SourceUnavailable("poller stopped".to_string()))
    }

    /// Stops polling. Equivalent to dropping the handle.
    pub fn shutdown(self) {}
}

impl<T> Drop for PollerHandle<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Starts polling `fetch` on its own task.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_poller<T, F, Fut>(name: impl Into<String>, settings: PollSettings, fetch: F) -> PollerHandle<T>
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, StatusError>> + Send + 'static,
{
    let (tx, rx) = watch::channel(ConsumerView::default());
    let task = tokio::spawn(run(name.into(), settings, fetch, tx));
    PollerHandle { task, view: rx }
}

async fn run<T, F, Fut>(name: String, settings: PollSettings, fetch: F, tx: watch::Sender<ConsumerView<T>>)
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, StatusError>> + Send + 'static,
{
    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Dropped (and every request in it aborted) when this task ends or is aborted.
    let mut in_flight: JoinSet<(u64, Result<T, StatusError>)> = JoinSet::new();
    let mut next_seq: u64 = 0;

    logging::debug(DataSource::Poller, None, &format!("{}: polling every {:?}", name, settings.interval));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                next_seq += 1;
                let seq = next_seq;
                let request = fetch();
                let timeout = settings.fetch_timeout;
                in_flight.spawn(async move {
                    let outcome = match tokio::time::timeout(timeout, request).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(StatusError::SourceUnavailable(format!(
                            "request {} timed out after {:?}",
                            seq, timeout
                        ))),
                    };
                    (seq, outcome)
                });
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                match joined {
                    Ok((seq, outcome)) => {
                        if let Err(err) = &outcome {
                            logging::log_source_failure(DataSource::Poller, None, &name, err);
                        }
                        let now = Utc::now();
                        let applied = tx.send_if_modified(|view| view.apply(seq, outcome, now));
                        if !applied {
                            logging::debug(
                                DataSource::Poller,
                                None,
                                &format!("{}: discarded out-of-order response {}", name, seq),
                            );
                        }
                    }
                    Err(join_err) if join_err.is_cancelled() => {}
                    Err(join_err) => {
                        logging::error(DataSource::Poller, None, &format!("{}: request panicked: {}", name, join_err));
                    }
                }
            }
            _ = tx.closed() => {
                logging::debug(DataSource::Poller, None, &format!("{}: no consumers left, stopping", name));
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn t(sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, sec).unwrap()
    }

    fn offline() -> StatusError {
        StatusError::SourceUnavailable("offline".to_string())
    }

    fn settings(interval_secs: u64, timeout_secs: u64) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(interval_secs),
            fetch_timeout: Duration::from_secs(timeout_secs),
        }
    }

    // --- ConsumerView::apply -----------------------------------------------

    #[test]
    fn test_apply_success_then_failure_keeps_last_known_good() {
        let mut view = ConsumerView::default();
        assert!(view.apply(1, Ok(10), t(0)));
        assert!(view.apply(2, Err(offline()), t(1)));

        assert_eq!(view.latest, Some(10));
        assert_eq!(view.applied_seq, 1);
        assert!(view.stale);
        assert_eq!(view.last_error, Some(offline()));
        assert_eq!(view.updated_at, Some(t(0)));
    }

    #[test]
    fn test_apply_discards_older_responses() {
        let mut view = ConsumerView::default();
        assert!(view.apply(3, Ok(30), t(0)));
        assert!(!view.apply(2, Ok(20), t(1)), "older success must not regress");
        assert!(!view.apply(1, Err(offline()), t(2)), "older failure must not mark stale");
        assert_eq!(view.latest, Some(30));
        assert!(!view.stale);
    }

    #[test]
    fn test_late_success_after_newer_failure_is_applied() {
        let mut view = ConsumerView::default();
        assert!(view.apply(1, Ok(1), t(0)));
        assert!(view.apply(3, Err(offline()), t(1)));
        assert!(view.apply(2, Ok(2), t(2)));
        assert_eq!(view.latest, Some(2));
        assert_eq!(view.applied_seq, 2);
        assert!(!view.stale);
    }

    // --- Running poller -----------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_first_fetch_happens_immediately() {
        let mut handle = spawn_poller("test", settings(30, 10), || async { Ok(7u32) });
        handle.changed().await.unwrap();

        let view = handle.view();
        assert_eq!(view.latest, Some(7));
        assert_eq!(view.applied_seq, 1);
        assert!(!view.stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_retried_on_next_tick() {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        let mut handle = spawn_poller("test", settings(30, 10), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { if n == 2 { Err(offline()) } else { Ok(n) } }
        });

        handle.changed().await.unwrap();
        assert_eq!(handle.view().latest, Some(1));

        handle.changed().await.unwrap();
        let view = handle.view();
        assert_eq!(view.latest, Some(1), "last-known-good survives the failure");
        assert!(view.stale);

        handle.changed().await.unwrap();
        let view = handle.view();
        assert_eq!(view.latest, Some(3));
        assert!(!view.stale);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_response_overtaken_by_newer_one_is_discarded() {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        // Request 1 takes 45s; request 2 (t=30) answers at once; request 3 at t=60.
        let mut handle = spawn_poller("test", settings(30, 120), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 1 {
                    tokio::time::sleep(Duration::from_secs(45)).await;
                }
                Ok(n)
            }
        });

        handle.changed().await.unwrap();
        assert_eq!(handle.view().latest, Some(2));

        // The t=45 completion of request 1 must not surface.
        handle.changed().await.unwrap();
        let view = handle.view();
        assert_eq!(view.latest, Some(3));
        assert_eq!(view.applied_seq, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_fetch_times_out_as_stale() {
        let mut handle = spawn_poller("test", settings(30, 5), || {
            std::future::pending::<Result<u32, StatusError>>()
        });
        handle.changed().await.unwrap();

        let view = handle.view();
        assert!(view.latest.is_none());
        assert!(view.stale);
        assert!(matches!(view.last_error, Some(StatusError::SourceUnavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_polling() {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        let mut handle = spawn_poller("test", settings(5, 1), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(n) }
        });
        handle.changed().await.unwrap();
        handle.shutdown();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "no fetch after teardown");
    }
}
