//! Deadlines around blocking external calls.
//!
//! The pipeline is synchronous. When a stage has a timeout, its call runs
//! on a helper thread and the caller waits on a channel with
//! `recv_timeout`. On expiry the helper is detached; whatever it returns
//! later is dropped.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum DeadlineError {
    #[error("deadline of {} ms elapsed", .0.as_millis())]
    Elapsed(Duration),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("worker thread panicked")]
    Panicked,
}

/// Run `f`, giving up after `timeout`.
///
/// With no timeout, `f` runs on the calling thread.
pub fn run_with_deadline<T, F>(stage: &str, timeout: Option<Duration>, f: F) -> Result<T, DeadlineError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let Some(timeout) = timeout else {
        return Ok(f());
    };

    let (tx, rx) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name(format!("reporag-{}", stage))
        .spawn(move || {
            // The receiver is gone once the deadline has passed.
            let _ = tx.send(f());
        })
        .map_err(DeadlineError::Spawn)?;

    match rx.recv_timeout(timeout) {
        Ok(value) => Ok(value),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            warn!(stage, timeout_ms = timeout.as_millis() as u64, "Deadline elapsed");
            Err(DeadlineError::Elapsed(timeout))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(DeadlineError::Panicked),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_timeout_runs_inline() {
        let id = thread::current().id();
        let ran_on = run_with_deadline("inline", None, move || thread::current().id() == id).unwrap();
        assert!(ran_on);
    }

    #[test]
    fn test_fast_call_completes() {
        let value = run_with_deadline("fast", Some(Duration::from_secs(5)), || 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_slow_call_elapses() {
        let result = run_with_deadline("slow", Some(Duration::from_millis(20)), || {
            thread::sleep(Duration::from_millis(500));
            1
        });
        assert!(matches!(result, Err(DeadlineError::Elapsed(_))));
    }

    #[test]
    fn test_panicking_call_reports_panic() {
        let result: Result<(), _> =
            run_with_deadline("panics", Some(Duration::from_secs(5)), || panic!("boom"));
        assert!(matches!(result, Err(DeadlineError::Panicked)));
    }
}
