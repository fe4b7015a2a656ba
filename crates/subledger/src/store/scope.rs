//! Per-call deadlines and caller-driven cancellation.

use crate::error::{StoreError, StoreResult};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Create a connected cancellation pair.
///
/// Dropping the [`CancelHandle`] without calling [`CancelHandle::cancel`] never cancels.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

/// The caller's side: flips every associated [`CancelSignal`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// The store's side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Handle dropped without cancelling.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Bounds applied to every statement a store issues.
#[derive(Debug, Clone, Default)]
pub struct CallScope {
    timeout: Option<Duration>,
    cancel: Option<CancelSignal>,
}

impl CallScope {
    /// No deadline, no cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail calls that run longer than `timeout` with [`StoreError::Timeout`].
    ///
    /// An expired statement is cancelled on the server and awaited, so the call can
    /// return somewhat after `timeout` elapses.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fail calls with [`StoreError::Cancelled`] once `signal` fires.
    pub fn with_cancel(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Start the clock for one call. Connection acquisition and the statement itself share
    /// the same deadline.
    pub(crate) fn start(&self) -> ActiveCall {
        ActiveCall {
            deadline: self.timeout.map(|t| (Instant::now() + t, t)),
            cancel: self.cancel.clone(),
        }
    }
}

/// A call in flight.
pub(crate) struct ActiveCall {
    deadline: Option<(Instant, Duration)>,
    cancel: Option<CancelSignal>,
}

#[derive(Debug, Clone, Copy)]
enum Abort {
    Deadline(Duration),
    Caller,
}

impl Abort {
    fn into_error(self, op: &'static str) -> StoreError {
        match self {
            Abort::Deadline(after) => StoreError::Timeout { op, after },
            Abort::Caller => StoreError::Cancelled { op },
        }
    }
}

impl ActiveCall {
    /// Drive `fut` to completion unless the deadline passes or the caller cancels.
    ///
    /// Without a cancel token the abandoned future is dropped. With one, the server is
    /// asked to abort the statement and `fut` is still driven to its end, so the
    /// connection it borrows is idle again before it can return to the pool. A statement
    /// that finished before the cancel landed reports its real outcome.
    pub(crate) async fn run<T, F>(
        &mut self,
        op: &'static str,
        cancel_token: Option<tokio_postgres::CancelToken>,
        fut: F,
    ) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>> + Send,
    {
        if self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
            return Err(StoreError::Cancelled { op });
        }

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some((at, _)) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        let cancel = &mut self.cancel;
        let cancelled = async move {
            match cancel {
                Some(signal) => signal.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::pin!(fut);
        let outcome = tokio::select! {
            res = &mut fut => Ok(res),
            _ = expired => Err(Abort::Deadline(deadline.map(|(_, t)| t).unwrap_or_default())),
            _ = cancelled => Err(Abort::Caller),
        };

        let result = match outcome {
            Ok(res) => res.map_err(|e| e.in_op(op)),
            Err(abort) => match cancel_token {
                None => Err(abort.into_error(op)),
                Some(token) => {
                    if let Err(err) = token.cancel_query(tokio_postgres::NoTls).await {
                        tracing::warn!(
                            target: "subledger.store",
                            op,
                            error = %err,
                            "cancel request failed; waiting for the statement to finish"
                        );
                    }
                    match fut.await {
                        Err(StoreError::Cancelled { .. }) => Err(abort.into_error(op)),
                        res => res.map_err(|e| e.in_op(op)),
                    }
                }
            },
        };

        if let Err(err) = &result {
            tracing::warn!(target: "subledger.store", op, error = %err, "store call failed");
        }
        result
    }
}
