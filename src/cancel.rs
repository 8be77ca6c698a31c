//! Cancellation signal threaded through every external call
//!
//! One handle/token pair per invocation: ctrl-c fires the handle, and the
//! token is passed down into the LLM transport, shell execution, and HTTP
//! fetch so an in-flight call is aborted rather than merely outlived. The
//! orchestrator also observes the token at iteration boundaries and pauses
//! the session.

use tokio::sync::watch;

/// Fires the cancellation signal. Held by the process entry point.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observes the cancellation signal. Cheap to clone and pass down.
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the handle fires. If the handle is gone without firing,
    /// this never resolves, so `tokio::select!` arms fall through to the
    /// racing call.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// A token with no interrupt source behind it.
    pub fn never() -> Self {
        channel().1
    }
}

/// Create a connected handle/token pair.
pub fn channel() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}
