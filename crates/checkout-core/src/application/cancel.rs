use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::errors::CheckoutError;

/// Cancels whatever checkout step is in flight when `cancel` is called.
#[derive(Clone)]
pub struct CancelHandle {
    cancel: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }
}

/// Bounds each remote step with a timeout and the session's cancel signal.
pub(crate) struct CallGuard {
    timeout: Duration,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl CallGuard {
    pub(crate) fn new(timeout: Duration) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            timeout,
            cancel_tx: Arc::new(tx),
            cancel_rx: rx,
        }
    }

    pub(crate) fn handle(&self) -> CancelHandle {
        CancelHandle {
            cancel: self.cancel_tx.clone(),
        }
    }

    /// Clears a cancel request left over from an earlier step.
    pub(crate) fn rearm(&self) {
        self.cancel_tx.send_replace(false);
    }

    pub(crate) async fn run<T, E, F>(
        &self,
        operation: &'static str,
        fut: F,
    ) -> Result<T, CheckoutError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<StepError>,
    {
        let mut cancel = self.cancel_rx.clone();
        tokio::select! {
            res = tokio::time::timeout(self.timeout, fut) => match res {
                Ok(Ok(v)) => Ok(v),
                Ok(Err(e)) => Err(e.into().into_checkout(operation)),
                Err(_) => {
                    tracing::warn!(operation, timeout_ms = self.timeout.as_millis() as u64, "remote call timed out");
                    Err(CheckoutError::Timeout { operation, after: self.timeout })
                }
            },
            _ = cancelled(&mut cancel) => {
                tracing::info!(operation, "cancelled");
                Err(CheckoutError::Cancelled)
            }
        }
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Failure of a single guarded step before it is tagged with its operation.
pub(crate) enum StepError {
    Api(checkout_types::ports::commerce_api::ApiError),
    Gateway(checkout_types::ports::payment_gateway::GatewayError),
}

impl StepError {
    fn into_checkout(self, operation: &'static str) -> CheckoutError {
        match self {
            StepError::Api(source) => CheckoutError::RemoteCall { operation, source },
            StepError::Gateway(e) => CheckoutError::Gateway(e.0),
        }
    }
}

impl From<checkout_types::ports::commerce_api::ApiError> for StepError {
    fn from(e: checkout_types::ports::commerce_api::ApiError) -> Self {
        StepError::Api(e)
    }
}

impl From<checkout_types::ports::payment_gateway::GatewayError> for StepError {
    fn from(e: checkout_types::ports::payment_gateway::GatewayError) -> Self {
        StepError::Gateway(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_types::ports::commerce_api::ApiError;

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let guard = CallGuard::new(Duration::from_millis(100));
        let res: Result<(), _> = guard
            .run("place order", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, ApiError>(())
            })
            .await;
        assert!(matches!(
            res,
            Err(CheckoutError::Timeout { operation: "place order", .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_pending_call() {
        let guard = CallGuard::new(Duration::from_secs(60));
        let handle = guard.handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.cancel();
        });
        let res: Result<(), _> = guard
            .run("verify payment", async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, ApiError>(())
            })
            .await;
        assert!(matches!(res, Err(CheckoutError::Cancelled)));

        guard.rearm();
        let ok = guard.run("verify payment", async { Ok::<_, ApiError>(5) }).await;
        assert_eq!(ok.unwrap(), 5);
    }

    #[tokio::test]
    async fn api_errors_are_tagged_with_operation() {
        let guard = CallGuard::new(Duration::from_secs(1));
        let res: Result<(), _> = guard
            .run("create address", async { Err(ApiError::status(500, "boom")) })
            .await;
        match res {
            Err(CheckoutError::RemoteCall { operation, source }) => {
                assert_eq!(operation, "create address");
                assert_eq!(source.status_code(), Some(500));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
