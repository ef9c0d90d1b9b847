use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Action, Result, StorageError},
    error_classification, metrics,
    transport::{HttpResponse, RequestDescriptor, Transport},
};

/// Terminal state of an operation as reported to callbacks
#[derive(Debug)]
pub enum Outcome<T> {
    Completed(T),
    Failed(StorageError),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn into_result(self, action: Action) -> Result<T> {
        match self {
            Outcome::Completed(value) => Ok(value),
            Outcome::Failed(error) => Err(error),
            Outcome::Cancelled => Err(StorageError::Cancelled { action }),
        }
    }
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Outcome::Completed(value),
            Err(StorageError::Cancelled { .. }) => Outcome::Cancelled,
            Err(error) => Outcome::Failed(error),
        }
    }
}

/// Sends requests through a transport with a concurrency limit, cooperative
/// cancellation and per-request metrics.
#[derive(Clone)]
pub(crate) struct Executor {
    backend: &'static str,
    transport: Arc<dyn Transport>,
    concurrency_limiter: Arc<Semaphore>,
    max_concurrent: usize,
}

impl Executor {
    pub(crate) fn new(
        backend: &'static str,
        transport: Arc<dyn Transport>,
        max_concurrent_operations: usize,
    ) -> Self {
        let max_concurrent = max_concurrent_operations.max(1);
        if max_concurrent != max_concurrent_operations {
            tracing::warn!(
                backend,
                configured = max_concurrent_operations,
                effective = max_concurrent,
                "max_concurrent_operations too low; clamped"
            );
        }
        tracing::debug!(
            backend,
            transport = transport.name(),
            max_concurrent,
            "Store request limiter initialized"
        );
        Self {
            backend,
            transport,
            concurrency_limiter: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub(crate) fn backend(&self) -> &'static str {
        self.backend
    }

    fn record_permit_snapshot(&self) {
        metrics::record_permit_snapshot(
            self.backend,
            self.max_concurrent,
            self.concurrency_limiter.available_permits(),
        );
    }

    async fn acquire_permit(
        &self,
        action: Action,
        cancel: &CancellationToken,
    ) -> Result<OwnedSemaphorePermit> {
        let wait_started = Instant::now();
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                metrics::record_cancelled(self.backend, action, "queued");
                return Err(StorageError::Cancelled { action });
            }
            permit = self.concurrency_limiter.clone().acquire_owned() => {
                permit.map_err(|_| StorageError::SemaphoreClosed)?
            }
        };
        metrics::record_permit_wait(self.backend, action, wait_started.elapsed());
        self.record_permit_snapshot();
        Ok(permit)
    }

    /// Send one request and require a 2xx answer.
    pub(crate) async fn send(
        &self,
        action: Action,
        request: RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        let response = self.execute(action, request, cancel).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(error_classification::from_http(action, &response))
        }
    }

    /// Send one request and hand back whatever status the store answered with.
    ///
    /// A token that is already cancelled sends nothing. Cancellation while the
    /// request is in flight drops the exchange.
    pub(crate) async fn execute(
        &self,
        action: Action,
        request: RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        if cancel.is_cancelled() {
            metrics::record_cancelled(self.backend, action, "before_send");
            return Err(StorageError::Cancelled { action });
        }

        let started = Instant::now();
        let permit = self.acquire_permit(action, cancel).await?;

        let method = request.method.clone();
        let path = request.path.clone();
        let request_bytes = request.body.as_ref().map_or(0, |body| body.len());
        metrics::record_request_bytes(self.backend, action, request_bytes);

        tracing::debug!(
            backend = self.backend,
            action = action.label(),
            method = %method,
            path = %path,
            request_bytes,
            "Sending store request"
        );

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                metrics::record_cancelled(self.backend, action, "in_flight");
                tracing::debug!(
                    backend = self.backend,
                    action = action.label(),
                    path = %path,
                    "Store request abandoned after cancellation"
                );
                Err(StorageError::Cancelled { action })
            }
            response = self.transport.execute(request) => {
                response.map_err(|e| error_classification::from_transport(action, e))
            }
        };
        drop(permit);
        self.record_permit_snapshot();

        let elapsed = started.elapsed();
        match &result {
            Ok(response) => {
                metrics::record_response_bytes(self.backend, action, response.body_bytes().len());
                let error = (!response.is_success())
                    .then(|| error_classification::from_http(action, response));
                metrics::record_request(self.backend, action, error.as_ref(), elapsed);
                log_completion(self.backend, action, &method, &path, response.status, elapsed);
            }
            Err(error) => {
                metrics::record_request(self.backend, action, Some(error), elapsed);
                if !error.is_cancelled() {
                    tracing::warn!(
                        backend = self.backend,
                        action = action.label(),
                        method = %method,
                        path = %path,
                        error = %error,
                        "Store request failed"
                    );
                }
            }
        }
        result
    }
}

fn log_completion(
    backend: &str,
    action: Action,
    method: &reqwest::Method,
    path: &str,
    status: u16,
    elapsed: Duration,
) {
    if (200..300).contains(&status) {
        tracing::debug!(
            backend,
            action = action.label(),
            method = %method,
            path,
            status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Store request completed"
        );
    } else {
        tracing::warn!(
            backend,
            action = action.label(),
            method = %method,
            path,
            status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Store answered with an error status"
        );
    }
}
