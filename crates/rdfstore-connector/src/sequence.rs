use std::future::Future;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Action, Result, StorageError},
    executor::Executor,
    metrics,
    transport::RequestDescriptor,
};

/// Run independent steps concurrently under a shared child token.
///
/// The first failure cancels the remaining steps. Every step is awaited
/// before returning, and the first non-cancellation error wins.
pub(crate) async fn run_all<I, F, Fut>(
    backend: &'static str,
    action: Action,
    cancel: &CancellationToken,
    steps: I,
) -> Result<()>
where
    I: IntoIterator<Item = F>,
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    if cancel.is_cancelled() {
        return Err(StorageError::Cancelled { action });
    }

    let shared = cancel.child_token();
    let pending: Vec<_> = steps
        .into_iter()
        .map(|step| {
            let token = shared.clone();
            async move {
                let result = step(token.clone()).await;
                if result.is_err() {
                    token.cancel();
                }
                result
            }
        })
        .collect();
    let requests = pending.len();
    let results = join_all(pending).await;

    let mut cancelled = None;
    let mut failure = None;
    for result in results {
        match result {
            Ok(()) => {}
            Err(error @ StorageError::Cancelled { .. }) => {
                cancelled.get_or_insert(error);
            }
            Err(error) => {
                failure.get_or_insert(error);
            }
        }
    }

    let outcome = match (failure, cancelled) {
        (Some(error), _) => Err(error),
        (None, Some(_)) if cancel.is_cancelled() => Err(StorageError::Cancelled { action }),
        (None, Some(error)) => Err(error),
        (None, None) => Ok(()),
    };
    metrics::record_sequence(backend, action, outcome.as_ref().err(), requests);
    if let Err(error) = &outcome {
        tracing::debug!(
            backend,
            action = action.label(),
            requests,
            error = %error,
            "Request sequence did not complete"
        );
    }
    outcome
}

/// Send every request and require each to succeed.
pub(crate) async fn send_all(
    executor: &Executor,
    action: Action,
    requests: Vec<RequestDescriptor>,
    cancel: &CancellationToken,
) -> Result<()> {
    let steps = requests.into_iter().map(|request| {
        move |token: CancellationToken| async move {
            executor.send(action, request, &token).await.map(|_| ())
        }
    });
    run_all(executor.backend(), action, cancel, steps).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use super::*;

    type Step =
        Box<dyn FnOnce(CancellationToken) -> futures::future::BoxFuture<'static, Result<()>>>;

    fn ok_step(counter: Arc<AtomicUsize>) -> Step {
        Box::new(move |_token| {
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn all_steps_succeed() {
        let counter = Arc::new(AtomicUsize::new(0));
        let steps = vec![
            ok_step(counter.clone()),
            ok_step(counter.clone()),
            ok_step(counter.clone()),
        ];
        run_all("test", Action::DeleteGraph, &CancellationToken::new(), steps)
            .await
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn first_failure_cancels_siblings_and_wins() {
        let failing: Step = Box::new(|_token| {
            Box::pin(async { Err(StorageError::Unsupported("boom".to_string())) })
        });
        let waiting: Step = Box::new(|token: CancellationToken| {
            Box::pin(async move {
                tokio::select! {
                    _ = token.cancelled() => {
                        Err(StorageError::Cancelled { action: Action::DeleteGraph })
                    }
                    _ = tokio::time::sleep(Duration::from_secs(30)) => Ok(()),
                }
            })
        });

        let parent = CancellationToken::new();
        let result = run_all("test", Action::DeleteGraph, &parent, vec![waiting, failing]).await;
        assert!(matches!(result, Err(StorageError::Unsupported(_))));
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_parent_runs_nothing() {
        let counter = Arc::new(AtomicUsize::new(0));
        let parent = CancellationToken::new();
        parent.cancel();
        let steps = vec![ok_step(counter.clone())];
        let result = run_all("test", Action::DeleteGraph, &parent, steps).await;
        assert!(matches!(result, Err(StorageError::Cancelled { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
