use std::{
    fmt,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Action, Result, StorageError},
    executor::Executor,
    metrics,
    request::{Operation, RequestBuilder},
};

/// Server-issued transaction identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of the connector's transaction slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    NotStarted,
    Active,
    /// The last transaction was committed or rolled back
    Terminated,
}

/// Who opened the active transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Owner {
    Caller,
    AutoCommit,
}

impl Owner {
    fn label(self) -> &'static str {
        match self {
            Owner::Caller => "caller",
            Owner::AutoCommit => "auto_commit",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Finish {
    Commit,
    Rollback,
}

impl Finish {
    fn action(self) -> Action {
        match self {
            Finish::Commit => Action::CommitTransaction,
            Finish::Rollback => Action::RollbackTransaction,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Finish::Commit => "commit",
            Finish::Rollback => "rollback",
        }
    }

    fn operation(self) -> Operation<'static> {
        match self {
            Finish::Commit => Operation::Commit,
            Finish::Rollback => Operation::Rollback,
        }
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Idle { terminated: bool },
    Beginning,
    Active { id: TransactionId, owner: Owner },
    Completing { id: TransactionId },
}

impl Slot {
    fn holds(&self, txn: &TransactionId) -> bool {
        matches!(self, Slot::Active { id, .. } | Slot::Completing { id, .. } if id == txn)
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the single transaction slot of a connector.
///
/// At most one transaction is active at a time. Auto-commit units are
/// serialized by `writer_gate` and join a caller transaction when one is open.
#[derive(Clone)]
pub(crate) struct TransactionManager {
    executor: Executor,
    builder: RequestBuilder,
    slot: Arc<Mutex<Slot>>,
    writer_gate: Arc<Semaphore>,
}

impl TransactionManager {
    pub(crate) fn new(executor: Executor, builder: RequestBuilder) -> Self {
        Self {
            executor,
            builder,
            slot: Arc::new(Mutex::new(Slot::Idle { terminated: false })),
            writer_gate: Arc::new(Semaphore::new(1)),
        }
    }

    pub(crate) fn status(&self) -> TransactionStatus {
        match &*lock(&self.slot) {
            Slot::Idle { terminated: true } => TransactionStatus::Terminated,
            Slot::Idle { terminated: false } | Slot::Beginning => TransactionStatus::NotStarted,
            Slot::Active { .. } | Slot::Completing { .. } => TransactionStatus::Active,
        }
    }

    /// Transaction opened by the caller, if any.
    pub(crate) fn caller_transaction(&self) -> Option<TransactionId> {
        match &*lock(&self.slot) {
            Slot::Active {
                id,
                owner: Owner::Caller,
            } => Some(id.clone()),
            _ => None,
        }
    }

    /// Any open transaction, whoever owns it.
    pub(crate) fn active_transaction(&self) -> Option<TransactionId> {
        match &*lock(&self.slot) {
            Slot::Active { id, .. } | Slot::Completing { id, .. } => Some(id.clone()),
            _ => None,
        }
    }

    pub(crate) async fn begin(
        &self,
        owner: Owner,
        reasoning: bool,
        cancel: &CancellationToken,
    ) -> Result<TransactionId> {
        {
            let mut slot = lock(&self.slot);
            if !matches!(*slot, Slot::Idle { .. }) {
                return Err(StorageError::TransactionAlreadyActive);
            }
            *slot = Slot::Beginning;
        }
        let mut claim = BeginClaim {
            slot: &self.slot,
            armed: true,
        };

        let request = self.builder.build(Operation::Begin { reasoning }, None)?;
        let result = self
            .executor
            .send(Action::BeginTransaction, request, cancel)
            .await;
        let backend = self.executor.backend();
        let response = match result {
            Ok(response) => response,
            Err(error) => {
                metrics::record_transaction_event(backend, "begin", owner.label(), false);
                return Err(error);
            }
        };

        let id = response.body_text().trim().to_string();
        if id.is_empty() {
            metrics::record_transaction_event(backend, "begin", owner.label(), false);
            return Err(StorageError::InvalidResponse {
                action: Action::BeginTransaction,
                reason: "failed to begin a transaction, the store returned an empty transaction id"
                    .to_string(),
            });
        }

        let id = TransactionId::new(id);
        *lock(&self.slot) = Slot::Active {
            id: id.clone(),
            owner,
        };
        claim.armed = false;

        metrics::record_transaction_event(backend, "begin", owner.label(), true);
        tracing::debug!(
            backend,
            knowledge_base = self.builder.knowledge_base(),
            txn = %id,
            owner = owner.label(),
            reasoning,
            "Transaction started"
        );
        Ok(id)
    }

    pub(crate) async fn commit(&self, owner: Owner, cancel: &CancellationToken) -> Result<()> {
        self.finish(Finish::Commit, owner, cancel).await
    }

    pub(crate) async fn rollback(&self, owner: Owner, cancel: &CancellationToken) -> Result<()> {
        self.finish(Finish::Rollback, owner, cancel).await
    }

    async fn finish(&self, finish: Finish, owner: Owner, cancel: &CancellationToken) -> Result<()> {
        let id = {
            let mut slot = lock(&self.slot);
            let id = match &*slot {
                Slot::Active { id, owner: current } if *current == owner => id.clone(),
                _ => {
                    return Err(StorageError::NoActiveTransaction {
                        operation: finish.label(),
                    });
                }
            };
            *slot = Slot::Completing { id: id.clone() };
            id
        };
        // Failure or cancellation leaves the transaction active.
        let mut restore = RestoreOnFailure {
            slot: &self.slot,
            id: &id,
            owner,
            armed: true,
        };

        let request = self.builder.build(finish.operation(), Some(&id))?;
        let result = self.executor.send(finish.action(), request, cancel).await;
        let backend = self.executor.backend();
        metrics::record_transaction_event(backend, finish.label(), owner.label(), result.is_ok());
        result?;

        *lock(&self.slot) = Slot::Idle { terminated: true };
        restore.armed = false;
        tracing::debug!(
            backend,
            txn = %id,
            owner = owner.label(),
            "Transaction {}",
            match finish {
                Finish::Commit => "committed",
                Finish::Rollback => "rolled back",
            }
        );
        Ok(())
    }

    /// Run `body` inside a transaction.
    ///
    /// With a caller transaction open, `body` joins it and nothing is
    /// committed. Otherwise a private transaction is begun, committed when
    /// `body` succeeds and rolled back once when anything fails; the rollback
    /// uses a fresh token so it still goes out after cancellation, and the
    /// original error is returned.
    pub(crate) async fn run_auto_commit<T, F, Fut>(
        &self,
        action: Action,
        cancel: &CancellationToken,
        body: F,
    ) -> Result<T>
    where
        F: FnOnce(TransactionId) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(txn) = self.caller_transaction() {
            return body(txn).await;
        }
        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled { action });
        }

        let backend = self.executor.backend();
        let wait_started = Instant::now();
        let _gate = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StorageError::Cancelled { action }),
            permit = self.writer_gate.acquire() => {
                permit.map_err(|_| StorageError::SemaphoreClosed)?
            }
        };
        metrics::record_writer_gate_wait(backend, action, wait_started.elapsed());

        if let Some(txn) = self.caller_transaction() {
            return body(txn).await;
        }

        let started = Instant::now();
        let txn = self.begin(Owner::AutoCommit, false, cancel).await?;
        let mut abandon = AbandonGuard {
            manager: self.clone(),
            txn: txn.clone(),
            armed: true,
        };

        let result = match body(txn.clone()).await {
            Ok(value) => self.commit(Owner::AutoCommit, cancel).await.map(|()| value),
            Err(error) => Err(error),
        };
        abandon.armed = false;

        match result {
            Ok(value) => {
                metrics::record_auto_commit(backend, action, None, started.elapsed());
                Ok(value)
            }
            Err(error) => {
                self.rollback_after_failure(action, &txn, &error).await;
                metrics::record_auto_commit(backend, action, Some(&error), started.elapsed());
                Err(error)
            }
        }
    }

    async fn rollback_after_failure(
        &self,
        action: Action,
        txn: &TransactionId,
        cause: &StorageError,
    ) {
        let backend = self.executor.backend();
        let fresh = CancellationToken::new();
        match self.rollback(Owner::AutoCommit, &fresh).await {
            Ok(()) => {
                metrics::record_auto_commit_rollback(backend, action, true);
                tracing::debug!(
                    backend,
                    txn = %txn,
                    cause = %cause,
                    "Auto-commit transaction rolled back"
                );
            }
            Err(rollback_error) => {
                metrics::record_auto_commit_rollback(backend, action, false);
                tracing::warn!(
                    backend,
                    txn = %txn,
                    cause = %cause,
                    error = %rollback_error,
                    "Failed to roll back auto-commit transaction"
                );
                self.release(txn);
            }
        }
    }

    /// Forget `txn` if it still occupies the slot.
    fn release(&self, txn: &TransactionId) {
        let mut slot = lock(&self.slot);
        if slot.holds(txn) {
            *slot = Slot::Idle { terminated: true };
        }
    }

    fn spawn_rollback(&self, txn: TransactionId) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(txn = %txn, "No runtime to roll back abandoned transaction");
            return;
        };
        let executor = self.executor.clone();
        let request = match self.builder.build(Operation::Rollback, Some(&txn)) {
            Ok(request) => request,
            Err(error) => {
                tracing::warn!(txn = %txn, error = %error, "Cannot build rollback request");
                return;
            }
        };
        handle.spawn(async move {
            let fresh = CancellationToken::new();
            let result = executor
                .send(Action::RollbackTransaction, request, &fresh)
                .await;
            if let Err(error) = result {
                tracing::warn!(
                    txn = %txn,
                    error = %error,
                    "Rollback of abandoned transaction failed"
                );
            }
        });
    }
}

/// Resets a `Beginning` slot when begin fails or its future is dropped.
struct BeginClaim<'a> {
    slot: &'a Mutex<Slot>,
    armed: bool,
}

impl Drop for BeginClaim<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut slot = lock(self.slot);
            if matches!(*slot, Slot::Beginning) {
                *slot = Slot::Idle { terminated: false };
            }
        }
    }
}

/// Puts a `Completing` transaction back to `Active` when commit or rollback
/// does not go through.
struct RestoreOnFailure<'a> {
    slot: &'a Mutex<Slot>,
    id: &'a TransactionId,
    owner: Owner,
    armed: bool,
}

impl Drop for RestoreOnFailure<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut slot = lock(self.slot);
            if matches!(&*slot, Slot::Completing { id, .. } if id == self.id) {
                *slot = Slot::Active {
                    id: self.id.clone(),
                    owner: self.owner,
                };
            }
        }
    }
}

/// Frees the slot and rolls back in the background when an auto-commit
/// future is dropped before it finished.
struct AbandonGuard {
    manager: TransactionManager,
    txn: TransactionId,
    armed: bool,
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if self.armed {
            self.manager.release(&self.txn);
            self.manager.spawn_rollback(self.txn.clone());
        }
    }
}
