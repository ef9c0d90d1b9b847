//! Callback-style invocation of connector operations.

use std::future::Future;

use oxigraph::model::Triple;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    connector::{QueryResult, StardogConnector},
    error::Result,
    executor::Outcome,
    rdf::Graph,
    transaction::TransactionId,
};

/// Operation a callback reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOperation {
    LoadGraph,
    SaveGraph,
    UpdateGraph,
    DeleteGraph,
    ListGraphs,
    Query,
    SparqlUpdate,
    TransactionBegin,
    TransactionCommit,
    TransactionRollback,
}

/// Arguments handed to a completion callback
#[derive(Debug)]
pub struct CallbackArgs<T> {
    pub operation: StorageOperation,
    pub outcome: Outcome<T>,
}

/// Spawn `future` on the current runtime and invoke `callback` exactly once
/// with its outcome.
pub fn spawn_with_callback<T, Fut, F>(
    operation: StorageOperation,
    future: Fut,
    callback: F,
) -> JoinHandle<()>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    F: FnOnce(CallbackArgs<T>) + Send + 'static,
{
    tokio::spawn(async move {
        let outcome = Outcome::from(future.await);
        if let Outcome::Failed(error) = &outcome {
            tracing::debug!(operation = ?operation, error = %error, "Storage operation failed");
        }
        callback(CallbackArgs { operation, outcome });
    })
}

impl StardogConnector {
    pub fn load_graph_with_callback<F>(
        &self,
        graph_name: Option<String>,
        cancel: CancellationToken,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(CallbackArgs<Graph>) + Send + 'static,
    {
        let connector = self.clone();
        spawn_with_callback(
            StorageOperation::LoadGraph,
            async move { connector.load_graph(graph_name.as_deref(), &cancel).await },
            callback,
        )
    }

    pub fn save_graph_with_callback<F>(
        &self,
        graph: Graph,
        cancel: CancellationToken,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(CallbackArgs<()>) + Send + 'static,
    {
        let connector = self.clone();
        spawn_with_callback(
            StorageOperation::SaveGraph,
            async move { connector.save_graph(&graph, &cancel).await },
            callback,
        )
    }

    pub fn update_graph_with_callback<F>(
        &self,
        graph_name: Option<String>,
        additions: Vec<Triple>,
        removals: Vec<Triple>,
        cancel: CancellationToken,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(CallbackArgs<()>) + Send + 'static,
    {
        let connector = self.clone();
        spawn_with_callback(
            StorageOperation::UpdateGraph,
            async move {
                connector
                    .update_graph(graph_name.as_deref(), &additions, &removals, &cancel)
                    .await
            },
            callback,
        )
    }

    pub fn delete_graph_with_callback<F>(
        &self,
        graph_name: Option<String>,
        cancel: CancellationToken,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(CallbackArgs<()>) + Send + 'static,
    {
        let connector = self.clone();
        spawn_with_callback(
            StorageOperation::DeleteGraph,
            async move { connector.delete_graph(graph_name.as_deref(), &cancel).await },
            callback,
        )
    }

    pub fn list_graphs_with_callback<F>(
        &self,
        cancel: CancellationToken,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(CallbackArgs<Vec<String>>) + Send + 'static,
    {
        let connector = self.clone();
        spawn_with_callback(
            StorageOperation::ListGraphs,
            async move { connector.list_graphs(&cancel).await },
            callback,
        )
    }

    pub fn query_with_callback<F>(
        &self,
        query: String,
        cancel: CancellationToken,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(CallbackArgs<QueryResult>) + Send + 'static,
    {
        let connector = self.clone();
        spawn_with_callback(
            StorageOperation::Query,
            async move { connector.query(&query, &cancel).await },
            callback,
        )
    }

    pub fn update_with_callback<F>(
        &self,
        sparql_update: String,
        cancel: CancellationToken,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(CallbackArgs<()>) + Send + 'static,
    {
        let connector = self.clone();
        spawn_with_callback(
            StorageOperation::SparqlUpdate,
            async move { connector.update(&sparql_update, &cancel).await },
            callback,
        )
    }

    pub fn begin_with_callback<F>(&self, cancel: CancellationToken, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(CallbackArgs<TransactionId>) + Send + 'static,
    {
        let connector = self.clone();
        spawn_with_callback(
            StorageOperation::TransactionBegin,
            async move { connector.begin(&cancel).await },
            callback,
        )
    }

    pub fn commit_with_callback<F>(&self, cancel: CancellationToken, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(CallbackArgs<()>) + Send + 'static,
    {
        let connector = self.clone();
        spawn_with_callback(
            StorageOperation::TransactionCommit,
            async move { connector.commit(&cancel).await },
            callback,
        )
    }

    pub fn rollback_with_callback<F>(
        &self,
        cancel: CancellationToken,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(CallbackArgs<()>) + Send + 'static,
    {
        let connector = self.clone();
        spawn_with_callback(
            StorageOperation::TransactionRollback,
            async move { connector.rollback(&cancel).await },
            callback,
        )
    }
}
