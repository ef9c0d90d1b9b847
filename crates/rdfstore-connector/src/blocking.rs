//! Synchronous wrappers over the async connectors.

use std::future::Future;

use oxigraph::model::Triple;
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{GraphStoreConfig, StardogConnectorConfig},
    connector::{QueryResult, StardogConnector},
    error::Result,
    graph_store::GraphStoreConnector,
    rdf::Graph,
    store::{GraphStore, StoreCapabilities},
    transaction::TransactionId,
};

/// Blocking connector driving an async connector on its own runtime.
///
/// The wrapped connector can be shared with async code; both sides see the
/// same transaction. Like `reqwest::blocking`, calling these methods from
/// inside an async runtime panics.
pub struct BlockingConnector<C> {
    connector: C,
    runtime: Runtime,
}

pub type BlockingStardogConnector = BlockingConnector<StardogConnector>;
pub type BlockingGraphStoreConnector = BlockingConnector<GraphStoreConnector>;

impl<C> BlockingConnector<C> {
    pub fn from_connector(connector: C) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self { connector, runtime })
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    fn wait<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

impl<C: GraphStore> BlockingConnector<C> {
    pub fn capabilities(&self) -> StoreCapabilities {
        self.connector.capabilities()
    }

    pub fn load_graph(&self, graph_name: Option<&str>) -> Result<Graph> {
        let never = CancellationToken::new();
        self.wait(self.connector.load_graph(graph_name, &never))
    }

    pub fn save_graph(&self, graph: &Graph) -> Result<()> {
        let never = CancellationToken::new();
        self.wait(self.connector.save_graph(graph, &never))
    }

    pub fn update_graph(
        &self,
        graph_name: Option<&str>,
        additions: &[Triple],
        removals: &[Triple],
    ) -> Result<()> {
        let never = CancellationToken::new();
        self.wait(
            self.connector
                .update_graph(graph_name, additions, removals, &never),
        )
    }

    pub fn delete_graph(&self, graph_name: Option<&str>) -> Result<()> {
        let never = CancellationToken::new();
        self.wait(self.connector.delete_graph(graph_name, &never))
    }

    pub fn list_graphs(&self) -> Result<Vec<String>> {
        let never = CancellationToken::new();
        self.wait(self.connector.list_graphs(&never))
    }
}

impl BlockingConnector<StardogConnector> {
    pub fn new(config: StardogConnectorConfig) -> Result<Self> {
        Self::from_connector(StardogConnector::new(config)?)
    }

    pub fn query(&self, query: &str) -> Result<QueryResult> {
        let never = CancellationToken::new();
        self.wait(self.connector.query(query, &never))
    }

    pub fn query_with_reasoning(&self, query: &str, reasoning: bool) -> Result<QueryResult> {
        let never = CancellationToken::new();
        self.wait(self.connector.query_with_reasoning(query, reasoning, &never))
    }

    pub fn update(&self, sparql_update: &str) -> Result<()> {
        let never = CancellationToken::new();
        self.wait(self.connector.update(sparql_update, &never))
    }

    pub fn begin(&self) -> Result<TransactionId> {
        let never = CancellationToken::new();
        self.wait(self.connector.begin(&never))
    }

    pub fn begin_with_reasoning(&self, reasoning: bool) -> Result<TransactionId> {
        let never = CancellationToken::new();
        self.wait(self.connector.begin_with_reasoning(reasoning, &never))
    }

    pub fn commit(&self) -> Result<()> {
        let never = CancellationToken::new();
        self.wait(self.connector.commit(&never))
    }

    pub fn rollback(&self) -> Result<()> {
        let never = CancellationToken::new();
        self.wait(self.connector.rollback(&never))
    }
}

impl BlockingConnector<GraphStoreConnector> {
    pub fn new(config: GraphStoreConfig) -> Result<Self> {
        Self::from_connector(GraphStoreConnector::new(config)?)
    }

    pub fn has_graph(&self, graph_name: Option<&str>) -> Result<bool> {
        let never = CancellationToken::new();
        self.wait(self.connector.has_graph(graph_name, &never))
    }
}
