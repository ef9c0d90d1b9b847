use async_trait::async_trait;
use oxigraph::model::Triple;
use tokio_util::sync::CancellationToken;

use crate::{error::Result, rdf::Graph};

/// What a connector can do against its store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCapabilities {
    pub is_ready: bool,
    pub is_read_only: bool,
    pub update_supported: bool,
    /// Removals are accepted by `update_graph`
    pub removals_supported: bool,
    pub delete_supported: bool,
    pub list_graphs_supported: bool,
    pub transactions_supported: bool,
    pub sparql_update_supported: bool,
}

/// Graph-level operations shared by the connectors
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Connector name for logging/debugging
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> StoreCapabilities;

    /// Load a graph, `None` addressing the default graph.
    async fn load_graph(
        &self,
        graph_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Graph>;

    /// Replace the stored graph named by `graph` with its triples.
    async fn save_graph(&self, graph: &Graph, cancel: &CancellationToken) -> Result<()>;

    /// Apply removals, then additions.
    async fn update_graph(
        &self,
        graph_name: Option<&str>,
        additions: &[Triple],
        removals: &[Triple],
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn delete_graph(
        &self,
        graph_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn list_graphs(&self, cancel: &CancellationToken) -> Result<Vec<String>>;
}
