use std::{fmt, sync::Arc};

use async_trait::async_trait;
use oxigraph::model::{NamedNode, Triple};
use reqwest::Method;
use tokio_util::sync::CancellationToken;

use crate::{
    config::GraphStoreConfig,
    connector::graph_name_node,
    dispatch,
    error::{Action, ConfigError, Result, StorageError},
    error_classification,
    executor::Executor,
    mime::MimeRegistry,
    rdf::{DatasetWriter, Graph, OxigraphDatasetWriter},
    sequence,
    store::{GraphStore, StoreCapabilities},
    transport::{HttpTransport, RequestBody, RequestDescriptor, Transport},
};

const BACKEND: &str = "graph_store";

/// Connector for a SPARQL 1.1 Graph Store HTTP protocol endpoint.
///
/// Graphs are addressed indirectly through `?graph=<iri>` or `?default`.
/// The protocol has no way to remove individual triples or list graphs.
#[derive(Clone)]
pub struct GraphStoreConnector {
    inner: Arc<Inner>,
}

struct Inner {
    config: GraphStoreConfig,
    registry: MimeRegistry,
    writer: Arc<dyn DatasetWriter>,
    executor: Executor,
}

impl GraphStoreConnector {
    pub fn new(config: GraphStoreConfig) -> Result<Self> {
        config.validate()?;
        let transport =
            HttpTransport::new(&config.service_url, config.credentials(), &config.transport)?;
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(config: GraphStoreConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let writer = OxigraphDatasetWriter::for_media_type(&config.content_type).ok_or_else(|| {
            ConfigError::InvalidConfig(format!(
                "content_type '{}' has no RDF serializer",
                config.content_type
            ))
        })?;
        let executor = Executor::new(
            BACKEND,
            transport,
            config.transport.max_concurrent_operations,
        );

        tracing::info!(
            service_url = %config.service_url,
            content_type = %writer.content_type(),
            "Graph Store connector initialized"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                registry: MimeRegistry::default(),
                writer: Arc::new(writer),
                executor,
            }),
        })
    }

    pub fn service_url(&self) -> &str {
        &self.inner.config.service_url
    }

    pub fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            is_ready: true,
            is_read_only: false,
            update_supported: true,
            removals_supported: false,
            delete_supported: true,
            list_graphs_supported: false,
            transactions_supported: false,
            sparql_update_supported: false,
        }
    }

    fn request(&self, method: Method, graph_name: Option<&NamedNode>) -> RequestDescriptor {
        let request = RequestDescriptor::new(method, "");
        match graph_name {
            Some(name) => request.with_query("graph", name.as_str()),
            None => request.with_query("default", ""),
        }
    }

    fn payload(&self, graph: &Graph) -> Result<RequestBody> {
        let data = self
            .inner
            .writer
            .write(graph)
            .map_err(|e| StorageError::Serialize(e.to_string()))?;
        Ok(RequestBody::Content {
            content_type: self.inner.writer.content_type().to_string(),
            data,
        })
    }

    /// Load a graph. A graph the service does not know is returned empty.
    pub async fn load_graph(
        &self,
        graph_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Graph> {
        let name = graph_name_node(graph_name)?;
        let request = self
            .request(Method::GET, name.as_ref())
            .with_accept(self.inner.registry.graph_accept_header());
        let response = self
            .inner
            .executor
            .execute(Action::LoadGraph, request, cancel)
            .await?;

        let mut graph = Graph::with_name(name);
        match response.status {
            404 => {
                tracing::debug!(graph = ?graph_name, "Graph not found, returning empty graph");
                Ok(graph)
            }
            _ if response.is_success() => {
                dispatch::read_graph(
                    &self.inner.registry,
                    Action::LoadGraph,
                    &response,
                    &mut graph,
                )?;
                Ok(graph)
            }
            _ => Err(error_classification::from_http(Action::LoadGraph, &response)),
        }
    }

    /// Whether the service holds the graph, probed with HEAD.
    pub async fn has_graph(
        &self,
        graph_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let name = graph_name_node(graph_name)?;
        let request = self.request(Method::HEAD, name.as_ref());
        let response = self
            .inner
            .executor
            .execute(Action::HasGraph, request, cancel)
            .await?;
        match response.status {
            404 => Ok(false),
            _ if response.is_success() => Ok(true),
            _ => Err(error_classification::from_http(Action::HasGraph, &response)),
        }
    }

    /// Replace the graph with `graph` via PUT.
    pub async fn save_graph(&self, graph: &Graph, cancel: &CancellationToken) -> Result<()> {
        let request = self
            .request(Method::PUT, graph.name())
            .with_body(self.payload(graph)?);
        self.inner
            .executor
            .send(Action::SaveGraph, request, cancel)
            .await
            .map(|_| ())
    }

    /// Append `additions` via POST. Removals are rejected before anything is sent.
    pub async fn update_graph(
        &self,
        graph_name: Option<&str>,
        additions: &[Triple],
        removals: &[Triple],
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !removals.is_empty() {
            return Err(StorageError::Unsupported(
                "the Graph Store protocol cannot remove individual triples".to_string(),
            ));
        }
        if additions.is_empty() {
            return Ok(());
        }

        let graph = Graph::from_triples(graph_name_node(graph_name)?, additions.iter().cloned());
        let request = self
            .request(Method::POST, graph.name())
            .with_body(self.payload(&graph)?);
        self.inner
            .executor
            .send(Action::UpdateGraph, request, cancel)
            .await
            .map(|_| ())
    }

    /// Delete a graph. Deleting a graph the service does not know succeeds.
    pub async fn delete_graph(
        &self,
        graph_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let name = graph_name_node(graph_name)?;
        self.delete_node(name.as_ref(), cancel).await
    }

    /// Delete several graphs with concurrent requests.
    pub async fn delete_graphs(
        &self,
        graph_names: &[&str],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let names = graph_names
            .iter()
            .map(|name| graph_name_node(Some(*name)))
            .collect::<Result<Vec<_>>>()?;
        let steps = names.iter().map(|name| {
            move |token: CancellationToken| async move {
                self.delete_node(name.as_ref(), &token).await
            }
        });
        sequence::run_all(BACKEND, Action::DeleteGraph, cancel, steps).await
    }

    async fn delete_node(
        &self,
        name: Option<&NamedNode>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let request = self.request(Method::DELETE, name);
        let response = self
            .inner
            .executor
            .execute(Action::DeleteGraph, request, cancel)
            .await?;
        if response.is_success() || response.status == 404 {
            Ok(())
        } else {
            Err(error_classification::from_http(Action::DeleteGraph, &response))
        }
    }
}

impl fmt::Display for GraphStoreConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[SPARQL Graph Store] Service '{}'", self.service_url())
    }
}

#[async_trait]
impl GraphStore for GraphStoreConnector {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn capabilities(&self) -> StoreCapabilities {
        GraphStoreConnector::capabilities(self)
    }

    async fn load_graph(
        &self,
        graph_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Graph> {
        GraphStoreConnector::load_graph(self, graph_name, cancel).await
    }

    async fn save_graph(&self, graph: &Graph, cancel: &CancellationToken) -> Result<()> {
        GraphStoreConnector::save_graph(self, graph, cancel).await
    }

    async fn update_graph(
        &self,
        graph_name: Option<&str>,
        additions: &[Triple],
        removals: &[Triple],
        cancel: &CancellationToken,
    ) -> Result<()> {
        GraphStoreConnector::update_graph(self, graph_name, additions, removals, cancel).await
    }

    async fn delete_graph(
        &self,
        graph_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        GraphStoreConnector::delete_graph(self, graph_name, cancel).await
    }

    async fn list_graphs(&self, _cancel: &CancellationToken) -> Result<Vec<String>> {
        Err(StorageError::Unsupported(
            "the Graph Store protocol does not support listing graphs".to_string(),
        ))
    }
}
