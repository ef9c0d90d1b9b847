use std::{fmt, sync::Arc};

use async_trait::async_trait;
use oxigraph::{
    io::RdfFormat,
    model::{NamedNode, Term, Triple},
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{ReasoningMode, StardogConnectorConfig, StardogVersion},
    dispatch::{self, Dispatched},
    error::{Action, Result, StorageError},
    executor::Executor,
    mime::MimeRegistry,
    rdf::{Graph, OxigraphDatasetWriter, RdfHandler},
    request::{self, LIST_GRAPHS_QUERY, Operation, RequestBuilder},
    results::{ResultsHandler, SparqlResultSet},
    sequence,
    store::{GraphStore, StoreCapabilities},
    transaction::{Owner, TransactionId, TransactionManager, TransactionStatus},
    transport::{HttpTransport, Transport},
};

const BACKEND: &str = "stardog";

/// Result of a query run without caller-supplied handlers
#[derive(Debug)]
pub enum QueryResult {
    Graph(Graph),
    Results(SparqlResultSet),
}

/// Connector for a single Stardog knowledge base.
///
/// Cloning is cheap and clones share the same transaction slot. Graph writes
/// run in a private transaction that is committed or rolled back on the
/// caller's behalf, unless the caller has begun a transaction of its own.
#[derive(Clone)]
pub struct StardogConnector {
    inner: Arc<Inner>,
}

struct Inner {
    config: StardogConnectorConfig,
    registry: MimeRegistry,
    builder: RequestBuilder,
    executor: Executor,
    transactions: TransactionManager,
}

impl StardogConnector {
    /// Create a connector talking HTTP to `config.url`.
    pub fn new(config: StardogConnectorConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config.url, config.credentials(), &config.transport)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a connector over a custom transport.
    pub fn with_transport(
        config: StardogConnectorConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        Self::with_registry(config, transport, MimeRegistry::default())
    }

    /// Create a connector over a custom transport and reader registry.
    pub fn with_registry(
        config: StardogConnectorConfig,
        transport: Arc<dyn Transport>,
        registry: MimeRegistry,
    ) -> Result<Self> {
        config.validate()?;

        let builder = RequestBuilder::new(
            config.knowledge_base.clone(),
            config.version,
            config.effective_reasoning(),
            registry.query_accept_header(),
            Arc::new(OxigraphDatasetWriter::new(RdfFormat::TriG)),
        );
        let executor = Executor::new(
            BACKEND,
            transport,
            config.transport.max_concurrent_operations,
        );
        let transactions = TransactionManager::new(executor.clone(), builder.clone());

        tracing::info!(
            url = %config.url,
            knowledge_base = %config.knowledge_base,
            version = ?config.version,
            reasoning = %config.effective_reasoning(),
            "Stardog connector initialized"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                registry,
                builder,
                executor,
                transactions,
            }),
        })
    }

    pub fn url(&self) -> &str {
        &self.inner.config.url
    }

    pub fn knowledge_base(&self) -> &str {
        &self.inner.config.knowledge_base
    }

    pub fn version(&self) -> StardogVersion {
        self.inner.config.version
    }

    pub fn reasoning(&self) -> ReasoningMode {
        self.inner.config.effective_reasoning()
    }

    pub fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            is_ready: true,
            is_read_only: false,
            update_supported: true,
            removals_supported: true,
            delete_supported: true,
            list_graphs_supported: true,
            transactions_supported: true,
            sparql_update_supported: self.version().supports_sparql_update(),
        }
    }

    /// Identifier of the open transaction, if any.
    pub fn active_transaction(&self) -> Option<TransactionId> {
        self.inner.transactions.active_transaction()
    }

    pub fn transaction_status(&self) -> TransactionStatus {
        self.inner.transactions.status()
    }

    // ========== Graphs ==========

    pub async fn load_graph(
        &self,
        graph_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Graph> {
        let mut graph = Graph::with_name(graph_name_node(graph_name)?);
        self.load_graph_with_handler(&mut graph, graph_name, cancel)
            .await?;
        Ok(graph)
    }

    /// Stream a graph's triples into `handler`.
    pub async fn load_graph_with_handler(
        &self,
        handler: &mut dyn RdfHandler,
        graph_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let name = graph_name_node(graph_name)?;
        let query = request::load_graph_query(name.as_ref().map(NamedNode::as_str));
        let txn = self.inner.transactions.caller_transaction();
        let request = self.inner.builder.build(
            Operation::Query {
                query: &query,
                reasoning: None,
            },
            txn.as_ref(),
        )?;
        let response = self
            .inner
            .executor
            .send(Action::LoadGraph, request, cancel)
            .await?;
        dispatch::read_graph(&self.inner.registry, Action::LoadGraph, &response, handler)
    }

    /// Replace the stored graph with `graph`: clear it, then add its triples.
    pub async fn save_graph(&self, graph: &Graph, cancel: &CancellationToken) -> Result<()> {
        let name = graph.name().map(|name| name.as_str().to_string());
        self.inner
            .transactions
            .run_auto_commit(Action::SaveGraph, cancel, |txn| async move {
                self.stage(
                    Action::SaveGraph,
                    Operation::Clear {
                        graph_name: name.as_deref(),
                    },
                    &txn,
                    cancel,
                )
                .await?;
                if !graph.is_empty() {
                    self.stage(Action::SaveGraph, Operation::Add { graph }, &txn, cancel)
                        .await?;
                }
                Ok(())
            })
            .await
    }

    /// Remove `removals`, then add `additions`, in one transaction.
    /// Nothing is sent when both are empty.
    pub async fn update_graph(
        &self,
        graph_name: Option<&str>,
        additions: &[Triple],
        removals: &[Triple],
        cancel: &CancellationToken,
    ) -> Result<()> {
        if additions.is_empty() && removals.is_empty() {
            tracing::debug!(knowledge_base = %self.knowledge_base(), "Empty graph update skipped");
            return Ok(());
        }
        let name = graph_name_node(graph_name)?;
        let removals = Graph::from_triples(name.clone(), removals.iter().cloned());
        let additions = Graph::from_triples(name, additions.iter().cloned());

        self.inner
            .transactions
            .run_auto_commit(Action::UpdateGraph, cancel, |txn| async move {
                if !removals.is_empty() {
                    let remove = Operation::Remove { graph: &removals };
                    self.stage(Action::UpdateGraph, remove, &txn, cancel).await?;
                }
                if !additions.is_empty() {
                    let add = Operation::Add { graph: &additions };
                    self.stage(Action::UpdateGraph, add, &txn, cancel).await?;
                }
                Ok(())
            })
            .await
    }

    pub async fn delete_graph(
        &self,
        graph_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let name = graph_name_node(graph_name)?;
        let name = name.as_ref().map(NamedNode::as_str);
        self.inner
            .transactions
            .run_auto_commit(Action::DeleteGraph, cancel, |txn| async move {
                self.stage(Action::DeleteGraph, Operation::Clear { graph_name: name }, &txn, cancel)
                    .await
            })
            .await
    }

    /// Clear several graphs in one transaction; the clears are sent concurrently.
    pub async fn delete_graphs(
        &self,
        graph_names: &[&str],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let names = graph_names
            .iter()
            .map(|name| graph_name_node(Some(*name)))
            .collect::<Result<Vec<_>>>()?;
        if names.is_empty() {
            return Ok(());
        }

        self.inner
            .transactions
            .run_auto_commit(Action::DeleteGraph, cancel, |txn| async move {
                let requests = names
                    .iter()
                    .map(|name| {
                        self.inner.builder.build(
                            Operation::Clear {
                                graph_name: name.as_ref().map(NamedNode::as_str),
                            },
                            Some(&txn),
                        )
                    })
                    .collect::<Result<Vec<_>>>()?;
                sequence::send_all(&self.inner.executor, Action::DeleteGraph, requests, cancel)
                    .await
            })
            .await
    }

    /// Names of the non-empty named graphs.
    pub async fn list_graphs(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        let mut graph = Graph::new();
        let mut results = SparqlResultSet::new();
        let dispatched = self
            .execute_query(
                Action::ListGraphs,
                LIST_GRAPHS_QUERY,
                None,
                &mut graph,
                &mut results,
                cancel,
            )
            .await?;
        if dispatched == Dispatched::Graph {
            return Ok(Vec::new());
        }

        Ok(results
            .column("g")
            .filter_map(|term| match term {
                Term::NamedNode(node) => Some(node.as_str().to_string()),
                Term::BlankNode(node) => Some(format!("_:{}", node.as_str())),
                _ => None,
            })
            .collect())
    }

    // ========== Queries ==========

    pub async fn query(&self, query: &str, cancel: &CancellationToken) -> Result<QueryResult> {
        self.query_inner(query, None, cancel).await
    }

    /// Query with reasoning switched on or off for this request only.
    pub async fn query_with_reasoning(
        &self,
        query: &str,
        reasoning: bool,
        cancel: &CancellationToken,
    ) -> Result<QueryResult> {
        self.query_inner(query, Some(reasoning), cancel).await
    }

    /// Stream the response into whichever handler matches its content type.
    pub async fn query_with_handlers(
        &self,
        rdf: &mut dyn RdfHandler,
        results: &mut dyn ResultsHandler,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Dispatched> {
        self.execute_query(Action::Query, query, None, rdf, results, cancel)
            .await
    }

    /// Execute a SPARQL update. It commits on its own and is not part of an
    /// open client transaction.
    pub async fn update(&self, sparql_update: &str, cancel: &CancellationToken) -> Result<()> {
        let request = self.inner.builder.build(
            Operation::Update {
                update: sparql_update,
            },
            None,
        )?;
        if let Some(txn) = self.inner.transactions.caller_transaction() {
            tracing::debug!(txn = %txn, "SPARQL update runs outside the open transaction");
        }
        self.inner
            .executor
            .send(Action::SparqlUpdate, request, cancel)
            .await
            .map(|_| ())
    }

    async fn query_inner(
        &self,
        query: &str,
        reasoning: Option<bool>,
        cancel: &CancellationToken,
    ) -> Result<QueryResult> {
        let mut graph = Graph::new();
        let mut results = SparqlResultSet::new();
        let dispatched = self
            .execute_query(Action::Query, query, reasoning, &mut graph, &mut results, cancel)
            .await?;
        Ok(match dispatched {
            Dispatched::Graph => QueryResult::Graph(graph),
            Dispatched::Results => QueryResult::Results(results),
        })
    }

    async fn execute_query(
        &self,
        action: Action,
        query: &str,
        reasoning: Option<bool>,
        rdf: &mut dyn RdfHandler,
        results: &mut dyn ResultsHandler,
        cancel: &CancellationToken,
    ) -> Result<Dispatched> {
        let txn = self.inner.transactions.caller_transaction();
        let request = self
            .inner
            .builder
            .build(Operation::Query { query, reasoning }, txn.as_ref())?;
        let response = self.inner.executor.send(action, request, cancel).await?;
        dispatch::dispatch(
            &self.inner.registry,
            action,
            &response,
            request::is_ask_query(query),
            rdf,
            results,
        )
    }

    // ========== Transactions ==========

    pub async fn begin(&self, cancel: &CancellationToken) -> Result<TransactionId> {
        self.inner.transactions.begin(Owner::Caller, false, cancel).await
    }

    /// Begin a transaction in which queries run with reasoning.
    pub async fn begin_with_reasoning(
        &self,
        reasoning: bool,
        cancel: &CancellationToken,
    ) -> Result<TransactionId> {
        self.inner
            .transactions
            .begin(Owner::Caller, reasoning, cancel)
            .await
    }

    pub async fn commit(&self, cancel: &CancellationToken) -> Result<()> {
        self.inner.transactions.commit(Owner::Caller, cancel).await
    }

    pub async fn rollback(&self, cancel: &CancellationToken) -> Result<()> {
        self.inner.transactions.rollback(Owner::Caller, cancel).await
    }

    async fn stage(
        &self,
        action: Action,
        operation: Operation<'_>,
        txn: &TransactionId,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let request = self.inner.builder.build(operation, Some(txn))?;
        self.inner
            .executor
            .send(action, request, cancel)
            .await
            .map(|_| ())
    }
}

/// Graph name as an IRI. `None` and the empty string address the default graph.
pub(crate) fn graph_name_node(graph_name: Option<&str>) -> Result<Option<NamedNode>> {
    match graph_name {
        None | Some("") => Ok(None),
        Some(name) if name.starts_with("_:") => Err(StorageError::Unsupported(format!(
            "blank node graph name '{name}' cannot be addressed"
        ))),
        Some(name) => NamedNode::new(name).map(Some).map_err(|e| {
            StorageError::InvalidArgument(format!("graph name '{name}' is not a valid IRI: {e}"))
        }),
    }
}

impl fmt::Display for StardogConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Stardog] Knowledge Base '{}' on Server '{}' ({})",
            self.knowledge_base(),
            self.url(),
            self.reasoning()
        )
    }
}

impl fmt::Debug for StardogConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StardogConnector")
            .field("url", &self.url())
            .field("knowledge_base", &self.knowledge_base())
            .field("version", &self.version())
            .field("active_transaction", &self.active_transaction())
            .finish()
    }
}

#[async_trait]
impl GraphStore for StardogConnector {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn capabilities(&self) -> StoreCapabilities {
        StardogConnector::capabilities(self)
    }

    async fn load_graph(
        &self,
        graph_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Graph> {
        StardogConnector::load_graph(self, graph_name, cancel).await
    }

    async fn save_graph(&self, graph: &Graph, cancel: &CancellationToken) -> Result<()> {
        StardogConnector::save_graph(self, graph, cancel).await
    }

    async fn update_graph(
        &self,
        graph_name: Option<&str>,
        additions: &[Triple],
        removals: &[Triple],
        cancel: &CancellationToken,
    ) -> Result<()> {
        StardogConnector::update_graph(self, graph_name, additions, removals, cancel).await
    }

    async fn delete_graph(
        &self,
        graph_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        StardogConnector::delete_graph(self, graph_name, cancel).await
    }

    async fn list_graphs(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        StardogConnector::list_graphs(self, cancel).await
    }
}
