//! Translation of Stardog operations into request descriptors.

use std::sync::Arc;

use reqwest::Method;

use crate::{
    config::{ReasoningMode, StardogVersion},
    error::{Result, StorageError},
    rdf::{DatasetWriter, Graph},
    transaction::TransactionId,
    transport::{RequestBody, RequestDescriptor},
};

/// Queries at or above this many characters are sent as a form POST.
pub const MAX_GET_QUERY_LENGTH: usize = 2048;

pub const SPARQL_UPDATE_CONTENT_TYPE: &str = "application/sparql-update";

const DEFAULT_GRAPH_TOKEN: &str = "DEFAULT";

/// A single store-level operation
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Query {
        query: &'a str,
        reasoning: Option<bool>,
    },
    Update {
        update: &'a str,
    },
    Add {
        graph: &'a Graph,
    },
    Remove {
        graph: &'a Graph,
    },
    Clear {
        graph_name: Option<&'a str>,
    },
    Begin {
        reasoning: bool,
    },
    Commit,
    Rollback,
}

impl Operation<'_> {
    fn name(&self) -> &'static str {
        match self {
            Operation::Query { .. } => "query",
            Operation::Update { .. } => "update",
            Operation::Add { .. } => "add",
            Operation::Remove { .. } => "remove",
            Operation::Clear { .. } => "clear",
            Operation::Begin { .. } => "begin",
            Operation::Commit => "commit",
            Operation::Rollback => "rollback",
        }
    }
}

/// Builds Stardog requests for one knowledge base
#[derive(Clone)]
pub struct RequestBuilder {
    knowledge_base: String,
    version: StardogVersion,
    reasoning: ReasoningMode,
    query_accept: String,
    writer: Arc<dyn DatasetWriter>,
}

impl RequestBuilder {
    pub fn new(
        knowledge_base: impl Into<String>,
        version: StardogVersion,
        reasoning: ReasoningMode,
        query_accept: impl Into<String>,
        writer: Arc<dyn DatasetWriter>,
    ) -> Self {
        Self {
            knowledge_base: knowledge_base.into(),
            version,
            reasoning,
            query_accept: query_accept.into(),
            writer,
        }
    }

    pub fn knowledge_base(&self) -> &str {
        &self.knowledge_base
    }

    pub fn build(
        &self,
        operation: Operation<'_>,
        txn: Option<&TransactionId>,
    ) -> Result<RequestDescriptor> {
        let kb = &self.knowledge_base;
        let request = match operation {
            Operation::Query { query, reasoning } => {
                let path = match txn {
                    Some(txn) => format!("{kb}/{txn}/query"),
                    None => format!("{kb}/query"),
                };
                let request = if query.chars().count() < MAX_GET_QUERY_LENGTH {
                    let mut request =
                        RequestDescriptor::new(Method::GET, path).with_query("query", query);
                    if let Some(reasoning) = reasoning {
                        request = request.with_query("reasoning", reasoning.to_string());
                    }
                    request
                } else {
                    let mut fields = Vec::with_capacity(2);
                    if reasoning == Some(true) {
                        fields.push(("reasoning".to_string(), "true".to_string()));
                    }
                    fields.push(("query".to_string(), query.to_string()));
                    RequestDescriptor::new(Method::POST, path).with_body(RequestBody::Form(fields))
                };
                request.with_accept(self.query_accept.as_str())
            }
            Operation::Update { update } => {
                if !self.version.supports_sparql_update() {
                    return Err(StorageError::Unsupported(
                        "Stardog 1.x does not support SPARQL Update".to_string(),
                    ));
                }
                RequestDescriptor::new(Method::POST, format!("{kb}/update")).with_body(
                    RequestBody::Content {
                        content_type: SPARQL_UPDATE_CONTENT_TYPE.to_string(),
                        data: update.as_bytes().to_vec(),
                    },
                )
            }
            Operation::Add { graph } | Operation::Remove { graph } => {
                let txn = require_txn(txn, &operation)?;
                let verb = operation.name();
                let data = self
                    .writer
                    .write(graph)
                    .map_err(|e| StorageError::Serialize(e.to_string()))?;
                RequestDescriptor::new(Method::POST, format!("{kb}/{txn}/{verb}")).with_body(
                    RequestBody::Content {
                        content_type: self.writer.content_type().to_string(),
                        data,
                    },
                )
            }
            Operation::Clear { graph_name } => {
                let txn = require_txn(txn, &operation)?;
                RequestDescriptor::new(Method::POST, format!("{kb}/{txn}/clear/"))
                    .with_query("graph-uri", graph_name.unwrap_or(DEFAULT_GRAPH_TOKEN))
                    .with_body(RequestBody::Form(Vec::new()))
            }
            Operation::Begin { reasoning } => {
                let mut request =
                    RequestDescriptor::new(Method::POST, format!("{kb}/transaction/begin"))
                        .with_accept("text/plain")
                        .with_body(RequestBody::Form(Vec::new()));
                if reasoning {
                    request = request.with_query("reasoning", "true");
                }
                request
            }
            Operation::Commit | Operation::Rollback => {
                let txn = require_txn(txn, &operation)?;
                let verb = operation.name();
                RequestDescriptor::new(Method::POST, format!("{kb}/transaction/{verb}/{txn}"))
                    .with_accept("text/plain")
                    .with_body(RequestBody::Form(Vec::new()))
            }
        };
        self.apply_reasoning(request)
    }

    /// Add the connection-level reasoning parameter and the headers each
    /// protocol generation expects.
    fn apply_reasoning(&self, mut request: RequestDescriptor) -> Result<RequestDescriptor> {
        let level = self.reasoning.parameter();
        match self.version {
            StardogVersion::V1 => {
                if self.reasoning == ReasoningMode::SL {
                    return Err(StorageError::Unsupported(
                        "Stardog 1.x does not support SL reasoning".to_string(),
                    ));
                }
                if let Some(level) = level {
                    request = request.with_query("reasoning", level);
                }
                let connection = match level {
                    Some(level) => format!("kb={};reasoning={}", self.knowledge_base, level),
                    None => format!("kb={};", self.knowledge_base),
                };
                request = request
                    .with_header("SD-Connection-String", connection)
                    .with_header("SD-Protocol", "1.0");
            }
            StardogVersion::V2 => {
                if let Some(level) = level {
                    request = request
                        .with_query("reasoning", level)
                        .with_header("SD-Connection-String", format!("reasoning={level}"));
                }
            }
            StardogVersion::V3 => {
                if level.is_some() {
                    return Err(StorageError::Unsupported(format!(
                        "Stardog 3.x uses database controlled reasoning, {} cannot be requested",
                        self.reasoning
                    )));
                }
            }
        }
        Ok(request)
    }
}

fn require_txn<'t>(
    txn: Option<&'t TransactionId>,
    operation: &Operation<'_>,
) -> Result<&'t TransactionId> {
    txn.ok_or(StorageError::NoActiveTransaction {
        operation: operation.name(),
    })
}

/// CONSTRUCT query returning every triple of a graph.
pub fn load_graph_query(graph_name: Option<&str>) -> String {
    match graph_name {
        Some(name) => format!("CONSTRUCT {{ ?s ?p ?o }} WHERE {{ GRAPH <{name}> {{ ?s ?p ?o }} }}"),
        None => "CONSTRUCT { ?s ?p ?o } WHERE { ?s ?p ?o }".to_string(),
    }
}

pub const LIST_GRAPHS_QUERY: &str = "SELECT DISTINCT ?g WHERE { GRAPH ?g { ?s ?p ?o } }";

/// Whether the query is an ASK: the first keyword after the prologue
/// (`BASE`/`PREFIX` declarations and `#` comments).
pub fn is_ask_query(query: &str) -> bool {
    let mut rest = query;
    loop {
        rest = rest.trim_start();
        if let Some(comment) = rest.strip_prefix('#') {
            rest = comment.split_once('\n').map_or("", |(_, tail)| tail);
            continue;
        }
        let end = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let (keyword, tail) = rest.split_at(end);
        if keyword.eq_ignore_ascii_case("prefix") || keyword.eq_ignore_ascii_case("base") {
            match tail.find('>') {
                Some(close) => rest = &tail[close + 1..],
                None => return false,
            }
            continue;
        }
        return keyword.eq_ignore_ascii_case("ask");
    }
}
