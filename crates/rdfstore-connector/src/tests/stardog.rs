#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use reqwest::Method;
use tokio_util::sync::CancellationToken;

use super::{GRAPH, MockTransport, Reply, stardog_config, stardog_with, triple};
use crate::{
    Action, GraphStore, QueryResult, ReasoningMode, StardogConnector, StardogVersion,
    StorageError, dispatch::Dispatched, rdf::Graph, request::MAX_GET_QUERY_LENGTH,
    results::SparqlResultSet,
};

const TURTLE: &str = "<http://example.org/a> <http://example.org/p> \"1\" .\n\
                      <http://example.org/b> <http://example.org/p> \"2\" .\n";

const GRAPHS_JSON: &str = r#"{
    "head": { "vars": ["g"] },
    "results": { "bindings": [
        { "g": { "type": "uri", "value": "http://example.org/g1" } },
        { "g": { "type": "bnode", "value": "b0" } }
    ] }
}"#;

#[tokio::test]
async fn load_graph_sends_construct_and_parses_rdf() {
    let transport = Arc::new(MockTransport::new([Reply::content("text/turtle", TURTLE)]));
    let connector = stardog_with(&transport);

    let graph = connector
        .load_graph(Some(GRAPH), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(graph.len(), 2);
    assert_eq!(graph.name().map(|n| n.as_str()), Some(GRAPH));
    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::GET);
    assert_eq!(calls[0].path, "kb/query");
    assert_eq!(
        calls[0].query_param("query"),
        Some("CONSTRUCT { ?s ?p ?o } WHERE { GRAPH <http://example.org/graph> { ?s ?p ?o } }")
    );
    assert!(calls[0].accept.as_deref().unwrap().contains("text/turtle"));
}

#[tokio::test]
async fn load_graph_rejects_results_content() {
    let transport = Arc::new(MockTransport::new([Reply::content(
        "application/sparql-results+json",
        GRAPHS_JSON,
    )]));
    let connector = stardog_with(&transport);

    let error = connector
        .load_graph(None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        StorageError::FormatSelection {
            action: Action::LoadGraph,
            ..
        }
    ));
}

#[tokio::test]
async fn blank_node_graph_names_are_rejected_without_requests() {
    let transport = Arc::new(MockTransport::new([]));
    let connector = stardog_with(&transport);

    let error = connector
        .delete_graph(Some("_:b1"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(error, StorageError::Unsupported(_)));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn select_query_yields_result_set() {
    let transport = Arc::new(MockTransport::new([Reply::content(
        "application/sparql-results+json",
        GRAPHS_JSON,
    )]));
    let connector = stardog_with(&transport);

    let result = connector
        .query("SELECT ?g WHERE { GRAPH ?g { ?s ?p ?o } }", &CancellationToken::new())
        .await
        .unwrap();
    match result {
        QueryResult::Results(results) => assert_eq!(results.len(), 2),
        QueryResult::Graph(_) => panic!("expected a result set"),
    }
}

#[tokio::test]
async fn construct_query_yields_graph() {
    let transport = Arc::new(MockTransport::new([Reply::content("text/turtle", TURTLE)]));
    let connector = stardog_with(&transport);

    let result = connector
        .query("CONSTRUCT WHERE { ?s ?p ?o }", &CancellationToken::new())
        .await
        .unwrap();
    match result {
        QueryResult::Graph(graph) => assert_eq!(graph.len(), 2),
        QueryResult::Results(_) => panic!("expected a graph"),
    }
}

#[tokio::test]
async fn ask_query_reads_plain_text_boolean() {
    let transport = Arc::new(MockTransport::new([Reply::text("true")]));
    let connector = stardog_with(&transport);

    let mut graph = Graph::new();
    let mut results = SparqlResultSet::new();
    let dispatched = connector
        .query_with_handlers(
            &mut graph,
            &mut results,
            "ASK { ?s ?p ?o }",
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(dispatched, Dispatched::Results);
    assert_eq!(results.boolean(), Some(true));
    assert!(graph.is_empty());
}

#[tokio::test]
async fn unknown_content_type_is_reported() {
    let transport = Arc::new(MockTransport::new([Reply::content("image/png", "....")]));
    let connector = stardog_with(&transport);

    let error = connector
        .query("SELECT * WHERE { ?s ?p ?o }", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(error, StorageError::UnsupportedContentType { .. }));
}

#[tokio::test]
async fn long_query_is_posted_as_form() {
    let transport = Arc::new(MockTransport::new([Reply::content(
        "application/sparql-results+json",
        GRAPHS_JSON,
    )]));
    let connector = stardog_with(&transport);
    let query = format!(
        "SELECT ?g WHERE {{ GRAPH ?g {{ ?s ?p \"{}\" }} }}",
        "x".repeat(MAX_GET_QUERY_LENGTH)
    );

    connector
        .query_with_reasoning(&query, true, &CancellationToken::new())
        .await
        .unwrap();

    let call = &transport.calls()[0];
    assert_eq!(call.method, Method::POST);
    assert_eq!(call.query_param("query"), None);
    let body = call.body.as_ref().unwrap();
    assert_eq!(body.form_field("query"), Some(query.as_str()));
    assert_eq!(body.form_field("reasoning"), Some("true"));
}

#[tokio::test]
async fn list_graphs_collects_names() {
    let transport = Arc::new(MockTransport::new([Reply::content(
        "application/sparql-results+json",
        GRAPHS_JSON,
    )]));
    let connector = stardog_with(&transport);

    let graphs = connector.list_graphs(&CancellationToken::new()).await.unwrap();
    assert_eq!(graphs, ["http://example.org/g1", "_:b0"]);
    assert_eq!(
        transport.calls()[0].query_param("query"),
        Some("SELECT DISTINCT ?g WHERE { GRAPH ?g { ?s ?p ?o } }")
    );
}

#[tokio::test]
async fn sparql_update_goes_to_update_endpoint() {
    let transport = Arc::new(MockTransport::new([Reply::ok()]));
    let connector = stardog_with(&transport);

    connector
        .update(
            "INSERT DATA { <http://example.org/s> <http://example.org/p> 1 }",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let call = &transport.calls()[0];
    assert_eq!(call.method, Method::POST);
    assert_eq!(call.path, "kb/update");
    assert_eq!(
        call.body.as_ref().unwrap().content_type(),
        "application/sparql-update"
    );
}

#[tokio::test]
async fn stardog_1_rejects_sparql_update_without_requests() {
    let transport = Arc::new(MockTransport::new([]));
    let mut config = stardog_config();
    config.version = StardogVersion::V1;
    let connector = StardogConnector::with_transport(config, transport.clone()).unwrap();

    let error = connector
        .update("CLEAR ALL", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(error, StorageError::Unsupported(_)));
    assert_eq!(transport.call_count(), 0);
    assert!(!connector.capabilities().sparql_update_supported);
}

#[tokio::test]
async fn stardog_2_sends_reasoning_on_every_request() {
    let transport = Arc::new(MockTransport::new([Reply::content("text/turtle", TURTLE)]));
    let mut config = stardog_config();
    config.version = StardogVersion::V2;
    config.reasoning = ReasoningMode::QL;
    let connector = StardogConnector::with_transport(config, transport.clone()).unwrap();

    connector.load_graph(None, &CancellationToken::new()).await.unwrap();

    let call = &transport.calls()[0];
    assert_eq!(call.query_param("reasoning"), Some("QL"));
    assert_eq!(call.header("SD-Connection-String"), Some("reasoning=QL"));
    assert_eq!(
        connector.to_string(),
        "[Stardog] Knowledge Base 'kb' on Server 'http://localhost:5820' (OWL QL Reasoning)"
    );
}

#[tokio::test]
async fn stardog_3_rejects_explicit_reasoning_config() {
    let mut config = stardog_config();
    config.reasoning = ReasoningMode::EL;
    let result = StardogConnector::with_transport(config, Arc::new(MockTransport::new([])));
    assert!(matches!(result, Err(StorageError::Config(_))));
}

#[tokio::test]
async fn http_errors_carry_action_and_body() {
    let transport = Arc::new(MockTransport::new([Reply::status(400, "Bad query syntax")]));
    let connector = stardog_with(&transport);

    let error = connector
        .query("SELEKT", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(error.status(), Some(400));
    let message = error.to_string();
    assert!(message.contains("executing a query on the Store"));
    assert!(message.contains("Bad query syntax"));
}

#[tokio::test]
async fn transport_errors_are_classified() {
    let transport = Arc::new(MockTransport::new([Reply::connect_error()]));
    let connector = stardog_with(&transport);

    let error = connector
        .list_graphs(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        StorageError::Transport {
            action: Action::ListGraphs,
            ..
        }
    ));
    assert!(crate::error_classification::is_retryable(&error));
}

#[tokio::test]
async fn cancelled_token_sends_nothing() {
    let transport = Arc::new(MockTransport::new([]));
    let connector = stardog_with(&transport);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let query = connector.query("SELECT * WHERE { ?s ?p ?o }", &cancel).await;
    assert!(matches!(query, Err(StorageError::Cancelled { .. })));

    let graph = Graph::from_triples(None, [triple("s", "o")]);
    let save = connector.save_graph(&graph, &cancel).await;
    assert!(matches!(save, Err(StorageError::Cancelled { .. })));

    let begin = connector.begin(&cancel).await;
    assert!(matches!(begin, Err(StorageError::Cancelled { .. })));

    assert_eq!(transport.call_count(), 0);
    assert!(connector.active_transaction().is_none());
}

#[tokio::test]
async fn connector_works_through_the_trait() {
    let transport = Arc::new(MockTransport::new([Reply::content("text/turtle", TURTLE)]));
    let store: Box<dyn GraphStore> = Box::new(stardog_with(&transport));

    assert_eq!(store.name(), "stardog");
    assert!(store.capabilities().transactions_supported);
    let graph = store
        .load_graph(None, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(graph.len(), 2);
}
