#![allow(clippy::unwrap_used)]

//! Integration tests against a live Stardog server.
//!
//! Start one with: `docker run -d -p 5820:5820 stardog/stardog`, create a
//! database named by `STARDOG_KB` (default `test`) and run with
//! `RUN_STARDOG_TESTS=1`.

use oxigraph::model::NamedNode;
use tokio_util::sync::CancellationToken;

use super::triple;
use crate::{Graph, QueryResult, StardogConnector, StardogConnectorConfig, TransactionStatus};

fn live_config() -> StardogConnectorConfig {
    let mut config = StardogConnectorConfig::new(
        std::env::var("STARDOG_URL").unwrap_or_else(|_| "http://localhost:5820".to_string()),
        std::env::var("STARDOG_KB").unwrap_or_else(|_| "test".to_string()),
    );
    config.username = Some(std::env::var("STARDOG_USER").unwrap_or_else(|_| "admin".to_string()));
    config.password =
        Some(std::env::var("STARDOG_PASSWORD").unwrap_or_else(|_| "admin".to_string()));
    config
}

fn unique_graph(label: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("http://example.org/test/{label}/{nanos}")
}

#[tokio::test]
async fn test_stardog_save_load_delete() {
    if !super::require_stardog() {
        return;
    }

    let connector = match StardogConnector::new(live_config()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Skipping test - Stardog not available: {e}");
            return;
        }
    };
    let cancel = CancellationToken::new();
    let name = unique_graph("save");
    let graph = Graph::from_triples(
        Some(NamedNode::new(name.as_str()).unwrap()),
        [triple("s1", "a"), triple("s2", "b")],
    );

    connector.save_graph(&graph, &cancel).await.unwrap();
    let loaded = connector.load_graph(Some(&name), &cancel).await.unwrap();
    assert_eq!(loaded.len(), 2);
    assert!(loaded.contains(&triple("s1", "a")));

    let graphs = connector.list_graphs(&cancel).await.unwrap();
    assert!(graphs.contains(&name));

    connector
        .update_graph(Some(&name), &[triple("s3", "c")], &[triple("s1", "a")], &cancel)
        .await
        .unwrap();
    let updated = connector.load_graph(Some(&name), &cancel).await.unwrap();
    assert_eq!(updated.len(), 2);
    assert!(!updated.contains(&triple("s1", "a")));
    assert!(updated.contains(&triple("s3", "c")));

    connector.delete_graph(Some(&name), &cancel).await.unwrap();
    let deleted = connector.load_graph(Some(&name), &cancel).await.unwrap();
    assert!(deleted.is_empty());
}

#[tokio::test]
async fn test_stardog_rollback_discards_writes() {
    if !super::require_stardog() {
        return;
    }

    let connector = match StardogConnector::new(live_config()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Skipping test - Stardog not available: {e}");
            return;
        }
    };
    let cancel = CancellationToken::new();
    let name = unique_graph("rollback");

    connector.begin(&cancel).await.unwrap();
    connector
        .update_graph(Some(&name), &[triple("s", "o")], &[], &cancel)
        .await
        .unwrap();
    let inside = connector.load_graph(Some(&name), &cancel).await.unwrap();
    assert_eq!(inside.len(), 1);
    connector.rollback(&cancel).await.unwrap();
    assert_eq!(connector.transaction_status(), TransactionStatus::Terminated);

    let after = connector.load_graph(Some(&name), &cancel).await.unwrap();
    assert!(after.is_empty());
}

#[tokio::test]
async fn test_stardog_query_and_update() {
    if !super::require_stardog() {
        return;
    }

    let connector = match StardogConnector::new(live_config()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Skipping test - Stardog not available: {e}");
            return;
        }
    };
    let cancel = CancellationToken::new();
    let name = unique_graph("update");

    connector
        .update(
            &format!(
                "INSERT DATA {{ GRAPH <{name}> {{ <http://example.org/s> <http://example.org/p> \"o\" }} }}"
            ),
            &cancel,
        )
        .await
        .unwrap();

    let ask = connector
        .query(&format!("ASK {{ GRAPH <{name}> {{ ?s ?p ?o }} }}"), &cancel)
        .await
        .unwrap();
    match ask {
        QueryResult::Results(results) => assert_eq!(results.boolean(), Some(true)),
        QueryResult::Graph(_) => panic!("ASK returned a graph"),
    }

    let select = connector
        .query(&format!("SELECT ?s WHERE {{ GRAPH <{name}> {{ ?s ?p ?o }} }}"), &cancel)
        .await
        .unwrap();
    match select {
        QueryResult::Results(results) => assert_eq!(results.len(), 1),
        QueryResult::Graph(_) => panic!("SELECT returned a graph"),
    }

    connector.delete_graph(Some(&name), &cancel).await.unwrap();
}
