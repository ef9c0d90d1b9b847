mod integration_tests;
mod mock_transport;
mod stardog;

use std::sync::Arc;

use oxigraph::model::{Literal, NamedNode, Triple};

pub(super) use mock_transport::{MockTransport, Reply};

use crate::{StardogConnector, StardogConnectorConfig};

pub(super) fn require_stardog() -> bool {
    if std::env::var("RUN_STARDOG_TESTS").ok().as_deref() == Some("1") {
        true
    } else {
        eprintln!("Skipping Stardog tests (set RUN_STARDOG_TESTS=1)");
        false
    }
}

pub(super) fn stardog_config() -> StardogConnectorConfig {
    StardogConnectorConfig::new("http://localhost:5820", "kb")
}

pub(super) fn stardog_with(transport: &Arc<MockTransport>) -> StardogConnector {
    StardogConnector::with_transport(stardog_config(), transport.clone())
        .unwrap_or_else(|e| panic!("connector: {e}"))
}

pub(super) fn triple(subject: &str, object: &str) -> Triple {
    Triple::new(
        NamedNode::new(format!("http://example.org/{subject}")).unwrap_or_else(|e| panic!("{e}")),
        NamedNode::new("http://example.org/p").unwrap_or_else(|e| panic!("{e}")),
        Literal::new_simple_literal(object),
    )
}

pub(super) const GRAPH: &str = "http://example.org/graph";
