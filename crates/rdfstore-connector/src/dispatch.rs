use crate::{
    error::{Action, Result, StorageError},
    mime::MimeRegistry,
    rdf::RdfHandler,
    results::ResultsHandler,
    transport::HttpResponse,
};

/// Which handler consumed a query response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Results,
    Graph,
}

/// Route a query response by content type.
///
/// A results reader is tried first. Only when none is registered for the
/// content type is an RDF reader tried; a parse error from the selected
/// reader is reported as such and never retried with the other family.
pub fn dispatch(
    registry: &MimeRegistry,
    action: Action,
    response: &HttpResponse,
    is_ask: bool,
    rdf: &mut dyn RdfHandler,
    results: &mut dyn ResultsHandler,
) -> Result<Dispatched> {
    let content_type = response.content_type.as_deref().unwrap_or_default();
    let body = response.body_bytes();

    if let Ok(reader) = registry.results_reader(content_type, is_ask) {
        reader.read(body, results).map_err(|e| StorageError::Parse {
            action,
            reason: e.to_string(),
        })?;
        return Ok(Dispatched::Results);
    }

    match registry.rdf_reader(content_type) {
        Ok(reader) => {
            reader.read(body, rdf).map_err(|e| StorageError::Parse {
                action,
                reason: e.to_string(),
            })?;
            Ok(Dispatched::Graph)
        }
        Err(_) => Err(StorageError::UnsupportedContentType {
            content_type: content_type.to_string(),
        }),
    }
}

/// Parse a graph response with an RDF reader only.
pub fn read_graph(
    registry: &MimeRegistry,
    action: Action,
    response: &HttpResponse,
    rdf: &mut dyn RdfHandler,
) -> Result<()> {
    let content_type = response.content_type.as_deref().unwrap_or_default();
    let reader = registry
        .rdf_reader(content_type)
        .map_err(|source| StorageError::FormatSelection { action, source })?;
    reader
        .read(response.body_bytes(), rdf)
        .map_err(|e| StorageError::Parse {
            action,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::{rdf::Graph, results::SparqlResultSet};

    fn run(
        content_type: &str,
        body: &str,
        is_ask: bool,
    ) -> (Result<Dispatched>, Graph, SparqlResultSet) {
        let registry = MimeRegistry::default();
        let response = HttpResponse::new(200, Some(content_type), body);
        let mut graph = Graph::new();
        let mut results = SparqlResultSet::new();
        let outcome = dispatch(
            &registry,
            Action::Query,
            &response,
            is_ask,
            &mut graph,
            &mut results,
        );
        (outcome, graph, results)
    }

    #[test]
    fn results_content_goes_to_results_handler() {
        let (outcome, graph, results) = run(
            "application/sparql-results+json; charset=utf-8",
            r#"{"head":{},"boolean":false}"#,
            true,
        );
        assert_eq!(outcome.unwrap(), Dispatched::Results);
        assert_eq!(results.boolean(), Some(false));
        assert!(graph.is_empty());
    }

    #[test]
    fn rdf_content_falls_back_to_rdf_handler() {
        let (outcome, graph, results) = run(
            "text/turtle",
            "<http://example.org/s> <http://example.org/p> <http://example.org/o> .",
            false,
        );
        assert_eq!(outcome.unwrap(), Dispatched::Graph);
        assert_eq!(graph.len(), 1);
        assert!(results.is_empty());
    }

    #[test]
    fn plain_text_is_boolean_for_ask_and_ntriples_otherwise() {
        let (outcome, _, results) = run("text/plain", "true", true);
        assert_eq!(outcome.unwrap(), Dispatched::Results);
        assert_eq!(results.boolean(), Some(true));

        let (outcome, graph, _) = run(
            "text/plain",
            "<http://example.org/s> <http://example.org/p> \"o\" .",
            false,
        );
        assert_eq!(outcome.unwrap(), Dispatched::Graph);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn unknown_content_type_is_unsupported() {
        let (outcome, _, _) = run("application/pdf", "%PDF", false);
        match outcome {
            Err(StorageError::UnsupportedContentType { content_type }) => {
                assert_eq!(content_type, "application/pdf");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn malformed_results_are_parse_errors() {
        let (outcome, _, _) = run("application/sparql-results+json", "{ not json", false);
        assert!(matches!(outcome, Err(StorageError::Parse { .. })));
    }
}
