//! Content-type driven selection of RDF and SPARQL results readers.

use std::{collections::HashMap, fmt, sync::Arc};

use oxigraph::{io::RdfFormat, sparql::results::QueryResultsFormat};
use thiserror::Error;

use crate::{
    rdf::{OxigraphRdfReader, RdfReader},
    results::{BooleanResultsReader, OxigraphResultsReader, ResultsReader},
};

/// Payload could not be decoded by the selected reader
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CodecError(pub String);

/// Which family of reader was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderKind {
    Rdf,
    Results,
}

impl fmt::Display for ReaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderKind::Rdf => f.write_str("RDF"),
            ReaderKind::Results => f.write_str("SPARQL results"),
        }
    }
}

/// No reader of the requested kind is registered for a content type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no {kind} reader is registered for content type '{content_type}'")]
pub struct FormatSelectionError {
    pub kind: ReaderKind,
    pub content_type: String,
}

const RDF_FORMATS: [RdfFormat; 6] = [
    RdfFormat::Turtle,
    RdfFormat::NTriples,
    RdfFormat::NQuads,
    RdfFormat::TriG,
    RdfFormat::RdfXml,
    RdfFormat::N3,
];

const RESULTS_FORMATS: [QueryResultsFormat; 3] = [
    QueryResultsFormat::Json,
    QueryResultsFormat::Xml,
    QueryResultsFormat::Tsv,
];

/// Media type without parameters, lowercased.
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Registry mapping media types to readers.
///
/// `Default` registers every syntax oxigraph reads. Custom readers override
/// the defaults for their media type.
#[derive(Clone)]
pub struct MimeRegistry {
    rdf_readers: HashMap<String, Arc<dyn RdfReader>>,
    results_readers: HashMap<String, Arc<dyn ResultsReader>>,
    rdf_order: Vec<String>,
    results_order: Vec<String>,
}

impl Default for MimeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for format in RDF_FORMATS {
            registry.register_rdf_reader(
                format.media_type(),
                Arc::new(OxigraphRdfReader::new(format)),
            );
        }
        registry.register_rdf_reader(
            "application/x-turtle",
            Arc::new(OxigraphRdfReader::new(RdfFormat::Turtle)),
        );
        registry.register_rdf_reader(
            "text/plain",
            Arc::new(OxigraphRdfReader::new(RdfFormat::NTriples)),
        );
        for format in RESULTS_FORMATS {
            registry.register_results_reader(
                format.media_type(),
                Arc::new(OxigraphResultsReader::new(format)),
            );
        }
        registry
    }
}

impl MimeRegistry {
    /// Registry with no readers at all.
    pub fn empty() -> Self {
        Self {
            rdf_readers: HashMap::new(),
            results_readers: HashMap::new(),
            rdf_order: Vec::new(),
            results_order: Vec::new(),
        }
    }

    pub fn register_rdf_reader(&mut self, media_type: &str, reader: Arc<dyn RdfReader>) {
        let key = essence(media_type);
        if self.rdf_readers.insert(key.clone(), reader).is_none() {
            self.rdf_order.push(key);
        }
    }

    pub fn register_results_reader(&mut self, media_type: &str, reader: Arc<dyn ResultsReader>) {
        let key = essence(media_type);
        if self.results_readers.insert(key.clone(), reader).is_none() {
            self.results_order.push(key);
        }
    }

    pub fn rdf_reader(
        &self,
        content_type: &str,
    ) -> Result<Arc<dyn RdfReader>, FormatSelectionError> {
        let key = essence(content_type);
        self.rdf_readers
            .get(&key)
            .cloned()
            .ok_or(FormatSelectionError {
                kind: ReaderKind::Rdf,
                content_type: key,
            })
    }

    /// Results reader for `content_type`. Plain text is read as a boolean
    /// only when the query was an ASK.
    pub fn results_reader(
        &self,
        content_type: &str,
        is_ask: bool,
    ) -> Result<Arc<dyn ResultsReader>, FormatSelectionError> {
        let key = essence(content_type);
        if let Some(reader) = self.results_readers.get(&key) {
            return Ok(reader.clone());
        }
        if is_ask && key == "text/plain" {
            return Ok(Arc::new(BooleanResultsReader));
        }
        Err(FormatSelectionError {
            kind: ReaderKind::Results,
            content_type: key,
        })
    }

    /// Accept header for queries: results syntaxes first, then RDF syntaxes.
    pub fn query_accept_header(&self) -> String {
        self.results_order
            .iter()
            .chain(self.rdf_order.iter().filter(|key| key.as_str() != "text/plain"))
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Accept header for graph retrieval.
    pub fn graph_accept_header(&self) -> String {
        self.rdf_order
            .iter()
            .filter(|key| key.as_str() != "text/plain")
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }
}
