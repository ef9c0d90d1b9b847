//! Graphs, RDF handlers and the oxigraph-backed RDF codecs.

use oxigraph::{
    io::{RdfFormat, RdfParser, RdfSerializer},
    model::{Graph as TripleSet, GraphNameRef, NamedNode, Triple, TripleRef},
};

use crate::mime::CodecError;

/// A named or default graph: an unordered set of triples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    name: Option<NamedNode>,
    triples: TripleSet,
}

impl Graph {
    /// Empty default graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty graph with the given name, `None` for the default graph.
    pub fn with_name(name: Option<NamedNode>) -> Self {
        Self {
            name,
            triples: TripleSet::new(),
        }
    }

    pub fn from_triples(
        name: Option<NamedNode>,
        triples: impl IntoIterator<Item = Triple>,
    ) -> Self {
        let mut graph = Self::with_name(name);
        graph.extend(triples);
        graph
    }

    pub fn name(&self) -> Option<&NamedNode> {
        self.name.as_ref()
    }

    pub fn set_name(&mut self, name: Option<NamedNode>) {
        self.name = name;
    }

    /// Returns `false` when the triple was already present.
    pub fn insert(&mut self, triple: &Triple) -> bool {
        self.triples.insert(triple)
    }

    pub fn extend(&mut self, triples: impl IntoIterator<Item = Triple>) {
        for triple in triples {
            self.triples.insert(&triple);
        }
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    pub fn iter(&self) -> impl Iterator<Item = TripleRef<'_>> {
        self.triples.iter()
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    fn graph_name(&self) -> GraphNameRef<'_> {
        match &self.name {
            Some(name) => GraphNameRef::NamedNode(name.as_ref()),
            None => GraphNameRef::DefaultGraph,
        }
    }
}

/// Receives triples as a response is parsed
pub trait RdfHandler: Send {
    fn handle_triple(&mut self, triple: Triple);
}

impl RdfHandler for Graph {
    fn handle_triple(&mut self, triple: Triple) {
        self.triples.insert(&triple);
    }
}

/// Parses an RDF payload into a handler
pub trait RdfReader: Send + Sync {
    fn read(&self, body: &[u8], handler: &mut dyn RdfHandler) -> Result<(), CodecError>;
}

/// Serializes a graph into a request payload
pub trait DatasetWriter: Send + Sync {
    fn content_type(&self) -> &str;

    fn write(&self, graph: &Graph) -> Result<Vec<u8>, CodecError>;
}

/// Reader for any syntax oxigraph parses. Quads are flattened into triples.
#[derive(Debug, Clone, Copy)]
pub struct OxigraphRdfReader {
    format: RdfFormat,
}

impl OxigraphRdfReader {
    pub fn new(format: RdfFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> RdfFormat {
        self.format
    }
}

impl RdfReader for OxigraphRdfReader {
    fn read(&self, body: &[u8], handler: &mut dyn RdfHandler) -> Result<(), CodecError> {
        for parsed in RdfParser::from_format(self.format).for_reader(body) {
            let quad = parsed.map_err(|e| {
                CodecError(format!("invalid {} content: {}", self.format.name(), e))
            })?;
            handler.handle_triple(Triple::from(quad));
        }
        Ok(())
    }
}

/// Writer emitting a graph in the given syntax. Dataset syntaxes carry the
/// graph name; triple syntaxes drop it.
#[derive(Debug, Clone, Copy)]
pub struct OxigraphDatasetWriter {
    format: RdfFormat,
}

impl OxigraphDatasetWriter {
    pub fn new(format: RdfFormat) -> Self {
        Self { format }
    }

    /// Writer for a media type oxigraph can serialize.
    pub fn for_media_type(media_type: &str) -> Option<Self> {
        let essence = crate::mime::essence(media_type);
        RdfFormat::from_media_type(&essence).map(Self::new)
    }
}

impl DatasetWriter for OxigraphDatasetWriter {
    fn content_type(&self) -> &str {
        self.format.media_type()
    }

    fn write(&self, graph: &Graph) -> Result<Vec<u8>, CodecError> {
        let mut serializer = RdfSerializer::from_format(self.format).for_writer(Vec::new());
        let graph_name = graph.graph_name();
        for triple in graph.iter() {
            let written = if self.format.supports_datasets() {
                serializer.serialize_quad(triple.in_graph(graph_name))
            } else {
                serializer.serialize_triple(triple)
            };
            written.map_err(|e| CodecError(format!("failed to serialize triple: {e}")))?;
        }
        serializer
            .finish()
            .map_err(|e| CodecError(format!("failed to finish serialization: {e}")))
    }
}
