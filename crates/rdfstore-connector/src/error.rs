use std::fmt;

use thiserror::Error;

use crate::{mime::FormatSelectionError, transport::TransportErrorKind};

/// The storage action an error occurred in, used to phrase error messages
/// and label metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    LoadGraph,
    SaveGraph,
    UpdateGraph,
    DeleteGraph,
    HasGraph,
    ListGraphs,
    Query,
    SparqlUpdate,
    BeginTransaction,
    CommitTransaction,
    RollbackTransaction,
}

impl Action {
    /// Phrase completing "... occurred while <phrase> the Store".
    pub fn phrase(self) -> &'static str {
        match self {
            Action::LoadGraph => "loading a Graph from",
            Action::SaveGraph => "saving a Graph to",
            Action::UpdateGraph => "updating a Graph in",
            Action::DeleteGraph => "deleting a Graph from",
            Action::HasGraph => "checking Graph existence in",
            Action::ListGraphs => "listing Graphs from",
            Action::Query => "executing a query on",
            Action::SparqlUpdate => "executing a SPARQL update against",
            Action::BeginTransaction => "beginning a Transaction in",
            Action::CommitTransaction => "committing a Transaction to",
            Action::RollbackTransaction => "rolling back a Transaction from",
        }
    }

    /// Low-cardinality metric label.
    pub fn label(self) -> &'static str {
        match self {
            Action::LoadGraph => "load_graph",
            Action::SaveGraph => "save_graph",
            Action::UpdateGraph => "update_graph",
            Action::DeleteGraph => "delete_graph",
            Action::HasGraph => "has_graph",
            Action::ListGraphs => "list_graphs",
            Action::Query => "query",
            Action::SparqlUpdate => "sparql_update",
            Action::BeginTransaction => "begin",
            Action::CommitTransaction => "commit",
            Action::RollbackTransaction => "rollback",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.phrase())
    }
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors surfaced by the store connectors
#[derive(Error, Debug)]
pub enum StorageError {
    /// The store answered with a non-success HTTP status
    #[error("{message}")]
    Http {
        action: Action,
        status: u16,
        reason: Option<String>,
        /// Excerpt of the response body, when one could be read
        body: Option<String>,
        message: String,
    },

    /// The request never produced an HTTP response
    #[error("A transport error ({kind}) occurred while {action} the Store: {message}")]
    Transport {
        action: Action,
        kind: TransportErrorKind,
        message: String,
    },

    /// The caller's cancellation token fired
    #[error("The operation was cancelled while {action} the Store")]
    Cancelled { action: Action },

    #[error("Cannot start a new Transaction as there is already an active Transaction")]
    TransactionAlreadyActive,

    #[error("Cannot {operation} a Transaction as there is currently no active Transaction")]
    NoActiveTransaction { operation: &'static str },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Neither a SPARQL results reader nor an RDF reader accepts the response
    #[error(
        "Unable to process a response with content type '{content_type}' as either SPARQL results or RDF"
    )]
    UnsupportedContentType { content_type: String },

    #[error("No reader available while {action} the Store: {source}")]
    FormatSelection {
        action: Action,
        #[source]
        source: FormatSelectionError,
    },

    #[error("Error parsing content returned while {action} the Store: {reason}")]
    Parse { action: Action, reason: String },

    #[error("Invalid response while {action} the Store: {reason}")]
    InvalidResponse { action: Action, reason: String },

    #[error("Failed to serialize RDF: {0}")]
    Serialize(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Concurrency limiter closed")]
    SemaphoreClosed,
}

impl StorageError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StorageError::Cancelled { .. })
    }

    /// HTTP status of the failed response, if the store answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            StorageError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, StorageError>;
