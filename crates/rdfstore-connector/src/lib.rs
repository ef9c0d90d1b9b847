//! Transactional HTTP connectors for RDF stores.
//!
//! [`StardogConnector`] speaks the Stardog transactional protocol (1.x, 2.x and
//! 3.x generations) and [`GraphStoreConnector`] the SPARQL 1.1 Graph Store
//! protocol. Both implement [`GraphStore`]. Every async operation takes a
//! [`CancellationToken`]; [`blocking`] and [`callback`] adapt them to
//! synchronous and callback-style callers.

pub mod blocking;
pub mod callback;
mod config;
mod connector;
pub mod dispatch;
pub mod error;
pub mod error_classification;
mod executor;
mod graph_store;
mod metrics;
pub mod mime;
pub mod rdf;
pub mod request;
pub mod results;
mod sequence;
mod store;
mod transaction;
pub mod transport;

pub use config::{
    ENV_PREFIX, GraphStoreConfig, ReasoningMode, StardogConnectorConfig, StardogVersion,
    TimeoutConfig, TransportConfig,
};
pub use connector::{QueryResult, StardogConnector};
pub use error::{Action, ConfigError, Result, StorageError};
pub use executor::Outcome;
pub use graph_store::GraphStoreConnector;
pub use rdf::Graph;
pub use results::SparqlResultSet;
pub use store::{GraphStore, StoreCapabilities};
pub use tokio_util::sync::CancellationToken;
pub use transaction::{TransactionId, TransactionStatus};

#[cfg(test)]
mod tests;
