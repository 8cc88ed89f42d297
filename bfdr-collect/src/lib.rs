//! Collects the FHIR artifacts each birth record needs from an EHR server.

pub mod catalog;
mod collect;
mod config;
mod error;
mod transport;

pub use catalog::{Fetch, FetchKind, SearchQuery, CHILD_BURST, MOTHER_BURST};
pub use collect::{CollectOutcome, CollectSummary, Collector, NO_REQUEST};
pub use config::{CollectConfig, DEFAULT_CHILD_IDENTIFIER_SYSTEM};
pub use error::CollectError;
pub use transport::{HttpTransport, Transport};
