//! sqlbridge engine - schema inference and streaming extraction
//!
//! This crate implements the connector's two pipelines:
//! - Type classification and key detection
//! - Schema inference from a probe query
//! - Streaming extraction through a row transformer into a row sink
//! - Request validation and the connector capability traits

pub mod classifier;
pub mod keys;
pub mod inference;
pub mod canonical;
pub mod transform;
pub mod sink;
pub mod extract;
pub mod request;
pub mod connector;

pub use classifier::classify;
pub use keys::{KeyResolver, KeyResolution};
pub use inference::{SchemaInferencer, InferenceOptions, InferError};
pub use canonical::{CanonicalValue, CanonicalRow, CanonicalRows};
pub use transform::{RowTransformer, LdmTransformer, PassthroughTransformer, TransformError};
pub use sink::{RowSink, CsvSink, CsvFileSink, MemorySink};
pub use extract::{StreamingExtractor, ExtractError};
pub use request::{ExtractParams, ExtractRequest, InferenceParams, InferenceRequest};
pub use connector::{SchemaInferrer, Extractor, SqlConnector};
