//! Flow-log record schema
//!
//! Typed views over what the log index holds:
//! - `types`: `LogRecord`, `IpAggregateRow` and the enums they are built from.
//! - `field_serde`: lenient decoders for the loosely-typed fields of indexed documents.

pub mod field_serde;
pub mod types;

pub use types::*;
