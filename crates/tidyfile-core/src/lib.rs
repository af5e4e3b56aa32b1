//! Core types for tidyfile.
//!
//! This crate holds the data model shared by the scanner, the operation
//! engine and the safety layer: immutable file records, operation intents
//! parsed at the planner boundary, batch results, the error taxonomy and
//! explicit configuration structs.

mod config;
mod error;
mod operation;
mod record;
mod result;

pub use config::{OperatorConfig, ScanConfig, ScanConfigBuilder, TidyConfig};
pub use error::{ConfigError, OpError, PlanError, ScanError};
pub use operation::{Operation, OperationIntent, OperationKind, parse_plan};
pub use record::{FileRecord, MetadataMap};
pub use result::{ExecutedOperation, ExecutionStatus, FailedOperation, OperationResult};
