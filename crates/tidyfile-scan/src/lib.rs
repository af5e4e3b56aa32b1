//! Directory scanning for tidyfile.
//!
//! Scanning happens in two phases:
//!
//! - **Candidate collection**: a serial jwalk traversal applying the depth,
//!   hidden-file and extension filters.
//! - **Extraction**: per-file stat, metadata and content sampling on a
//!   bounded rayon pool.
//!
//! Files that fail during extraction (vanished, unreadable) are dropped
//! from the result without error. A scan can therefore return fewer records
//! than it found candidates.
//!
//! # Example
//!
//! ```rust,no_run
//! use tidyfile_scan::{ScanConfig, Scanner};
//!
//! let config = ScanConfig::builder()
//!     .root("/path/to/inbox")
//!     .recursive(true)
//!     .build()
//!     .unwrap();
//! let records = Scanner::new().scan(&config).unwrap();
//!
//! for record in &records {
//!     println!("{} {}", record.path.display(), record.size_human());
//! }
//! ```

mod extract;
mod scanner;

pub use extract::{
    BINARY_SENTINEL, extract_metadata, mime_type_for, sample_content, sample_pdf_text,
};
pub use scanner::{Scanner, group_by_extension};

// Re-export core types for convenience
pub use tidyfile_core::{FileRecord, MetadataMap, ScanConfig, ScanConfigBuilder, ScanError};
