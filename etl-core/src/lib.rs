//! Dimensional ETL engine: turns semi-structured spreadsheet exports
//! into star-schema tables with stable surrogate keys.
//!
//! The engine is pure and synchronous. File readers hand it
//! [`RawTable`](table::RawTable)s; it hands the persistence layer
//! opaque [`TableWrite`](output::TableWrite) requests plus a
//! [`RunReport`](report::RunReport). Stage order is fixed: resolve
//! column bindings, build dimensions, merge datasets where two sources
//! exist, expand bridges, then derive facts.
//!
//! CRITICAL: every derivation must be DETERMINISTIC. Fact rows
//! reference dimension keys by value, so a rebuild on identical input
//! must assign identical surrogate keys.

pub mod bridge;
pub mod catalog;
pub mod dimension;
pub mod error;
pub mod fact;
pub mod merge;
pub mod output;
pub mod report;
pub mod resolve;
pub mod survey;
pub mod table;

pub use error::EtlError;
