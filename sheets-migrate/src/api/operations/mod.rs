//! Store Operations Module
//!
//! A uniform description of the mutating calls the importer makes, so they
//! can be logged in dry runs and executed with retry otherwise.

pub mod operation;

pub use operation::{Operation, OperationResult};
