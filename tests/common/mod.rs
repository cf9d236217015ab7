//! Shared test utilities for rptwatch integration harnesses.
//!
//! Import everything you need via `mod common; use common::*;` at the top of
//! each harness file. Filesystem helpers write into `tempfile` directories
//! that are removed when the returned guard drops.

pub mod assertions;
pub mod builders;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
