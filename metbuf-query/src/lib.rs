//! Query engine for hierarchical meteorological binary messages.
//!
//! The engine answers declarative queries of the form
//! `<subset>/<group>/.../<leaf>` against decoded subsets and materializes
//! each named query as a dense multi-dimensional array aligned across all
//! processed subsets. It runs in two stages:
//!
//! 1. Per subset, a [`runner::QueryRunner`] resolves each query against the
//!    subset's template (via a [`subset_table::SubsetTable`]), walks the flat
//!    value stream once and emits a [`frame::DataFrame`] holding every
//!    query's harvested values plus the replication counts that shaped them.
//! 2. A [`result_set::ResultSet`] accumulates frames across subsets and, on
//!    demand, inflates a named query's readings into a uniform bounding
//!    shape, inserting missing-value fill where replication counts fall
//!    short, and hands the result over as a typed [`data_object::DataObject`].

pub mod data_object;
pub mod frame;
pub mod result_set;
pub mod runner;
pub mod subset_table;
pub mod target;

#[cfg(test)]
mod tests;

pub use data_object::{ContainerKind, DataObject, DataValues};
pub use frame::{DataField, DataFrame};
pub use result_set::ResultSet;
pub use runner::QueryRunner;
pub use subset_table::SubsetTable;
pub use target::{Target, TargetComponent, TargetComponentKind, Targets};
