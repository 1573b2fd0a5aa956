//! Subset template model for hierarchical meteorological binary messages.
//!
//! A message consists of *subsets*, each an instance of a named template: a
//! tree of mnemonic-tagged fields and nested replication groups. This crate
//! defines the template node model ([`NodeType`], [`TypeInfo`]), the
//! [`DataProvider`](provider::DataProvider) interface through which a decoded
//! subset is observed, and the parsed query model ([`query`]) consumed by the
//! query engine.

pub mod node_type;
pub mod provider;
pub mod query;
pub mod type_info;

pub use node_type::NodeType;
pub use provider::DataProvider;
pub use type_info::TypeInfo;

/// Sentinel marking an absent reading in materialized output.
///
/// The decoder never produces this value; any occurrence in an output array
/// denotes absence (a query miss, or fill inserted during shape alignment).
pub const MISSING_VALUE: f64 = 10.0e10;
