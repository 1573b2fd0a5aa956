//! Common definitions (error and result types), relied upon by all metbuf-* crates.

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
