//! Controller client (spec §4.A, §4.B, §4.C)
//!
//! - `transport` -- the raw HTTP transaction layer, one call per request.
//! - `pagination` -- the limit/offset page-walking algorithm.
//! - `types` -- wire types for every controller operation.
//! - `client` -- [`client::Controller`], the session-aware façade tying the
//!   above together into the operations table.

pub mod client;
pub mod pagination;
pub mod transport;
pub mod types;

pub use client::Controller;
pub use transport::RawResponse;
