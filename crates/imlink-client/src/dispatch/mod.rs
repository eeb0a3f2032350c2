//! Request/response correlation.
//!
//! Re-exports the correlator so downstream consumers can depend on this
//! module directly.

pub mod correlator;

pub use correlator::{Correlator, Dispatch, Reply, Ticket};
