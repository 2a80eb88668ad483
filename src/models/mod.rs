//! Domain models shared by the provider clients, the aggregator and the API.

mod metrics;

pub use metrics::*;
